//! Mapping of ODF recnos onto chunk cells.

use odfce_types::{Epoch, IntervalDefinition, MINUTES_PER_WEEK, OdfceError, Result};

/// Identity of one chunk of one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkId {
    /// Interval L-code.
    pub l_code: u16,
    /// First day of the FCE epoch.
    pub epoch: Epoch,
    /// 1-based chunk number inside the epoch.
    pub chunk_no: u32,
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}/{}/{:02}", self.l_code, self.epoch, self.chunk_no)
    }
}

/// Where one ODF recno lands for one interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkAddress {
    /// Last recno of the bar containing the source recno.
    pub bar_close_recno: u32,
    /// First recno of that bar.
    pub bar_open_recno: u32,
    /// 1-based week of the ODF inside its FCE epoch.
    pub week_in_epoch: u32,
    /// Bar index inside the FCE epoch.
    pub fce_recno: u32,
    /// Target chunk.
    pub chunk: ChunkId,
    /// 1-based cell inside the chunk.
    pub chunk_recno: u32,
}

impl ChunkAddress {
    /// Addresses `recno` of the ODF week `odf_epoch` for `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`OdfceError::ChunkAddressing`] if the bar index is not
    /// positive or the interval or chunk size is zero.
    pub fn compute(
        interval: &IntervalDefinition,
        recno: u32,
        odf_epoch: Epoch,
        first_epoch: Epoch,
        chunk_size: u32,
    ) -> Result<Self> {
        let fce_epoch = odf_epoch.fce_epoch_start(first_epoch, interval.epoch_days());
        let addressing_error = |fce_recno: i64| OdfceError::ChunkAddressing {
            l_code: interval.l_code,
            bar_minutes: interval.bar_minutes,
            weeks_per_epoch: interval.weeks_per_epoch,
            time_shift: interval.time_shift,
            recno,
            odf_epoch: odf_epoch.day(),
            fce_epoch: fce_epoch.day(),
            fce_recno,
        };
        if interval.bar_minutes == 0 || chunk_size == 0 {
            return Err(addressing_error(0));
        }

        let bar = i64::from(interval.bar_minutes);
        let bar_close = i64::from(recno).div_euclid(bar) * bar
            + if i64::from(recno) % bar == 0 { 0 } else { bar };
        let bar_open = bar_close - bar + 1;

        let week_in_epoch = odf_epoch.week_in_epoch(fce_epoch);
        let offset = (i64::from(MINUTES_PER_WEEK) * i64::from(week_in_epoch - 1)).div_euclid(bar);
        let fce_recno =
            (i64::from(recno) + bar - i64::from(interval.time_shift)).div_euclid(bar) + offset;
        if fce_recno <= 0 {
            return Err(addressing_error(fce_recno));
        }

        let size = i64::from(chunk_size);
        let chunk_no = (fce_recno + size - 1) / size;
        let chunk_recno = fce_recno - (chunk_no - 1) * size;

        let to_u32 = |v: i64| u32::try_from(v).map_err(|_| addressing_error(fce_recno));
        Ok(Self {
            bar_close_recno: to_u32(bar_close)?,
            bar_open_recno: to_u32(bar_open.max(0))?,
            week_in_epoch,
            fce_recno: to_u32(fce_recno)?,
            chunk: ChunkId {
                l_code: interval.l_code,
                epoch: fce_epoch,
                chunk_no: to_u32(chunk_no)?,
            },
            chunk_recno: to_u32(chunk_recno)?,
        })
    }

    /// Returns true if the bar's OPEN must not be written this week.
    ///
    /// A four-week bar spans four ODF weeks; the week that begins it writes
    /// no OPEN.
    #[must_use]
    pub const fn open_suppressed(&self, interval: &IntervalDefinition) -> bool {
        interval.four_week_bar && self.week_in_epoch.saturating_sub(1) % 4 == 0
    }
}
