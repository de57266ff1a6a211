//! One aggregation pass over a record store.

use odfce_odf::{RecordStore, TradingLimits};
use odfce_types::{
    AdjustmentSettings, Decimal, Epoch, HeaderField, IntervalTable, OdfName, OdfceError, Record,
    RecordField, Result, Settings,
};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tracing::{debug, error, info};

use crate::{CellUpdate, Chunk, ChunkAddress, ChunkId, PassResult, ShortChunk};

/// Everything a pass needs besides the store itself.
#[derive(Debug, Clone, Copy)]
pub struct PassContext<'a> {
    /// The ODF being processed.
    pub name: &'a OdfName,
    /// Epoch of the current calendar week.
    pub current_epoch: Epoch,
    /// Run settings.
    pub settings: &'a Settings,
    /// Active intervals for this ODF.
    pub intervals: &'a IntervalTable,
}

/// Supplies the prior state of a chunk the first time a pass touches it.
pub trait ChunkSource {
    /// Returns the stored chunk `id`, or a zeroed one of `size` cells.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored chunk exists but cannot be read.
    fn load(&mut self, id: ChunkId, size: u32) -> PassResult<Chunk>;
}

/// A source with no prior state: every chunk starts zeroed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroChunks;

impl ChunkSource for ZeroChunks {
    fn load(&mut self, id: ChunkId, size: u32) -> PassResult<Chunk> {
        Ok(Chunk::new(id, size))
    }
}

impl ChunkSource for BTreeMap<ChunkId, Chunk> {
    fn load(&mut self, id: ChunkId, size: u32) -> PassResult<Chunk> {
        Ok(self.remove(&id).unwrap_or_else(|| Chunk::new(id, size)))
    }
}

/// A chunk ready to be flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedChunk {
    /// Accumulated cells, not gap-filled, header refreshed.
    pub long: Chunk,
    /// Gap-filled and quantized cells.
    pub short: ShortChunk,
}

/// What a pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Nothing left to aggregate and the ODF's week is over; the caller
    /// archives the ODF.
    Archived,
    /// Nothing left to aggregate in the current week.
    UpToDate,
    /// Records were aggregated.
    Processed {
        /// Records routed into chunks.
        records: usize,
        /// Records created or repaired by the gap-fill.
        gap_filled: usize,
        /// Every touched chunk.
        chunks: Vec<FinishedChunk>,
    },
}

impl PassOutcome {
    /// Short label for logs and reports.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Archived => "archived",
            Self::UpToDate => "up to date",
            Self::Processed { .. } => "processed",
        }
    }
}

fn positive_header(store: &RecordStore, field: HeaderField) -> u32 {
    store.header_u32(field).filter(|v| *v > 0).unwrap_or(1)
}

fn has_no_price(record: &Record) -> bool {
    record.open.is_zero() && record.high.is_zero() && record.low.is_zero() && record.close.is_zero()
}

/// Shifts nonzero prices by one tick (sign by recno parity) and inflates
/// the volume.
///
/// # Errors
///
/// Returns [`OdfceError::InvalidAdjustment`] if a price turns negative.
pub fn adjust_record(
    record: &Record,
    tick: u32,
    divider: u32,
    adjustment: &AdjustmentSettings,
) -> Result<Record> {
    let step = Decimal::from(tick) / Decimal::from(divider.max(1));
    let delta = step * Decimal::from(adjustment.even_recno_sign.factor(record.recno));
    let mut adjusted = *record;
    for field in RecordField::PRICES {
        let value = record.get(field);
        if value.is_zero() {
            continue;
        }
        let shifted = value + delta;
        if shifted.is_sign_negative() && !shifted.is_zero() {
            return Err(OdfceError::InvalidAdjustment {
                recno: record.recno,
                field: field.as_str(),
                value: shifted,
            });
        }
        adjusted.set(field, shifted);
    }
    adjusted.volume = record.volume + record.volume * adjustment.volume_inflation;
    Ok(adjusted)
}

/// Aggregates every unprocessed in-limits record of `store` into chunks.
///
/// Gap-fills the store, routes each record into one cell per interval,
/// finalizes every touched chunk and advances LAST_FCED_RECNO to
/// HIGHEST_RECNO. On error the watermark is left untouched and nothing is
/// returned for flushing.
///
/// # Errors
///
/// Returns [`OdfceError::HeaderIntegrity`] for missing limits headers or a
/// watermark past HIGHEST_RECNO, [`OdfceError::ChunkAddressing`] or
/// [`OdfceError::InvalidAdjustment`] from the per-record steps, and any
/// error of `source`.
pub fn run_pass(
    store: &mut RecordStore,
    ctx: &PassContext<'_>,
    source: &mut dyn ChunkSource,
) -> PassResult<PassOutcome> {
    let limits = store.limits(ctx.settings.recno_cycle)?;
    let highest = store
        .header_u32(HeaderField::HighestRecno)
        .ok_or_else(|| OdfceError::HeaderIntegrity("missing header HIGHEST_RECNO".into()))?;
    let last_fced = store.header_u32(HeaderField::LastFcedRecno).unwrap_or(0);

    if last_fced > highest {
        return Err(OdfceError::HeaderIntegrity(format!(
            "LAST_FCED_RECNO {last_fced} is past HIGHEST_RECNO {highest}"
        ))
        .into());
    }
    if last_fced == highest {
        let outcome = if ctx.name.epoch() == ctx.current_epoch {
            PassOutcome::UpToDate
        } else {
            PassOutcome::Archived
        };
        debug!(odf = %ctx.name, outcome = outcome.label(), "nothing to aggregate");
        return Ok(outcome);
    }

    let gap_filled = store.fill_missing_records(&limits)?;
    let tick = positive_header(store, HeaderField::Tick);
    let divider = positive_header(store, HeaderField::OhlcDivider);

    let mut chunks = BTreeMap::new();
    let mut records = 0;
    for recno in limits.recnos(last_fced, highest) {
        let Some(raw) = store.get(recno).copied() else {
            continue;
        };
        if has_no_price(&raw) {
            continue;
        }
        let record = if ctx.settings.adjustment.enabled {
            adjust_record(&raw, tick, divider, &ctx.settings.adjustment)?
        } else {
            raw
        };
        route_record(&record, highest, &limits, ctx, source, &mut chunks)?;
        records += 1;
    }

    let chunks: Vec<FinishedChunk> = chunks
        .into_values()
        .map(|mut long| {
            long.refresh_header();
            let short = long.filled().quantize_to_short(tick, divider);
            FinishedChunk { long, short }
        })
        .collect();

    store.set_header(HeaderField::LastFcedRecno, Decimal::from(highest));
    info!(
        odf = %ctx.name,
        from = last_fced,
        through = highest,
        records,
        gap_filled,
        chunks = chunks.len(),
        "aggregated"
    );
    Ok(PassOutcome::Processed {
        records,
        gap_filled,
        chunks,
    })
}

fn route_record(
    record: &Record,
    highest: u32,
    limits: &TradingLimits,
    ctx: &PassContext<'_>,
    source: &mut dyn ChunkSource,
    chunks: &mut BTreeMap<ChunkId, Chunk>,
) -> PassResult<()> {
    let size = ctx.settings.chunk_size;
    let recno = record.recno;
    for interval in ctx.intervals.iter() {
        let addr = ChunkAddress::compute(
            interval,
            recno,
            ctx.name.epoch(),
            ctx.settings.first_jsunnoon,
            size,
        )
        .inspect_err(|e| {
            error!(odf = %ctx.name, l_code = interval.l_code, recno, error = %e, "chunk addressing failed");
        })?;
        let chunk = match chunks.entry(addr.chunk) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(source.load(addr.chunk, size)?),
        };

        // Limits are exclusive, so the first tradable recno stands in for
        // the trading start.
        let update = CellUpdate {
            write_open: !addr.open_suppressed(interval)
                && (recno == addr.bar_open_recno
                    || recno == limits.trading_start.saturating_add(1)),
            write_close: interval.four_week_bar
                || recno == addr.bar_close_recno
                || recno == highest,
        };
        chunk.apply(addr.chunk_recno, recno, record, update)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PassError;
    use odfce_types::{AdjustmentSign, IntervalDefinition, IntervalToggles, INTERVAL_TABLE};

    const FIRST: Epoch = Epoch(56460);

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn store_with(records: &[(u32, &str)], highest: u32) -> RecordStore {
        let mut store = RecordStore::new();
        store.set_header(HeaderField::TradingStartRecno, Decimal::from(1));
        store.set_header(HeaderField::TradingRecsPerday, Decimal::from(1440));
        store.set_header(HeaderField::Tick, Decimal::from(5));
        store.set_header(HeaderField::OhlcDivider, Decimal::from(1000));
        store.set_header(HeaderField::HighestRecno, Decimal::from(highest));
        store.set_header(HeaderField::LastFcedRecno, Decimal::from(99));
        for (recno, price) in records {
            let p = d(price);
            store.insert(Record::new(*recno, p, p, p, p, Decimal::from(10)));
        }
        store
    }

    fn table(codes: &[u16]) -> IntervalTable {
        let all = IntervalTable::standard(1, &IntervalToggles::default());
        IntervalTable::from_definitions(
            codes.iter().filter_map(|c| all.get(*c).copied()).collect(),
        )
    }

    fn run(
        store: &mut RecordStore,
        name: &str,
        intervals: &IntervalTable,
        settings: &Settings,
    ) -> PassResult<PassOutcome> {
        let name = OdfName::parse(name).unwrap();
        let ctx = PassContext {
            name: &name,
            current_epoch: FIRST,
            settings,
            intervals,
        };
        run_pass(store, &ctx, &mut ZeroChunks)
    }

    fn chunks(outcome: PassOutcome) -> Vec<FinishedChunk> {
        match outcome {
            PassOutcome::Processed { chunks, .. } => chunks,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_gap_filled_record_lands_in_chunk() {
        let mut store = store_with(&[(100, "1.100"), (102, "1.120")], 102);
        let outcome = run(&mut store, "EURUSD-1856460", &table(&[31]), &Settings::default()).unwrap();
        let PassOutcome::Processed {
            records,
            gap_filled,
            ref chunks,
        } = outcome
        else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert_eq!(records, 3);
        assert_eq!(gap_filled, 1);
        assert_eq!(chunks.len(), 1);

        // one-minute bars: recno r lands in cell r + 1
        let long = &chunks[0].long;
        assert_eq!(long.id().chunk_no, 1);
        assert_eq!(long.cell(101).unwrap().volume, Decimal::from(10));
        assert_eq!(long.cell(102).unwrap().close, d("1.100"));
        assert_eq!(long.cell(102).unwrap().volume, Decimal::ZERO);
        assert_eq!(long.cell(103).unwrap().close, d("1.120"));
        assert_eq!(long.header().open_recno, 100);
        assert_eq!(long.header().close_recno, 102);
        assert_eq!(store.header_u32(HeaderField::LastFcedRecno), Some(102));
        assert_eq!(store.get(101).unwrap().close, d("1.100"));
    }

    #[test]
    fn test_daily_bar_on_third_day() {
        let mut store = store_with(&[(2881, "1.2"), (2882, "1.3")], 2882);
        store.set_header(HeaderField::LastFcedRecno, Decimal::from(2880));
        let chunks = chunks(run(&mut store, "EURUSD-1856460", &table(&[79]), &Settings::default()).unwrap());
        assert_eq!(chunks.len(), 1);

        let cell = chunks[0].long.cell(3).unwrap();
        assert_eq!(cell.open, d("1.2"));
        assert_eq!(cell.high, d("1.3"));
        assert_eq!(cell.low, d("1.2"));
        assert_eq!(cell.close, d("1.3"));
        assert_eq!(cell.volume, Decimal::from(20));
        assert_eq!(chunks[0].long.id().l_code, 79);
    }

    #[test]
    fn test_short_chunk_is_filled_and_quantized() {
        let mut store = store_with(&[(100, "1.100"), (101, "1.125")], 101);
        let chunks = chunks(run(&mut store, "EURUSD-1856460", &table(&[31]), &Settings::default()).unwrap());
        let short = &chunks[0].short;
        assert_eq!(short.header().lowest_low, 1100);
        // prices are stored as 1 + ticks above LOWEST_LOW
        assert_eq!(short.cells()[100].close, 1);
        assert_eq!(short.cells()[101].close, 6);
        // back-filled with the first OPEN
        assert_eq!(short.cells()[0].open, 1);
        assert_eq!(short.cells()[0].volume, 0);
        // forward-filled with the last CLOSE
        assert_eq!(short.cells()[1439].close, 6);
        // the long chunk keeps its gaps
        assert_eq!(chunks[0].long.cell(1).unwrap().open, Decimal::ZERO);
    }

    #[test]
    fn test_every_interval_is_addressed() {
        let mut store = store_with(&[(100, "1.1")], 100);
        let all = IntervalTable::standard(1, &IntervalToggles::default());
        let chunks = chunks(run(&mut store, "EURUSD-1856460", &all, &Settings::default()).unwrap());
        assert_eq!(chunks.len(), INTERVAL_TABLE.len());
    }

    #[test]
    fn test_no_op_outcomes() {
        let settings = Settings::default();
        let mut store = store_with(&[(100, "1.1")], 99);
        let outcome = run(&mut store, "EURUSD-1856460", &table(&[31]), &settings).unwrap();
        assert_eq!(outcome, PassOutcome::UpToDate);
        let outcome = run(&mut store, "EURUSD-1856453", &table(&[31]), &settings).unwrap();
        assert_eq!(outcome, PassOutcome::Archived);
    }

    #[test]
    fn test_watermark_past_highest() {
        let mut store = store_with(&[(100, "1.1")], 50);
        let err = run(&mut store, "EURUSD-1856460", &table(&[31]), &Settings::default()).unwrap_err();
        assert!(matches!(err, PassError::Core(OdfceError::HeaderIntegrity(_))));
    }

    #[test]
    fn test_addressing_error_keeps_watermark() {
        let mut store = store_with(&[(100, "1.1")], 100);
        store.set_header(HeaderField::LastFcedRecno, Decimal::from(9));
        store.insert(Record::new(10, d("1"), d("1"), d("1"), d("1"), Decimal::ONE));
        let shifted = IntervalTable::from_definitions(vec![IntervalDefinition {
            l_code: 59,
            bar_minutes: 60,
            weeks_per_epoch: 8,
            time_shift: 30,
            four_week_bar: false,
        }]);
        let err = run(&mut store, "EURUSD-1856460", &shifted, &Settings::default()).unwrap_err();
        assert!(matches!(
            err,
            PassError::Core(OdfceError::ChunkAddressing { l_code: 59, recno: 10, .. })
        ));
        assert_eq!(store.header_u32(HeaderField::LastFcedRecno), Some(9));
    }

    #[test]
    fn test_adjustment() {
        let adjustment = AdjustmentSettings {
            enabled: true,
            ..AdjustmentSettings::default()
        };
        let record = Record::new(100, d("1.100"), d("1.105"), Decimal::ZERO, d("1.1"), d("50"));
        let adjusted = adjust_record(&record, 5, 1000, &adjustment).unwrap();
        assert_eq!(adjusted.open, d("1.105"));
        assert_eq!(adjusted.high, d("1.110"));
        assert_eq!(adjusted.low, Decimal::ZERO);
        assert_eq!(adjusted.volume, d("51"));

        let odd = Record { recno: 101, ..record };
        assert_eq!(adjust_record(&odd, 5, 1000, &adjustment).unwrap().open, d("1.095"));

        let minus = AdjustmentSettings {
            even_recno_sign: AdjustmentSign::Minus,
            ..adjustment.clone()
        };
        assert_eq!(adjust_record(&record, 5, 1000, &minus).unwrap().open, d("1.095"));

        let tiny = Record::new(101, d("0.001"), d("0.001"), d("0.001"), d("0.001"), d("1"));
        assert!(matches!(
            adjust_record(&tiny, 5, 1000, &adjustment),
            Err(OdfceError::InvalidAdjustment { recno: 101, .. })
        ));
    }

    #[test]
    fn test_invalid_adjustment_aborts_pass() {
        let mut store = store_with(&[(100, "1.1"), (101, "0.001")], 101);
        let mut settings = Settings::default();
        settings.adjustment.enabled = true;
        let err = run(&mut store, "EURUSD-1856460", &table(&[31]), &settings).unwrap_err();
        assert!(matches!(err, PassError::Core(OdfceError::InvalidAdjustment { .. })));
        assert_eq!(store.header_u32(HeaderField::LastFcedRecno), Some(99));
    }

    #[test]
    fn test_second_pass_accumulates() {
        let settings = Settings::default();
        let intervals = table(&[35]);
        let mut store = store_with(&[(100, "1.10"), (101, "1.30")], 101);
        let first = chunks(run(&mut store, "EURUSD-1856460", &intervals, &settings).unwrap());

        store.insert(Record::new(102, d("1.2"), d("1.2"), d("1.05"), d("1.2"), Decimal::from(10)));
        store.set_header(HeaderField::HighestRecno, Decimal::from(102));
        let mut cache: BTreeMap<ChunkId, Chunk> =
            first.into_iter().map(|c| (c.long.id(), c.long)).collect();
        let name = OdfName::parse("EURUSD-1856460").unwrap();
        let ctx = PassContext {
            name: &name,
            current_epoch: FIRST,
            settings: &settings,
            intervals: &intervals,
        };
        let second = chunks(run_pass(&mut store, &ctx, &mut cache).unwrap());

        // recnos 100..=104 share cell 21; 101 opens its bar
        let cell = second[0].long.cell(21).unwrap();
        assert_eq!(cell.open, d("1.30"));
        assert_eq!(cell.high, d("1.30"));
        assert_eq!(cell.low, d("1.05"));
        assert_eq!(cell.close, d("1.2"));
        assert_eq!(cell.volume, Decimal::from(30));
        assert_eq!(second[0].long.header().open_recno, 100);
        assert_eq!(second[0].long.header().close_recno, 102);
    }

    #[test]
    fn test_daily_open_needs_bar_open_recno() {
        // 2881 opens the third daily bar but was aggregated by an earlier pass
        let mut store = store_with(&[(2881, "1.2"), (2882, "1.3")], 2882);
        store.set_header(HeaderField::LastFcedRecno, Decimal::from(2881));
        let chunks = chunks(run(&mut store, "EURUSD-1856460", &table(&[79]), &Settings::default()).unwrap());

        let cell = chunks[0].long.cell(3).unwrap();
        assert_eq!(cell.open, Decimal::ZERO);
        assert_eq!(cell.close, d("1.3"));
        assert_eq!(cell.volume, Decimal::from(10));
    }

    #[test]
    fn test_close_waits_for_bar_close() {
        // recnos 96..=100 share one 5-minute bar; 98 is neither its close nor HIGHEST_RECNO
        let mut store = store_with(&[(98, "1.1"), (99, "1.2"), (100, "1.3"), (101, "1.4")], 101);
        store.set_header(HeaderField::LastFcedRecno, Decimal::from(97));
        let chunks = chunks(run(&mut store, "EURUSD-1856460", &table(&[35]), &Settings::default()).unwrap());
        let long = &chunks[0].long;

        // fce recnos: 98, 99 -> 20; 100, 101 -> 21
        let cell = long.cell(20).unwrap();
        assert_eq!(cell.open, Decimal::ZERO);
        assert_eq!(cell.close, Decimal::ZERO);
        assert_eq!(cell.high, d("1.2"));
        let cell = long.cell(21).unwrap();
        assert_eq!(cell.open, d("1.4"));
        assert_eq!(cell.close, d("1.4"));
    }

    #[test]
    fn test_four_week_bar_open_skipped_in_opening_week() {
        let intervals = table(&[98]);
        let settings = Settings::default();
        let records = [(2, "1.1"), (3, "1.2")];

        let mut store = store_with(&records, 3);
        store.set_header(HeaderField::LastFcedRecno, Decimal::from(1));
        let opening = chunks(run(&mut store, "EURUSD-1856460", &intervals, &settings).unwrap());
        let cell = opening[0].long.cell(1).unwrap();
        assert_eq!(cell.open, Decimal::ZERO);
        assert_eq!(cell.close, d("1.2"));

        // the second week writes OPEN on its first tradable recno
        let mut store = store_with(&records, 3);
        store.set_header(HeaderField::LastFcedRecno, Decimal::from(1));
        let later = chunks(run(&mut store, "EURUSD-1856467", &intervals, &settings).unwrap());
        let cell = later[0].long.cell(1).unwrap();
        assert_eq!(cell.open, d("1.1"));
        assert_eq!(cell.close, d("1.2"));
    }
}
