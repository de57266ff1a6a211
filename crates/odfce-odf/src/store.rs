//! The ODF record store.

use odfce_codec::{Codec, Value, layout};
use odfce_types::{
    Decimal, HEADER_COUNT, HeaderField, OdfceError, Record, RecordField, Result, TEXT_HEADER_COUNT,
};
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeMap;
use std::io::Read;
use tracing::debug;

use crate::limits::{RecnosWithinLimits, TradingLimits};

/// First body recno of a binary ODF.
pub const FIRST_BODY_RECNO: u32 = HEADER_COUNT + 1;

/// Recno-indexed tick records plus the thirteen header scalars.
///
/// Headers and body records live in separate namespaces: the binary header
/// block is positional, so a body record may legitimately carry a recno
/// below 14.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordStore {
    headers: BTreeMap<HeaderField, Decimal>,
    records: BTreeMap<u32, Record>,
}

impl RecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a binary ODF.
    ///
    /// The header block (7 or 13 frames, storlocs in order) comes first; body
    /// frames follow until the end of the stream. Later duplicates replace
    /// earlier ones and recno 0 is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`OdfceError::HeaderIntegrity`] for a malformed header block,
    /// [`OdfceError::ShortRead`] for a truncated frame, or an I/O error.
    pub fn load<R: Read>(reader: &mut R) -> Result<Self> {
        let body = Codec::new(layout::ODF_BODY)?;
        let float_header = Codec::new(layout::ODF_HEADER_FLOAT)?;
        let int_header = Codec::new(layout::ODF_HEADER_INT)?;
        let mut store = Self::new();

        let mut pending = None;
        for storloc in 1..=HEADER_COUNT {
            let Some(frame) = body.read_frame(reader)? else {
                if storloc <= TEXT_HEADER_COUNT {
                    return Err(OdfceError::HeaderIntegrity(format!(
                        "stream ended before header {storloc}"
                    )));
                }
                break;
            };
            let Some(field) = HeaderField::from_storloc(storloc) else {
                break;
            };
            if storloc > TEXT_HEADER_COUNT && !looks_like_header(&frame, field) {
                if storloc == TEXT_HEADER_COUNT + 1 {
                    // Seven-header ODF: this frame is the first body record.
                    pending = Some(frame);
                    break;
                }
                return Err(OdfceError::HeaderIntegrity(format!(
                    "expected header {} at frame {storloc}",
                    field.as_str()
                )));
            }

            let codec = if field.is_integer() {
                &int_header
            } else {
                &float_header
            };
            let values = codec.decode(&frame)?;
            let found = values[0].as_int().unwrap_or_default();
            if found != u64::from(storloc) {
                return Err(OdfceError::HeaderIntegrity(format!(
                    "frame {storloc} carries storloc {found}"
                )));
            }
            store.headers.insert(field, values[1].to_decimal());
        }

        if let Some(frame) = pending {
            store.absorb_body_frame(&body, &frame)?;
        }
        while let Some(frame) = body.read_frame(reader)? {
            store.absorb_body_frame(&body, &frame)?;
        }
        Ok(store)
    }

    fn absorb_body_frame(&mut self, codec: &Codec, frame: &[u8]) -> Result<()> {
        let values = codec.decode(frame)?;
        let recno = values[0].as_int().unwrap_or_default() as u32;
        if recno == 0 {
            return Ok(());
        }
        let record = Record::new(
            recno,
            values[1].to_decimal(),
            values[2].to_decimal(),
            values[3].to_decimal(),
            values[4].to_decimal(),
            values[5].to_decimal(),
        );
        self.insert(record);
        Ok(())
    }

    /// Stores a record, replacing any earlier one with the same recno.
    pub fn insert(&mut self, record: Record) {
        if self.records.insert(record.recno, record).is_some() {
            debug!(recno = record.recno, "duplicate recno, keeping the later record");
        }
    }

    /// Returns the record at `recno`.
    #[must_use]
    pub fn get(&self, recno: u32) -> Option<&Record> {
        self.records.get(&recno)
    }

    /// Returns one field of the record at `recno`, zero when absent.
    #[must_use]
    pub fn value(&self, recno: u32, field: RecordField) -> Decimal {
        self.records
            .get(&recno)
            .map_or(Decimal::ZERO, |record| record.get(field))
    }

    /// Overwrites one field, creating a zero record if needed.
    pub fn set(&mut self, recno: u32, field: RecordField, value: Decimal) {
        self.records
            .entry(recno)
            .or_insert_with(|| Record::zero(recno))
            .set(field, value);
    }

    /// Body records in ascending recno order; reversible for newest-first
    /// scans.
    pub fn records(&self) -> impl DoubleEndedIterator<Item = &Record> {
        self.records.values()
    }

    /// Number of body records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the store has no body records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Highest body recno present.
    #[must_use]
    pub fn highest_recno(&self) -> Option<u32> {
        self.records.keys().next_back().copied()
    }

    /// Lowest body recno present.
    #[must_use]
    pub fn lowest_recno(&self) -> Option<u32> {
        self.records.keys().next().copied()
    }

    /// Returns a header scalar.
    #[must_use]
    pub fn header(&self, field: HeaderField) -> Option<Decimal> {
        self.headers.get(&field).copied()
    }

    /// Returns an integer header, treating absence as `None`.
    #[must_use]
    pub fn header_u32(&self, field: HeaderField) -> Option<u32> {
        self.header(field).and_then(|v| v.trunc().to_u32())
    }

    /// Returns a header that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`OdfceError::HeaderIntegrity`] if it is missing.
    pub fn require_header(&self, field: HeaderField) -> Result<Decimal> {
        self.header(field)
            .ok_or_else(|| OdfceError::HeaderIntegrity(format!("missing header {field}")))
    }

    /// Sets a header scalar.
    pub fn set_header(&mut self, field: HeaderField, value: Decimal) {
        self.headers.insert(field, value);
    }

    /// Sets a header only if it is absent or zero. Returns true if it was set.
    pub fn add_missing_header(&mut self, field: HeaderField, value: Decimal) -> bool {
        match self.headers.get(&field) {
            Some(existing) if !existing.is_zero() => false,
            _ => {
                self.headers.insert(field, value);
                true
            }
        }
    }

    /// Header scalars in storloc order.
    pub fn headers(&self) -> impl Iterator<Item = (HeaderField, Decimal)> + '_ {
        self.headers.iter().map(|(k, v)| (*k, *v))
    }

    /// Returns true if any derived header (storlocs 8..13) is present.
    #[must_use]
    pub fn has_derived_headers(&self) -> bool {
        self.headers.keys().any(|field| !field.is_textual())
    }

    /// Trading-window limits from the TRADING_START_RECNO and
    /// TRADING_RECS_PERDAY headers.
    ///
    /// # Errors
    ///
    /// Returns [`OdfceError::HeaderIntegrity`] if either header is missing.
    pub fn limits(&self, cycle: u32) -> Result<TradingLimits> {
        let start = self.require_header(HeaderField::TradingStartRecno)?;
        let per_day = self.require_header(HeaderField::TradingRecsPerday)?;
        let to_u32 = |field: HeaderField, value: Decimal| {
            value.trunc().to_u32().ok_or_else(|| {
                OdfceError::HeaderIntegrity(format!("header {field} = {value} is not a recno"))
            })
        };
        Ok(TradingLimits::new(
            to_u32(HeaderField::TradingStartRecno, start)?,
            to_u32(HeaderField::TradingRecsPerday, per_day)?,
            cycle,
        ))
    }

    /// Returns true if `recno` lies outside the trading windows.
    #[must_use]
    pub const fn is_recno_out_of_limits(recno: u32, limits: &TradingLimits) -> bool {
        limits.is_out_of_limits(recno)
    }

    /// Lazily yields in-limits recnos in `(after, through]`.
    #[must_use]
    pub const fn recnos_within_limits(
        limits: &TradingLimits,
        after: u32,
        through: u32,
    ) -> RecnosWithinLimits {
        limits.recnos(after, through)
    }

    /// Sets or replaces the record at `recno` with a flat record at `close`,
    /// keeping its volume.
    pub fn add_missing_record(&mut self, recno: u32, close: Decimal) {
        let volume = self.value(recno, RecordField::Volume);
        self.records.insert(recno, Record::flat(recno, close, volume));
    }

    /// Highest in-limits recno with a nonzero CLOSE.
    #[must_use]
    pub fn find_highest_valid_recno(&self, limits: &TradingLimits) -> Option<u32> {
        self.records
            .values()
            .rev()
            .find(|r| limits.contains(r.recno) && !r.close.is_zero())
            .map(|r| r.recno)
    }

    /// First nonzero OPEN after the trading start, in recno order.
    #[must_use]
    pub fn find_first_non_zero_open(&self, limits: &TradingLimits) -> Option<Decimal> {
        self.records
            .range(limits.trading_start.saturating_add(1)..)
            .map(|(_, r)| r)
            .find(|r| limits.contains(r.recno) && !r.open.is_zero())
            .map(|r| r.open)
    }

    /// Gap-fills missing prices between the LAST_FCED_RECNO watermark and
    /// HIGHEST_RECNO by carrying the last close forward.
    ///
    /// A never-processed store starts just before the trading start and
    /// seeds the carry with PREV_HIGHEST_RECNO_CLOSE. Returns the number of
    /// records filled; running it again fills nothing.
    ///
    /// # Errors
    ///
    /// Returns [`OdfceError::HeaderIntegrity`] if HIGHEST_RECNO is missing.
    pub fn fill_missing_records(&mut self, limits: &TradingLimits) -> Result<usize> {
        let highest = self.header_u32(HeaderField::HighestRecno).ok_or_else(|| {
            OdfceError::HeaderIntegrity("missing header HIGHEST_RECNO".into())
        })?;
        let last_fced = self.header_u32(HeaderField::LastFcedRecno).unwrap_or(0);

        let (start, mut carry) = if last_fced == 0 {
            (
                limits.trading_start.saturating_sub(1),
                self.header(HeaderField::PrevHighestRecnoClose)
                    .unwrap_or_default(),
            )
        } else {
            (last_fced, self.value(last_fced, RecordField::Close))
        };

        let mut filled = 0;
        for recno in limits.recnos(start, highest) {
            match self.records.get(&recno) {
                Some(record) if !record.has_missing_price() => carry = record.close,
                _ if carry.is_zero() => {}
                _ => {
                    self.add_missing_record(recno, carry);
                    filled += 1;
                }
            }
        }
        if filled > 0 {
            debug!(filled, from = start, through = highest, "gap-filled records");
        }
        Ok(filled)
    }

    /// Encodes the store as a binary ODF.
    ///
    /// Writes seven header frames, or thirteen when any derived header is
    /// present (absent derived headers encode as zero). Body recnos run
    /// without holes from `min(14, lowest recno)` to the highest recno.
    ///
    /// # Errors
    ///
    /// Returns [`OdfceError::HeaderIntegrity`] if a mandatory header is
    /// missing, or a codec error for values that do not fit their fields.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = Codec::new(layout::ODF_BODY)?;
        let float_header = Codec::new(layout::ODF_HEADER_FLOAT)?;
        let int_header = Codec::new(layout::ODF_HEADER_INT)?;

        let header_count = if self.has_derived_headers() {
            HEADER_COUNT
        } else {
            TEXT_HEADER_COUNT
        };
        let mut out = Vec::with_capacity(body.size() * (header_count as usize + self.len()));

        for field in HeaderField::ALL.iter().take(header_count as usize) {
            let value = if field.is_textual() {
                self.require_header(*field)?
            } else {
                self.header(*field).unwrap_or_default()
            };
            let storloc = Value::Int(u64::from(field.storloc()));
            let frame = if field.is_integer() {
                let int = value.trunc().to_u64().ok_or_else(|| OdfceError::ValueOutOfRange {
                    field: field.as_str(),
                    value: value.to_string(),
                })?;
                int_header.encode(&[storloc, Value::Int(int)])?
            } else {
                float_header.encode(&[storloc, Value::from_decimal(value)])?
            };
            out.extend_from_slice(&frame);
        }

        if let (Some(lowest), Some(highest)) = (self.lowest_recno(), self.highest_recno()) {
            for recno in lowest.min(FIRST_BODY_RECNO)..=highest {
                let record = self.get(recno).copied().unwrap_or_else(|| Record::zero(recno));
                let frame = body.encode(&[
                    Value::Int(u64::from(recno)),
                    Value::from_decimal(record.open),
                    Value::from_decimal(record.high),
                    Value::from_decimal(record.low),
                    Value::from_decimal(record.close),
                    Value::from_decimal(record.volume),
                ])?;
                out.extend_from_slice(&frame);
            }
        }
        Ok(out)
    }
}

/// A frame is a derived header if it carries the expected storloc and a zero
/// padding tail.
fn looks_like_header(frame: &[u8], field: HeaderField) -> bool {
    let storloc = u32::from(u16::from_le_bytes([frame[0], frame[1]]));
    let value_end = if field.is_integer() { 6 } else { 10 };
    storloc == field.storloc() && frame[value_end..].iter().all(|b| *b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn sample_store() -> RecordStore {
        let mut store = RecordStore::new();
        for (field, value) in [
            (HeaderField::GmtOffset, "0"),
            (HeaderField::TradingStartRecno, "1"),
            (HeaderField::TradingRecsPerday, "1440"),
            (HeaderField::IdfCurrency, "840"),
            (HeaderField::IdfCurrencyMaxDecimals, "5"),
            (HeaderField::SplitFactor, "1"),
            (HeaderField::CurrencyValueOfPoint, "1"),
        ] {
            store.set_header(field, dec(value));
        }
        store
    }

    #[test]
    fn test_encode_load_seven_headers() {
        let mut store = sample_store();
        store.insert(Record::new(100, dec("1.0"), dec("1.2"), dec("0.9"), dec("1.1"), dec("1000")));
        let bytes = store.encode().unwrap();
        // 7 headers + recnos 14..=100
        assert_eq!(bytes.len(), 42 * (7 + 87));

        let loaded = RecordStore::load(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(loaded.header(HeaderField::IdfCurrency), Some(dec("840")));
        assert!(!loaded.has_derived_headers());
        assert_eq!(loaded.get(100).unwrap().close, dec("1.1"));
        assert_eq!(loaded.get(50).unwrap(), &Record::zero(50));
        assert_eq!(loaded.len(), 87);
    }

    #[test]
    fn test_encode_load_thirteen_headers() {
        let mut store = sample_store();
        store.set_header(HeaderField::Tick, dec("5"));
        store.set_header(HeaderField::HighestRecnoClose, dec("1.105"));
        store.insert(Record::flat(3, dec("2.5"), dec("10")));
        store.insert(Record::flat(14, dec("2.6"), dec("1")));
        let bytes = store.encode().unwrap();
        assert_eq!(bytes.len(), 42 * (13 + 12));

        let loaded = RecordStore::load(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(loaded.header(HeaderField::Tick), Some(dec("5")));
        assert_eq!(loaded.header(HeaderField::OhlcDivider), Some(Decimal::ZERO));
        assert_eq!(loaded.header(HeaderField::HighestRecnoClose), Some(dec("1.105")));
        assert_eq!(loaded.get(3).unwrap().open, dec("2.5"));
        assert_eq!(loaded.lowest_recno(), Some(3));
        assert_eq!(loaded.highest_recno(), Some(14));
    }

    #[test]
    fn test_records_newest_first() {
        let mut store = sample_store();
        for recno in [120, 100, 110] {
            store.insert(Record::zero(recno));
        }
        let newest: Vec<u32> = store.records().rev().map(|r| r.recno).collect();
        assert_eq!(newest, vec![120, 110, 100]);
    }

    #[test]
    fn test_duplicate_keeps_later_record() {
        let body = Codec::new(layout::ODF_BODY).unwrap();
        let mut bytes = sample_store().encode().unwrap();
        for close in [1.5, 1.75] {
            bytes.extend(
                body.encode(&[
                    Value::Int(20),
                    Value::Float(1.0),
                    Value::Float(2.0),
                    Value::Float(0.5),
                    Value::Float(close),
                    Value::Float(1.0),
                ])
                .unwrap(),
            );
        }
        let mut filler = vec![Value::Int(0)];
        filler.extend([Value::Float(9.0); 5]);
        bytes.extend(body.encode(&filler).unwrap());

        let loaded = RecordStore::load(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(loaded.get(20).unwrap().close, dec("1.75"));
        assert!(loaded.get(0).is_none());
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn test_reordered_headers_rejected() {
        let mut bytes = sample_store().encode().unwrap();
        bytes.swap(0, 42);
        assert!(matches!(
            RecordStore::load(&mut Cursor::new(bytes)),
            Err(OdfceError::HeaderIntegrity(_))
        ));
    }

    #[test]
    fn test_truncated_stream() {
        let mut bytes = sample_store().encode().unwrap();
        bytes.truncate(42 * 3 + 10);
        assert!(RecordStore::load(&mut Cursor::new(bytes)).is_err());
    }

    #[test]
    fn test_missing_mandatory_header() {
        let mut store = RecordStore::new();
        store.set_header(HeaderField::GmtOffset, Decimal::ZERO);
        assert!(matches!(store.encode(), Err(OdfceError::HeaderIntegrity(_))));
    }

    #[test]
    fn test_add_missing_header() {
        let mut store = sample_store();
        assert!(store.add_missing_header(HeaderField::Tick, dec("5")));
        assert!(!store.add_missing_header(HeaderField::Tick, dec("7")));
        assert_eq!(store.header_u32(HeaderField::Tick), Some(5));
        store.set_header(HeaderField::OhlcDivider, Decimal::ZERO);
        assert!(store.add_missing_header(HeaderField::OhlcDivider, dec("1000")));
    }

    #[test]
    fn test_gap_fill_carries_close() {
        let mut store = sample_store();
        store.insert(Record::new(100, dec("1.0"), dec("1.2"), dec("0.9"), dec("1.1"), dec("1000")));
        store.insert(Record::zero(102));
        store.set_header(HeaderField::HighestRecno, dec("102"));
        store.set_header(HeaderField::LastFcedRecno, dec("99"));
        let limits = store.limits(1400).unwrap();

        let filled = store.fill_missing_records(&limits).unwrap();
        assert_eq!(filled, 2);
        assert_eq!(store.get(101).unwrap(), &Record::flat(101, dec("1.1"), Decimal::ZERO));
        assert_eq!(store.get(102).unwrap(), &Record::flat(102, dec("1.1"), Decimal::ZERO));
        assert_eq!(store.get(100).unwrap().open, dec("1.0"));

        let again = store.clone();
        assert_eq!(store.fill_missing_records(&limits).unwrap(), 0);
        assert_eq!(store, again);
    }

    #[test]
    fn test_gap_fill_seeds_from_previous_week() {
        let mut store = sample_store();
        store.insert(Record::new(4, dec("2.0"), dec("2.1"), dec("1.9"), dec("2.05"), dec("5")));
        store.set_header(HeaderField::HighestRecno, dec("4"));
        store.set_header(HeaderField::PrevHighestRecnoClose, dec("1.95"));
        let limits = store.limits(1400).unwrap();

        assert_eq!(store.fill_missing_records(&limits).unwrap(), 2);
        assert_eq!(store.get(2).unwrap().close, dec("1.95"));
        assert_eq!(store.get(3).unwrap().high, dec("1.95"));
        assert!(store.get(1).is_none());
    }

    #[test]
    fn test_find_helpers() {
        let mut store = sample_store();
        store.insert(Record::new(5, Decimal::ZERO, dec("1"), dec("1"), dec("1"), Decimal::ZERO));
        store.insert(Record::new(6, dec("1.3"), dec("1.4"), dec("1.2"), dec("1.35"), dec("1")));
        store.insert(Record::flat(1441, dec("9"), Decimal::ZERO));
        let limits = store.limits(1400).unwrap();
        assert_eq!(store.find_first_non_zero_open(&limits), Some(dec("1.3")));
        assert_eq!(store.find_highest_valid_recno(&limits), Some(6));
        assert!(RecordStore::is_recno_out_of_limits(1441, &limits));
        assert_eq!(RecordStore::recnos_within_limits(&limits, 4, 6).count(), 2);
    }
}
