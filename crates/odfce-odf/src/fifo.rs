//! Rolling window of the most recent records and the quantization parameters
//! derived from it.

use chrono::{DateTime, Duration, Utc};
use odfce_codec::{Codec, Value, layout};
use odfce_types::{Decimal, OdfceError, Record, RecordField, Result};
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Read;
use tracing::debug;

use crate::{RecordStore, TradingLimits};

/// Largest supported divider exponent (10^9 still fits a u32).
const MAX_DIVIDER_DIGITS: u32 = 9;

/// The FIFO window of one ODF.
///
/// Records are renumbered 1..k with the most recent record at 1. The header
/// (TICK, OHLC_DIVIDER) sits at recno `capacity + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fifo {
    capacity: u32,
    records: BTreeMap<u32, Record>,
    tick: u32,
    divider: u32,
}

impl Fifo {
    /// Creates an empty FIFO holding at most `capacity` records.
    #[must_use]
    pub const fn new(capacity: u32) -> Self {
        Self {
            capacity,
            records: BTreeMap::new(),
            tick: 1,
            divider: 1,
        }
    }

    /// Collects the most recent non-flat, in-limits records of `store`.
    ///
    /// Walks down from the highest recno, stops at the trading start, keeps at
    /// most `capacity` records and computes the header.
    #[must_use]
    pub fn build_from_window(store: &RecordStore, capacity: u32, limits: &TradingLimits) -> Self {
        let mut fifo = Self::new(capacity);
        fifo.records = Self::window(store, capacity, limits);
        fifo.refresh_header();
        fifo
    }

    /// Renumbered window records, most recent first.
    #[must_use]
    pub fn window(
        store: &RecordStore,
        capacity: u32,
        limits: &TradingLimits,
    ) -> BTreeMap<u32, Record> {
        store
            .records()
            .rev()
            .take_while(|r| r.recno > limits.trading_start)
            .filter(|r| limits.contains(r.recno) && !r.is_flat())
            .take(capacity as usize)
            .zip(1..)
            .map(|(r, n)| {
                (
                    n,
                    Record::new(n, r.open, r.high, r.low, r.close, Decimal::ZERO),
                )
            })
            .collect()
    }

    /// Merges `records` into the window by recno, then recomputes the header.
    pub fn update_from_list(&mut self, records: impl IntoIterator<Item = Record>) {
        for record in records {
            if record.recno == 0 || record.recno > self.capacity {
                continue;
            }
            self.records.insert(record.recno, record);
        }
        self.refresh_header();
    }

    /// Recomputes TICK and OHLC_DIVIDER from the current records.
    pub fn refresh_header(&mut self) {
        self.divider = self.compute_divider();
        self.tick = self.compute_tick(self.divider);
        debug!(
            records = self.records.len(),
            tick = self.tick,
            divider = self.divider,
            "fifo header"
        );
    }

    /// Decimal divider: 10 raised to the mean number of significant fractional
    /// digits of OPEN, rounded up once the mean exceeds the floor by 0.05.
    #[must_use]
    pub fn compute_divider(&self) -> u32 {
        if self.records.is_empty() {
            return 1;
        }
        let total: u32 = self
            .records
            .values()
            .map(|r| r.open.normalize().scale())
            .sum();
        let mean = Decimal::from(total) / Decimal::from(self.records.len());
        let floor = mean.floor();
        let digits = if floor + Decimal::new(5, 2) < mean {
            floor + Decimal::ONE
        } else {
            floor
        };
        let digits = digits.to_u32().unwrap_or(0).min(MAX_DIVIDER_DIGITS);
        10u32.pow(digits)
    }

    /// Minimum nonzero absolute change, in divider-scaled units, of any OHLC
    /// field between consecutive records. Defaults to 1.
    #[must_use]
    pub fn compute_tick(&self, divider: u32) -> u32 {
        let scale = Decimal::from(divider);
        let ordered: Vec<&Record> = self.records.values().collect();
        ordered
            .windows(2)
            .flat_map(|pair| {
                RecordField::PRICES
                    .iter()
                    .map(move |f| ((pair[0].get(*f) - pair[1].get(*f)) * scale).abs())
            })
            .filter(|delta| !delta.is_zero())
            .min()
            .and_then(|delta| delta.round().to_u32())
            .map_or(1, |tick| tick.max(1))
    }

    /// Minimum price increment in divider-scaled units.
    #[must_use]
    pub const fn tick(&self) -> u32 {
        self.tick
    }

    /// Decimal scale divider.
    #[must_use]
    pub const fn divider(&self) -> u32 {
        self.divider
    }

    /// Maximum number of records.
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Window records, most recent first.
    pub fn records(&self) -> impl DoubleEndedIterator<Item = &Record> {
        self.records.values()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the window holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns true if a FIFO persisted at `modified` is older than
    /// `max_age_days` at `now`.
    #[must_use]
    pub fn is_stale(modified: DateTime<Utc>, now: DateTime<Utc>, max_age_days: u32) -> bool {
        now - modified > Duration::days(i64::from(max_age_days))
    }

    /// Encodes the FIFO: body frames 1..k, then the header frame.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a recno does not fit its field.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = Codec::new(layout::FIFO_BODY)?;
        let header = Codec::new(layout::FIFO_HEADER)?;
        let mut out = Vec::with_capacity(body.size() * (self.records.len() + 1));
        for r in self.records.values() {
            out.extend(body.encode(&[
                Value::Int(u64::from(r.recno)),
                Value::from_decimal(r.open),
                Value::from_decimal(r.high),
                Value::from_decimal(r.low),
                Value::from_decimal(r.close),
            ])?);
        }
        out.extend(header.encode(&[
            Value::Int(u64::from(self.capacity) + 1),
            Value::Int(u64::from(self.tick)),
            Value::Int(u64::from(self.divider)),
        ])?);
        Ok(out)
    }

    /// Decodes a FIFO. The last frame is the header; its recno gives the
    /// capacity.
    ///
    /// # Errors
    ///
    /// Returns [`OdfceError::HeaderIntegrity`] if the stream is empty or the
    /// header recno does not follow every body recno, or a codec error.
    pub fn load<R: Read>(reader: &mut R) -> Result<Self> {
        let body = Codec::new(layout::FIFO_BODY)?;
        let header = Codec::new(layout::FIFO_HEADER)?;

        let mut frames = Vec::new();
        while let Some(frame) = body.read_frame(reader)? {
            frames.push(frame);
        }
        let last = frames
            .pop()
            .ok_or_else(|| OdfceError::HeaderIntegrity("empty FIFO".into()))?;

        let head = header.decode(&last)?;
        let header_recno = head[0].as_int().unwrap_or_default();
        let capacity = u32::try_from(header_recno.saturating_sub(1)).unwrap_or(0);
        let mut fifo = Self::new(capacity);
        fifo.tick = head[1].as_int().unwrap_or(1) as u32;
        fifo.divider = head[2].as_int().unwrap_or(1) as u32;

        for frame in &frames {
            let v = body.decode(frame)?;
            let recno = v[0].as_int().unwrap_or_default() as u32;
            if recno == 0 || recno > capacity {
                return Err(OdfceError::HeaderIntegrity(format!(
                    "FIFO record {recno} outside 1..={capacity}"
                )));
            }
            fifo.records.insert(
                recno,
                Record::new(
                    recno,
                    v[1].to_decimal(),
                    v[2].to_decimal(),
                    v[3].to_decimal(),
                    v[4].to_decimal(),
                    Decimal::ZERO,
                ),
            );
        }
        Ok(fifo)
    }

    /// Renders `recno,open,high,low,close` lines followed by
    /// `header_recno,tick,divider`.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for r in self.records.values() {
            let _ = writeln!(out, "{},{},{},{},{}", r.recno, r.open, r.high, r.low, r.close);
        }
        let _ = writeln!(out, "{},{},{}", self.capacity + 1, self.tick, self.divider);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odfce_types::HeaderField;
    use std::io::Cursor;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn bar(recno: u32, open: &str) -> Record {
        let o = dec(open);
        Record::new(recno, o, o + dec("0.01"), o - dec("0.01"), o, dec("1"))
    }

    fn store_with(records: &[Record]) -> RecordStore {
        let mut store = RecordStore::new();
        store.set_header(HeaderField::TradingStartRecno, dec("1"));
        store.set_header(HeaderField::TradingRecsPerday, dec("1440"));
        for r in records {
            store.insert(*r);
        }
        store
    }

    #[test]
    fn test_divider_and_tick() {
        // Most recent (highest recno) first: 1.10, 1.105, 1.095
        let store = store_with(&[bar(10, "1.095"), bar(11, "1.105"), bar(12, "1.10")]);
        let limits = store.limits(1400).unwrap();
        let fifo = Fifo::build_from_window(&store, 500, &limits);
        assert_eq!(fifo.len(), 3);
        assert_eq!(fifo.records().next().unwrap().open, dec("1.10"));
        assert_eq!(fifo.divider(), 1000);
        assert_eq!(fifo.tick(), 5);
    }

    #[test]
    fn test_window_skips_flat_and_out_of_limits() {
        let store = store_with(&[
            bar(5, "2.0"),
            Record::flat(6, dec("2.0"), dec("3")),
            bar(7, "2.1"),
            bar(1441, "9.9"),
        ]);
        let limits = store.limits(1400).unwrap();
        let window = Fifo::window(&store, 10, &limits);
        let opens: Vec<Decimal> = window.values().map(|r| r.open).collect();
        assert_eq!(opens, vec![dec("2.1"), dec("2.0")]);
        assert_eq!(window.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_window_capacity() {
        let records: Vec<Record> = (20..30).map(|n| bar(n, "1.5")).collect();
        let store = store_with(&records);
        let limits = store.limits(1400).unwrap();
        let window = Fifo::window(&store, 4, &limits);
        assert_eq!(window.len(), 4);
        assert_eq!(window[&4].recno, 4);
    }

    #[test]
    fn test_divider_rounding_bias() {
        let mut fifo = Fifo::new(10);
        // digits 2, 2 and 3: mean 2.33 rounds up to 3
        fifo.update_from_list([bar(1, "1.25"), bar(2, "1.35"), bar(3, "1.355")]);
        assert_eq!(fifo.divider(), 1000);
        // 24 one-digit opens and one two-digit open: mean 1.04 stays 1
        let mut fifo = Fifo::new(100);
        let mut list: Vec<Record> = (1..=24).map(|n| bar(n, "1.5")).collect();
        list.push(bar(25, "1.55"));
        fifo.update_from_list(list);
        assert_eq!(fifo.divider(), 10);
    }

    #[test]
    fn test_empty_defaults() {
        let fifo = Fifo::new(500);
        assert_eq!(fifo.compute_divider(), 1);
        assert_eq!(fifo.compute_tick(1), 1);
    }

    #[test]
    fn test_update_from_list_merges() {
        let mut fifo = Fifo::new(3);
        fifo.update_from_list([bar(1, "1.0"), bar(2, "1.1")]);
        fifo.update_from_list([bar(2, "1.2"), bar(3, "1.3"), bar(4, "9.9")]);
        assert_eq!(fifo.len(), 3);
        assert_eq!(fifo.records().nth(1).unwrap().open, dec("1.2"));
    }

    #[test]
    fn test_binary_round_trip() {
        let mut fifo = Fifo::new(500);
        fifo.update_from_list([bar(1, "1.10"), bar(2, "1.105")]);
        let bytes = fifo.encode().unwrap();
        assert_eq!(bytes.len(), 34 * 3);
        let loaded = Fifo::load(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(loaded.capacity(), 500);
        assert_eq!(loaded.tick(), fifo.tick());
        assert_eq!(loaded.divider(), fifo.divider());
        let opens: Vec<Decimal> = loaded.records().map(|r| r.open).collect();
        assert_eq!(opens, vec![dec("1.1"), dec("1.105")]);
    }

    #[test]
    fn test_staleness() {
        let now = Utc::now();
        assert!(!Fifo::is_stale(now - Duration::days(3), now, 25));
        assert!(Fifo::is_stale(now - Duration::days(26), now, 25));
    }

    #[test]
    fn test_text_rendering() {
        let mut fifo = Fifo::new(2);
        fifo.update_from_list([bar(1, "1.5")]);
        assert_eq!(fifo.to_text(), "1,1.5,1.51,1.49,1.5\n3,1,10\n");
    }
}
