//! Benchmark fixtures for odfce.

use chrono::{DateTime, TimeZone, Utc};
use odfce_lib::{Decimal, HeaderField, OdfName, Record, RecordStore};

/// Symbol group used by the fixtures.
pub const GROUP: &str = "FX";

/// Last recno before the fixtures' trading day.
pub const TRADING_START: u32 = 60;

/// The fixtures' ODF name: EURUSD for the week of 2013-08-11.
pub fn odf_name() -> OdfName {
    OdfName::parse("EURUSD-1856516").unwrap_or_else(|e| panic!("fixture name: {e}"))
}

/// A Tuesday noon inside the fixtures' week.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2013, 8, 13, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// An ODF with `days` days of one-minute records after the trading start.
///
/// Prices walk a fixed saw-tooth around 1.1 so runs are reproducible.
pub fn synthetic_store(days: u32) -> RecordStore {
    let mut store = RecordStore::new();
    for (field, value) in [
        (HeaderField::GmtOffset, 0),
        (HeaderField::TradingStartRecno, TRADING_START),
        (HeaderField::TradingRecsPerday, 1440),
        (HeaderField::IdfCurrency, 840),
        (HeaderField::IdfCurrencyMaxDecimals, 5),
        (HeaderField::SplitFactor, 1),
        (HeaderField::CurrencyValueOfPoint, 1),
    ] {
        store.set_header(field, Decimal::from(value));
    }

    let base = Decimal::new(110_000, 5);
    let step = Decimal::new(1, 5);
    for recno in TRADING_START + 1..=TRADING_START + days * 1440 {
        let open = base + step * Decimal::from(recno % 97);
        let close = open + step * Decimal::from(recno % 7);
        let high = close + step * Decimal::from(3);
        let low = open - step * Decimal::from(2);
        let volume = Decimal::from(1 + recno % 13);
        store.insert(Record::new(recno, open, high, low, close, volume));
    }
    store
}

/// [`synthetic_store`] with the derived headers a pass expects.
pub fn prepared_store(days: u32) -> RecordStore {
    let mut store = synthetic_store(days);
    let highest = store.highest_recno().unwrap_or(0);
    store.set_header(HeaderField::Tick, Decimal::ONE);
    store.set_header(HeaderField::OhlcDivider, Decimal::from(100_000));
    store.set_header(HeaderField::LastFcedRecno, Decimal::ZERO);
    store.set_header(HeaderField::HighestRecno, Decimal::from(highest));
    store
}
