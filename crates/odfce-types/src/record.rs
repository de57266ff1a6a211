//! Tick record representation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::OdfceError;

/// A single tick-level OHLCV record.
///
/// Prices and volume are decimals so that values parsed from text keep the
/// precision they were written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// 1-based position in the trading-day-cyclic address space.
    pub recno: u32,
    /// Opening price.
    pub open: Decimal,
    /// Highest price.
    pub high: Decimal,
    /// Lowest price.
    pub low: Decimal,
    /// Closing price.
    pub close: Decimal,
    /// Traded volume.
    pub volume: Decimal,
}

impl Record {
    /// Creates a new record.
    #[must_use]
    pub const fn new(
        recno: u32,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            recno,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Creates a null record used to plug holes in the recno sequence.
    #[must_use]
    pub const fn zero(recno: u32) -> Self {
        Self::new(
            recno,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
        )
    }

    /// Creates a gap-filled record: `price` broadcast to O/H/L/C.
    #[must_use]
    pub const fn flat(recno: u32, price: Decimal, volume: Decimal) -> Self {
        Self::new(recno, price, price, price, price, volume)
    }

    /// Returns true if O = H = L = C (no price movement inside the tick).
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.open == self.high && self.high == self.low && self.low == self.close
    }

    /// Returns true if any of O/H/L/C is zero.
    #[must_use]
    pub fn has_missing_price(&self) -> bool {
        self.open.is_zero() || self.high.is_zero() || self.low.is_zero() || self.close.is_zero()
    }

    /// Returns the value of a field.
    #[must_use]
    pub const fn get(&self, field: RecordField) -> Decimal {
        match field {
            RecordField::Open => self.open,
            RecordField::High => self.high,
            RecordField::Low => self.low,
            RecordField::Close => self.close,
            RecordField::Volume => self.volume,
        }
    }

    /// Overwrites the value of a field.
    pub const fn set(&mut self, field: RecordField, value: Decimal) {
        match field {
            RecordField::Open => self.open = value,
            RecordField::High => self.high = value,
            RecordField::Low => self.low = value,
            RecordField::Close => self.close = value,
            RecordField::Volume => self.volume = value,
        }
    }
}

/// Named OHLCV field of a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordField {
    /// `ODF_OPEN`
    Open,
    /// `ODF_HIGH`
    High,
    /// `ODF_LOW`
    Low,
    /// `ODF_CLOSE`
    Close,
    /// `ODF_VOLUME`
    Volume,
}

impl RecordField {
    /// The four price fields, in storage order.
    pub const PRICES: [Self; 4] = [Self::Open, Self::High, Self::Low, Self::Close];

    /// Returns the wire name of the field.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "ODF_OPEN",
            Self::High => "ODF_HIGH",
            Self::Low => "ODF_LOW",
            Self::Close => "ODF_CLOSE",
            Self::Volume => "ODF_VOLUME",
        }
    }
}

impl std::fmt::Display for RecordField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RecordField {
    type Err = OdfceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ODF_OPEN" | "OPEN" => Ok(Self::Open),
            "ODF_HIGH" | "HIGH" => Ok(Self::High),
            "ODF_LOW" | "LOW" => Ok(Self::Low),
            "ODF_CLOSE" | "CLOSE" => Ok(Self::Close),
            "ODF_VOLUME" | "VOLUME" => Ok(Self::Volume),
            _ => Err(OdfceError::UnknownField(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_flat_record() {
        let rec = Record::flat(101, dec("1.1"), Decimal::ZERO);
        assert!(rec.is_flat());
        assert!(!rec.has_missing_price());
        assert_eq!(rec.get(RecordField::Low), dec("1.1"));
    }

    #[test]
    fn test_missing_price() {
        let rec = Record::new(5, dec("1.0"), dec("1.2"), Decimal::ZERO, dec("1.1"), dec("10"));
        assert!(rec.has_missing_price());
        assert!(Record::zero(6).has_missing_price());
    }

    #[test]
    fn test_set_field() {
        let mut rec = Record::zero(14);
        rec.set(RecordField::Close, dec("2.5"));
        assert_eq!(rec.close, dec("2.5"));
        assert!(rec.open.is_zero());
    }

    #[test]
    fn test_field_parse() {
        assert_eq!("ODF_OPEN".parse::<RecordField>().unwrap(), RecordField::Open);
        assert_eq!("volume".parse::<RecordField>().unwrap(), RecordField::Volume);
        assert!(matches!(
            "ODF_SPREAD".parse::<RecordField>(),
            Err(OdfceError::UnknownField(_))
        ));
    }
}
