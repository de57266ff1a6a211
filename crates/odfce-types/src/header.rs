//! ODF header storloc table.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::OdfceError;

/// Number of reserved header recnos.
pub const HEADER_COUNT: u32 = 13;

/// Number of header scalars present in the plain-text ODF form.
pub const TEXT_HEADER_COUNT: u32 = 7;

/// Returns true if `recno` is one of the reserved header recnos (1..=13).
#[must_use]
pub const fn is_header_recno(recno: u32) -> bool {
    recno >= 1 && recno <= HEADER_COUNT
}

/// One of the thirteen ODF header scalars.
///
/// The discriminant is the field's storloc, i.e. the recno it occupies in the
/// header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeaderField {
    /// Offset of the exchange clock from GMT.
    GmtOffset = 1,
    /// Last recno before the trading day starts.
    TradingStartRecno = 2,
    /// Number of records in a trading day.
    TradingRecsPerday = 3,
    /// Currency code of the instrument.
    IdfCurrency = 4,
    /// Maximum number of decimals quoted in the currency.
    IdfCurrencyMaxDecimals = 5,
    /// Split factor.
    SplitFactor = 6,
    /// Currency value of one point.
    CurrencyValueOfPoint = 7,
    /// Minimum price increment in divider-scaled units.
    Tick = 8,
    /// Decimal scale divider (a power of ten).
    OhlcDivider = 9,
    /// Watermark: highest recno already aggregated.
    LastFcedRecno = 10,
    /// Highest in-limits recno with data.
    HighestRecno = 11,
    /// CLOSE at the highest recno.
    HighestRecnoClose = 12,
    /// Highest-recno CLOSE of the previous week.
    PrevHighestRecnoClose = 13,
}

impl HeaderField {
    /// All header fields in storloc order.
    pub const ALL: [Self; 13] = [
        Self::GmtOffset,
        Self::TradingStartRecno,
        Self::TradingRecsPerday,
        Self::IdfCurrency,
        Self::IdfCurrencyMaxDecimals,
        Self::SplitFactor,
        Self::CurrencyValueOfPoint,
        Self::Tick,
        Self::OhlcDivider,
        Self::LastFcedRecno,
        Self::HighestRecno,
        Self::HighestRecnoClose,
        Self::PrevHighestRecnoClose,
    ];

    /// Returns the storloc (header recno) of this field.
    #[must_use]
    pub const fn storloc(&self) -> u32 {
        *self as u32
    }

    /// Looks up a field by storloc.
    #[must_use]
    pub const fn from_storloc(storloc: u32) -> Option<Self> {
        if is_header_recno(storloc) {
            Some(Self::ALL[(storloc - 1) as usize])
        } else {
            None
        }
    }

    /// Returns true for the mandatory, textually sourced fields (storlocs 1..=7).
    #[must_use]
    pub const fn is_textual(&self) -> bool {
        self.storloc() <= TEXT_HEADER_COUNT
    }

    /// Returns true if the field is stored as an unsigned integer.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Tick | Self::OhlcDivider | Self::LastFcedRecno | Self::HighestRecno
        )
    }

    /// Returns the field's wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GmtOffset => "GMT_OFFSET",
            Self::TradingStartRecno => "TRADING_START_RECNO",
            Self::TradingRecsPerday => "TRADING_RECS_PERDAY",
            Self::IdfCurrency => "IDF_CURRENCY",
            Self::IdfCurrencyMaxDecimals => "IDF_CURRENCY_MAX_DECIMALS",
            Self::SplitFactor => "SPLIT_FACTOR",
            Self::CurrencyValueOfPoint => "CURRENCY_VALUE_OF_POINT",
            Self::Tick => "TICK",
            Self::OhlcDivider => "OHLC_DIVIDER",
            Self::LastFcedRecno => "LAST_FCED_RECNO",
            Self::HighestRecno => "HIGHEST_RECNO",
            Self::HighestRecnoClose => "HIGHEST_RECNO_CLOSE",
            Self::PrevHighestRecnoClose => "PREV_HIGHEST_RECNO_CLOSE",
        }
    }
}

impl std::fmt::Display for HeaderField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HeaderField {
    type Err = OdfceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_uppercase();
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == upper)
            .ok_or_else(|| OdfceError::UnknownField(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storloc_round_trip() {
        for (idx, field) in HeaderField::ALL.iter().enumerate() {
            assert_eq!(field.storloc(), idx as u32 + 1);
            assert_eq!(HeaderField::from_storloc(field.storloc()), Some(*field));
        }
        assert_eq!(HeaderField::from_storloc(0), None);
        assert_eq!(HeaderField::from_storloc(14), None);
    }

    #[test]
    fn test_textual_split() {
        let textual: Vec<_> = HeaderField::ALL.iter().filter(|f| f.is_textual()).collect();
        assert_eq!(textual.len(), 7);
        assert!(!HeaderField::Tick.is_textual());
        assert!(HeaderField::CurrencyValueOfPoint.is_textual());
    }

    #[test]
    fn test_header_recno() {
        assert!(!is_header_recno(0));
        assert!(is_header_recno(1));
        assert!(is_header_recno(13));
        assert!(!is_header_recno(14));
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "last_fced_recno".parse::<HeaderField>().unwrap(),
            HeaderField::LastFcedRecno
        );
        assert!("NOPE".parse::<HeaderField>().is_err());
    }
}
