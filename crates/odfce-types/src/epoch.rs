//! Sunday-noon calendar epochs and ODF naming.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::OdfceError;

/// Day zero of the reduced Julian day count (JD - 2400000).
fn origin() -> NaiveDate {
    NaiveDate::from_ymd_opt(1858, 11, 16).unwrap_or_default()
}

/// A calendar day expressed as a reduced Julian day number.
///
/// ODFs cover one week and are named after the number of the Sunday that
/// opens that week (the "jsunnoon").
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Epoch(pub u32);

impl Epoch {
    /// Creates an epoch from a raw day number.
    #[must_use]
    pub const fn new(day: u32) -> Self {
        Self(day)
    }

    /// Returns the raw day number.
    #[must_use]
    pub const fn day(&self) -> u32 {
        self.0
    }

    /// Converts a calendar date. Dates before 1858-11-16 clamp to zero.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        let days = date.signed_duration_since(origin()).num_days();
        Self(u32::try_from(days.max(0)).unwrap_or(u32::MAX))
    }

    /// Converts back to a calendar date.
    #[must_use]
    pub fn to_date(&self) -> NaiveDate {
        origin()
            .checked_add_days(Days::new(u64::from(self.0)))
            .unwrap_or(NaiveDate::MAX)
    }

    /// The Sunday on or before `date`.
    #[must_use]
    pub fn sunday_on_or_before(date: NaiveDate) -> Self {
        let back = date.weekday().num_days_from_sunday();
        Self::from_date(date).previous_days(back)
    }

    /// The epoch of the week containing `now`.
    #[must_use]
    pub fn current(now: DateTime<Utc>) -> Self {
        Self::sunday_on_or_before(now.date_naive())
    }

    /// The same weekday one week earlier.
    #[must_use]
    pub const fn previous_week(&self) -> Self {
        self.previous_days(7)
    }

    const fn previous_days(&self, days: u32) -> Self {
        Self(self.0.saturating_sub(days))
    }

    /// Returns true if this day is a Sunday.
    #[must_use]
    pub fn is_sunday(&self) -> bool {
        self.to_date().weekday().num_days_from_sunday() == 0
    }

    /// Snaps this epoch down to the start of the `epoch_days`-long FCE epoch
    /// containing it, counting from `first`.
    #[must_use]
    pub fn fce_epoch_start(&self, first: Self, epoch_days: u32) -> Self {
        let span = i64::from(epoch_days.max(1));
        let delta = i64::from(self.0) - i64::from(first.0);
        let start = i64::from(first.0) + delta.div_euclid(span) * span;
        Self(u32::try_from(start.max(0)).unwrap_or(0))
    }

    /// 1-based index of this week inside the FCE epoch starting at `fce_start`.
    #[must_use]
    pub const fn week_in_epoch(&self, fce_start: Self) -> u32 {
        1 + self.0.saturating_sub(fce_start.0) / 7
    }
}

impl std::fmt::Display for Epoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Epoch {
    type Err = OdfceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|_| OdfceError::InvalidOdfName(s.to_string()))
    }
}

/// A parsed ODF basename of the form `{SYMBOL}-18{jsunnoon}...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OdfName {
    basename: String,
    symbol: String,
    epoch: Epoch,
}

impl OdfName {
    /// Parses a basename (no directory, no extension).
    ///
    /// The last `-18` marker is followed by the epoch digits; the symbol is
    /// the text before the last `-`.
    ///
    /// # Errors
    ///
    /// Returns [`OdfceError::InvalidOdfName`] if there is no `-18` marker
    /// followed by digits, or the symbol is empty.
    pub fn parse(basename: &str) -> Result<Self, OdfceError> {
        let invalid = || OdfceError::InvalidOdfName(basename.to_string());

        let marker = basename.rfind("-18").ok_or_else(invalid)?;
        let digits: String = basename[marker + 3..]
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        if digits.is_empty() {
            return Err(invalid());
        }
        let epoch = digits.parse::<u32>().map(Epoch).map_err(|_| invalid())?;

        let dash = basename.rfind('-').ok_or_else(invalid)?;
        let symbol = &basename[..dash];
        if symbol.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            basename: basename.to_string(),
            symbol: symbol.to_string(),
            epoch,
        })
    }

    /// The full basename.
    #[must_use]
    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// The instrument symbol.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// The calendar epoch (Sunday) of the week this ODF covers.
    #[must_use]
    pub const fn epoch(&self) -> Epoch {
        self.epoch
    }
}

impl std::fmt::Display for OdfName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.basename)
    }
}

impl FromStr for OdfName {
    type Err = OdfceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_first_epoch_is_sunday() {
        let first = Epoch::new(56460);
        assert_eq!(first.to_date(), date(2013, 6, 16));
        assert!(first.is_sunday());
        assert_eq!(Epoch::from_date(date(2013, 6, 16)), first);
    }

    #[test]
    fn test_current_epoch() {
        let monday = Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap();
        assert_eq!(Epoch::current(monday), Epoch::new(61332));
        let sunday = Utc.with_ymd_and_hms(2026, 10, 18, 23, 0, 0).unwrap();
        assert_eq!(Epoch::current(sunday), Epoch::new(61332));
        assert_eq!(Epoch::new(61332).to_date(), date(2026, 10, 18));
    }

    #[test]
    fn test_previous_week() {
        assert_eq!(Epoch::new(56467).previous_week(), Epoch::new(56460));
        assert_eq!(Epoch::new(3).previous_week(), Epoch::new(0));
    }

    #[test]
    fn test_fce_epoch_start() {
        let first = Epoch::new(56460);
        // Two-week epochs: the second week snaps back to the first.
        assert_eq!(Epoch::new(56467).fce_epoch_start(first, 14), first);
        assert_eq!(Epoch::new(56474).fce_epoch_start(first, 14), Epoch::new(56474));
        // Weeks before the origin snap down, not toward zero.
        assert_eq!(Epoch::new(56453).fce_epoch_start(first, 14), Epoch::new(56446));
    }

    #[test]
    fn test_week_in_epoch() {
        let start = Epoch::new(56460);
        assert_eq!(Epoch::new(56460).week_in_epoch(start), 1);
        assert_eq!(Epoch::new(56481).week_in_epoch(start), 4);
    }

    #[test]
    fn test_odf_name() {
        let name = OdfName::parse("EURUSD-1856460").unwrap();
        assert_eq!(name.symbol(), "EURUSD");
        assert_eq!(name.epoch(), Epoch::new(56460));
        assert_eq!(name.basename(), "EURUSD-1856460");

        let name: OdfName = "BRK-B-1861332x".parse().unwrap();
        assert_eq!(name.symbol(), "BRK-B");
        assert_eq!(name.epoch(), Epoch::new(61332));
    }

    #[test]
    fn test_odf_name_invalid() {
        assert!(OdfName::parse("EURUSD").is_err());
        assert!(OdfName::parse("EURUSD-18").is_err());
        assert!(OdfName::parse("-1856460").is_err());
    }
}
