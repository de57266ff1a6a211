//! Resampling interval definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minutes in one calendar week.
pub const MINUTES_PER_WEEK: u32 = 10_080;

/// Minutes in one calendar day.
pub const MINUTES_PER_DAY: u32 = 1_440;

/// One resampling resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntervalDefinition {
    /// Two-digit interval code used in chunk paths (e.g. 31 for 1-minute bars).
    pub l_code: u16,
    /// Bar length in minutes.
    pub bar_minutes: u32,
    /// Number of calendar weeks sharing one FCE epoch.
    pub weeks_per_epoch: u32,
    /// Shift applied to recnos before bucketing, in minutes.
    pub time_shift: u32,
    /// Four-week bars: OPEN only in the opening week, CLOSE on every record.
    pub four_week_bar: bool,
}

impl IntervalDefinition {
    const fn new(
        l_code: u16,
        bar_minutes: u32,
        weeks_per_epoch: u32,
        time_shift: u32,
        four_week_bar: bool,
    ) -> Self {
        Self {
            l_code,
            bar_minutes,
            weeks_per_epoch,
            time_shift,
            four_week_bar,
        }
    }

    /// Returns true for the daily, weekly and four-weekly intervals, which
    /// cannot be disabled.
    #[must_use]
    pub const fn is_mandatory(&self) -> bool {
        matches!(self.l_code, 79 | 88 | 98)
    }

    /// Length of one FCE epoch in days.
    #[must_use]
    pub const fn epoch_days(&self) -> u32 {
        7 * self.weeks_per_epoch
    }

    /// Settings key of this interval's enable flag.
    #[must_use]
    pub fn toggle_key(&self) -> String {
        format!("L{}", self.l_code)
    }
}

/// The full interval table. The daily interval's time shift is a placeholder;
/// [`IntervalTable::standard`] resolves it from the trading start recno.
pub const INTERVAL_TABLE: [IntervalDefinition; 16] = [
    IntervalDefinition::new(31, 1, 1, 0, false),
    IntervalDefinition::new(32, 2, 1, 0, false),
    IntervalDefinition::new(33, 3, 1, 0, false),
    IntervalDefinition::new(34, 4, 1, 0, false),
    IntervalDefinition::new(35, 5, 1, 0, false),
    IntervalDefinition::new(36, 7, 1, 0, false),
    IntervalDefinition::new(37, 10, 1, 0, false),
    IntervalDefinition::new(38, 15, 2, 0, false),
    IntervalDefinition::new(48, 30, 4, 0, false),
    IntervalDefinition::new(58, 60, 8, 0, false),
    IntervalDefinition::new(59, 60, 8, 30, false),
    IntervalDefinition::new(68, 240, 26, 0, false),
    IntervalDefinition::new(69, 240, 26, 30, false),
    IntervalDefinition::new(79, 1440, 52, 0, false),
    IntervalDefinition::new(88, 10080, 260, 0, false),
    IntervalDefinition::new(98, 40320, 1040, 0, true),
];

/// Per-interval enable flags keyed `L31` .. `L69`.
///
/// Missing keys count as enabled. Flags for the mandatory intervals are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntervalToggles(BTreeMap<String, bool>);

impl IntervalToggles {
    /// Returns true if the interval with `l_code` should run.
    #[must_use]
    pub fn is_enabled(&self, l_code: u16) -> bool {
        if matches!(l_code, 79 | 88 | 98) {
            return true;
        }
        self.0.get(&format!("L{l_code}")).copied().unwrap_or(true)
    }

    /// Sets the enable flag of an interval.
    pub fn set(&mut self, l_code: u16, enabled: bool) {
        self.0.insert(format!("L{l_code}"), enabled);
    }

    /// Returns keys that do not name an optional interval.
    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str).filter(|key| {
            !INTERVAL_TABLE
                .iter()
                .any(|def| !def.is_mandatory() && def.toggle_key() == *key)
        })
    }
}

/// The intervals active for one ODF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalTable {
    intervals: Vec<IntervalDefinition>,
}

impl IntervalTable {
    /// Builds the active table for an ODF whose trading day starts after
    /// `trading_start_recno`.
    #[must_use]
    pub fn standard(trading_start_recno: u32, toggles: &IntervalToggles) -> Self {
        let intervals = INTERVAL_TABLE
            .iter()
            .filter(|def| toggles.is_enabled(def.l_code))
            .map(|def| {
                let mut def = *def;
                if def.l_code == 79 {
                    def.time_shift = trading_start_recno % MINUTES_PER_DAY;
                }
                def
            })
            .collect();
        Self { intervals }
    }

    /// Builds a table from explicit definitions.
    #[must_use]
    pub const fn from_definitions(intervals: Vec<IntervalDefinition>) -> Self {
        Self { intervals }
    }

    /// Iterates over the active intervals in table order.
    pub fn iter(&self) -> impl Iterator<Item = &IntervalDefinition> {
        self.intervals.iter()
    }

    /// Looks up an active interval by L-code.
    #[must_use]
    pub fn get(&self, l_code: u16) -> Option<&IntervalDefinition> {
        self.intervals.iter().find(|def| def.l_code == l_code)
    }

    /// Number of active intervals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Returns true if no interval is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}
