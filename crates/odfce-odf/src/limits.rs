//! Trading-window limits inside the recno space.

/// The repeating trading window of an ODF.
///
/// A recno is in limits if, after subtracting `cycle` until it no longer
/// exceeds `trading_start + recs_per_day`, it lies strictly between
/// `trading_start` and `trading_start + recs_per_day`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingLimits {
    /// Last recno before the trading day.
    pub trading_start: u32,
    /// Records per trading day.
    pub recs_per_day: u32,
    /// Cycle subtracted when folding a recno back into the first window.
    pub cycle: u32,
}

impl TradingLimits {
    /// Creates limits. A zero cycle is treated as 1.
    #[must_use]
    pub const fn new(trading_start: u32, recs_per_day: u32, cycle: u32) -> Self {
        Self {
            trading_start,
            recs_per_day,
            cycle: if cycle == 0 { 1 } else { cycle },
        }
    }

    /// Upper bound (exclusive) of the first window.
    #[must_use]
    pub const fn upper(&self) -> u32 {
        self.trading_start.saturating_add(self.recs_per_day)
    }

    /// Returns true if `recno` lies inside a trading window.
    #[must_use]
    pub const fn contains(&self, recno: u32) -> bool {
        let upper = self.upper();
        let folded = if recno > upper {
            let steps = (recno - upper).div_ceil(self.cycle);
            recno.saturating_sub(steps.saturating_mul(self.cycle))
        } else {
            recno
        };
        folded > self.trading_start && folded < upper
    }

    /// Returns true if `recno` lies outside every trading window.
    #[must_use]
    pub const fn is_out_of_limits(&self, recno: u32) -> bool {
        !self.contains(recno)
    }

    /// Lazily yields the in-limits recnos in `(after, through]`.
    #[must_use]
    pub const fn recnos(&self, after: u32, through: u32) -> RecnosWithinLimits {
        RecnosWithinLimits {
            limits: *self,
            next: after.saturating_add(1),
            through,
        }
    }
}

/// Ascending iterator over in-limits recnos. Cloning restarts from the
/// clone point.
#[derive(Debug, Clone)]
pub struct RecnosWithinLimits {
    limits: TradingLimits,
    next: u32,
    through: u32,
}

impl Iterator for RecnosWithinLimits {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        while self.next <= self.through {
            let recno = self.next;
            self.next = self.next.checked_add(1)?;
            if self.limits.contains(recno) {
                return Some(recno);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_window_is_open_interval() {
        let limits = TradingLimits::new(1, 1440, 1400);
        assert!(!limits.contains(1));
        assert!(limits.contains(2));
        assert!(limits.contains(1440));
        assert!(!limits.contains(1441));
    }

    #[test]
    fn test_folding_by_cycle() {
        let limits = TradingLimits::new(100, 200, 1400);
        assert!(limits.contains(150));
        // 1550 folds to 150.
        assert!(limits.contains(1550));
        // 1450 folds to 50, before the window.
        assert!(limits.is_out_of_limits(1450));
        // 2900 folds to 100, the trading start itself.
        assert!(limits.is_out_of_limits(2900));
    }

    #[test]
    fn test_recnos_iterator() {
        let limits = TradingLimits::new(10, 5, 1400);
        let recnos: Vec<u32> = limits.recnos(0, 20).collect();
        assert_eq!(recnos, vec![11, 12, 13, 14]);

        let iter = limits.recnos(11, 14);
        let again = iter.clone();
        assert_eq!(iter.count(), 3);
        assert_eq!(again.collect::<Vec<_>>(), vec![12, 13, 14]);
    }

    #[test]
    fn test_empty_range() {
        let limits = TradingLimits::new(0, 1440, 1400);
        assert_eq!(limits.recnos(50, 50).count(), 0);
        assert_eq!(limits.recnos(60, 50).count(), 0);
    }
}
