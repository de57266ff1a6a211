//! Intervals command.

use odfce_lib::{INTERVAL_TABLE, IntervalTable, Settings};

/// Lists every interval with its parameters and enable state.
pub(crate) fn list_intervals(settings: &Settings, trading_start: u32) {
    let active = IntervalTable::standard(trading_start, &settings.intervals);

    println!(
        "{:<5} {:>8} {:>6} {:>6} {:>10} {:<8}",
        "CODE", "MINUTES", "WEEKS", "SHIFT", "FOUR-WEEK", "STATE"
    );
    println!("{}", "-".repeat(50));

    for def in &INTERVAL_TABLE {
        let (def, state) = match active.get(def.l_code) {
            Some(active) if def.is_mandatory() => (active, "always"),
            Some(active) => (active, "enabled"),
            None => (def, "disabled"),
        };
        println!(
            "L{:<4} {:>8} {:>6} {:>6} {:>10} {:<8}",
            def.l_code,
            def.bar_minutes,
            def.weeks_per_epoch,
            def.time_shift,
            if def.four_week_bar { "yes" } else { "no" },
            state
        );
    }

    println!();
    println!("{} of {} intervals active", active.len(), INTERVAL_TABLE.len());
}
