use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

const MICROS_PER_SECOND: u64 = 1_000_000;

/// Timer period for `qps` requests per second, biased short by
/// `correction` to absorb per-tick scheduling overhead. `None` when rate
/// limiting is off.
#[must_use]
pub fn dispatch_period(qps: u64, correction: Duration) -> Option<Duration> {
    let base_us = MICROS_PER_SECOND.checked_div(qps)?;
    let correction_us = u64::try_from(correction.as_micros()).unwrap_or(u64::MAX);
    let period_us = base_us.saturating_sub(correction_us).max(1);
    Some(Duration::from_micros(period_us))
}

/// Recurring dispatch timer; the first tick fires one period after start.
///
/// Ticks that fall due while a request is still in flight are skipped.
pub(crate) fn pacer(period: Duration) -> Interval {
    let start = Instant::now();
    let mut interval = tokio::time::interval_at(start.checked_add(period).unwrap_or(start), period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}
