use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

/// First instant strictly after `now` that lies on the UTC grid of `interval`.
///
/// The grid starts at the Unix epoch, so an hourly interval fires at the top
/// of every UTC hour and a daily one at UTC midnight.
pub fn next_run_after(now: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    let interval_ms = i64::try_from(interval.as_millis()).unwrap_or(i64::MAX).max(1);
    let now_ms = now.timestamp_millis();
    let next_ms = now_ms
        .div_euclid(interval_ms)
        .saturating_add(1)
        .saturating_mul(interval_ms);

    Utc.timestamp_millis_opt(next_ms)
        .single()
        .unwrap_or_else(|| now + chrono::Duration::milliseconds(interval_ms))
}

pub fn delay_until_next_run(now: DateTime<Utc>, interval: Duration) -> Duration {
    (next_run_after(now, interval) - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}
