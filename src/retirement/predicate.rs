//! Retirement predicate shared by the reactive and the scheduled path.

use crate::core::{FieldValue, RetireReason};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Keep,
    Retire(RetireReason),
}

impl Verdict {
    pub fn is_retire(&self) -> bool {
        matches!(self, Self::Retire(_))
    }
}

/// Decides whether a lobby should be retired.
///
/// Rules, first match wins:
/// 1. occupancy absent, malformed or `<= 0` retires as empty;
/// 2. `now - created_at >= stale_after` retires as stale;
/// 3. otherwise the lobby is kept.
///
/// A creation time in the future is never stale. Pure; performs no I/O.
pub fn should_retire(
    occupancy: &FieldValue<i64>,
    created_at: &FieldValue<i64>,
    now_unix_ms: i64,
    stale_after: Duration,
) -> Verdict {
    match occupancy {
        FieldValue::Present(count) if *count > 0 => {}
        other => {
            return Verdict::Retire(RetireReason::Empty {
                occupancy: other.clone(),
            });
        }
    }

    if let FieldValue::Present(created) = created_at {
        let age_ms = now_unix_ms.saturating_sub(*created);
        let threshold_ms = stale_after.as_millis();
        if age_ms >= 0 && age_ms as u128 >= threshold_ms {
            return Verdict::Retire(RetireReason::Stale {
                age_ms,
                threshold_ms: u64::try_from(threshold_ms).unwrap_or(u64::MAX),
            });
        }
    }

    Verdict::Keep
}
