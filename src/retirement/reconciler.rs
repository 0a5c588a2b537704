use super::{LobbyCleaner, Verdict, should_retire};
use crate::core::{FieldValue, GameId, Result, RetireOutcome};
use crate::storage::Store;
use chrono::Utc;
use serde_json::Value;
use tracing::{Level, event};

/// A write to one lobby's occupancy counter.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyChange {
    pub game_id: GameId,
    pub before: FieldValue<i64>,
    pub after: FieldValue<i64>,
}

impl OccupancyChange {
    pub fn new(game_id: GameId, before: Option<&Value>, after: Option<&Value>) -> Self {
        Self {
            game_id,
            before: FieldValue::integer(before),
            after: FieldValue::integer(after),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The new occupancy does not qualify for retirement.
    Kept,
    Retired(RetireOutcome),
}

impl<S: Store + ?Sized> LobbyCleaner<S> {
    /// Reactive path: re-evaluates a single lobby after its counter changed.
    ///
    /// Only the occupancy edge is considered; staleness is left to the sweep.
    /// `reconcile_deadline_ms` bounds the phase read only.
    pub async fn reconcile(&self, change: &OccupancyChange) -> Result<ReconcileOutcome> {
        let verdict = should_retire(
            &change.after,
            &FieldValue::Absent,
            Utc::now().timestamp_millis(),
            self.config.stale_after_duration(),
        );

        let reason = match verdict {
            Verdict::Keep => {
                event!(
                    Level::DEBUG,
                    game_id = %change.game_id,
                    occupancy = ?change.after,
                    "occupancy change keeps lobby"
                );
                return Ok(ReconcileOutcome::Kept);
            }
            Verdict::Retire(reason) => reason,
        };

        let outcome = self
            .retire_within(&change.game_id, &reason, self.config.reconcile_deadline_ms)
            .await?;
        Ok(ReconcileOutcome::Retired(outcome))
    }

    /// Reconciles a lobby against its current counter value rather than a
    /// delivered change, for hosts that lost the original notification.
    pub async fn reconcile_game(&self, game_id: &GameId) -> Result<ReconcileOutcome> {
        let current = self.store.get(&self.config.occupancy_path(game_id)?).await?;
        let change = OccupancyChange::new(game_id.clone(), current.as_ref(), current.as_ref());
        self.reconcile(&change).await
    }
}
