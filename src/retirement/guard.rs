use super::LobbyCleaner;
use crate::core::{
    CleanupError, FieldValue, GameId, GamePhase, Result, RetireOutcome, RetireReason,
};
use crate::storage::{ConditionalRemove, Precondition, Store};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{Instrument, Level, event, info_span};

impl<S: Store + ?Sized> LobbyCleaner<S> {
    /// Guarded dual-delete.
    ///
    /// Reads the game's phase; if it is discardable, removes the lobby record
    /// and the game record concurrently. The game delete is conditional on
    /// the phase still holding the value just read. Safe to repeat: a second
    /// call finds the lobby gone and returns `SkippedConcurrentlyGone`.
    pub async fn retire(&self, game_id: &GameId, reason: &RetireReason) -> Result<RetireOutcome> {
        self.retire_within(game_id, reason, None).await
    }

    /// Like [`retire`](Self::retire), but gives up when the phase read has
    /// not settled within `read_deadline_ms`. The deadline never applies to
    /// the deletes: once issued, both run to completion.
    pub(crate) async fn retire_within(
        &self,
        game_id: &GameId,
        reason: &RetireReason,
        read_deadline_ms: Option<u64>,
    ) -> Result<RetireOutcome> {
        let span = info_span!("lobby.retire", game_id = %game_id, reason = %reason);
        self.retire_inner(game_id, read_deadline_ms)
            .instrument(span)
            .await
    }

    async fn retire_inner(
        &self,
        game_id: &GameId,
        read_deadline_ms: Option<u64>,
    ) -> Result<RetireOutcome> {
        let lobby_path = self.config.lobby_path(game_id)?;
        let game_path = self.config.game_path(game_id)?;
        let phase_path = game_path.child(&self.config.phase_field)?;

        let read = self.store.get(&phase_path);
        let raw_phase = match read_deadline_ms {
            Some(after_ms) => timeout(Duration::from_millis(after_ms), read)
                .await
                .map_err(|_| {
                    event!(Level::WARN, after_ms, "phase read timed out; nothing deleted");
                    CleanupError::DeadlineExceeded {
                        operation: format!("reconcile {}", game_id),
                        after_ms,
                    }
                })??,
            None => read.await?,
        };
        let phase = GamePhase::from_field(FieldValue::string(raw_phase.as_ref()));

        if !phase.is_discardable(&self.config.safe_phases, self.config.retire_when_phase_absent) {
            event!(
                Level::INFO,
                phase = %phase,
                "skipped cleanup: game is no longer waiting"
            );
            return Ok(RetireOutcome::SkippedActiveGame { phase });
        }

        let precondition = Precondition {
            field: self.config.phase_field.clone(),
            expected: phase.as_stored(),
        };
        let (lobby_result, game_result) = futures::join!(
            self.store.remove(&lobby_path),
            self.store.remove_if(&game_path, &precondition),
        );

        // Both deletes have settled; report every failure before returning one.
        if let Err(err) = &lobby_result {
            event!(Level::WARN, error = %err, path = %lobby_path, "lobby delete failed");
        }
        if let Err(err) = &game_result {
            event!(Level::WARN, error = %err, path = %game_path, "game delete failed");
        }
        let lobby_removed = lobby_result?;
        let game_removed = match game_result? {
            ConditionalRemove::Removed => true,
            ConditionalRemove::AlreadyAbsent => false,
            ConditionalRemove::PreconditionFailed { actual } => {
                event!(
                    Level::WARN,
                    expected = %phase,
                    actual = ?actual,
                    "game phase changed during cleanup; game record preserved"
                );
                false
            }
        };

        if !lobby_removed {
            event!(Level::INFO, game_removed, "lobby already cleaned up");
            return Ok(RetireOutcome::SkippedConcurrentlyGone);
        }

        event!(Level::INFO, phase = %phase, game_removed, "cleaned up lobby");
        Ok(RetireOutcome::Deleted { game_removed })
    }
}
