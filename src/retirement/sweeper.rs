use super::{LobbyCleaner, Verdict, should_retire};
use crate::core::{CleanupError, GameId, LobbyRecord, Result, RetireOutcome, RetireReason};
use crate::storage::Store;
use chrono::Utc;
use futures::future;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{Instrument, Level, event, info_span};

/// Aggregated result of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    /// Lobby records found in the index.
    pub scanned: usize,
    /// Records the predicate selected for retirement.
    pub candidates: usize,
    pub deleted: usize,
    pub skipped_active: usize,
    pub already_gone: usize,
    pub failures: Vec<SweepFailure>,
    /// The sweep deadline expired before every candidate settled.
    pub timed_out: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepFailure {
    pub game_id: String,
    pub error: String,
}

impl SweepReport {
    fn record(&mut self, game_id: &GameId, outcome: Result<RetireOutcome>) {
        match outcome {
            Ok(RetireOutcome::Deleted { .. }) => self.deleted += 1,
            Ok(RetireOutcome::SkippedActiveGame { .. }) => self.skipped_active += 1,
            Ok(RetireOutcome::SkippedConcurrentlyGone) => self.already_gone += 1,
            Err(err) => {
                event!(
                    Level::WARN,
                    game_id = %game_id,
                    error = %err,
                    "cleanup failed; left for the next sweep"
                );
                self.failures.push(SweepFailure {
                    game_id: game_id.to_string(),
                    error: err.to_string(),
                });
            }
        }
    }
}

impl<S: Store + ?Sized> LobbyCleaner<S> {
    /// Scheduled path: scans every lobby and retires the empty or stale ones.
    pub async fn sweep(&self) -> Result<SweepReport> {
        self.sweep_at(Utc::now().timestamp_millis()).await
    }

    /// Sweeps with a fixed notion of "now" shared by every candidate.
    pub async fn sweep_at(&self, now_unix_ms: i64) -> Result<SweepReport> {
        let span = info_span!("lobby.sweep", now_unix_ms);
        self.sweep_inner(now_unix_ms).instrument(span).await
    }

    async fn sweep_inner(&self, now_unix_ms: i64) -> Result<SweepReport> {
        event!(Level::INFO, "starting scheduled lobby cleanup");

        let root = self.config.lobbies_root()?;
        let index = match self.store.get(&root).await? {
            Some(Value::Object(entries)) if !entries.is_empty() => entries,
            None | Some(Value::Object(_)) => {
                event!(Level::INFO, "no active lobbies found");
                return Ok(SweepReport::default());
            }
            Some(_) => {
                return Err(CleanupError::malformed(&root, "lobby index is not an object"));
            }
        };

        let mut report = SweepReport {
            scanned: index.len(),
            ..SweepReport::default()
        };
        let candidates = self.select_candidates(&index, now_unix_ms, &mut report);
        report.candidates = candidates.len();

        // Past the deadline no new candidate is started; retirements already
        // in flight run to completion so neither record is left half-deleted.
        let deadline = self
            .config
            .sweep_deadline_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));
        let cleaner = self;
        let mut settled = stream::iter(candidates)
            .take_while(move |_| future::ready(deadline.map_or(true, |d| Instant::now() < d)))
            .map(move |(game_id, reason)| async move {
                let outcome = cleaner.retire(&game_id, &reason).await;
                (game_id, outcome)
            })
            .buffer_unordered(self.config.max_concurrency);

        let mut settled_count = 0;
        while let Some((game_id, outcome)) = settled.next().await {
            settled_count += 1;
            report.record(&game_id, outcome);
        }
        report.timed_out = settled_count < report.candidates;

        if report.timed_out {
            event!(
                Level::WARN,
                settled = settled_count,
                candidates = report.candidates,
                "sweep deadline reached; remaining lobbies left for the next run"
            );
        }
        event!(
            Level::INFO,
            scanned = report.scanned,
            deleted = report.deleted,
            skipped_active = report.skipped_active,
            already_gone = report.already_gone,
            failed = report.failures.len(),
            "scheduled cleanup completed: {} lobbies cleaned",
            report.deleted
        );
        Ok(report)
    }

    fn select_candidates(
        &self,
        index: &serde_json::Map<String, Value>,
        now_unix_ms: i64,
        report: &mut SweepReport,
    ) -> Vec<(GameId, RetireReason)> {
        let stale_after = self.config.stale_after_duration();
        let mut candidates = Vec::new();

        for (raw_id, raw_lobby) in index {
            let game_id = match GameId::new(raw_id.as_str()) {
                Ok(game_id) => game_id,
                Err(err) => {
                    event!(Level::WARN, key = %raw_id, error = %err, "skipping unaddressable lobby key");
                    report.failures.push(SweepFailure {
                        game_id: raw_id.clone(),
                        error: err.to_string(),
                    });
                    continue;
                }
            };

            let record = LobbyRecord::decode(
                raw_lobby,
                &self.config.occupancy_field,
                &self.config.created_at_field,
            );
            if let Verdict::Retire(reason) =
                should_retire(&record.occupancy, &record.created_at, now_unix_ms, stale_after)
            {
                event!(
                    Level::INFO,
                    game_id = %game_id,
                    reason = %reason,
                    "scheduled cleanup: removing lobby"
                );
                candidates.push((game_id, reason));
            }
        }

        candidates
    }
}
