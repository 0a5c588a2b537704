use super::schedule::delay_until_next_run;
use super::trigger::OccupancyTrigger;
use crate::core::{CleanupError, Result};
use crate::retirement::{LobbyCleaner, ReconcileOutcome};
use crate::storage::Store;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{Level, event};

/// Background worker running the sweep on the configured UTC grid.
pub struct SweepWorker {
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl SweepWorker {
    /// Signals the worker to stop and waits for the current sweep to finish.
    pub async fn stop(mut self) -> Result<()> {
        stop_and_join(self.stop_tx.take(), self.join_handle.take(), "sweep worker").await
    }
}

impl Drop for SweepWorker {
    fn drop(&mut self) {
        abort(self.stop_tx.take(), self.join_handle.take());
    }
}

/// Starts the periodic sweeper. The first sweep runs at the next grid
/// boundary, not immediately.
pub fn spawn_sweep_worker<S>(cleaner: LobbyCleaner<S>) -> SweepWorker
where
    S: Store + ?Sized + 'static,
{
    let interval = Duration::from_millis(cleaner.config().sweep_interval_ms);
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let join_handle = tokio::spawn(async move {
        loop {
            let delay = delay_until_next_run(Utc::now(), interval);
            event!(Level::DEBUG, delay_ms = delay.as_millis() as u64, "next sweep scheduled");

            tokio::select! {
                _ = &mut stop_rx => {
                    break;
                }
                _ = sleep(delay) => {
                    if let Err(err) = cleaner.sweep().await {
                        event!(Level::ERROR, error = %err, "scheduled lobby cleanup failed");
                    }
                }
            }
        }
    });

    SweepWorker {
        stop_tx: Some(stop_tx),
        join_handle: Some(join_handle),
    }
}

/// Background task reconciling lobbies whose occupancy counter changed.
pub struct OccupancyWatcher {
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl OccupancyWatcher {
    pub async fn stop(mut self) -> Result<()> {
        stop_and_join(self.stop_tx.take(), self.join_handle.take(), "occupancy watcher").await
    }
}

impl Drop for OccupancyWatcher {
    fn drop(&mut self) {
        abort(self.stop_tx.take(), self.join_handle.take());
    }
}

/// Subscribes to the store and reconciles every occupancy edge in its own
/// task, so one slow lobby never delays another.
///
/// The subscription is taken before this function returns: writes made
/// afterwards are always observed.
pub fn spawn_occupancy_watcher<S>(cleaner: LobbyCleaner<S>) -> Result<OccupancyWatcher>
where
    S: Store + ?Sized + 'static,
{
    let trigger = OccupancyTrigger::new(cleaner.config())?;
    let mut changes = cleaner.store().subscribe();
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let join_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut stop_rx => {
                    break;
                }
                received = changes.recv() => match received {
                    Ok(change) => {
                        for edge in trigger.edges(&change) {
                            let cleaner = cleaner.clone();
                            tokio::spawn(async move {
                                match cleaner.reconcile(&edge).await {
                                    Ok(ReconcileOutcome::Kept) => {}
                                    Ok(ReconcileOutcome::Retired(outcome)) => {
                                        event!(
                                            Level::DEBUG,
                                            game_id = %edge.game_id,
                                            outcome = ?outcome,
                                            "occupancy reconciliation finished"
                                        );
                                    }
                                    Err(err) => {
                                        event!(
                                            Level::WARN,
                                            game_id = %edge.game_id,
                                            error = %err,
                                            "occupancy reconciliation failed"
                                        );
                                    }
                                }
                            });
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        event!(
                            Level::WARN,
                            missed,
                            "occupancy watcher fell behind; the next sweep will catch up"
                        );
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });

    Ok(OccupancyWatcher {
        stop_tx: Some(stop_tx),
        join_handle: Some(join_handle),
    })
}

async fn stop_and_join(
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
    name: &str,
) -> Result<()> {
    if let Some(stop_tx) = stop_tx {
        let _ = stop_tx.send(());
    }

    if let Some(join_handle) = join_handle {
        join_handle
            .await
            .map_err(|err| CleanupError::Worker(format!("{} join: {}", name, err)))?;
    }
    Ok(())
}

fn abort(stop_tx: Option<oneshot::Sender<()>>, join_handle: Option<JoinHandle<()>>) {
    if let Some(stop_tx) = stop_tx {
        let _ = stop_tx.send(());
    }
    if let Some(join_handle) = join_handle {
        join_handle.abort();
    }
}
