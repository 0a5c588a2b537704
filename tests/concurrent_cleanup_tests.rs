/// Concurrency tests for the reactive and scheduled paths
///
/// Run with: cargo test --test concurrent_cleanup_tests

mod common;

use common::*;
use lobbykeeper::host::{spawn_occupancy_watcher, spawn_sweep_worker};
use lobbykeeper::{
    CleanupConfig, GameId, LobbyCleaner, MemoryStore, OccupancyChange, ReconcileOutcome,
    RetireOutcome, Store,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

async fn wait_until_absent(store: &MemoryStore, raw: &str) -> bool {
    for _ in 0..100 {
        if !exists(store, raw).await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reactive_and_scheduled_paths_delete_each_lobby_once() {
    let count = 40;
    let lobbies: serde_json::Map<String, Value> = (0..count)
        .map(|i| (format!("g{}", i), lobby(0, NOW)))
        .collect();
    let games: serde_json::Map<String, Value> = (0..count)
        .map(|i| (format!("g{}", i), waiting_game()))
        .collect();
    let store = Arc::new(store_with(json!({ "activeLobbies": lobbies, "games": games })));
    let cleaner = LobbyCleaner::new(store.clone(), CleanupConfig::default()).unwrap();
    let barrier = Arc::new(Barrier::new(2));

    let reactive = {
        let cleaner = cleaner.clone();
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            barrier.wait().await;
            let mut deleted = 0;
            for i in 0..count {
                let event = OccupancyChange::new(
                    GameId::new(format!("g{}", i)).unwrap(),
                    Some(&json!(1)),
                    Some(&json!(0)),
                );
                match cleaner.reconcile(&event).await.unwrap() {
                    ReconcileOutcome::Retired(RetireOutcome::Deleted { .. }) => deleted += 1,
                    ReconcileOutcome::Retired(RetireOutcome::SkippedConcurrentlyGone) => {}
                    other => panic!("unexpected outcome {:?}", other),
                }
            }
            deleted
        })
    };
    let scheduled = {
        let cleaner = cleaner.clone();
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            barrier.wait().await;
            cleaner.sweep_at(NOW).await.unwrap()
        })
    };

    let reactive_deleted = reactive.await.unwrap();
    let report = scheduled.await.unwrap();

    assert!(report.failures.is_empty());
    assert_eq!(reactive_deleted + report.deleted, count);
    assert_eq!(report.deleted + report.already_gone, report.candidates);
    assert_eq!(store.snapshot().await, json!({}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_retirements_of_one_lobby_have_a_single_winner() {
    let store = Arc::new(store_with(json!({
        "activeLobbies": { "G": lobby(0, NOW) },
        "games": { "G": waiting_game() }
    })));
    let cleaner = LobbyCleaner::new(store.clone(), CleanupConfig::default()).unwrap();
    let event = OccupancyChange::new(GameId::new("G").unwrap(), Some(&json!(1)), Some(&json!(0)));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cleaner = cleaner.clone();
            let event = event.clone();
            tokio::spawn(async move { cleaner.reconcile(&event).await })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            ReconcileOutcome::Retired(RetireOutcome::Deleted { .. }) => winners += 1,
            ReconcileOutcome::Retired(RetireOutcome::SkippedConcurrentlyGone) => {}
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(store.snapshot().await, json!({}));
}

#[tokio::test]
async fn watcher_retires_lobby_when_last_player_leaves() {
    let store = Arc::new(store_with(json!({
        "activeLobbies": {
            "G": lobby(1, NOW),
            "R": lobby(2, NOW)
        },
        "games": { "G": waiting_game(), "R": game_in("in_progress") }
    })));
    let cleaner = LobbyCleaner::new(store.clone(), CleanupConfig::default()).unwrap();
    let watcher = spawn_occupancy_watcher(cleaner).unwrap();

    store.set(&path("activeLobbies/R/playerCount"), json!(0)).await.unwrap();
    store.set(&path("activeLobbies/G/playerCount"), json!(0)).await.unwrap();

    assert!(wait_until_absent(&store, "activeLobbies/G").await);
    assert!(wait_until_absent(&store, "games/G").await);

    watcher.stop().await.unwrap();
    // The running game kept both of its records.
    assert_eq!(
        store.get(&path("activeLobbies/R/playerCount")).await.unwrap(),
        Some(json!(0))
    );
    assert!(exists(store.as_ref(), "games/R").await);
}

#[tokio::test]
async fn watcher_ignores_joins() {
    let tree = json!({
        "activeLobbies": { "G": lobby(1, NOW - 10 * HOUR_MS) },
        "games": { "G": waiting_game() }
    });
    let store = Arc::new(store_with(tree));
    let cleaner = LobbyCleaner::new(store.clone(), CleanupConfig::default()).unwrap();
    let watcher = spawn_occupancy_watcher(cleaner).unwrap();

    store.set(&path("activeLobbies/G/playerCount"), json!(2)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    watcher.stop().await.unwrap();

    assert!(exists(store.as_ref(), "activeLobbies/G").await);
    assert!(exists(store.as_ref(), "games/G").await);
}

#[tokio::test]
async fn sweep_worker_runs_on_its_interval() {
    let store = Arc::new(store_with(json!({
        "activeLobbies": { "stale": lobby(3, 0) },
        "games": { "stale": waiting_game() }
    })));
    let config = CleanupConfig::new().sweep_interval(Duration::from_millis(50));
    let cleaner = LobbyCleaner::new(store.clone(), config).unwrap();
    let worker = spawn_sweep_worker(cleaner);

    assert!(wait_until_absent(&store, "activeLobbies/stale").await);
    assert!(!exists(store.as_ref(), "games/stale").await);

    worker.stop().await.unwrap();
}
