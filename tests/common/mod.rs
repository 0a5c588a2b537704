//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use lobbykeeper::{
    CleanupError, ConditionalRemove, MemoryStore, Precondition, Result, Store, StoreChange,
    StorePath,
};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

pub const HOUR_MS: i64 = 60 * 60 * 1000;
pub const MINUTE_MS: i64 = 60 * 1000;
pub const NOW: i64 = 1_700_000_000_000;

pub fn path(raw: &str) -> StorePath {
    StorePath::parse(raw).unwrap()
}

pub fn lobby(player_count: i64, created_at: i64) -> Value {
    json!({ "playerCount": player_count, "createdAt": created_at })
}

pub fn waiting_game() -> Value {
    json!({ "status": "waiting", "hostId": "p1" })
}

pub fn game_in(phase: &str) -> Value {
    json!({ "status": phase, "hostId": "p1" })
}

pub fn store_with(tree: Value) -> MemoryStore {
    MemoryStore::from_snapshot(tree).unwrap()
}

pub async fn exists(store: &impl Store, raw: &str) -> bool {
    store.get(&path(raw)).await.unwrap().is_some()
}

/// Memory store with injectable read/delete failures, artificial latency
/// and an in-flight read counter.
pub struct FlakyStore {
    inner: MemoryStore,
    failing: Mutex<HashSet<StorePath>>,
    /// On the first read of this path, the value is replaced after being read.
    flip_after_read: Mutex<Option<(StorePath, Value)>>,
    read_delay: Duration,
    remove_delay: Duration,
    reads_in_flight: AtomicUsize,
    max_reads_in_flight: AtomicUsize,
    remove_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
            flip_after_read: Mutex::new(None),
            read_delay: Duration::ZERO,
            remove_delay: Duration::ZERO,
            reads_in_flight: AtomicUsize::new(0),
            max_reads_in_flight: AtomicUsize::new(0),
            remove_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Delays every delete, after the failure check and before the write.
    pub fn with_remove_delay(mut self, delay: Duration) -> Self {
        self.remove_delay = delay;
        self
    }

    pub fn fail_on(&self, raw: &str) {
        self.failing.lock().unwrap().insert(path(raw));
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn flip_after_read(&self, raw: &str, replacement: Value) {
        *self.flip_after_read.lock().unwrap() = Some((path(raw), replacement));
    }

    pub fn max_reads_in_flight(&self) -> usize {
        self.max_reads_in_flight.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Value {
        self.inner.snapshot().await
    }

    async fn delay_remove(&self) {
        if !self.remove_delay.is_zero() {
            tokio::time::sleep(self.remove_delay).await;
        }
    }

    fn check(&self, path: &StorePath) -> Result<()> {
        if self.failing.lock().unwrap().contains(path) {
            return Err(CleanupError::Store(format!("injected failure at {}", path)));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn get(&self, path: &StorePath) -> Result<Option<Value>> {
        self.check(path)?;

        let in_flight = self.reads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_reads_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        if !self.read_delay.is_zero() {
            tokio::time::sleep(self.read_delay).await;
        }
        let value = self.inner.get(path).await;
        self.reads_in_flight.fetch_sub(1, Ordering::SeqCst);

        let flip = {
            let mut pending = self.flip_after_read.lock().unwrap();
            match pending.as_ref() {
                Some((target, _)) if target == path => pending.take(),
                _ => None,
            }
        };
        if let Some((target, replacement)) = flip {
            self.inner.set(&target, replacement).await?;
        }
        value
    }

    async fn set(&self, path: &StorePath, value: Value) -> Result<()> {
        self.check(path)?;
        self.inner.set(path, value).await
    }

    async fn remove(&self, path: &StorePath) -> Result<bool> {
        self.check(path)?;
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        self.delay_remove().await;
        self.inner.remove(path).await
    }

    async fn remove_if(
        &self,
        path: &StorePath,
        precondition: &Precondition,
    ) -> Result<ConditionalRemove> {
        self.check(path)?;
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        self.delay_remove().await;
        self.inner.remove_if(path, precondition).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.inner.subscribe()
    }
}
