//! Lobby retirement: the shared predicate, the guarded dual-delete and the
//! two entry points built on them.

pub mod guard;
pub mod predicate;
pub mod reconciler;
pub mod sweeper;

pub use predicate::{Verdict, should_retire};
pub use reconciler::{OccupancyChange, ReconcileOutcome};
pub use sweeper::{SweepFailure, SweepReport};

use crate::config::CleanupConfig;
use crate::core::Result;
use crate::storage::Store;
use std::sync::Arc;

/// Entry point for both cleanup paths.
///
/// Holds no state besides the injected store and the configuration, so
/// clones may run concurrently against the same store.
pub struct LobbyCleaner<S: Store + ?Sized> {
    store: Arc<S>,
    config: CleanupConfig,
}

impl<S: Store + ?Sized> LobbyCleaner<S> {
    pub fn new(store: Arc<S>, config: CleanupConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &CleanupConfig {
        &self.config
    }
}

impl<S: Store + ?Sized> Clone for LobbyCleaner<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}
