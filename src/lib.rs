// ============================================================================
// lobbykeeper Library
// ============================================================================
//
// Keeps a lobby index and its game records coherent: lobbies that became
// empty or stale are retired together with their game, unless the game has
// already left the waiting phase.

pub mod config;
pub mod core;
pub mod host;
pub mod retirement;
pub mod storage;

// Re-export main types for convenience
pub use config::CleanupConfig;
pub use core::{
    CleanupError, FieldValue, GameId, GamePhase, LobbyRecord, Result, RetireOutcome, RetireReason,
};
pub use retirement::{
    LobbyCleaner, OccupancyChange, ReconcileOutcome, SweepFailure, SweepReport, Verdict,
    should_retire,
};
pub use storage::{ConditionalRemove, MemoryStore, Precondition, Store, StoreChange, StorePath};
