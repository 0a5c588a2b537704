pub mod error;
pub mod types;
pub mod value;

pub use error::{CleanupError, Result};
pub use types::{GameId, GamePhase, RetireOutcome, RetireReason};
pub use value::{FieldValue, LobbyRecord};
