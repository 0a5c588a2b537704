use super::{CleanupError, FieldValue, Result};
use serde::Serialize;
use std::fmt;

/// Identifier shared by a lobby record and its game record.
///
/// It is used verbatim as one path segment under both the lobby index and
/// the game store, so it may not be empty or contain a path separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(CleanupError::InvalidPath("game id cannot be empty".to_string()));
        }
        if id.contains('/') {
            return Err(CleanupError::InvalidPath(format!(
                "game id '{}' cannot contain '/'",
                id
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GameId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Phase of a game record as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum GamePhase {
    /// No phase field (or no game record at all).
    Absent,
    Named(String),
    /// The field exists but is not a string.
    Malformed(serde_json::Value),
}

impl GamePhase {
    pub fn from_field(field: FieldValue<String>) -> Self {
        match field {
            FieldValue::Present(name) => Self::Named(name),
            FieldValue::Invalid(raw) => Self::Malformed(raw),
            FieldValue::Absent => Self::Absent,
        }
    }

    /// Whether a game in this phase may be deleted together with its lobby.
    ///
    /// Malformed phases are never discardable: the guard errs toward keeping
    /// game state.
    pub fn is_discardable(&self, safe_phases: &[String], absent_is_safe: bool) -> bool {
        match self {
            Self::Absent => absent_is_safe,
            Self::Named(name) => safe_phases.iter().any(|safe| safe == name),
            Self::Malformed(_) => false,
        }
    }

    /// The stored value, used as the precondition of the conditional game delete.
    pub fn as_stored(&self) -> Option<serde_json::Value> {
        match self {
            Self::Absent => None,
            Self::Named(name) => Some(serde_json::Value::String(name.clone())),
            Self::Malformed(raw) => Some(raw.clone()),
        }
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("<absent>"),
            Self::Named(name) => f.write_str(name),
            Self::Malformed(raw) => write!(f, "<malformed: {}>", raw),
        }
    }
}

/// Why a lobby qualified for retirement.
#[derive(Debug, Clone, PartialEq)]
pub enum RetireReason {
    /// Occupancy is absent, null, malformed or not positive.
    Empty { occupancy: FieldValue<i64> },
    /// The lobby outlived the staleness threshold while still occupied.
    Stale { age_ms: i64, threshold_ms: u64 },
}

impl fmt::Display for RetireReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { occupancy } => match occupancy {
                FieldValue::Present(count) => write!(f, "empty (occupancy is {})", count),
                FieldValue::Invalid(raw) => write!(f, "empty (occupancy is malformed: {})", raw),
                FieldValue::Absent => f.write_str("empty (occupancy is absent)"),
            },
            Self::Stale { age_ms, threshold_ms } => write!(
                f,
                "stale (created {:.2} hours ago, threshold {:.2} hours)",
                *age_ms as f64 / MS_PER_HOUR,
                *threshold_ms as f64 / MS_PER_HOUR
            ),
        }
    }
}

const MS_PER_HOUR: f64 = 60.0 * 60.0 * 1000.0;

/// Result of one guarded dual-delete.
#[derive(Debug, Clone, PartialEq)]
pub enum RetireOutcome {
    /// This call removed the lobby record.
    ///
    /// `game_removed` is false when the game record was already gone or when
    /// its phase changed between the guard read and the delete.
    Deleted { game_removed: bool },
    /// The game has left a discardable phase; both records were left untouched.
    SkippedActiveGame { phase: GamePhase },
    /// Another invocation already removed the lobby record.
    SkippedConcurrentlyGone,
}

impl RetireOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted { .. })
    }
}
