use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CleanupError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Malformed record at '{path}': {detail}")]
    MalformedRecord { path: String, detail: String },

    #[error("Invalid store path: {0}")]
    InvalidPath(String),

    #[error("{operation} exceeded its deadline of {after_ms}ms")]
    DeadlineExceeded { operation: String, after_ms: u64 },

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, CleanupError>;

impl CleanupError {
    pub fn malformed(path: impl ToString, detail: impl Into<String>) -> Self {
        Self::MalformedRecord {
            path: path.to_string(),
            detail: detail.into(),
        }
    }
}

impl From<std::io::Error> for CleanupError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CleanupError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedRecord {
            path: "<json>".to_string(),
            detail: err.to_string(),
        }
    }
}
