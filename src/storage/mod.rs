//! Store contract consumed by the retirement protocol.
//!
//! The store is a hierarchical JSON tree addressed by slash-delimited paths.
//! Production deployments implement [`Store`] against their realtime
//! database; [`MemoryStore`] is the in-process reference implementation.

pub mod memory;

pub use memory::MemoryStore;

use crate::core::{CleanupError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use tokio::sync::broadcast;

/// Slash-delimited location in the store. The empty path is the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses `a/b/c`. Leading and trailing slashes are ignored; empty
    /// segments in the middle (`a//b`) are rejected.
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            if segment.is_empty() {
                return Err(CleanupError::InvalidPath(format!(
                    "empty segment in '{}'",
                    path
                )));
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    pub fn child(&self, relative: &str) -> Result<Self> {
        let relative = Self::parse(relative)?;
        let mut segments = self.segments.clone();
        segments.extend(relative.segments);
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Remaining segments of `self` below `prefix`, if `self` lies at or under it.
    pub fn strip_prefix(&self, prefix: &StorePath) -> Option<&[String]> {
        self.segments.strip_prefix(prefix.segments.as_slice())
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

/// One write observed by the store, with the values before and after it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub path: StorePath,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

/// Requirement checked against a child field right before a conditional delete.
#[derive(Debug, Clone, PartialEq)]
pub struct Precondition {
    pub field: String,
    /// `None` requires the field to be absent.
    pub expected: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionalRemove {
    Removed,
    AlreadyAbsent,
    PreconditionFailed { actual: Option<Value> },
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Point read. `None` means nothing is stored at `path`.
    async fn get(&self, path: &StorePath) -> Result<Option<Value>>;

    /// Writes `value` at `path`. Writing `null` removes the path.
    async fn set(&self, path: &StorePath, value: Value) -> Result<()>;

    /// Point delete. Returns `false` if `path` was already absent.
    async fn remove(&self, path: &StorePath) -> Result<bool>;

    /// Deletes `path` only if its `precondition.field` child still holds
    /// the expected value.
    ///
    /// The default implementation reads then removes and is therefore not
    /// atomic; stores with conditional writes should override it.
    async fn remove_if(
        &self,
        path: &StorePath,
        precondition: &Precondition,
    ) -> Result<ConditionalRemove> {
        let actual = self.get(&path.child(&precondition.field)?).await?;
        if actual != precondition.expected {
            return Ok(ConditionalRemove::PreconditionFailed { actual });
        }

        if self.remove(path).await? {
            Ok(ConditionalRemove::Removed)
        } else {
            Ok(ConditionalRemove::AlreadyAbsent)
        }
    }

    /// Change notifications for every subsequent write.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}
