use super::{ConditionalRemove, Precondition, Store, StoreChange, StorePath};
use crate::core::{CleanupError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{RwLock, broadcast};

const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// In-memory hierarchical store with realtime-database write semantics:
/// writing `null` removes a path and objects left without children vanish.
pub struct MemoryStore {
    /// Whole tree under one lock; the root is always an object.
    root: RwLock<Value>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            root: RwLock::new(Value::Object(Map::new())),
            changes,
        }
    }

    /// Builds a store from an exported tree. The snapshot must be an object or `null`.
    pub fn from_snapshot(snapshot: Value) -> Result<Self> {
        let root = match normalize(snapshot) {
            None => Value::Object(Map::new()),
            Some(tree @ Value::Object(_)) => tree,
            Some(other) => {
                return Err(CleanupError::malformed(
                    StorePath::root(),
                    format!("snapshot root must be an object, got {}", type_name(&other)),
                ));
            }
        };

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            root: RwLock::new(root),
            changes,
        })
    }

    /// Copy of the whole tree.
    pub async fn snapshot(&self) -> Value {
        self.root.read().await.clone()
    }

    fn publish(&self, path: &StorePath, before: Option<Value>, after: Option<Value>) {
        if before == after {
            return;
        }
        // No subscribers is fine.
        let _ = self.changes.send(StoreChange {
            path: path.clone(),
            before,
            after,
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, path: &StorePath) -> Result<Option<Value>> {
        let root = self.root.read().await;
        Ok(lookup(&root, path.segments()).cloned())
    }

    async fn set(&self, path: &StorePath, value: Value) -> Result<()> {
        let mut root = self.root.write().await;
        let before = lookup(&root, path.segments()).cloned();

        match normalize(value) {
            None => {
                remove_at(&mut root, path.segments());
            }
            Some(value) if path.is_root() => {
                if !value.is_object() {
                    return Err(CleanupError::malformed(
                        path,
                        format!("root must be an object, got {}", type_name(&value)),
                    ));
                }
                *root = value;
            }
            Some(value) => insert_at(&mut root, path.segments(), value),
        }

        let after = lookup(&root, path.segments()).cloned();
        self.publish(path, before, after);
        Ok(())
    }

    async fn remove(&self, path: &StorePath) -> Result<bool> {
        let mut root = self.root.write().await;
        let before = remove_at(&mut root, path.segments());
        let removed = before.is_some();
        self.publish(path, before, None);
        Ok(removed)
    }

    async fn remove_if(
        &self,
        path: &StorePath,
        precondition: &Precondition,
    ) -> Result<ConditionalRemove> {
        let guard_path = path.child(&precondition.field)?;
        let mut root = self.root.write().await;

        let actual = lookup(&root, guard_path.segments()).cloned();
        if actual != precondition.expected {
            return Ok(ConditionalRemove::PreconditionFailed { actual });
        }

        match remove_at(&mut root, path.segments()) {
            Some(before) => {
                self.publish(path, Some(before), None);
                Ok(ConditionalRemove::Removed)
            }
            None => Ok(ConditionalRemove::AlreadyAbsent),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

/// Nested objects are never empty once normalized, so only an empty root is
/// filtered here.
fn lookup<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
        .filter(|node| !node.as_object().is_some_and(Map::is_empty))
}

fn insert_at(node: &mut Value, segments: &[String], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    // Writing below a scalar replaces it, as in a realtime database.
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(children) = node {
        let child = children.entry(first.clone()).or_insert(Value::Null);
        insert_at(child, rest, value);
    }
}

/// Removes the value at `segments`, pruning parents that end up empty.
fn remove_at(root: &mut Value, segments: &[String]) -> Option<Value> {
    let Some((first, rest)) = segments.split_first() else {
        let children = root.as_object_mut()?;
        if children.is_empty() {
            return None;
        }
        return Some(Value::Object(std::mem::take(children)));
    };

    let children = root.as_object_mut()?;
    if rest.is_empty() {
        return children.remove(first);
    }

    let child = children.get_mut(first)?;
    let removed = remove_at(child, rest)?;
    if child.as_object().is_some_and(Map::is_empty) {
        children.remove(first);
    }
    Some(removed)
}

/// Drops nulls and empty objects, which the store never holds.
fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(fields) => {
            let fields: Map<String, Value> = fields
                .into_iter()
                .filter_map(|(key, child)| normalize(child).map(|child| (key, child)))
                .collect();
            if fields.is_empty() {
                None
            } else {
                Some(Value::Object(fields))
            }
        }
        other => Some(other),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
