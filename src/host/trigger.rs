use crate::config::CleanupConfig;
use crate::core::{GameId, Result};
use crate::retirement::OccupancyChange;
use crate::storage::{StoreChange, StorePath};
use serde_json::Value;
use std::collections::BTreeSet;

/// Derives occupancy edges from raw store notifications.
///
/// A counter can change through a write at the counter itself, at its lobby,
/// at the index or anywhere above it; each of these yields one edge per
/// lobby whose counter value actually differs.
#[derive(Debug, Clone)]
pub struct OccupancyTrigger {
    lobbies_root: StorePath,
    occupancy_field: Vec<String>,
}

impl OccupancyTrigger {
    pub fn new(config: &CleanupConfig) -> Result<Self> {
        Ok(Self {
            lobbies_root: config.lobbies_root()?,
            occupancy_field: StorePath::parse(&config.occupancy_field)?.segments().to_vec(),
        })
    }

    pub fn edges(&self, change: &StoreChange) -> Vec<OccupancyChange> {
        let before = change.before.as_ref();
        let after = change.after.as_ref();

        if let Some(below_root) = change.path.strip_prefix(&self.lobbies_root) {
            let Some((game_key, below_lobby)) = below_root.split_first() else {
                return self.index_edges(before, after);
            };
            // Writes beside the counter, or inside a non-scalar counter, carry
            // no complete counter value.
            let Some(to_counter) = self.occupancy_field.strip_prefix(below_lobby) else {
                return Vec::new();
            };
            return self
                .edge(game_key, descend(before, to_counter), descend(after, to_counter))
                .into_iter()
                .collect();
        }

        if let Some(to_index) = self.lobbies_root.strip_prefix(&change.path) {
            return self.index_edges(descend(before, to_index), descend(after, to_index));
        }

        Vec::new()
    }

    fn index_edges(&self, before: Option<&Value>, after: Option<&Value>) -> Vec<OccupancyChange> {
        let keys: BTreeSet<&String> = [before, after]
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
            .flat_map(|lobbies| lobbies.keys())
            .collect();

        keys.into_iter()
            .filter_map(|key| {
                let lobby_before = descend(before, std::slice::from_ref(key));
                let lobby_after = descend(after, std::slice::from_ref(key));
                self.edge(
                    key,
                    descend(lobby_before, &self.occupancy_field),
                    descend(lobby_after, &self.occupancy_field),
                )
            })
            .collect()
    }

    fn edge(
        &self,
        game_key: &str,
        before: Option<&Value>,
        after: Option<&Value>,
    ) -> Option<OccupancyChange> {
        if before == after {
            return None;
        }
        let game_id = GameId::new(game_key).ok()?;
        Some(OccupancyChange::new(game_id, before, after))
    }
}

fn descend<'a>(value: Option<&'a Value>, segments: &[String]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(value?, |node, segment| node.as_object()?.get(segment))
}
