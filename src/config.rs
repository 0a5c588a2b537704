use crate::core::{CleanupError, GameId, Result};
use crate::storage::StorePath;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_STALE_AFTER_MS: u64 = 2 * 60 * 60 * 1000;
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 60 * 60 * 1000;

/// Cleanup configuration
///
/// Every field has a default, so a JSON config file only needs the values
/// it overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CleanupConfig {
    /// Store path of the lobby index
    pub lobbies_path: String,

    /// Store path under which game records live
    pub games_path: String,

    /// Lobby field holding the player count
    pub occupancy_field: String,

    /// Lobby field holding the creation time (epoch milliseconds)
    pub created_at_field: String,

    /// Game field holding the phase
    pub phase_field: String,

    /// Age after which an occupied lobby is retired anyway
    pub stale_after_ms: u64,

    /// Sweep cadence, aligned to UTC boundaries
    pub sweep_interval_ms: u64,

    /// Game phases that may be deleted together with their lobby
    pub safe_phases: Vec<String>,

    /// Whether a game with no phase (or no record) counts as safe
    pub retire_when_phase_absent: bool,

    /// Maximum concurrent guarded deletes during a sweep
    pub max_concurrency: usize,

    /// Optional bound on a whole sweep
    pub sweep_deadline_ms: Option<u64>,

    /// Optional bound on one reactive reconciliation
    pub reconcile_deadline_ms: Option<u64>,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            lobbies_path: "activeLobbies".to_string(),
            games_path: "games".to_string(),
            occupancy_field: "playerCount".to_string(),
            created_at_field: "createdAt".to_string(),
            phase_field: "status".to_string(),
            stale_after_ms: DEFAULT_STALE_AFTER_MS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            safe_phases: vec!["waiting".to_string()],
            retire_when_phase_absent: true,
            max_concurrency: 16,
            sweep_deadline_ms: None,
            reconcile_deadline_ms: Some(60_000),
        }
    }
}

impl CleanupConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from a JSON file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| CleanupError::Config(format!("{}: {}", path.display(), err)))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|err| CleanupError::Config(format!("{}: {}", path.display(), err)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let named = [
            ("lobbies_path", &self.lobbies_path),
            ("games_path", &self.games_path),
            ("occupancy_field", &self.occupancy_field),
            ("created_at_field", &self.created_at_field),
            ("phase_field", &self.phase_field),
        ];
        for (name, value) in named {
            if value.trim_matches('/').is_empty() {
                return Err(CleanupError::Config(format!("{} cannot be empty", name)));
            }
            StorePath::parse(value)
                .map_err(|err| CleanupError::Config(format!("{}: {}", name, err)))?;
        }

        if self.sweep_interval_ms == 0 {
            return Err(CleanupError::Config(
                "sweep_interval_ms must be positive".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(CleanupError::Config(
                "max_concurrency must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the staleness threshold
    pub fn stale_after(mut self, threshold: Duration) -> Self {
        self.stale_after_ms = millis(threshold);
        self
    }

    /// Set the sweep cadence
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval_ms = millis(interval);
        self
    }

    /// Replace the set of discardable game phases
    pub fn safe_phases<I, P>(mut self, phases: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.safe_phases = phases.into_iter().map(Into::into).collect();
        self
    }

    pub fn retire_when_phase_absent(mut self, retire: bool) -> Self {
        self.retire_when_phase_absent = retire;
        self
    }

    /// Set the sweep fan-out limit
    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    pub fn sweep_deadline(mut self, deadline: Duration) -> Self {
        self.sweep_deadline_ms = Some(millis(deadline));
        self
    }

    pub fn reconcile_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.reconcile_deadline_ms = deadline.map(millis);
        self
    }

    /// Relocate both record trees, e.g. under a per-environment prefix
    pub fn paths(mut self, lobbies_path: &str, games_path: &str) -> Self {
        self.lobbies_path = lobbies_path.to_string();
        self.games_path = games_path.to_string();
        self
    }

    pub fn stale_after_duration(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    pub fn lobbies_root(&self) -> Result<StorePath> {
        StorePath::parse(&self.lobbies_path)
    }

    pub fn lobby_path(&self, game_id: &GameId) -> Result<StorePath> {
        self.lobbies_root()?.child(game_id.as_str())
    }

    pub fn occupancy_path(&self, game_id: &GameId) -> Result<StorePath> {
        self.lobby_path(game_id)?.child(&self.occupancy_field)
    }

    pub fn game_path(&self, game_id: &GameId) -> Result<StorePath> {
        StorePath::parse(&self.games_path)?.child(game_id.as_str())
    }

    pub fn phase_path(&self, game_id: &GameId) -> Result<StorePath> {
        self.game_path(game_id)?.child(&self.phase_field)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_hosted_deployment() {
        let config = CleanupConfig::default();

        assert_eq!(config.stale_after_ms, 7_200_000);
        assert_eq!(config.sweep_interval_ms, 3_600_000);
        assert_eq!(config.safe_phases, vec!["waiting".to_string()]);
        assert!(config.retire_when_phase_absent);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_overrides() {
        let config = CleanupConfig::new()
            .stale_after(Duration::from_secs(30 * 60))
            .safe_phases(["waiting", "lobby"])
            .max_concurrency(4);

        assert_eq!(config.stale_after_ms, 1_800_000);
        assert_eq!(config.safe_phases.len(), 2);
        assert_eq!(config.max_concurrency, 4);
    }

    #[test]
    fn oversized_durations_saturate() {
        let config = CleanupConfig::new()
            .stale_after(Duration::MAX)
            .sweep_interval(Duration::MAX)
            .sweep_deadline(Duration::MAX)
            .reconcile_deadline(Some(Duration::MAX));

        assert_eq!(config.stale_after_ms, u64::MAX);
        assert_eq!(config.sweep_interval_ms, u64::MAX);
        assert_eq!(config.sweep_deadline_ms, Some(u64::MAX));
        assert_eq!(config.reconcile_deadline_ms, Some(u64::MAX));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: CleanupConfig =
            serde_json::from_str(r#"{ "stale_after_ms": 1000, "phase_field": "phase" }"#).unwrap();

        assert_eq!(config.stale_after_ms, 1000);
        assert_eq!(config.phase_field, "phase");
        assert_eq!(config.lobbies_path, "activeLobbies");
    }

    #[test]
    fn validate_rejects_degenerate_values() {
        assert!(CleanupConfig::new().max_concurrency(0).validate().is_err());
        assert!(CleanupConfig::new().paths("", "games").validate().is_err());
        assert!(CleanupConfig::new().paths("a//b", "games").validate().is_err());

        let mut config = CleanupConfig::new();
        config.sweep_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn record_paths() {
        let config = CleanupConfig::new();
        let game_id = GameId::new("g1").unwrap();

        assert_eq!(
            config.occupancy_path(&game_id).unwrap().to_string(),
            "/activeLobbies/g1/playerCount"
        );
        assert_eq!(config.phase_path(&game_id).unwrap().to_string(), "/games/g1/status");
    }

    #[tokio::test]
    async fn load_reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleanup.json");
        std::fs::write(&path, r#"{ "max_concurrency": 2 }"#).unwrap();

        let config = CleanupConfig::load(&path).await.unwrap();
        assert_eq!(config.max_concurrency, 2);

        std::fs::write(&path, r#"{ "max_concurrency": 0 }"#).unwrap();
        assert!(matches!(
            CleanupConfig::load(&path).await,
            Err(CleanupError::Config(_))
        ));
    }
}
