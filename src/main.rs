use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lobbykeeper::host::{spawn_occupancy_watcher, spawn_sweep_worker};
use lobbykeeper::{CleanupConfig, GameId, LobbyCleaner, MemoryStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "lobbykeeper")]
#[command(version, about = "Retires empty or stale lobbies and their waiting games")]
struct Cli {
    /// JSON export of the store (object root)
    #[arg(long, global = true, default_value = "store.json")]
    snapshot: PathBuf,

    /// JSON file overriding cleanup defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one sweep over every lobby and print the report
    Sweep {
        /// Evaluate staleness against this instant instead of the clock
        #[arg(long)]
        now_ms: Option<i64>,
        /// Write the resulting store back to the snapshot file
        #[arg(long)]
        write: bool,
    },
    /// Reconcile one lobby against its current player count
    Reconcile {
        #[arg(long)]
        game_id: String,
        #[arg(long)]
        write: bool,
    },
    /// Run the hourly sweeper and the occupancy watcher until Ctrl-C
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = match &cli.config {
        Some(path) => CleanupConfig::load(path).await?,
        None => CleanupConfig::default(),
    };
    let store = Arc::new(load_store(&cli.snapshot).await?);
    let cleaner = LobbyCleaner::new(Arc::clone(&store), config)?;

    match cli.command {
        Command::Sweep { now_ms, write } => {
            let report = match now_ms {
                Some(now_ms) => cleaner.sweep_at(now_ms).await?,
                None => cleaner.sweep().await?,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            if write {
                save_store(&store, &cli.snapshot).await?;
            }
        }
        Command::Reconcile { game_id, write } => {
            let game_id = GameId::new(game_id)?;
            let outcome = cleaner.reconcile_game(&game_id).await?;
            println!("{}: {:?}", game_id, outcome);
            if write {
                save_store(&store, &cli.snapshot).await?;
            }
        }
        Command::Serve => {
            let watcher = spawn_occupancy_watcher(cleaner.clone())?;
            let sweeper = spawn_sweep_worker(cleaner);
            tracing::info!(snapshot = %cli.snapshot.display(), "lobbykeeper running");

            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;

            tracing::info!("shutting down");
            watcher.stop().await?;
            sweeper.stop().await?;
            save_store(&store, &cli.snapshot).await?;
        }
    }

    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn load_store(path: &Path) -> Result<MemoryStore> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let snapshot: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("snapshot {} is not valid JSON", path.display()))?;
    Ok(MemoryStore::from_snapshot(snapshot)?)
}

async fn save_store(store: &MemoryStore, path: &Path) -> Result<()> {
    let snapshot = store.snapshot().await;
    tokio::fs::write(path, serde_json::to_vec_pretty(&snapshot)?)
        .await
        .with_context(|| format!("failed to write snapshot {}", path.display()))?;
    Ok(())
}
