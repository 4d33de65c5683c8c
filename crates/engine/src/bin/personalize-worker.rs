//! personalize-worker — standalone runner for the personalization engine.
//!
//! Loads a registry snapshot, performs a full load of the directive files,
//! and keeps watching the config root for changes. With `--once` it builds
//! the artifacts and exits instead of watching.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use personalize_core::config::{self, Config};
use personalize_core::{EnableFlag, NotificationSink};
use personalize_engine::snapshot::SnapshotRegistry;
use personalize_engine::watch::FsWatchService;
use personalize_engine::ReloadOrchestrator;

// ── CLI ─────────────────────────────────────────────────────────────

/// Personalization worker — directive file watching and artifact generation.
#[derive(Parser, Debug)]
#[command(name = "personalize-worker", version, about)]
struct Cli {
    /// Path to the registry snapshot JSON (the host's base data).
    #[arg(long, env = "PERSONALIZE_REGISTRY_SNAPSHOT", default_value = "data/registry.json")]
    registry_snapshot: PathBuf,

    /// Directory holding the directive category folders.
    #[arg(long, env = "PERSONALIZE_CONFIG_ROOT")]
    config_root: Option<PathBuf>,

    /// Root of the host's source declarations.
    #[arg(long, env = "PERSONALIZE_SOURCE_ROOT")]
    source_root: Option<PathBuf>,

    /// Root receiving generated artifacts.
    #[arg(long, env = "PERSONALIZE_GENERATED_ROOT")]
    generated_root: Option<PathBuf>,

    /// Build artifacts once and exit instead of watching.
    #[arg(long)]
    once: bool,
}

// ── Host collaborators ──────────────────────────────────────────────

/// Flag fixed at startup; the standalone worker has no host to flip it.
struct StaticFlag(bool);

impl EnableFlag for StaticFlag {
    fn enabled(&self) -> bool {
        self.0
    }
}

/// User notifications go to the log when no host UI is attached.
struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, message: &str) {
        warn!(message, "user notification");
    }
}

// ── main ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(root) = cli.config_root {
        config.config_root = root;
    }
    if let Some(root) = cli.source_root {
        config.source_root = root;
    }
    if let Some(root) = cli.generated_root {
        config.generated_root = root;
    }
    // the standalone worker exists to generate artifacts
    config.enabled = true;
    config.log_summary();

    let registry = Arc::new(
        SnapshotRegistry::from_file(&cli.registry_snapshot).with_context(|| {
            format!(
                "failed to load registry snapshot {}",
                cli.registry_snapshot.display()
            )
        })?,
    );

    let enabled = config.enabled;
    let orchestrator = ReloadOrchestrator::new(
        config,
        registry,
        Arc::new(FsWatchService::new()),
        Arc::new(StaticFlag(enabled)),
        Arc::new(LogSink),
    );

    info!("personalize-worker starting");
    orchestrator.startup();

    if cli.once {
        info!("artifacts built, exiting");
        return Ok(());
    }

    info!("watching for directive changes, ctrl-c to exit");
    loop {
        std::thread::park();
    }
}
