//! hangar server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite store, and either serves the JSON API over HTTP or runs one
//! detection batch and exits.
//!
//! # Monthly cron
//!
//! ```text
//! hangar --config /etc/hangar.toml detect --version 2026-11
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use hangar_engine::{DetectionRequest, DetectionScope, Engine};
use hangar_server::{ServerConfig, SqliteEngine, expand_tilde};
use hangar_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about = "Hangar AD/SB change detection")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the JSON API (the default).
  Serve,
  /// Run one detection batch, print its summary as JSON, and exit.
  Detect {
    /// Catalog version label; defaults to the catalog's current version.
    #[arg(long)]
    version:  Option<String>,
    /// Reprocess aircraft already at this version.
    #[arg(long)]
    force:    bool,
    /// Only this owner's aircraft.
    #[arg(long, conflicts_with = "aircraft")]
    owner:    Option<String>,
    /// Only this aircraft.
    #[arg(long)]
    aircraft: Option<Uuid>,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let server_cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load config from {:?}", cli.config))?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );
  let engine = Engine::new(Arc::clone(&store), store, server_cfg.detection.clone());

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(engine, &server_cfg).await,
    Command::Detect { version, force, owner, aircraft } => {
      let scope = match (aircraft, owner) {
        (Some(id), _) => DetectionScope::Aircraft(id),
        (None, Some(owner)) => DetectionScope::Owner(owner),
        (None, None) => DetectionScope::All,
      };
      detect(engine, DetectionRequest { scope, version, force, triggered_by: None }).await
    }
  }
}

async fn serve(engine: SqliteEngine, cfg: &ServerConfig) -> anyhow::Result<()> {
  let app = hangar_server::router(engine);
  let address = cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

async fn detect(engine: SqliteEngine, request: DetectionRequest) -> anyhow::Result<()> {
  let summary = engine
    .trigger_detection(request)
    .await
    .context("detection run failed")?;

  println!(
    "{}",
    serde_json::to_string_pretty(&summary).context("failed to serialise summary")?
  );

  if summary.failed > 0 {
    anyhow::bail!("{} aircraft failed detection", summary.failed);
  }
  Ok(())
}
