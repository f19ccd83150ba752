//! srcreg-ui: the local registry editing server.
//!
//! Reads `srcreg.toml` (or the path given with `--config`), opens the
//! file-backed registry and serves the form on localhost until Ctrl-C or
//! `POST /api/shutdown`.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use srcreg_server::{AppState, RegistryService, config::ServerConfig, router};
use srcreg_store::{FileStorage, StoragePaths};
use tokio::net::TcpListener;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Source registry editing server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "srcreg.toml")]
  config: PathBuf,

  /// Interface to bind; overrides the config file.
  #[arg(long)]
  host: Option<String>,

  /// Port to bind; overrides the config file.
  #[arg(short, long)]
  port: Option<u16>,

  /// Repository root; document paths resolve against it.
  #[arg(long, env = "SRCREG_ROOT")]
  root: Option<PathBuf>,
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

  let mut cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to read {}", cli.config.display()))?;
  if let Some(host) = cli.host {
    cfg.host = host;
  }
  if let Some(port) = cli.port {
    cfg.port = port;
  }
  if let Some(root) = cli.root {
    cfg.paths = StoragePaths { root, ..cfg.paths };
  }

  let storage = Arc::new(FileStorage::new(cfg.paths.clone()));
  let service = RegistryService::open(storage)
    .await
    .context("failed to open registry")?;
  let state = AppState::new(service);
  let shutdown = Arc::clone(&state.shutdown);

  let addr = cfg.address();
  let listener = TcpListener::bind(&addr)
    .await
    .with_context(|| format!("failed to bind {addr}"))?;
  info!("listening on http://{addr}");

  axum::serve(listener, router(state))
    .with_graceful_shutdown(async move {
      tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
        _ = shutdown.notified() => {}
      }
    })
    .await
    .context("server error")?;

  info!("server stopped");
  Ok(())
}
