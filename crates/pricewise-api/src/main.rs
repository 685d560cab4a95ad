//! pricewise binary.
//!
//! Reads `config.toml` (or the path given with `--config`), layers
//! `PRICEWISE_*` environment variables on top, opens the SQLite store and
//! either serves the JSON API or runs one learning batch.
//!
//! ```text
//! pricewise serve
//! pricewise --config /etc/pricewise.toml learn
//! PRICEWISE_TRANSITIONS__PRESET=recommended pricewise serve
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use axum::Router;
use clap::{Parser, Subcommand};
use pricewise_api::{ServerConfig, api_router, learning};
use pricewise_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Pricewise decision service")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the JSON API.
  Serve,
  /// Recompute learning aggregates once, store the snapshot and exit.
  Learn,
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

  let settings = config::Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080)?
    .set_default("store_path", "pricewise.db")?
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("PRICEWISE").separator("__"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let policy = server_cfg
    .transitions
    .policy()
    .context("invalid [transitions] settings")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?
    .with_transition_policy(policy);

  match cli.command {
    Command::Learn => {
      let snapshot = learning::recompute(&store)
        .await
        .context("learning batch failed")?;
      tracing::info!(
        snapshot = %snapshot.snapshot_id,
        groups = snapshot.aggregates.len(),
        "snapshot stored"
      );
    }
    Command::Serve => {
      let app = Router::new()
        .nest("/api", api_router(Arc::new(store)))
        .layer(TraceLayer::new_for_http());
      let address = format!("{}:{}", server_cfg.host, server_cfg.port);

      tracing::info!("Listening on http://{address}");
      let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

      axum::serve(listener, app).await.context("server error")?;
    }
  }

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
