//! `dossier` — administer owners' addresses and phone numbers.
//!
//! # Usage
//!
//! ```text
//! dossier address add --owner <uuid> --label Home --recipient "Ada" \
//!   --street "1 Main St" --locality Springfield --postal-code 12345 --country US --default
//! dossier address list --owner <uuid> --all
//! dossier phone set-default --owner <uuid> --id <uuid>
//! dossier phone deactivate --owner <uuid> --ids <uuid>,<uuid>
//! ```
//!
//! Settings are read from `dossier.toml` (or `--config`) and `DOSSIER_*`
//! environment variables; `--store` overrides the database path.

mod commands;
mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use dossier_store_sqlite::SqliteStore;
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Manage owners' addresses and phone numbers")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "dossier.toml")]
  config: PathBuf,

  /// Path to the SQLite store, overriding the configuration.
  #[arg(long, env = "DOSSIER_STORE")]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr so stdout stays machine-readable.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let mut settings = Settings::load(&cli.config)?;
  if let Some(path) = cli.store {
    settings.store_path = settings::expand_tilde(&path);
  }

  if let Some(parent) = settings.store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }

  let store = SqliteStore::open(&settings.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", settings.store_path))?;

  commands::run(cli.command, Arc::new(store)).await
}
