//! Runtime settings, layered from defaults, an optional TOML file and
//! `DOSSIER_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

/// Default location of the SQLite store.
const DEFAULT_STORE_PATH: &str = "~/.local/share/dossier/dossier.db";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  /// Path of the SQLite database file. `~` is expanded.
  pub store_path: PathBuf,
}

impl Settings {
  /// Load settings from `file` (if it exists) and the environment, e.g.
  /// `DOSSIER_STORE_PATH=/var/lib/dossier.db`.
  pub fn load(file: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .set_default("store_path", DEFAULT_STORE_PATH)?
      .add_source(config::File::from(file.to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("DOSSIER"))
      .build()
      .with_context(|| format!("failed to read config file {}", file.display()))?;

    let mut settings: Settings = settings
      .try_deserialize()
      .context("failed to deserialise settings")?;
    settings.store_path = expand_tilde(&settings.store_path);
    Ok(settings)
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
