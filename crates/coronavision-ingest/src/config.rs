//! Runtime configuration, deserialised from `coronavision.toml` and
//! `COVID_*` environment variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
  #[serde(default = "default_store_path")]
  pub store_path:         PathBuf,
  /// Registry files listing live and historical data sources.
  #[serde(default = "default_sources")]
  pub sources:            Vec<PathBuf>,
  /// Standards table; names pass through unchanged without one.
  #[serde(default)]
  pub standards_path:     Option<PathBuf>,
  #[serde(default = "default_fetch_timeout")]
  pub fetch_timeout_secs: u64,
  #[serde(default)]
  pub force_refresh:      bool,
  #[serde(default = "default_poll_interval")]
  pub poll_interval_secs: u64,
}

fn default_store_path() -> PathBuf { PathBuf::from("coronavision.db") }

fn default_sources() -> Vec<PathBuf> {
  vec![PathBuf::from("data_sources/data_sources.json")]
}

fn default_fetch_timeout() -> u64 { 30 }

fn default_poll_interval() -> u64 { 600 }

impl IngestConfig {
  /// Read `path` if it exists, then layer `COVID_*` variables on top.
  pub fn load(path: &Path) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("COVID"))
      .build()?;
    Ok(settings.try_deserialize()?)
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
