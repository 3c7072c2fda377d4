//! The data-source registry: which sources exist, how to fetch them and
//! which rows to drop before upload.

use std::path::{Path, PathBuf};

use coronavision_pipeline::{RawRow, UploadOptions};
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};

/// The adapter a source is fetched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
  /// HTTP GET a JSON document and extract rows from it.
  Json,
  /// The same extraction over a JSON file on disk.
  JsonFile,
  /// No rows; recompute deltas over the whole history.
  UpdateAllDeltas,
}

/// One entry in a registry file.
#[derive(Debug, Clone, Deserialize)]
pub struct DataSource {
  pub label:       String,
  pub method:      Method,
  /// Adapter arguments; their shape depends on `method`.
  #[serde(default)]
  pub args:        Value,
  #[serde(default)]
  pub defaults:    RawRow,
  #[serde(default)]
  pub source_link: String,
  #[serde(default)]
  pub disallow:    Vec<RawRow>,
}

impl DataSource {
  /// Whether `row` survives every disallow rule.
  ///
  /// A rule matches when any one of its fields equals the row's field.
  pub fn allows(&self, row: &RawRow) -> bool {
    !self.disallow.iter().any(|rule| {
      rule
        .iter()
        .any(|(field, value)| row.get(field) == Some(value))
    })
  }

  /// Drop every row a disallow rule matches.
  pub fn filter(&self, rows: Vec<RawRow>) -> Vec<RawRow> {
    rows.into_iter().filter(|row| self.allows(row)).collect()
  }

  pub fn upload_options(&self, force_refresh: bool) -> UploadOptions {
    let mut options = UploadOptions::new(self.source_link.clone());
    options.defaults = self.defaults.clone();
    options.force_refresh = force_refresh;
    options
  }
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// Live and historical sources, concatenated across registry files in the
/// order the files are listed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registry {
  #[serde(default)]
  pub live:       Vec<DataSource>,
  #[serde(default)]
  pub historical: Vec<DataSource>,
}

impl Registry {
  pub fn load(paths: &[PathBuf]) -> Result<Self> {
    let mut registry = Self::default();
    for path in paths {
      let file = Self::load_file(path)?;
      tracing::debug!(
        path = %path.display(),
        live = file.live.len(),
        historical = file.historical.len(),
        "loaded registry file"
      );
      registry.live.extend(file.live);
      registry.historical.extend(file.historical);
    }
    Ok(registry)
  }

  fn load_file(path: &Path) -> Result<Self> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Ok(serde_json::from_str(&text)?)
  }

  /// A source by label, searching live sources before historical ones.
  pub fn find(&self, label: &str) -> Result<&DataSource> {
    self
      .live
      .iter()
      .chain(&self.historical)
      .find(|s| s.label == label)
      .ok_or_else(|| Error::UnknownSource(label.to_owned()))
  }
}
