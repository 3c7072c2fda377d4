//! Error types for `coronavision-ingest`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("config error: {0}")]
  Config(#[from] config::ConfigError),

  #[error("failed to read {path:?}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  /// A selector path did not resolve against a fetched document.
  #[error("selector error: {0}")]
  Selector(String),

  #[error("transform ::{name} cannot handle {value}")]
  Transform { name: String, value: String },

  #[error("unknown transform ::{0}")]
  UnknownTransform(String),

  #[error("invalid date template {0:?}")]
  InvalidTemplate(String),

  #[error("fetch task did not complete")]
  FetchAborted,

  #[error("no data source labelled {0:?}")]
  UnknownSource(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
