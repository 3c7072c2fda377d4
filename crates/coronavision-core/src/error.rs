//! Error types for `coronavision-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown stat label: {0:?}")]
  UnknownStat(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
