//! Source orchestration for coronavision.
//!
//! Loads the data-source registry, fetches each source through its adapter,
//! applies disallow rules and hands the rows to an
//! [`Ingest`](coronavision_pipeline::Ingest) backend one batch at a time.

pub mod config;
pub mod error;
pub mod registry;
pub mod runner;
pub mod sources;
pub mod standards;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;
