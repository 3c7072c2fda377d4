//! Core types and trait definitions for the coronavision datapoint store.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the canonical record type, the per-record merge rule, and the persistence
//! and name-lookup seams the pipeline is written against.

pub mod datapoint;
pub mod error;
pub mod location;
pub mod memory;
pub mod standards;
pub mod stat;
pub mod store;

pub use error::{Error, Result};
