//! The reconciliation pipeline: normalise source rows, merge them into
//! canonical datapoints, roll changed records up to province, country and
//! world level, and recompute day-over-day deltas.
//!
//! Every function here runs against a [`RecordStore`] that represents one
//! open transaction. Backends implement [`Ingest`] to wrap a whole batch in
//! that transaction.
//!
//! [`RecordStore`]: coronavision_core::store::RecordStore

#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod deltas;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod upload;

pub use error::{Error, Result};
pub use ingest::{Ingest, SharedMemoryStore};
pub use normalize::RawRow;
pub use upload::{UploadOptions, UploadReport, upload};
