//! The `Ingest` trait: running a whole batch as one transaction.
//!
//! Backends (e.g. `coronavision-store-sqlite`) implement it by opening a
//! transaction, handing a [`RecordStore`] view to [`upload`], and committing
//! only on success. Callers such as the source runner depend on this
//! abstraction, not on any concrete backend.
//!
//! [`RecordStore`]: coronavision_core::store::RecordStore

use std::{future::Future, sync::Arc};

use chrono::NaiveDate;
use coronavision_core::{memory::MemoryStore, standards::Standards};
use tokio::sync::Mutex;

use crate::{
  Error,
  deltas::update_all_deltas,
  normalize::RawRow,
  upload::{UploadOptions, UploadReport, upload},
};

/// A store that can run ingestion batches atomically.
///
/// Each call holds exclusive write access for its duration, so concurrent
/// callers are serialized.
pub trait Ingest: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Run [`upload`] over `rows` and commit, or change nothing on error.
  fn upload(
    &self,
    standards: Arc<dyn Standards>,
    rows: Vec<RawRow>,
    options: UploadOptions,
  ) -> impl Future<Output = Result<UploadReport, Self::Error>> + Send + '_;

  /// Recompute deltas for every day in `from..=to` and commit.
  fn update_all_deltas(
    &self,
    from: NaiveDate,
    to: NaiveDate,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}

// ─── SharedMemoryStore ───────────────────────────────────────────────────────

/// A [`MemoryStore`] behind an async mutex, for dry runs.
///
/// Cloning is cheap; clones share the same store.
#[derive(Clone, Default)]
pub struct SharedMemoryStore {
  inner: Arc<Mutex<MemoryStore>>,
}

impl SharedMemoryStore {
  pub fn new() -> Self { Self::default() }

  /// A copy of the current committed state.
  pub async fn snapshot(&self) -> MemoryStore { self.inner.lock().await.clone() }
}

impl Ingest for SharedMemoryStore {
  type Error = Error;

  async fn upload(
    &self,
    standards: Arc<dyn Standards>,
    rows: Vec<RawRow>,
    options: UploadOptions,
  ) -> Result<UploadReport, Error> {
    let mut store = self.inner.lock().await;
    store.atomically(|tx| upload(tx, standards.as_ref(), rows, &options))
  }

  async fn update_all_deltas(
    &self,
    from: NaiveDate,
    to: NaiveDate,
  ) -> Result<usize, Error> {
    let mut store = self.inner.lock().await;
    store.atomically(|tx| update_all_deltas(tx, from, to))
  }
}
