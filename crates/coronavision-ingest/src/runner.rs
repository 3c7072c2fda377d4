//! Running a list of sources against an [`Ingest`] backend.
//!
//! Fetches run concurrently on a [`JoinSet`]. Uploads go to the store one
//! at a time in registry order, each as soon as its own fetch and every
//! earlier source are done. A failing source is logged and skipped.

use std::collections::BTreeMap;

use coronavision_pipeline::{Ingest, RawRow, UploadReport, deltas::history_start};
use serde::Serialize;
use tokio::task::JoinSet;

use crate::{
  Error, Result,
  registry::{DataSource, Method},
  sources::{self, FetchContext},
};

/// What happened to one source in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum SourceOutcome {
  Uploaded(UploadReport),
  /// The source produced no rows after filtering.
  Empty,
  DeltasRecomputed(usize),
  Failed(String),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
  pub outcomes: Vec<(String, SourceOutcome)>,
}

impl RunSummary {
  pub fn failed(&self) -> usize {
    self
      .outcomes
      .iter()
      .filter(|(_, o)| matches!(o, SourceOutcome::Failed(_)))
      .count()
  }

  pub fn outcome(&self, label: &str) -> Option<&SourceOutcome> {
    self.outcomes.iter().find(|(l, _)| l == label).map(|(_, o)| o)
  }
}

pub struct Runner<I> {
  store:         I,
  ctx:           FetchContext,
  force_refresh: bool,
}

impl<I: Ingest> Runner<I> {
  pub fn new(store: I, ctx: FetchContext, force_refresh: bool) -> Self {
    Self { store, ctx, force_refresh }
  }

  pub fn store(&self) -> &I { &self.store }

  pub async fn run(&self, sources: &[DataSource]) -> RunSummary {
    let mut fetches = JoinSet::new();
    for (index, source) in sources.iter().enumerate() {
      if source.method == Method::UpdateAllDeltas {
        continue;
      }
      let source = source.clone();
      let ctx = self.ctx.clone();
      fetches.spawn(async move { (index, sources::fetch(&source, &ctx).await) });
    }

    let mut ready: BTreeMap<usize, Result<Vec<RawRow>>> = BTreeMap::new();
    let mut summary = RunSummary::default();
    let mut next = 0;

    loop {
      while let Some(source) = sources.get(next) {
        let fetched = match source.method {
          Method::UpdateAllDeltas => None,
          _ => match ready.remove(&next) {
            Some(fetched) => Some(fetched),
            // Its task ended without reporting back.
            None if fetches.is_empty() => Some(Err(Error::FetchAborted)),
            None => break,
          },
        };
        let outcome = self.process(source, fetched).await;
        summary.outcomes.push((source.label.clone(), outcome));
        next += 1;
      }
      if next == sources.len() {
        break;
      }

      match fetches.join_next().await {
        Some(Ok((index, fetched))) => {
          ready.insert(index, fetched);
        }
        Some(Err(e)) => tracing::error!(error = %e, "fetch task failed"),
        None => {}
      }
    }

    tracing::info!(
      sources = sources.len(),
      failed = summary.failed(),
      "run finished"
    );
    summary
  }

  async fn process(
    &self,
    source: &DataSource,
    fetched: Option<Result<Vec<RawRow>>>,
  ) -> SourceOutcome {
    let label = source.label.as_str();
    let rows = match fetched {
      None => {
        return match self.store.update_all_deltas(history_start(), self.ctx.today).await {
          Ok(written) => {
            tracing::info!(source = label, written, "recomputed deltas");
            SourceOutcome::DeltasRecomputed(written)
          }
          Err(e) => failed(label, &e),
        };
      }
      Some(Err(e)) => return failed(label, &e),
      Some(Ok(rows)) => rows,
    };

    let fetched = rows.len();
    let rows = source.filter(rows);
    if rows.is_empty() {
      tracing::info!(source = label, fetched, "no rows to upload");
      return SourceOutcome::Empty;
    }

    let options = source.upload_options(self.force_refresh);
    match self
      .store
      .upload(self.ctx.standards.clone(), rows, options)
      .await
    {
      Ok(report) => {
        tracing::info!(
          source = label,
          fetched,
          created = report.created,
          updated = report.updated,
          "uploaded"
        );
        SourceOutcome::Uploaded(report)
      }
      Err(e) => failed(label, &e),
    }
  }
}

fn failed(label: &str, error: &dyn std::error::Error) -> SourceOutcome {
  tracing::error!(source = label, %error, "source failed");
  SourceOutcome::Failed(error.to_string())
}
