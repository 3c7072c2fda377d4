//! coronavision-ingest binary.
//!
//! Reads `coronavision.toml` (or the path given with `--config`), loads the
//! data-source registry and runs sources into the SQLite store.

use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use coronavision_ingest::{
  config::{IngestConfig, expand_tilde},
  registry::{DataSource, Registry},
  runner::{RunSummary, Runner},
  sources::FetchContext,
  standards::load_standards,
};
use coronavision_pipeline::{Ingest, SharedMemoryStore, deltas::history_start};
use coronavision_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "COVID-19 data collection and reconciliation")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "coronavision.toml")]
  config: PathBuf,

  /// Overwrite stored values even when they would regress.
  #[arg(long, global = true)]
  force_refresh: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Run every live source once.
  Live,
  /// Run live sources forever, pausing between passes.
  Watch,
  /// Run every historical source once.
  Historical,
  /// Recompute day-over-day deltas.
  Deltas {
    #[arg(long)]
    from: Option<NaiveDate>,
    #[arg(long)]
    to:   Option<NaiveDate>,
  },
  /// Run a single source by label.
  Test {
    label:   String,
    /// Upload into a throwaway in-memory store and print the report.
    #[arg(long)]
    dry_run: bool,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg = IngestConfig::load(&cli.config).context("failed to load configuration")?;
  let force_refresh = cli.force_refresh || cfg.force_refresh;
  let today = Utc::now().date_naive();

  let standards = load_standards(cfg.standards_path.as_deref())
    .context("failed to load standards table")?;
  let ctx = FetchContext::new(standards, Duration::from_secs(cfg.fetch_timeout_secs), today)
    .context("failed to build HTTP client")?;

  if let Command::Test { label, dry_run: true } = &cli.command {
    let registry = load_registry(&cfg)?;
    let source = registry.find(label)?;
    let runner = Runner::new(SharedMemoryStore::new(), ctx, force_refresh);
    let summary = runner.run(std::slice::from_ref(source)).await;
    let datapoints = runner.store().snapshot().await.len();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    tracing::info!(datapoints, "dry run finished; nothing was written");
    return finish(&summary);
  }

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command {
    Command::Live => {
      let registry = load_registry(&cfg)?;
      finish(&run(store, ctx, force_refresh, &registry.live).await)
    }
    Command::Historical => {
      let registry = load_registry(&cfg)?;
      finish(&run(store, ctx, force_refresh, &registry.historical).await)
    }
    Command::Watch => {
      let registry = load_registry(&cfg)?;
      let runner = Runner::new(store, ctx, force_refresh);
      let pause = Duration::from_secs(cfg.poll_interval_secs);
      loop {
        let summary = runner.run(&registry.live).await;
        if summary.failed() > 0 {
          tracing::warn!(failed = summary.failed(), "pass finished with failures");
        }
        tokio::select! {
          _ = tokio::time::sleep(pause) => {}
          _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, stopping");
            return Ok(());
          }
        }
      }
    }
    Command::Deltas { from, to } => {
      let from = from.unwrap_or_else(history_start);
      let to = to.unwrap_or(today);
      let written = store
        .update_all_deltas(from, to)
        .await
        .context("failed to recompute deltas")?;
      tracing::info!(%from, %to, written, "deltas recomputed");
      Ok(())
    }
    Command::Test { label, .. } => {
      let registry = load_registry(&cfg)?;
      let source = registry.find(&label)?.clone();
      let summary = run(store, ctx, force_refresh, std::slice::from_ref(&source)).await;
      println!("{}", serde_json::to_string_pretty(&summary)?);
      finish(&summary)
    }
  }
}

fn load_registry(cfg: &IngestConfig) -> anyhow::Result<Registry> {
  Registry::load(&cfg.sources).context("failed to load data-source registry")
}

async fn run(
  store: SqliteStore,
  ctx: FetchContext,
  force_refresh: bool,
  sources: &[DataSource],
) -> RunSummary {
  Runner::new(store, ctx, force_refresh).run(sources).await
}

/// Fail the process if any source failed.
fn finish(summary: &RunSummary) -> anyhow::Result<()> {
  match summary.failed() {
    0 => Ok(()),
    n => anyhow::bail!("{n} of {} sources failed", summary.outcomes.len()),
  }
}
