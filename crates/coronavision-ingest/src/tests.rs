//! Tests for registry filtering, selector extraction and the source runner.

use std::{path::PathBuf, sync::Arc, time::Duration};

use chrono::NaiveDate;
use coronavision_core::{
  location::LocationKey,
  standards::{PassThrough, Standards},
  store::RecordStore,
};
use coronavision_pipeline::{RawRow, SharedMemoryStore};
use serde_json::{Value, json};

use crate::{
  Error,
  config::IngestConfig,
  registry::{DataSource, Method, Registry},
  runner::{Runner, SourceOutcome},
  sources::{
    FetchContext,
    select::{ExtractArgs, extract, find, number},
  },
  standards::TableStandards,
};

fn date(s: &str) -> NaiveDate { NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap() }

fn row(value: Value) -> RawRow { serde_json::from_value(value).unwrap() }

fn source(value: Value) -> DataSource { serde_json::from_value(value).unwrap() }

fn selector(segments: &[&str]) -> Vec<String> {
  segments.iter().map(|s| s.to_string()).collect()
}

/// Write `contents` to a per-process scratch file and return its path.
fn scratch(name: &str, contents: &str) -> PathBuf {
  let dir = std::env::temp_dir().join(format!("coronavision-ingest-{}", std::process::id()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join(name);
  std::fs::write(&path, contents).unwrap();
  path
}

fn us_table() -> TableStandards {
  TableStandards::from_json(
    &json!({
      "country_aliases": { "US": "United States" },
      "province_aliases": { "United States": { "Mass.": "Massachusetts" } },
      "continents": { "United States": "North America" },
      "admin1_codes": { "United States": { "MA": "Massachusetts" } },
      "locations": [
        { "country": "United States", "province": "Massachusetts", "latitude": 42.4, "longitude": -71.4 }
      ]
    })
    .to_string(),
  )
  .unwrap()
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[test]
fn disallow_matches_on_any_single_field() {
  let src = source(json!({
    "label": "feed",
    "method": "json",
    "disallow": [{ "admin1": "Recovered", "admin0": "Nowhere" }]
  }));

  assert!(!src.allows(&row(json!({ "admin0": "Testland", "admin1": "Recovered" }))));
  assert!(!src.allows(&row(json!({ "admin0": "Nowhere", "admin1": "North" }))));
  assert!(src.allows(&row(json!({ "admin0": "Testland", "admin1": "North" }))));
  assert!(src.allows(&row(json!({ "admin0": "Testland" }))));
}

#[test]
fn upload_options_carry_defaults_and_link() {
  let src = source(json!({
    "label": "feed",
    "method": "json",
    "source_link": "https://example.org",
    "defaults": { "country": "Testland" }
  }));
  let options = src.upload_options(true);
  assert_eq!(options.source_link, "https://example.org");
  assert_eq!(options.defaults.get("country"), Some(&json!("Testland")));
  assert!(options.force_refresh);
  assert!(options.recount);
}

#[test]
fn registry_files_concatenate_in_order() {
  let a = scratch(
    "registry-a.json",
    &json!({ "live": [{ "label": "a1", "method": "json" }] }).to_string(),
  );
  let b = scratch(
    "registry-b.json",
    &json!({
      "live": [{ "label": "b1", "method": "json_file" }],
      "historical": [{ "label": "all-deltas", "method": "update_all_deltas" }]
    })
    .to_string(),
  );

  let registry = Registry::load(&[a, b]).unwrap();
  let live: Vec<_> = registry.live.iter().map(|s| s.label.as_str()).collect();
  assert_eq!(live, ["a1", "b1"]);
  assert_eq!(registry.find("all-deltas").unwrap().method, Method::UpdateAllDeltas);
  assert!(matches!(registry.find("nope"), Err(Error::UnknownSource(_))));
}

#[test]
fn unknown_method_is_rejected() {
  let result: Result<DataSource, _> =
    serde_json::from_value(json!({ "label": "x", "method": "worldometers" }));
  assert!(result.is_err());
}

// ─── Selectors ───────────────────────────────────────────────────────────────

#[test]
fn number_parses_scraped_text() {
  assert_eq!(number(&json!(12)), Some(12));
  assert_eq!(number(&json!(12.9)), Some(12));
  assert_eq!(number(&json!(" 1,204 ")), Some(1204));
  assert_eq!(number(&json!("+37 new")), Some(37));
  assert_eq!(number(&json!("5*")), Some(5));
  assert_eq!(number(&json!("")), Some(0));
  assert_eq!(number(&json!("N/A")), Some(0));
  assert_eq!(number(&Value::Null), None);
}

#[test]
fn find_walks_objects_arrays_and_transforms() {
  let doc = json!({ "data": [{ "name": "  north  ", "when": "20210315" }] });
  let p = &PassThrough;

  assert_eq!(
    find(&doc, &selector(&["data", "0", "name", "::strip", "::cap"]), p).unwrap(),
    Some(json!("North"))
  );
  assert_eq!(
    find(&doc, &selector(&["data", "0", "when", "::ymd"]), p).unwrap(),
    Some(json!("2021-03-15"))
  );
  assert_eq!(find(&doc, &selector(&["data", "3"]), p).unwrap(), None);
  assert_eq!(find(&doc, &selector(&["missing", "name"]), p).unwrap(), None);
}

#[test]
fn date_transforms_produce_iso_dates() {
  let p = &PassThrough;
  let cases = [
    (json!("15032021"), "::dmy"),
    (json!("2021-03-15T08:30:00"), "::date_t"),
    (json!(1615796400000_i64), "::unixtime"),
  ];
  for (value, transform) in cases {
    assert_eq!(
      find(&value, &selector(&[transform]), p).unwrap(),
      Some(json!("2021-03-15")),
      "{transform}"
    );
  }
}

#[test]
fn transform_failures_are_errors() {
  let p = &PassThrough;
  assert!(matches!(
    find(&json!("not a date"), &selector(&["::ymd"]), p),
    Err(Error::Transform { .. })
  ));
  assert!(matches!(
    find(&json!("x"), &selector(&["::text"]), p),
    Err(Error::UnknownTransform(_))
  ));
}

#[test]
fn us_state_codes_resolve_through_standards() {
  let table = us_table();
  assert_eq!(
    find(&json!("ma"), &selector(&["::us_state_code"]), &table).unwrap(),
    Some(json!("Massachusetts"))
  );
  assert_eq!(
    find(&json!("ZZ"), &selector(&["::us_state_code"]), &table).unwrap(),
    Some(Value::Null)
  );
}

#[test]
fn extract_applies_allow_rules_and_drops_missing_labels() {
  let doc = json!({
    "features": [
      { "attributes": { "Country": "Testland", "Kind": "state", "Cases": "1,000", "Deaths": null } },
      { "attributes": { "Country": "Testland", "Kind": "total", "Cases": "1,500" } },
      { "attributes": { "Country": "Testland", "Cases": "7" } }
    ]
  });
  let args: ExtractArgs = serde_json::from_value(json!({
    "labels": {
      "admin0": ["attributes", "Country"],
      "confirmed": ["attributes", "Cases", "::number"],
      "deaths": ["attributes", "Deaths"]
    },
    "allow": [[["attributes", "Kind"], "total", "!="]]
  }))
  .unwrap();

  let rows = extract(&doc, &args, &PassThrough).unwrap();
  assert_eq!(rows.len(), 1, "the total row is excluded, the kindless row lacks the field");
  assert_eq!(rows[0], row(json!({ "admin0": "Testland", "confirmed": 1000 })));
}

#[test]
fn extract_of_single_object_yields_one_row() {
  let doc = json!({ "summary": { "cases": 42 } });
  let args: ExtractArgs = serde_json::from_value(json!({
    "namespace": ["summary"],
    "labels": { "confirmed": ["cases"] }
  }))
  .unwrap();
  let rows = extract(&doc, &args, &PassThrough).unwrap();
  assert_eq!(rows, vec![row(json!({ "confirmed": 42 }))]);

  let missing: ExtractArgs =
    serde_json::from_value(json!({ "labels": { "confirmed": ["cases"] } })).unwrap();
  assert!(matches!(extract(&doc, &missing, &PassThrough), Err(Error::Selector(_))));
}

// ─── Standards ───────────────────────────────────────────────────────────────

#[test]
fn table_standards_canonicalise_names() {
  let table = us_table();
  assert_eq!(
    table.normalize_name(" US ", "Mass.", "Suffolk"),
    ("United States".to_owned(), "Massachusetts".to_owned(), "Suffolk".to_owned())
  );
  assert_eq!(table.fix_country_name("Testland"), "Testland");
  assert_eq!(table.continent("United States"), "North America");
  assert_eq!(table.continent("Testland"), "");

  let ma = LocationKey::rollup("United States", "Massachusetts");
  assert_eq!(table.estimated_location(&ma).map(|c| c.latitude), Some(42.4));
  assert_eq!(table.estimated_location(&LocationKey::WorldRollup), None);
}

// ─── Config ──────────────────────────────────────────────────────────────────

#[test]
fn config_file_overrides_defaults() {
  let path = scratch(
    "coronavision.toml",
    "store_path = \"~/covid.db\"\nfetch_timeout_secs = 5\nsources = [\"a.json\", \"b.json\"]\n",
  );
  let cfg = IngestConfig::load(&path).unwrap();
  assert_eq!(cfg.fetch_timeout_secs, 5);
  assert_eq!(cfg.sources, [PathBuf::from("a.json"), PathBuf::from("b.json")]);
  assert_eq!(cfg.poll_interval_secs, 600);
  assert!(cfg.standards_path.is_none());
  assert!(!cfg.force_refresh);
}

// ─── Runner ──────────────────────────────────────────────────────────────────

fn context() -> FetchContext {
  let standards: Arc<dyn Standards> = Arc::new(PassThrough);
  FetchContext::new(standards, Duration::from_secs(5), date("2021-01-02")).unwrap()
}

fn feed_source(label: &str, path: &PathBuf) -> Value {
  json!({
    "label": label,
    "method": "json_file",
    "source_link": "https://example.org/arcgis",
    "args": {
      "path": path,
      "labels": {
        "admin0": ["attributes", "Country_Region"],
        "admin1": ["attributes", "Province_State"],
        "confirmed": ["attributes", "Confirmed", "::number"],
        "deaths": ["attributes", "Deaths"],
        "entry_date": ["attributes", "Last_Update", "::unixtime"]
      }
    },
    "disallow": [{ "admin1": "Recovered" }]
  })
}

#[tokio::test]
async fn runner_uploads_in_order_and_isolates_failures() {
  // 1609459200000 ms is 2021-01-01T00:00:00Z.
  let feed = scratch(
    "feed.json",
    &json!({ "features": [
      { "attributes": { "Country_Region": "Testland", "Province_State": "North",
                        "Confirmed": "1,204", "Deaths": 3, "Last_Update": 1609459200000_i64 } },
      { "attributes": { "Country_Region": "Testland", "Province_State": "South",
                        "Confirmed": "50", "Deaths": 0, "Last_Update": 1609459200000_i64 } },
      { "attributes": { "Country_Region": "Testland", "Province_State": "Recovered",
                        "Confirmed": "9", "Deaths": 0, "Last_Update": 1609459200000_i64 } }
    ]})
    .to_string(),
  );
  let sources = vec![
    source(feed_source("arcgis", &feed)),
    source(feed_source("broken", &PathBuf::from("/nonexistent/coronavision/feed.json"))),
    source(json!({ "label": "deltas", "method": "update_all_deltas" })),
  ];

  let runner = Runner::new(SharedMemoryStore::new(), context(), false);
  let summary = runner.run(&sources).await;

  let labels: Vec<_> = summary.outcomes.iter().map(|(l, _)| l.as_str()).collect();
  assert_eq!(labels, ["arcgis", "broken", "deltas"]);
  assert_eq!(summary.failed(), 1);
  assert!(matches!(summary.outcome("broken"), Some(SourceOutcome::Failed(_))));
  assert!(matches!(summary.outcome("deltas"), Some(SourceOutcome::DeltasRecomputed(_))));
  let Some(SourceOutcome::Uploaded(report)) = summary.outcome("arcgis") else {
    panic!("arcgis should have uploaded: {summary:?}");
  };
  assert_eq!(report.rows, 2, "the Recovered row is disallowed");
  assert_eq!(report.created, 2);

  let snapshot = runner.store().snapshot().await;
  let country = snapshot
    .get(&LocationKey::rollup("Testland", ""), date("2021-01-01"))
    .unwrap()
    .unwrap();
  assert_eq!(country.stats.confirmed, 1254);
  assert_eq!(country.stats.deaths, 3);
  assert_eq!(country.sources.confirmed.as_deref(), Some("calculated"));

  let north = snapshot
    .get(&LocationKey::rollup("Testland", "North"), date("2021-01-01"))
    .unwrap()
    .unwrap();
  assert_eq!(north.sources.confirmed.as_deref(), Some("https://example.org/arcgis"));
}

#[tokio::test]
async fn fully_disallowed_source_is_empty() {
  let feed = scratch(
    "recovered-only.json",
    &json!({ "features": [
      { "attributes": { "Country_Region": "Testland", "Province_State": "Recovered",
                        "Confirmed": "9", "Last_Update": 1609459200000_i64 } }
    ]})
    .to_string(),
  );
  let runner = Runner::new(SharedMemoryStore::new(), context(), false);
  let summary = runner.run(&[source(feed_source("recovered", &feed))]).await;

  assert_eq!(summary.outcome("recovered"), Some(&SourceOutcome::Empty));
  assert!(runner.store().snapshot().await.is_empty());
}
