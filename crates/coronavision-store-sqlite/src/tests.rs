//! Integration tests for `SqliteStore` against an in-memory database.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use coronavision_core::{
  datapoint::{Datapoint, Observation},
  location::{Coordinates, LocationKey},
  standards::{PassThrough, Standards},
  stat::{Stat, Totals},
  store::{ChildScope, RecordFilter, RecordStore},
};
use coronavision_pipeline::{Ingest, RawRow, UploadOptions};
use serde_json::{Value, json};

use crate::{SqliteStore, SqliteTx};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn standards() -> Arc<dyn Standards> { Arc::new(PassThrough) }

fn rows(value: Value) -> Vec<RawRow> {
  serde_json::from_value(value).expect("array of objects")
}

fn date(s: &str) -> NaiveDate { NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap() }

fn testland() -> LocationKey { LocationKey::rollup("Testland", "") }

// ─── Transaction view ────────────────────────────────────────────────────────

#[test]
fn datapoint_columns_round_trip() {
  let conn = rusqlite::Connection::open_in_memory().unwrap();
  conn.execute_batch(crate::schema::SCHEMA).unwrap();
  let mut tx = SqliteTx::new(&conn);

  let obs = Observation::new(LocationKey::from_parts("Testland", "North", "Alpha"), date("2021-01-01"))
    .with_stat(Stat::Confirmed, 12)
    .with_stat(Stat::Serious, 2)
    .with_stat(Stat::DDeaths, -1);
  let (mut dp, _) = Datapoint::create(&obs, "https://example.org", true, &PassThrough, Utc::now());
  dp.coordinates = Some(Coordinates { latitude: 42.5, longitude: -71.25 });
  dp.group = "Atlantis".into();
  tx.put(&dp).unwrap();

  let back = tx.get(&dp.key, dp.entry_date).unwrap().unwrap();
  assert_eq!(back.key, dp.key);
  assert_eq!(back.stats, dp.stats);
  assert_eq!(back.sources, dp.sources);
  assert_eq!(back.coordinates, dp.coordinates);
  assert_eq!(back.group, "Atlantis");
  assert!(back.is_first_day);
  assert_eq!(back.update_time.timestamp(), dp.update_time.timestamp());
}

#[test]
fn rollup_keys_are_distinct_rows() {
  let conn = rusqlite::Connection::open_in_memory().unwrap();
  conn.execute_batch(crate::schema::SCHEMA).unwrap();
  let mut tx = SqliteTx::new(&conn);

  for key in [
    LocationKey::WorldRollup,
    testland(),
    LocationKey::rollup("Testland", "North"),
    LocationKey::from_parts("Testland", "North", "Alpha"),
  ] {
    tx.put(&Datapoint::new(key, date("2021-01-01"), Utc::now())).unwrap();
  }

  let all = tx.find(&RecordFilter::on(date("2021-01-01"))).unwrap();
  assert_eq!(all.len(), 4);
  assert!(tx.get(&LocationKey::WorldRollup, date("2021-01-01")).unwrap().is_some());
  assert!(tx.get(&testland(), date("2021-01-02")).unwrap().is_none());
}

#[test]
fn sum_children_respects_scope_and_emptiness() {
  let conn = rusqlite::Connection::open_in_memory().unwrap();
  conn.execute_batch(crate::schema::SCHEMA).unwrap();
  let mut tx = SqliteTx::new(&conn);

  for (county, confirmed) in [("Alpha", 4), ("Beta", 6), ("", 100)] {
    let mut dp = Datapoint::new(
      LocationKey::from_parts("Testland", "North", county),
      date("2021-01-01"),
      Utc::now(),
    );
    dp.stats.confirmed = confirmed;
    tx.put(&dp).unwrap();
  }

  let counties = ChildScope::Counties { country: "Testland".into(), province: "North".into() };
  let sum = tx.sum_children(&counties, date("2021-01-01")).unwrap();
  assert_eq!(sum, Some(Totals { confirmed: 10, ..Default::default() }));

  let provinces = ChildScope::Provinces { country: "Testland".into() };
  assert_eq!(
    tx.sum_children(&provinces, date("2021-01-01")).unwrap().map(|t| t.confirmed),
    Some(100)
  );
  assert_eq!(tx.sum_children(&ChildScope::Countries, date("2021-01-01")).unwrap(), None);
  assert_eq!(tx.sum_children(&counties, date("2021-01-02")).unwrap(), None);
}

#[test]
fn narrowed_find_filters_by_country_and_province() {
  let conn = rusqlite::Connection::open_in_memory().unwrap();
  conn.execute_batch(crate::schema::SCHEMA).unwrap();
  let mut tx = SqliteTx::new(&conn);
  for country in ["Testland", "Otherland"] {
    tx.put(&Datapoint::new(LocationKey::rollup(country, ""), date("2021-01-01"), Utc::now()))
      .unwrap();
  }

  let filter = RecordFilter {
    entry_date: date("2021-01-01"),
    countries:  Some(["".to_owned(), "Testland".to_owned()].into()),
    provinces:  Some(["".to_owned()].into()),
  };
  let found = tx.find(&filter).unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].key, testland());
}

// ─── Batches ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_commits_merged_and_rolled_up_records() {
  let s = store().await;
  let report = s
    .upload(
      standards(),
      rows(json!([
        { "country": "Testland", "province": "North", "county": "Alpha", "entry_date": "2021-01-01", "confirmed": 7 },
        { "country": "Testland", "province": "North", "county": "Beta", "entry_date": "2021-01-01", "confirmed": 3, "latitude": 1.5, "longitude": 2.5 },
      ])),
      UploadOptions::new("https://example.org/feed"),
    )
    .await
    .unwrap();
  assert_eq!(report.created, 2);
  assert_eq!(report.recounted, 3);

  let country = s.get_datapoint(testland(), date("2021-01-01")).await.unwrap().unwrap();
  assert_eq!(country.stats.confirmed, 10);
  assert_eq!(country.stats.active, 10);

  let world = s.get_datapoint(LocationKey::WorldRollup, date("2021-01-01")).await.unwrap().unwrap();
  assert_eq!(world.stats.confirmed, 10);

  let beta = LocationKey::from_parts("Testland", "North", "Beta");
  let location = s.get_location(beta).await.unwrap().unwrap();
  assert!(location.show_geography);
  assert_eq!(location.coordinates, Some(Coordinates { latitude: 1.5, longitude: 2.5 }));
}

#[tokio::test]
async fn scenario_counties_override_national_row_under_force_refresh() {
  let s = store().await;
  s.upload(
    standards(),
    rows(json!([{ "country": "Testland", "province": "", "county": "", "entry_date": "2021-01-01",
                  "confirmed": 10, "deaths": 1, "recovered": 2 }])),
    UploadOptions::new("national"),
  )
  .await
  .unwrap();

  let mut options = UploadOptions::new("county");
  options.force_refresh = true;
  s.upload(
    standards(),
    rows(json!([{ "country": "Testland", "province": "North", "county": "Alpha", "entry_date": "2021-01-01",
                  "confirmed": 10 }])),
    options,
  )
  .await
  .unwrap();

  let dp = s.get_datapoint(testland(), date("2021-01-01")).await.unwrap().unwrap();
  assert_eq!((dp.stats.confirmed, dp.stats.deaths, dp.stats.recovered), (10, 0, 0));
}

#[tokio::test]
async fn deltas_are_recomputed_across_batches() {
  let s = store().await;
  for (day, confirmed) in [("2021-01-01", 80), ("2021-01-02", 100)] {
    s.upload(
      standards(),
      rows(json!([{ "country": "Testland", "entry_date": day, "confirmed": confirmed }])),
      UploadOptions::new("src"),
    )
    .await
    .unwrap();
  }

  let dp = s.get_datapoint(testland(), date("2021-01-02")).await.unwrap().unwrap();
  assert_eq!(dp.stats.dconfirmed, 20);

  // Backfill raises the earlier day; a full recompute follows it.
  s.upload(
    standards(),
    rows(json!([{ "country": "Testland", "entry_date": "2021-01-01", "confirmed": 90 }])),
    UploadOptions::new("backfill"),
  )
  .await
  .unwrap();
  let written = s.update_all_deltas(date("2021-01-01"), date("2021-01-02")).await.unwrap();
  assert!(written >= 1);

  let dp = s.get_datapoint(testland(), date("2021-01-02")).await.unwrap().unwrap();
  assert_eq!(dp.stats.dconfirmed, 10);
}

#[tokio::test]
async fn rejected_batch_leaves_database_untouched() {
  let s = store().await;
  // A pre-existing row with a date column SQLite accepts but chrono cannot
  // read makes the batch fail when it loads that day.
  s.conn_for_tests(|conn| {
    conn.execute(
      "INSERT INTO datapoints (country, entry_date, update_time) VALUES ('Testland', '2021-01-01', 'garbage')",
      [],
    )
  })
  .await;

  let result = s
    .upload(
      standards(),
      rows(json!([
        { "country": "Otherland", "entry_date": "2021-01-01", "confirmed": 5 },
      ])),
      UploadOptions::new("src"),
    )
    .await;
  assert!(result.is_err());

  let found = s.find(RecordFilter::on(date("2021-01-01"))).await;
  assert!(found.is_err(), "the unreadable row is still the only one");
  let other = s
    .conn_for_tests(|conn| {
      conn.query_row("SELECT COUNT(*) FROM datapoints WHERE country = 'Otherland'", [], |r| {
        r.get::<_, i64>(0)
      })
    })
    .await;
  assert_eq!(other, 0);
  let locations = s
    .conn_for_tests(|conn| conn.query_row("SELECT COUNT(*) FROM locations", [], |r| r.get::<_, i64>(0)))
    .await;
  assert_eq!(locations, 0);
}

impl SqliteStore {
  async fn conn_for_tests<T, F>(&self, f: F) -> T
  where
    T: Send + 'static,
    F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
  {
    self
      .conn
      .call(move |conn| Ok(f(conn)?))
      .await
      .expect("test query")
  }
}
