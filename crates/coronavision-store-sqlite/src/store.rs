//! [`SqliteStore`], the SQLite implementation of [`Ingest`], and
//! [`SqliteTx`], the [`RecordStore`] view over one open transaction.

use std::{path::Path, sync::Arc};

use chrono::NaiveDate;
use rusqlite::OptionalExtension as _;

use coronavision_core::{
  datapoint::Datapoint,
  location::{Location, LocationKey},
  standards::Standards,
  stat::Totals,
  store::{ChildScope, RecordFilter, RecordStore},
};
use coronavision_pipeline::{
  Ingest, RawRow, UploadOptions, UploadReport, deltas::update_all_deltas, upload,
};

use crate::{
  Error, Result,
  encode::{
    DATAPOINT_COLUMNS, RawDatapoint, RawLocation, encode_coordinates, encode_date,
    encode_dt, encode_key,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A datapoint store backed by a single SQLite file.
///
/// Clones share one reference-counted connection. All calls
/// run on the connection's single worker thread, so batches are serialized.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Point lookup outside of any batch.
  pub async fn get_datapoint(
    &self,
    key: LocationKey,
    entry_date: NaiveDate,
  ) -> Result<Option<Datapoint>> {
    self
      .conn
      .call(move |conn| Ok(SqliteTx::new(conn).get(&key, entry_date)))
      .await?
  }

  /// Every datapoint matching `filter`.
  pub async fn find(&self, filter: RecordFilter) -> Result<Vec<Datapoint>> {
    self
      .conn
      .call(move |conn| Ok(SqliteTx::new(conn).find(&filter)))
      .await?
  }

  pub async fn get_location(&self, key: LocationKey) -> Result<Option<Location>> {
    self
      .conn
      .call(move |conn| Ok(SqliteTx::new(conn).get_location(&key)))
      .await?
  }
}

// ─── Ingest impl ─────────────────────────────────────────────────────────────

impl Ingest for SqliteStore {
  type Error = Error;

  async fn upload(
    &self,
    standards: Arc<dyn Standards>,
    rows: Vec<RawRow>,
    options: UploadOptions,
  ) -> Result<UploadReport> {
    let report = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = upload(&mut SqliteTx::new(&tx), standards.as_ref(), rows, &options);
        // Dropping `tx` without committing rolls the whole batch back.
        match outcome {
          Ok(report) => {
            tx.commit()?;
            Ok(Ok(report))
          }
          Err(e) => Ok(Err(e)),
        }
      })
      .await??;
    tracing::debug!(rows = report.rows, days = report.days, "batch committed");
    Ok(report)
  }

  async fn update_all_deltas(&self, from: NaiveDate, to: NaiveDate) -> Result<usize> {
    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = update_all_deltas(&mut SqliteTx::new(&tx), from, to);
        match outcome {
          Ok(written) => {
            tx.commit()?;
            Ok(Ok(written))
          }
          Err(e) => Ok(Err(e)),
        }
      })
      .await??;
    Ok(written)
  }
}

// ─── Transaction view ────────────────────────────────────────────────────────

/// A [`RecordStore`] over a borrowed connection, normally an open
/// [`rusqlite::Transaction`].
pub struct SqliteTx<'a> {
  conn: &'a rusqlite::Connection,
}

impl<'a> SqliteTx<'a> {
  pub fn new(conn: &'a rusqlite::Connection) -> Self { Self { conn } }
}

fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }

impl RecordStore for SqliteTx<'_> {
  type Error = Error;

  fn get(&self, key: &LocationKey, entry_date: NaiveDate) -> Result<Option<Datapoint>> {
    let (country, province, county) = encode_key(key);
    let raw = self
      .conn
      .query_row(
        &format!(
          "SELECT {DATAPOINT_COLUMNS} FROM datapoints
           WHERE country = ?1 AND province = ?2 AND county = ?3 AND entry_date = ?4"
        ),
        rusqlite::params![country, province, county, encode_date(entry_date)],
        RawDatapoint::from_row,
      )
      .optional()?;
    raw.map(RawDatapoint::into_datapoint).transpose()
  }

  fn find(&self, filter: &RecordFilter) -> Result<Vec<Datapoint>> {
    let mut sql = format!("SELECT {DATAPOINT_COLUMNS} FROM datapoints WHERE entry_date = ?");
    let mut params = vec![encode_date(filter.entry_date)];

    if let Some(countries) = &filter.countries {
      sql.push_str(&format!(" AND country IN ({})", placeholders(countries.len())));
      params.extend(countries.iter().cloned());
    }
    if let Some(provinces) = &filter.provinces {
      sql.push_str(&format!(" AND province IN ({})", placeholders(provinces.len())));
      params.extend(provinces.iter().cloned());
    }

    let mut stmt = self.conn.prepare(&sql)?;
    let raws = stmt
      .query_map(rusqlite::params_from_iter(params.iter()), RawDatapoint::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;

    raws.into_iter().map(RawDatapoint::into_datapoint).collect()
  }

  fn sum_children(&self, scope: &ChildScope, entry_date: NaiveDate) -> Result<Option<Totals>> {
    let mut params = vec![encode_date(entry_date)];
    let condition = match scope {
      ChildScope::Counties { country, province } => {
        params.extend([country.clone(), province.clone()]);
        "country = ?2 AND province = ?3 AND county != ''"
      }
      ChildScope::Provinces { country } => {
        params.push(country.clone());
        "country = ?2 AND province != '' AND county = ''"
      }
      ChildScope::Countries => "country != '' AND province = '' AND county = ''",
    };

    let (count, totals): (i64, Totals) = self.conn.query_row(
      &format!(
        "SELECT COUNT(*),
                COALESCE(SUM(confirmed), 0), COALESCE(SUM(deaths), 0),
                COALESCE(SUM(recovered), 0), COALESCE(SUM(num_tests), 0)
         FROM datapoints
         WHERE entry_date = ?1 AND {condition}"
      ),
      rusqlite::params_from_iter(params.iter()),
      |row| {
        Ok((row.get(0)?, Totals {
          confirmed: row.get(1)?,
          deaths:    row.get(2)?,
          recovered: row.get(3)?,
          num_tests: row.get(4)?,
        }))
      },
    )?;

    Ok((count > 0).then_some(totals))
  }

  fn put(&mut self, dp: &Datapoint) -> Result<()> {
    let (country, province, county) = encode_key(&dp.key);
    let (latitude, longitude) = encode_coordinates(dp.coordinates);
    let s = &dp.stats;
    let src = &dp.sources;

    self.conn.execute(
      &format!(
        "INSERT OR REPLACE INTO datapoints ({DATAPOINT_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                 ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)"
      ),
      rusqlite::params![
        country,
        province,
        county,
        encode_date(dp.entry_date),
        encode_dt(dp.update_time),
        dp.group,
        latitude,
        longitude,
        dp.is_first_day,
        s.confirmed,
        s.recovered,
        s.deaths,
        s.active,
        s.serious,
        s.num_tests,
        s.dconfirmed,
        s.drecovered,
        s.ddeaths,
        s.dactive,
        s.dserious,
        src.confirmed,
        src.recovered,
        src.deaths,
        src.serious,
        src.num_tests,
      ],
    )?;
    Ok(())
  }

  fn get_location(&self, key: &LocationKey) -> Result<Option<Location>> {
    let (country, province, county) = encode_key(key);
    let raw = self
      .conn
      .query_row(
        "SELECT country, province, county, latitude, longitude, show_geography
         FROM locations WHERE country = ?1 AND province = ?2 AND county = ?3",
        rusqlite::params![country, province, county],
        |row| {
          Ok(RawLocation {
            country:        row.get(0)?,
            province:       row.get(1)?,
            county:         row.get(2)?,
            latitude:       row.get(3)?,
            longitude:      row.get(4)?,
            show_geography: row.get(5)?,
          })
        },
      )
      .optional()?;
    Ok(raw.map(RawLocation::into_location))
  }

  fn put_location(&mut self, location: &Location) -> Result<()> {
    let (country, province, county) = encode_key(&location.key);
    let (latitude, longitude) = encode_coordinates(location.coordinates);
    self.conn.execute(
      "INSERT OR REPLACE INTO locations
         (country, province, county, latitude, longitude, show_geography)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      rusqlite::params![country, province, county, latitude, longitude, location.show_geography],
    )?;
    Ok(())
  }
}
