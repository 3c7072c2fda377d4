//! The batch driver.
//!
//! One call to [`upload`] is one ingestion batch: normalise, merge, roll up
//! and recompute deltas, all against the same open transaction. Nothing here
//! commits; the caller commits only if `upload` returns `Ok`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use coronavision_core::{
  datapoint::{Datapoint, MergeOutcome, Observation},
  location::{Location, LocationKey},
  standards::Standards,
  store::{RecordFilter, RecordStore},
};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  aggregate::{calc_overall, calc_overall_country, calc_overall_province, update_overall},
  deltas::update_deltas,
  normalize::{RawRow, normalize},
};

// ─── Options & report ────────────────────────────────────────────────────────

/// Per-batch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOptions {
  /// Values for fields a row leaves out.
  #[serde(default)]
  pub defaults:      RawRow,
  /// Attribution for every field this batch moves, unless a row has its own.
  #[serde(default)]
  pub source_link:   String,
  /// Recompute roll-ups above every changed record.
  #[serde(default = "default_true")]
  pub recount:       bool,
  /// Overwrite stats and roll-ups regardless of direction.
  #[serde(default)]
  pub force_refresh: bool,
}

fn default_true() -> bool { true }

impl UploadOptions {
  pub fn new(source_link: impl Into<String>) -> Self {
    Self {
      defaults:      RawRow::new(),
      source_link:   source_link.into(),
      recount:       true,
      force_refresh: false,
    }
  }
}

/// What one batch did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
  pub rows:           usize,
  pub created:        usize,
  pub updated:        usize,
  pub unchanged:      usize,
  pub skipped_empty:  usize,
  /// Rows repeating a (location, date) already seen in this batch. They are
  /// merged like any other row.
  pub duplicates:     usize,
  pub rejected:       usize,
  pub recounted:      usize,
  pub deltas_written: usize,
  pub days:           usize,
}

// ─── Batch context ───────────────────────────────────────────────────────────

type RecordId = (NaiveDate, LocationKey);

/// State scoped to one `upload` call and dropped at its end.
#[derive(Default)]
struct Batch {
  records:   HashMap<RecordId, Datapoint>,
  dirty:     BTreeSet<RecordId>,
  seen:      HashSet<RecordId>,
  provinces: BTreeSet<(NaiveDate, String, String)>,
  countries: BTreeSet<(NaiveDate, String)>,
  worlds:    BTreeSet<NaiveDate>,
  days:      BTreeSet<NaiveDate>,
}

impl Batch {
  /// Note the roll-ups above a record that just changed.
  fn register_parents(&mut self, key: &LocationKey, date: NaiveDate) {
    let (country, province, county) = key.parts();
    if !county.is_empty() {
      self
        .provinces
        .insert((date, country.to_owned(), province.to_owned()));
    }
    if !province.is_empty() {
      self.countries.insert((date, country.to_owned()));
    }
    if !country.is_empty() {
      self.worlds.insert(date);
    }
  }
}

// ─── upload ──────────────────────────────────────────────────────────────────

/// Run one ingestion batch against `store`.
pub fn upload<S: RecordStore>(
  store: &mut S,
  standards: &dyn Standards,
  rows: Vec<RawRow>,
  options: &UploadOptions,
) -> Result<UploadReport> {
  let now = Utc::now();
  let mut report = UploadReport { rows: rows.len(), ..Default::default() };

  // Normalise, then group by date so each date's records load once.
  let mut by_date: BTreeMap<NaiveDate, Vec<Observation>> = BTreeMap::new();
  for row in rows {
    match normalize(row, &options.defaults, standards, now.date_naive()) {
      Ok(Some(obs)) => by_date.entry(obs.entry_date).or_default().push(obs),
      Ok(None) => report.skipped_empty += 1,
      Err(Error::InvalidDate(date)) => {
        tracing::warn!(%date, "rejecting row with an unparsable date");
        report.rejected += 1;
      }
      Err(e) => return Err(e),
    }
  }

  let mut batch = Batch::default();
  for (date, observations) in &by_date {
    load_existing(store, &mut batch, *date, observations)?;
    for obs in observations {
      merge(store, standards, &mut batch, obs, options, now, &mut report)?;
    }
  }

  for id in std::mem::take(&mut batch.dirty) {
    if let Some(dp) = batch.records.get(&id) {
      store.put(dp).map_err(Error::store)?;
    }
  }

  recount(store, standards, &batch, options.force_refresh, now, &mut report)?;

  for day in &batch.days {
    report.deltas_written += update_deltas(store, *day)?;
  }
  report.days = batch.days.len();

  tracing::info!(
    source = %options.source_link,
    rows = report.rows,
    created = report.created,
    updated = report.updated,
    unchanged = report.unchanged,
    recounted = report.recounted,
    "batch merged"
  );
  Ok(report)
}

/// Pull the existing records a date's observations may touch. When the
/// observations span only one country (or province) the query is narrowed
/// to it; roll-up records are always included.
fn load_existing<S: RecordStore>(
  store: &S,
  batch: &mut Batch,
  date: NaiveDate,
  observations: &[Observation],
) -> Result<()> {
  let mut countries = BTreeSet::from([String::new()]);
  let mut provinces = BTreeSet::from([String::new()]);
  for obs in observations {
    countries.insert(obs.key.country().to_owned());
    provinces.insert(obs.key.province().to_owned());
  }

  let filter = RecordFilter {
    entry_date: date,
    countries:  (countries.len() <= 2).then_some(countries),
    provinces:  (provinces.len() <= 2).then_some(provinces),
  };
  for dp in store.find(&filter).map_err(Error::store)? {
    batch.records.insert((dp.entry_date, dp.key.clone()), dp);
  }
  Ok(())
}

fn merge<S: RecordStore>(
  store: &mut S,
  standards: &dyn Standards,
  batch: &mut Batch,
  obs: &Observation,
  options: &UploadOptions,
  now: DateTime<Utc>,
  report: &mut UploadReport,
) -> Result<()> {
  let id = (obs.entry_date, obs.key.clone());
  if !batch.seen.insert(id.clone()) {
    tracing::debug!(location = %obs.key, date = %obs.entry_date, "repeated row in batch");
    report.duplicates += 1;
  }

  let new_location = upsert_location(store, standards, obs)?;
  let link = obs.source_link.as_deref().unwrap_or(&options.source_link);
  let outcome: MergeOutcome = match batch.records.get_mut(&id) {
    Some(dp) => {
      let before = dp.clone();
      let outcome = dp.update(obs, link, options.force_refresh, now);
      dp.guess_location(standards);
      if *dp != before {
        batch.dirty.insert(id.clone());
      }
      if outcome.is_updated() {
        report.updated += 1;
      } else {
        report.unchanged += 1;
      }
      outcome
    }
    None => {
      let (dp, outcome) = Datapoint::create(obs, link, new_location, standards, now);
      batch.records.insert(id.clone(), dp);
      batch.dirty.insert(id);
      report.created += 1;
      outcome
    }
  };

  batch.days.insert(obs.entry_date);
  if outcome.is_updated() && options.recount {
    batch.register_parents(&obs.key, obs.entry_date);
  }
  Ok(())
}

/// Record the location of `obs`. Returns whether it was not known before.
fn upsert_location<S: RecordStore>(
  store: &mut S,
  standards: &dyn Standards,
  obs: &Observation,
) -> Result<bool> {
  match store.get_location(&obs.key).map_err(Error::store)? {
    Some(mut location) => {
      if location.observe(obs.coordinates) {
        store.put_location(&location).map_err(Error::store)?;
      }
      Ok(false)
    }
    None => {
      let mut location = Location::new(obs.key.clone());
      if !location.observe(obs.coordinates) {
        location.coordinates = standards.estimated_location(&obs.key);
      }
      store.put_location(&location).map_err(Error::store)?;
      Ok(true)
    }
  }
}

fn recount<S: RecordStore>(
  store: &mut S,
  standards: &dyn Standards,
  batch: &Batch,
  force_refresh: bool,
  now: DateTime<Utc>,
  report: &mut UploadReport,
) -> Result<()> {
  for (date, country, province) in &batch.provinces {
    let overall = calc_overall_province(store, country, province, *date)?;
    if update_overall(store, &overall, standards, force_refresh, now)? {
      report.recounted += 1;
    }
  }
  for (date, country) in &batch.countries {
    let overall = calc_overall_country(store, country, *date)?;
    if update_overall(store, &overall, standards, force_refresh, now)? {
      report.recounted += 1;
    }
  }
  for date in &batch.worlds {
    let overall = calc_overall(store, *date)?;
    if update_overall(store, &overall, standards, force_refresh, now)? {
      report.recounted += 1;
    }
  }
  tracing::debug!(
    provinces = batch.provinces.len(),
    countries = batch.countries.len(),
    worlds = batch.worlds.len(),
    "recounted roll-ups"
  );
  Ok(())
}
