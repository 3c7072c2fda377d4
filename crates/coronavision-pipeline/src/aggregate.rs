//! Roll-up of child records into province, country and world totals.
//!
//! Each level is a read-sum-then-upsert. Levels must run county→province,
//! province→country, country→world within a batch, because each one reads
//! what the level below just wrote for the same date.

use chrono::{DateTime, NaiveDate, Utc};
use coronavision_core::{
  datapoint::Datapoint,
  location::LocationKey,
  standards::Standards,
  stat::Totals,
  store::{ChildScope, RecordStore},
};

use crate::{Error, Result};

/// Source attribution written on every aggregated field.
pub const CALCULATED: &str = "calculated";

/// A freshly computed roll-up, not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overall {
  pub key:        LocationKey,
  pub entry_date: NaiveDate,
  pub totals:     Totals,
}

/// Sum the counties of `(country, province)` on `entry_date`.
///
/// With no county rows, the existing province record is taken as
/// authoritative rather than being zeroed out.
pub fn calc_overall_province<S: RecordStore>(
  store: &S,
  country: &str,
  province: &str,
  entry_date: NaiveDate,
) -> Result<Overall> {
  let scope = ChildScope::Counties {
    country:  country.to_owned(),
    province: province.to_owned(),
  };
  calc(store, &scope, entry_date, true)
}

/// Sum the provinces of `country` on `entry_date`, falling back to the
/// existing country record when there are none.
pub fn calc_overall_country<S: RecordStore>(
  store: &S,
  country: &str,
  entry_date: NaiveDate,
) -> Result<Overall> {
  let scope = ChildScope::Provinces { country: country.to_owned() };
  calc(store, &scope, entry_date, true)
}

/// Sum every country on `entry_date`.
pub fn calc_overall<S: RecordStore>(store: &S, entry_date: NaiveDate) -> Result<Overall> {
  calc(store, &ChildScope::Countries, entry_date, false)
}

fn calc<S: RecordStore>(
  store: &S,
  scope: &ChildScope,
  entry_date: NaiveDate,
  fallback: bool,
) -> Result<Overall> {
  let key = scope.target();
  let totals = match store.sum_children(scope, entry_date).map_err(Error::store)? {
    Some(totals) => totals,
    None if fallback => store
      .get(&key, entry_date)
      .map_err(Error::store)?
      .map(|dp| Totals::of(&dp.stats))
      .unwrap_or_default(),
    None => Totals::default(),
  };
  Ok(Overall { key, entry_date, totals })
}

/// Write `overall` into its roll-up record, creating the record if needed.
///
/// Normally a field is only raised, never lowered. With `force_refresh` every
/// field is overwritten. Returns whether any value changed; running it twice
/// with the same totals writes nothing the second time.
pub fn update_overall<S: RecordStore>(
  store: &mut S,
  overall: &Overall,
  standards: &dyn Standards,
  force_refresh: bool,
  now: DateTime<Utc>,
) -> Result<bool> {
  let existing = store
    .get(&overall.key, overall.entry_date)
    .map_err(Error::store)?;
  let created = existing.is_none();
  let mut dp = existing.unwrap_or_else(|| {
    let mut dp = Datapoint::new(overall.key.clone(), overall.entry_date, now);
    dp.guess_location(standards);
    dp
  });

  let mut changed = false;
  let mut dirty = created;
  for stat in Totals::STATS {
    let new = overall.totals.get(stat);
    let old = dp.stats.get(stat);
    if !(force_refresh || new > old) {
      continue;
    }
    if new != old {
      dp.stats.set(stat, new);
      changed = true;
    }
    if dp.sources.get(stat) != Some(CALCULATED) {
      dp.sources.set(stat, CALCULATED);
      dirty = true;
    }
  }

  if changed {
    dp.update_time = now;
    tracing::debug!(
      location = %overall.key,
      date = %overall.entry_date,
      confirmed = dp.stats.confirmed,
      deaths = dp.stats.deaths,
      recovered = dp.stats.recovered,
      "updated an overall"
    );
  }
  if changed || dirty {
    store.put(&dp).map_err(Error::store)?;
  }
  Ok(changed)
}
