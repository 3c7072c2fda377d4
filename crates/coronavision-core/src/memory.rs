//! [`MemoryStore`]: an in-process [`RecordStore`] for dry runs and tests.

use std::{collections::BTreeMap, convert::Infallible};

use chrono::NaiveDate;

use crate::{
  datapoint::Datapoint,
  location::{Location, LocationKey},
  stat::Totals,
  store::{ChildScope, RecordFilter, RecordStore},
};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  datapoints: BTreeMap<(NaiveDate, LocationKey), Datapoint>,
  locations:  BTreeMap<LocationKey, Location>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Run `f` against a working copy and keep its writes only if it succeeds.
  pub fn atomically<T, E>(
    &mut self,
    f: impl FnOnce(&mut MemoryStore) -> Result<T, E>,
  ) -> Result<T, E> {
    let mut work = self.clone();
    let out = f(&mut work)?;
    *self = work;
    Ok(out)
  }

  pub fn len(&self) -> usize { self.datapoints.len() }

  pub fn is_empty(&self) -> bool { self.datapoints.is_empty() }

  pub fn datapoints(&self) -> impl Iterator<Item = &Datapoint> {
    self.datapoints.values()
  }

  pub fn locations(&self) -> impl Iterator<Item = &Location> {
    self.locations.values()
  }
}

impl RecordStore for MemoryStore {
  type Error = Infallible;

  fn get(
    &self,
    key: &LocationKey,
    entry_date: NaiveDate,
  ) -> Result<Option<Datapoint>, Infallible> {
    Ok(self.datapoints.get(&(entry_date, key.clone())).cloned())
  }

  fn find(&self, filter: &RecordFilter) -> Result<Vec<Datapoint>, Infallible> {
    Ok(
      self
        .datapoints
        .range((filter.entry_date, smallest_key())..)
        .take_while(|((date, _), _)| *date == filter.entry_date)
        .map(|(_, dp)| dp)
        .filter(|dp| filter.matches(dp))
        .cloned()
        .collect(),
    )
  }

  fn sum_children(
    &self,
    scope: &ChildScope,
    entry_date: NaiveDate,
  ) -> Result<Option<Totals>, Infallible> {
    let mut totals: Option<Totals> = None;
    for dp in self.datapoints.values() {
      if dp.entry_date == entry_date && scope.contains(&dp.key) {
        totals.get_or_insert_with(Totals::default).add(&dp.stats);
      }
    }
    Ok(totals)
  }

  fn put(&mut self, dp: &Datapoint) -> Result<(), Infallible> {
    self
      .datapoints
      .insert((dp.entry_date, dp.key.clone()), dp.clone());
    Ok(())
  }

  fn get_location(&self, key: &LocationKey) -> Result<Option<Location>, Infallible> {
    Ok(self.locations.get(key).cloned())
  }

  fn put_location(&mut self, location: &Location) -> Result<(), Infallible> {
    self.locations.insert(location.key.clone(), location.clone());
    Ok(())
  }
}

/// The least `LocationKey` in derived order: `Precise` sorts first and empty
/// strings sort before everything else.
fn smallest_key() -> LocationKey {
  LocationKey::Precise {
    country:  String::new(),
    province: String::new(),
    county:   String::new(),
  }
}
