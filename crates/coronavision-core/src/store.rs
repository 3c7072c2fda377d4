//! The `RecordStore` trait and supporting query types.
//!
//! A `RecordStore` is a view over one open transaction. The pipeline reads
//! and writes through it synchronously; committing or rolling back is the
//! job of whoever opened the transaction (see `coronavision-pipeline`'s
//! `Ingest` trait).

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::{
  datapoint::Datapoint,
  location::{Location, LocationKey},
  stat::Totals,
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`RecordStore::find`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
  pub entry_date: NaiveDate,
  /// Restrict to records whose country is in this set.
  pub countries:  Option<BTreeSet<String>>,
  /// Restrict to records whose province is in this set.
  pub provinces:  Option<BTreeSet<String>>,
}

impl RecordFilter {
  /// Every record on `entry_date`.
  pub fn on(entry_date: NaiveDate) -> Self {
    Self { entry_date, countries: None, provinces: None }
  }

  pub fn matches(&self, dp: &Datapoint) -> bool {
    let (country, province, _) = dp.key.parts();
    dp.entry_date == self.entry_date
      && self.countries.as_ref().is_none_or(|set| set.contains(country))
      && self.provinces.as_ref().is_none_or(|set| set.contains(province))
  }
}

/// The set of child records one roll-up level sums over.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChildScope {
  /// Records in `(country, province)` with a nonempty county.
  Counties { country: String, province: String },
  /// Records in `country` with a nonempty province and empty county.
  Provinces { country: String },
  /// Records with a nonempty country and empty province and county.
  Countries,
}

impl ChildScope {
  pub fn contains(&self, key: &LocationKey) -> bool {
    let (country, province, county) = key.parts();
    match self {
      Self::Counties { country: c, province: p } => {
        country == c && province == p && !county.is_empty()
      }
      Self::Provinces { country: c } => {
        country == c && !province.is_empty() && county.is_empty()
      }
      Self::Countries => {
        !country.is_empty() && province.is_empty() && county.is_empty()
      }
    }
  }

  /// The roll-up record the children of this scope are summed into.
  pub fn target(&self) -> LocationKey {
    match self {
      Self::Counties { country, province } => LocationKey::rollup(country, province),
      Self::Provinces { country } => LocationKey::rollup(country, ""),
      Self::Countries => LocationKey::WorldRollup,
    }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Transactional access to datapoints and locations.
///
/// Writes must be visible to subsequent reads through the same value; the
/// roll-up passes read the sums of records written moments earlier.
pub trait RecordStore {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Point lookup by full key.
  fn get(
    &self,
    key: &LocationKey,
    entry_date: NaiveDate,
  ) -> Result<Option<Datapoint>, Self::Error>;

  /// All records matching `filter`.
  fn find(&self, filter: &RecordFilter) -> Result<Vec<Datapoint>, Self::Error>;

  /// Sum the roll-up totals over every record in `scope` on `entry_date`.
  /// Returns `None` when the scope has no records at all.
  fn sum_children(
    &self,
    scope: &ChildScope,
    entry_date: NaiveDate,
  ) -> Result<Option<Totals>, Self::Error>;

  /// Insert or replace the record at `dp`'s key.
  fn put(&mut self, dp: &Datapoint) -> Result<(), Self::Error>;

  fn get_location(&self, key: &LocationKey) -> Result<Option<Location>, Self::Error>;

  /// Insert or replace a location.
  fn put_location(&mut self, location: &Location) -> Result<(), Self::Error>;
}
