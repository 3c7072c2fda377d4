//! Datapoints and the merge rule that folds an observation into one.
//!
//! A [`Datapoint`] is the canonical record for one location on one date. It
//! is created the first time an [`Observation`] names its key and is mutated
//! by every later merge, roll-up or delta pass. It is never deleted.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  location::{Coordinates, LocationKey},
  standards::Standards,
  stat::{Sources, Stat, Stats},
};

// ─── Observation ─────────────────────────────────────────────────────────────

/// A normalised source row, ready to merge.
///
/// `stats` holds only the fields the source actually reported; an explicit
/// zero is present, a missing or unparsable value is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
  pub key:         LocationKey,
  pub entry_date:  NaiveDate,
  pub group:       String,
  pub coordinates: Option<Coordinates>,
  /// Per-row override of the batch's source link.
  pub source_link: Option<String>,
  pub stats:       BTreeMap<Stat, i64>,
}

impl Observation {
  pub fn new(key: LocationKey, entry_date: NaiveDate) -> Self {
    Self {
      key,
      entry_date,
      group: String::new(),
      coordinates: None,
      source_link: None,
      stats: BTreeMap::new(),
    }
  }

  pub fn with_stat(mut self, stat: Stat, value: i64) -> Self {
    self.stats.insert(stat, value);
    self
  }

  /// `true` if at least one stat is present and nonzero.
  pub fn has_data(&self) -> bool { self.stats.values().any(|v| *v != 0) }
}

// ─── MergeOutcome ────────────────────────────────────────────────────────────

/// What a merge did to a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
  /// `new - old` for every field the merge accepted.
  pub delta:   BTreeMap<Stat, i64>,
  /// Whether the record counts as updated for roll-up purposes.
  pub changed: bool,
}

impl MergeOutcome {
  pub fn is_updated(&self) -> bool { self.changed }

  pub fn delta_of(&self, stat: Stat) -> i64 {
    self.delta.get(&stat).copied().unwrap_or(0)
  }
}

// ─── Datapoint ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
  pub key:          LocationKey,
  pub entry_date:   NaiveDate,
  /// Continent or other display group.
  pub group:        String,
  pub coordinates:  Option<Coordinates>,
  /// First record ever seen for this location.
  pub is_first_day: bool,
  pub stats:        Stats,
  pub sources:      Sources,
  pub update_time:  DateTime<Utc>,
}

impl Datapoint {
  /// An all-zero record with no provenance.
  pub fn new(key: LocationKey, entry_date: NaiveDate, now: DateTime<Utc>) -> Self {
    Self {
      key,
      entry_date,
      group: String::new(),
      coordinates: None,
      is_first_day: false,
      stats: Stats::default(),
      sources: Sources::default(),
      update_time: now,
    }
  }

  /// Create the record for a key that has never been seen on this date.
  ///
  /// `first_day` marks the earliest record of a location that was not known
  /// before. Every present stat is treated as a change, so a brand new record
  /// is always reported as updated.
  pub fn create(
    obs: &Observation,
    source_link: &str,
    first_day: bool,
    standards: &dyn Standards,
    now: DateTime<Utc>,
  ) -> (Self, MergeOutcome) {
    let mut dp = Self::new(obs.key.clone(), obs.entry_date, now);
    dp.group = obs.group.clone();
    dp.coordinates = obs.coordinates;
    dp.is_first_day = first_day;

    for (&stat, &value) in &obs.stats {
      dp.stats.set(stat, value);
    }
    let delta = obs.stats.clone();
    dp.stamp_sources(&delta, source_link, now);
    dp.guess_location(standards);

    (dp, MergeOutcome { delta, changed: true })
  }

  /// Merge `obs` into this record.
  ///
  /// Monotonic stats only move upwards; other stats move on any difference.
  /// With `force_refresh` every present field is overwritten regardless of
  /// direction. A rejected field contributes nothing to the delta and does
  /// not stop the other fields of the same row from applying.
  pub fn update(
    &mut self,
    obs: &Observation,
    source_link: &str,
    force_refresh: bool,
    now: DateTime<Utc>,
  ) -> MergeOutcome {
    let mut delta = BTreeMap::new();

    for (&stat, &new) in &obs.stats {
      let old = self.stats.get(stat);
      let accept = if stat.is_monotonic() { new > old } else { new != old };
      if accept || force_refresh {
        delta.insert(stat, new - old);
        self.stats.set(stat, new);
      }
    }

    if self.coordinates.is_none() {
      self.coordinates = obs.coordinates;
    }
    if self.group.is_empty() && !obs.group.is_empty() {
      self.group = obs.group.clone();
    }

    let moved = self.stamp_sources(&delta, source_link, now);
    let changed = moved || (force_refresh && !obs.stats.is_empty());
    MergeOutcome { delta, changed }
  }

  /// Fill in estimated coordinates if the record has none.
  pub fn guess_location(&mut self, standards: &dyn Standards) {
    if self.coordinates.is_none() {
      self.coordinates = standards.estimated_location(&self.key);
    }
  }

  /// Attribute every nonzero delta to `link`. Returns whether any field moved.
  fn stamp_sources(
    &mut self,
    delta: &BTreeMap<Stat, i64>,
    link: &str,
    now: DateTime<Utc>,
  ) -> bool {
    let mut moved = false;
    for (&stat, &d) in delta {
      if d != 0 {
        self.sources.set(stat, link);
        moved = true;
      }
    }
    if moved {
      self.update_time = now;
    }
    moved
  }
}
