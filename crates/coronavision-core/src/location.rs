//! Location keys and the secondary `Location` entity.
//!
//! A datapoint is keyed by where it applies. Roll-up records are explicit
//! variants of [`LocationKey`]; the "empty string means roll-up" convention
//! exists only at the storage-encoding boundary (see [`LocationKey::parts`]
//! and [`LocationKey::from_parts`]).

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── LocationKey ─────────────────────────────────────────────────────────────

/// The geographic half of a datapoint key.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum LocationKey {
  /// A county-level (admin 2) observation.
  Precise {
    country:  String,
    province: String,
    county:   String,
  },
  /// The aggregate of every county in a province.
  ProvinceRollup { country: String, province: String },
  /// The aggregate of every province in a country.
  CountryRollup { country: String },
  /// The aggregate of every country.
  WorldRollup,
}

impl LocationKey {
  /// Build the key from the three stored name columns, where an empty string
  /// marks the level as a roll-up.
  pub fn from_parts(country: &str, province: &str, county: &str) -> Self {
    if !county.is_empty() {
      Self::Precise {
        country:  country.to_owned(),
        province: province.to_owned(),
        county:   county.to_owned(),
      }
    } else if !province.is_empty() {
      Self::ProvinceRollup {
        country:  country.to_owned(),
        province: province.to_owned(),
      }
    } else if !country.is_empty() {
      Self::CountryRollup { country: country.to_owned() }
    } else {
      Self::WorldRollup
    }
  }

  /// The roll-up record that sits directly above `(country, province)`.
  pub fn rollup(country: &str, province: &str) -> Self {
    Self::from_parts(country, province, "")
  }

  /// `(country, province, county)` with empty strings for rolled-up levels.
  pub fn parts(&self) -> (&str, &str, &str) {
    match self {
      Self::Precise { country, province, county } => (country, province, county),
      Self::ProvinceRollup { country, province } => (country, province, ""),
      Self::CountryRollup { country } => (country, "", ""),
      Self::WorldRollup => ("", "", ""),
    }
  }

  pub fn country(&self) -> &str { self.parts().0 }

  pub fn province(&self) -> &str { self.parts().1 }

  pub fn county(&self) -> &str { self.parts().2 }

  pub fn is_rollup(&self) -> bool { !matches!(self, Self::Precise { .. }) }

  /// The key one level coarser, or `None` for the world record.
  pub fn parent(&self) -> Option<Self> {
    match self {
      Self::Precise { country, province, .. } => {
        Some(Self::rollup(country, province))
      }
      Self::ProvinceRollup { country, .. } => Some(Self::rollup(country, "")),
      Self::CountryRollup { .. } => Some(Self::WorldRollup),
      Self::WorldRollup => None,
    }
  }
}

impl fmt::Display for LocationKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Precise { country, province, county } => {
        write!(f, "{county}, {province}, {country}")
      }
      Self::ProvinceRollup { country, province } => {
        write!(f, "{province}, {country}")
      }
      Self::CountryRollup { country } => f.write_str(country),
      Self::WorldRollup => f.write_str("World"),
    }
  }
}

// ─── Coordinates ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub latitude:  f64,
  pub longitude: f64,
}

// ─── Location ────────────────────────────────────────────────────────────────

/// Descriptive data about a place, independent of any date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
  pub key:            LocationKey,
  pub coordinates:    Option<Coordinates>,
  /// Whether the coordinates came from a source rather than an estimate.
  pub show_geography: bool,
}

impl Location {
  pub fn new(key: LocationKey) -> Self {
    Self { key, coordinates: None, show_geography: false }
  }

  /// Fold newly observed coordinates into this location. Returns whether
  /// anything changed.
  pub fn observe(&mut self, coordinates: Option<Coordinates>) -> bool {
    match coordinates {
      Some(c) if self.coordinates != Some(c) || !self.show_geography => {
        self.coordinates = Some(c);
        self.show_geography = true;
        true
      }
      _ => false,
    }
  }
}
