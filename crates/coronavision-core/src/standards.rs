//! The name-standardisation collaborator.
//!
//! Lookup tables for country aliases, continents, admin codes and estimated
//! coordinates live outside this crate. The pipeline only ever calls them as
//! pure functions through [`Standards`].

use crate::location::{Coordinates, LocationKey};

pub trait Standards: Send + Sync {
  /// Canonicalise a `(country, province, county)` triple.
  fn normalize_name(
    &self,
    country: &str,
    province: &str,
    county: &str,
  ) -> (String, String, String);

  /// Canonical spelling of a country name.
  fn fix_country_name(&self, name: &str) -> String;

  /// Continent / group for a canonical country name; empty if unknown.
  fn continent(&self, country: &str) -> String;

  /// Best-guess coordinates for a location that a source did not place.
  fn estimated_location(&self, key: &LocationKey) -> Option<Coordinates>;

  /// Full first-level admin name for a code, e.g. `("United States", "MA")`.
  fn admin1_name(&self, country: &str, code: &str) -> Option<String>;
}

/// A [`Standards`] that leaves every name as given and knows no coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl Standards for PassThrough {
  fn normalize_name(
    &self,
    country: &str,
    province: &str,
    county: &str,
  ) -> (String, String, String) {
    (country.to_owned(), province.to_owned(), county.to_owned())
  }

  fn fix_country_name(&self, name: &str) -> String { name.to_owned() }

  fn continent(&self, _country: &str) -> String { String::new() }

  fn estimated_location(&self, _key: &LocationKey) -> Option<Coordinates> {
    None
  }

  fn admin1_name(&self, _country: &str, _code: &str) -> Option<String> { None }
}
