//! [`TableStandards`]: name standardisation from a JSON lookup table.
//!
//! ```json
//! {
//!   "country_aliases": { "US": "United States" },
//!   "province_aliases": { "United States": { "Mass.": "Massachusetts" } },
//!   "continents": { "United States": "North America" },
//!   "admin1_codes": { "United States": { "MA": "Massachusetts" } },
//!   "locations": [
//!     { "country": "United States", "province": "Massachusetts",
//!       "latitude": 42.4, "longitude": -71.4 }
//!   ]
//! }
//! ```

use std::{
  collections::HashMap,
  path::Path,
  sync::Arc,
};

use coronavision_core::{
  location::{Coordinates, LocationKey},
  standards::{PassThrough, Standards},
};
use serde::Deserialize;

use crate::{Error, Result};

#[derive(Debug, Default, Deserialize)]
struct StandardsFile {
  #[serde(default)]
  country_aliases:  HashMap<String, String>,
  #[serde(default)]
  province_aliases: HashMap<String, HashMap<String, String>>,
  #[serde(default)]
  continents:       HashMap<String, String>,
  #[serde(default)]
  admin1_codes:     HashMap<String, HashMap<String, String>>,
  #[serde(default)]
  locations:        Vec<KnownLocation>,
}

#[derive(Debug, Deserialize)]
struct KnownLocation {
  country:   String,
  #[serde(default)]
  province:  String,
  #[serde(default)]
  county:    String,
  latitude:  f64,
  longitude: f64,
}

#[derive(Debug, Default)]
pub struct TableStandards {
  country_aliases:  HashMap<String, String>,
  province_aliases: HashMap<String, HashMap<String, String>>,
  continents:       HashMap<String, String>,
  /// Codes are stored upper-cased.
  admin1_codes:     HashMap<String, HashMap<String, String>>,
  coordinates:      HashMap<LocationKey, Coordinates>,
}

impl TableStandards {
  pub fn from_json(text: &str) -> Result<Self> {
    let file: StandardsFile = serde_json::from_str(text)?;
    Ok(Self {
      country_aliases:  file.country_aliases,
      province_aliases: file.province_aliases,
      continents:       file.continents,
      admin1_codes:     file
        .admin1_codes
        .into_iter()
        .map(|(country, codes)| {
          let codes = codes.into_iter().map(|(code, name)| (code.to_uppercase(), name));
          (country, codes.collect())
        })
        .collect(),
      coordinates:      file
        .locations
        .into_iter()
        .map(|l| {
          let key = LocationKey::from_parts(&l.country, &l.province, &l.county);
          (key, Coordinates { latitude: l.latitude, longitude: l.longitude })
        })
        .collect(),
    })
  }

  pub fn load(path: &Path) -> Result<Self> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json(&text)
  }
}

/// The standards table at `path`, or [`PassThrough`] when none is configured.
pub fn load_standards(path: Option<&Path>) -> Result<Arc<dyn Standards>> {
  match path {
    Some(path) => {
      let table = TableStandards::load(path)?;
      tracing::info!(
        path = %path.display(),
        locations = table.coordinates.len(),
        "loaded standards table"
      );
      Ok(Arc::new(table))
    }
    None => Ok(Arc::new(PassThrough)),
  }
}

impl Standards for TableStandards {
  fn normalize_name(
    &self,
    country: &str,
    province: &str,
    county: &str,
  ) -> (String, String, String) {
    let country = self.fix_country_name(country);
    let province = province.trim();
    let province = self
      .province_aliases
      .get(&country)
      .and_then(|aliases| aliases.get(province))
      .map_or(province, String::as_str)
      .to_owned();
    (country, province, county.trim().to_owned())
  }

  fn fix_country_name(&self, name: &str) -> String {
    let name = name.trim();
    self
      .country_aliases
      .get(name)
      .map_or(name, String::as_str)
      .to_owned()
  }

  fn continent(&self, country: &str) -> String {
    self.continents.get(country).cloned().unwrap_or_default()
  }

  fn estimated_location(&self, key: &LocationKey) -> Option<Coordinates> {
    self.coordinates.get(key).copied()
  }

  fn admin1_name(&self, country: &str, code: &str) -> Option<String> {
    self
      .admin1_codes
      .get(country)?
      .get(&code.trim().to_uppercase())
      .cloned()
  }
}
