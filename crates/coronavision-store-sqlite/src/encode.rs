//! Encoding and decoding helpers between domain types and the plain columns
//! stored in SQLite.
//!
//! Dates are stored as `YYYY-MM-DD`, timestamps as RFC 3339 strings.
//! [`LocationKey`] is flattened to three name columns with empty strings for
//! rolled-up levels; this module is the only place that convention exists.

use chrono::{DateTime, NaiveDate, Utc};
use coronavision_core::{
  datapoint::Datapoint,
  location::{Coordinates, Location, LocationKey},
  stat::{Sources, Stats},
};

use crate::{Error, Result};

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::Decode(format!("{s:?}: {e}")))
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("{s:?}: {e}")))
}

// ─── LocationKey ─────────────────────────────────────────────────────────────

pub fn encode_key(key: &LocationKey) -> (String, String, String) {
  let (country, province, county) = key.parts();
  (country.to_owned(), province.to_owned(), county.to_owned())
}

// ─── Coordinates ─────────────────────────────────────────────────────────────

pub fn encode_coordinates(c: Option<Coordinates>) -> (Option<f64>, Option<f64>) {
  match c {
    Some(c) => (Some(c.latitude), Some(c.longitude)),
    None => (None, None),
  }
}

fn decode_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Option<Coordinates> {
  Some(Coordinates { latitude: latitude?, longitude: longitude? })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawDatapoint::from_row`].
pub const DATAPOINT_COLUMNS: &str = "
  country, province, county, entry_date, update_time, grp,
  latitude, longitude, is_first_day,
  confirmed, recovered, deaths, active, serious, num_tests,
  dconfirmed, drecovered, ddeaths, dactive, dserious,
  source_confirmed, source_recovered, source_deaths, source_serious, source_num_tests";

/// Raw values read directly from a `datapoints` row.
pub struct RawDatapoint {
  pub country:      String,
  pub province:     String,
  pub county:       String,
  pub entry_date:   String,
  pub update_time:  String,
  pub group:        String,
  pub latitude:     Option<f64>,
  pub longitude:    Option<f64>,
  pub is_first_day: bool,
  pub stats:        Stats,
  pub sources:      Sources,
}

impl RawDatapoint {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      country:      row.get(0)?,
      province:     row.get(1)?,
      county:       row.get(2)?,
      entry_date:   row.get(3)?,
      update_time:  row.get(4)?,
      group:        row.get(5)?,
      latitude:     row.get(6)?,
      longitude:    row.get(7)?,
      is_first_day: row.get(8)?,
      stats:        Stats {
        confirmed:  row.get(9)?,
        recovered:  row.get(10)?,
        deaths:     row.get(11)?,
        active:     row.get(12)?,
        serious:    row.get(13)?,
        num_tests:  row.get(14)?,
        dconfirmed: row.get(15)?,
        drecovered: row.get(16)?,
        ddeaths:    row.get(17)?,
        dactive:    row.get(18)?,
        dserious:   row.get(19)?,
      },
      sources:      Sources {
        confirmed: row.get(20)?,
        recovered: row.get(21)?,
        deaths:    row.get(22)?,
        serious:   row.get(23)?,
        num_tests: row.get(24)?,
      },
    })
  }

  pub fn into_datapoint(self) -> Result<Datapoint> {
    Ok(Datapoint {
      key:          LocationKey::from_parts(&self.country, &self.province, &self.county),
      entry_date:   decode_date(&self.entry_date)?,
      group:        self.group,
      coordinates:  decode_coordinates(self.latitude, self.longitude),
      is_first_day: self.is_first_day,
      stats:        self.stats,
      sources:      self.sources,
      update_time:  decode_dt(&self.update_time)?,
    })
  }
}

/// Raw values read directly from a `locations` row.
pub struct RawLocation {
  pub country:        String,
  pub province:       String,
  pub county:         String,
  pub latitude:       Option<f64>,
  pub longitude:      Option<f64>,
  pub show_geography: bool,
}

impl RawLocation {
  pub fn into_location(self) -> Location {
    Location {
      key:            LocationKey::from_parts(&self.country, &self.province, &self.county),
      coordinates:    decode_coordinates(self.latitude, self.longitude),
      show_geography: self.show_geography,
    }
  }
}
