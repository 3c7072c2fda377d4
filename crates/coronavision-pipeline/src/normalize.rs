//! The normaliser: turns a raw source row into an [`Observation`].
//!
//! Source adapters hand over loosely-typed JSON maps. This module fills in
//! batch defaults, canonicalises names through [`Standards`], parses numbers
//! leniently and drops rows that carry no data.

use chrono::{DateTime, NaiveDate};
use coronavision_core::{
  datapoint::Observation,
  location::{Coordinates, LocationKey},
  standards::Standards,
  stat::Stat,
};
use serde_json::Value;

use crate::{Error, Result};

/// A source row as produced by an adapter.
pub type RawRow = serde_json::Map<String, Value>;

/// Adapter field names accepted in place of the canonical ones.
const ALIASES: &[(&str, &str)] = &[
  ("admin0", "country"),
  ("admin1", "province"),
  ("admin2", "county"),
  ("total", "confirmed"),
  ("tests", "num_tests"),
  ("dead", "deaths"),
];

/// Rename aliased fields. A canonical field already present wins.
pub fn canonicalize(mut row: RawRow) -> RawRow {
  for (alias, field) in ALIASES {
    if let Some(value) = row.remove(*alias) {
      row.entry(*field).or_insert(value);
    }
  }
  row
}

/// Fill every field missing from `row` with the batch default, or with the
/// empty string for location and group fields.
pub fn fill_defaults(row: RawRow, defaults: &RawRow) -> RawRow {
  let mut row = canonicalize(row);
  for (field, value) in canonicalize(defaults.clone()) {
    row.entry(field).or_insert(value);
  }
  for field in ["country", "province", "county", "group"] {
    row
      .entry(field)
      .or_insert_with(|| Value::String(String::new()));
  }
  row
}

/// Normalise one row. Returns `Ok(None)` for rows without any nonzero stat.
///
/// `today` is used when neither the row nor the defaults carry a date.
pub fn normalize(
  row: RawRow,
  defaults: &RawRow,
  standards: &dyn Standards,
  today: NaiveDate,
) -> Result<Option<Observation>> {
  let row = fill_defaults(row, defaults);

  let country = standards.fix_country_name(&text(row.get("country")));
  let group = match standards.continent(&country) {
    continent if continent.is_empty() => text(row.get("group")),
    continent => continent,
  };
  let (country, province, county) = standards.normalize_name(
    &country,
    &text(row.get("province")),
    &text(row.get("county")),
  );

  let entry_date = match row.get("entry_date") {
    None | Some(Value::Null) => today,
    Some(value) => parse_date(value)?,
  };

  let mut obs = Observation::new(
    LocationKey::from_parts(&country, &province, &county),
    entry_date,
  );
  obs.group = group;
  obs.coordinates = coordinates(&row);
  obs.source_link = Some(text(row.get("source_link"))).filter(|s| !s.is_empty());

  for stat in Stat::ALL {
    if let Some(value) = row.get(stat.label()).and_then(parse_number) {
      obs.stats.insert(stat, value);
    }
  }

  Ok(obs.has_data().then_some(obs))
}

/// Lenient integer parse. Anything that is not a finite number, or a string
/// holding one, is treated as absent.
pub fn parse_number(value: &Value) -> Option<i64> {
  match value {
    Value::Number(n) => n
      .as_i64()
      .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
    Value::String(s) => {
      let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
      cleaned.parse::<i64>().ok().or_else(|| {
        cleaned
          .parse::<f64>()
          .ok()
          .filter(|f| f.is_finite())
          .map(|f| f as i64)
      })
    }
    _ => None,
  }
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time component.
pub fn parse_date(value: &Value) -> Result<NaiveDate> {
  let s = match value {
    Value::String(s) => s.trim(),
    other => return Err(Error::InvalidDate(other.to_string())),
  };
  if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
    return Ok(date);
  }
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.date_naive());
  }
  s.get(..10)
    .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
    .ok_or_else(|| Error::InvalidDate(s.to_owned()))
}

fn text(value: Option<&Value>) -> String {
  match value {
    Some(Value::String(s)) => s.trim().to_owned(),
    Some(Value::Number(n)) => n.to_string(),
    _ => String::new(),
  }
}

fn coordinates(row: &RawRow) -> Option<Coordinates> {
  let float = |field: &str| match row.get(field)? {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse::<f64>().ok(),
    _ => None,
  };
  Some(Coordinates {
    latitude:  float("latitude").filter(|f| f.is_finite())?,
    longitude: float("longitude").filter(|f| f.is_finite())?,
  })
}
