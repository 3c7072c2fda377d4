//! Selector paths over JSON documents.
//!
//! A selector is a list of segments applied left to right. Plain segments
//! index into objects (by key) or arrays (by position). Segments starting
//! with `::` transform the current value instead, e.g.
//! `["attributes", "Confirmed", "::number"]`.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use coronavision_core::standards::Standards;
use coronavision_pipeline::RawRow;
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};

/// How a `json` or `json_file` source maps a document to rows.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractArgs {
  /// Path to the row list (or a single row object).
  #[serde(default = "default_namespace")]
  pub namespace: Vec<String>,
  /// Output field name to selector path.
  pub labels:    BTreeMap<String, Vec<String>>,
  /// Every rule must hold for a row to be kept.
  #[serde(default)]
  pub allow:     Vec<AllowRule>,
}

fn default_namespace() -> Vec<String> { vec!["features".to_owned()] }

/// `[selector, value, "==" | "!="]`.
#[derive(Debug, Clone, Deserialize)]
pub struct AllowRule(pub Vec<String>, pub Value, pub Comparison);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Comparison {
  #[serde(rename = "==")]
  Eq,
  #[serde(rename = "!=")]
  Ne,
}

impl AllowRule {
  /// `Ok(None)` when the selector does not resolve in `row`.
  fn check(&self, row: &Value, standards: &dyn Standards) -> Result<Option<bool>> {
    let AllowRule(selector, expected, comparison) = self;
    let Some(found) = find(row, selector, standards)? else {
      return Ok(None);
    };
    Ok(Some(match comparison {
      Comparison::Eq => &found == expected,
      Comparison::Ne => &found != expected,
    }))
  }
}

// ─── Extraction ──────────────────────────────────────────────────────────────

/// Extract rows from `document`.
///
/// Rows whose allow rules reference a missing field are skipped, and labels
/// whose selector is missing or resolves to `null` are left out of the row.
pub fn extract(
  document: &Value,
  args: &ExtractArgs,
  standards: &dyn Standards,
) -> Result<Vec<RawRow>> {
  let content = find(document, &args.namespace, standards)?.ok_or_else(|| {
    Error::Selector(format!("namespace {:?} not found", args.namespace))
  })?;

  let items = match content {
    Value::Array(items) => items,
    single => return Ok(vec![extract_row(&single, &args.labels, standards)?]),
  };

  let mut rows = Vec::with_capacity(items.len());
  'rows: for item in &items {
    for rule in &args.allow {
      match rule.check(item, standards)? {
        Some(true) => {}
        Some(false) => continue 'rows,
        None => {
          tracing::trace!(selector = ?rule.0, "allow rule field missing, skipping row");
          continue 'rows;
        }
      }
    }
    rows.push(extract_row(item, &args.labels, standards)?);
  }
  Ok(rows)
}

fn extract_row(
  item: &Value,
  labels: &BTreeMap<String, Vec<String>>,
  standards: &dyn Standards,
) -> Result<RawRow> {
  let mut row = RawRow::new();
  for (label, selector) in labels {
    match find(item, selector, standards)? {
      None | Some(Value::Null) => {}
      Some(value) => {
        row.insert(label.clone(), value);
      }
    }
  }
  Ok(row)
}

/// Walk `selector` from `head`. `Ok(None)` means a plain segment missed.
pub fn find(head: &Value, selector: &[String], standards: &dyn Standards) -> Result<Option<Value>> {
  let mut current = head.clone();
  for segment in selector {
    current = if let Some(name) = segment.strip_prefix("::") {
      transform(name, current, standards)?
    } else {
      let next = match &current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
      };
      match next {
        Some(v) => v.clone(),
        None => return Ok(None),
      }
    };
  }
  Ok(Some(current))
}

// ─── Transforms ──────────────────────────────────────────────────────────────

fn transform(name: &str, value: Value, standards: &dyn Standards) -> Result<Value> {
  let fail = |value: &Value| Error::Transform {
    name:  name.to_owned(),
    value: value.to_string(),
  };

  let out = match name {
    "number" => Value::from(number(&value).ok_or_else(|| fail(&value))?),
    "str" => Value::String(match &value {
      Value::String(s) => s.clone(),
      other => other.to_string(),
    }),
    "strip" => Value::String(text(&value).ok_or_else(|| fail(&value))?.trim().to_owned()),
    "cap" => Value::String(capitalize(text(&value).ok_or_else(|| fail(&value))?)),
    "ymd" => reformat_date(&value, "%Y%m%d").ok_or_else(|| fail(&value))?,
    "dmy" => reformat_date(&value, "%d%m%Y").ok_or_else(|| fail(&value))?,
    "date_t" => text(&value)
      .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok())
      .map(|dt| iso_date(dt.date()))
      .ok_or_else(|| fail(&value))?,
    "unixtime" => value
      .as_i64()
      .or_else(|| value.as_f64().map(|f| f as i64))
      .and_then(|millis| DateTime::from_timestamp(millis.div_euclid(1000), 0))
      .map(|dt| iso_date(dt.date_naive()))
      .ok_or_else(|| fail(&value))?,
    "us_state_code" => {
      let code = text(&value).ok_or_else(|| fail(&value))?;
      standards
        .admin1_name("United States", code)
        .map_or(Value::Null, Value::String)
    }
    _ => return Err(Error::UnknownTransform(name.to_owned())),
  };
  Ok(out)
}

fn text(value: &Value) -> Option<&str> { value.as_str() }

fn iso_date(d: NaiveDate) -> Value { Value::String(d.format("%Y-%m-%d").to_string()) }

fn reformat_date(value: &Value, format: &str) -> Option<Value> {
  let s = match value {
    Value::String(s) => s.clone(),
    Value::Number(n) => n.to_string(),
    _ => return None,
  };
  NaiveDate::parse_from_str(&s, format).ok().map(iso_date)
}

/// First character upper-cased, the rest lower-cased.
fn capitalize(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
    None => String::new(),
  }
}

/// Lenient count parsing for scraped text.
///
/// Numbers pass through (floats truncated). Strings are trimmed, cut at the
/// first whitespace, stripped of `, + . *` and parsed; anything unparsable
/// is 0. Other JSON types have no numeric reading.
pub fn number(value: &Value) -> Option<i64> {
  match value {
    Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
    Value::String(s) => {
      let token = s.split_whitespace().next().unwrap_or_default();
      let digits: String = token.chars().filter(|c| !matches!(c, ',' | '+' | '.' | '*')).collect();
      Some(digits.parse().unwrap_or(0))
    }
    _ => None,
  }
}
