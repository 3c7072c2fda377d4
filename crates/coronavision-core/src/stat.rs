//! Stat labels and the fixed-shape value/source tables carried by every
//! datapoint.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

// ─── Stat ────────────────────────────────────────────────────────────────────

/// A recognised numeric field on a datapoint.
///
/// The `D*` variants are day-over-day deltas. Sources may report them
/// directly, but the delta pass recomputes them whenever a prior day exists.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
  Confirmed,
  Recovered,
  Deaths,
  Active,
  Serious,
  NumTests,
  #[serde(rename = "dconfirmed")]
  DConfirmed,
  #[serde(rename = "drecovered")]
  DRecovered,
  #[serde(rename = "ddeaths")]
  DDeaths,
  #[serde(rename = "dactive")]
  DActive,
  #[serde(rename = "dserious")]
  DSerious,
}

impl Stat {
  pub const ALL: [Stat; 11] = [
    Stat::Confirmed,
    Stat::Recovered,
    Stat::Deaths,
    Stat::Active,
    Stat::Serious,
    Stat::NumTests,
    Stat::DConfirmed,
    Stat::DRecovered,
    Stat::DDeaths,
    Stat::DActive,
    Stat::DSerious,
  ];

  /// Cumulative counts that must never go down without a force refresh.
  pub fn is_monotonic(self) -> bool {
    matches!(
      self,
      Self::Confirmed | Self::Deaths | Self::Recovered | Self::NumTests
    )
  }

  /// Stats that carry a per-field source attribution.
  pub fn is_sourced(self) -> bool {
    matches!(
      self,
      Self::Confirmed
        | Self::Recovered
        | Self::Deaths
        | Self::Serious
        | Self::NumTests
    )
  }

  /// The column / row-field name for this stat.
  pub fn label(self) -> &'static str {
    match self {
      Self::Confirmed => "confirmed",
      Self::Recovered => "recovered",
      Self::Deaths => "deaths",
      Self::Active => "active",
      Self::Serious => "serious",
      Self::NumTests => "num_tests",
      Self::DConfirmed => "dconfirmed",
      Self::DRecovered => "drecovered",
      Self::DDeaths => "ddeaths",
      Self::DActive => "dactive",
      Self::DSerious => "dserious",
    }
  }

  /// The delta field tracking day-over-day change of this stat, if any.
  pub fn delta(self) -> Option<Stat> {
    match self {
      Self::Confirmed => Some(Self::DConfirmed),
      Self::Recovered => Some(Self::DRecovered),
      Self::Deaths => Some(Self::DDeaths),
      Self::Active => Some(Self::DActive),
      Self::Serious => Some(Self::DSerious),
      _ => None,
    }
  }
}

impl fmt::Display for Stat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

impl FromStr for Stat {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Stat::ALL
      .into_iter()
      .find(|stat| stat.label() == s)
      .ok_or_else(|| Error::UnknownStat(s.to_owned()))
  }
}

// ─── Stats ───────────────────────────────────────────────────────────────────

/// Current values of every [`Stat`] on a datapoint. Missing data is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
  pub confirmed:  i64,
  pub recovered:  i64,
  pub deaths:     i64,
  pub active:     i64,
  pub serious:    i64,
  pub num_tests:  i64,
  pub dconfirmed: i64,
  pub drecovered: i64,
  pub ddeaths:    i64,
  pub dactive:    i64,
  pub dserious:   i64,
}

impl Stats {
  pub fn get(&self, stat: Stat) -> i64 {
    match stat {
      Stat::Confirmed => self.confirmed,
      Stat::Recovered => self.recovered,
      Stat::Deaths => self.deaths,
      Stat::Active => self.active,
      Stat::Serious => self.serious,
      Stat::NumTests => self.num_tests,
      Stat::DConfirmed => self.dconfirmed,
      Stat::DRecovered => self.drecovered,
      Stat::DDeaths => self.ddeaths,
      Stat::DActive => self.dactive,
      Stat::DSerious => self.dserious,
    }
  }

  pub fn set(&mut self, stat: Stat, value: i64) {
    let slot = match stat {
      Stat::Confirmed => &mut self.confirmed,
      Stat::Recovered => &mut self.recovered,
      Stat::Deaths => &mut self.deaths,
      Stat::Active => &mut self.active,
      Stat::Serious => &mut self.serious,
      Stat::NumTests => &mut self.num_tests,
      Stat::DConfirmed => &mut self.dconfirmed,
      Stat::DRecovered => &mut self.drecovered,
      Stat::DDeaths => &mut self.ddeaths,
      Stat::DActive => &mut self.dactive,
      Stat::DSerious => &mut self.dserious,
    };
    *slot = value;
  }

  /// `confirmed - deaths - recovered`.
  pub fn derived_active(&self) -> i64 {
    self.confirmed - self.deaths - self.recovered
  }
}

// ─── Sources ─────────────────────────────────────────────────────────────────

/// Source link that last moved each attributed stat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sources {
  pub confirmed: Option<String>,
  pub recovered: Option<String>,
  pub deaths:    Option<String>,
  pub serious:   Option<String>,
  pub num_tests: Option<String>,
}

impl Sources {
  pub fn get(&self, stat: Stat) -> Option<&str> {
    match stat {
      Stat::Confirmed => self.confirmed.as_deref(),
      Stat::Recovered => self.recovered.as_deref(),
      Stat::Deaths => self.deaths.as_deref(),
      Stat::Serious => self.serious.as_deref(),
      Stat::NumTests => self.num_tests.as_deref(),
      _ => None,
    }
  }

  /// Attribute `stat` to `link`. Returns `false` for unattributed stats.
  pub fn set(&mut self, stat: Stat, link: &str) -> bool {
    let slot = match stat {
      Stat::Confirmed => &mut self.confirmed,
      Stat::Recovered => &mut self.recovered,
      Stat::Deaths => &mut self.deaths,
      Stat::Serious => &mut self.serious,
      Stat::NumTests => &mut self.num_tests,
      _ => return false,
    };
    *slot = Some(link.to_owned());
    true
  }
}

// ─── Totals ──────────────────────────────────────────────────────────────────

/// The cumulative stats that roll up from children into a parent record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
  pub confirmed: i64,
  pub deaths:    i64,
  pub recovered: i64,
  pub num_tests: i64,
}

impl Totals {
  pub const STATS: [Stat; 4] =
    [Stat::Confirmed, Stat::Deaths, Stat::Recovered, Stat::NumTests];

  pub fn of(stats: &Stats) -> Self {
    Self {
      confirmed: stats.confirmed,
      deaths:    stats.deaths,
      recovered: stats.recovered,
      num_tests: stats.num_tests,
    }
  }

  pub fn get(&self, stat: Stat) -> i64 {
    match stat {
      Stat::Confirmed => self.confirmed,
      Stat::Deaths => self.deaths,
      Stat::Recovered => self.recovered,
      Stat::NumTests => self.num_tests,
      _ => 0,
    }
  }

  pub fn add(&mut self, stats: &Stats) {
    self.confirmed += stats.confirmed;
    self.deaths += stats.deaths;
    self.recovered += stats.recovered;
    self.num_tests += stats.num_tests;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn labels_parse_back() {
    for stat in Stat::ALL {
      assert_eq!(stat.label().parse::<Stat>().unwrap(), stat);
    }
    assert!("total".parse::<Stat>().is_err());
  }

  #[test]
  fn serde_names_match_labels() {
    for stat in Stat::ALL {
      let json = serde_json::to_value(stat).unwrap();
      assert_eq!(json, serde_json::Value::String(stat.label().into()));
    }
  }

  #[test]
  fn only_cumulative_counts_are_monotonic() {
    let monotonic: Vec<_> =
      Stat::ALL.into_iter().filter(|s| s.is_monotonic()).collect();
    assert_eq!(monotonic, vec![
      Stat::Confirmed,
      Stat::Recovered,
      Stat::Deaths,
      Stat::NumTests
    ]);
  }

  #[test]
  fn unsourced_stats_are_not_attributed() {
    let mut sources = Sources::default();
    assert!(!sources.set(Stat::Active, "x"));
    assert!(sources.set(Stat::Serious, "x"));
    assert_eq!(sources.get(Stat::Serious), Some("x"));
    assert_eq!(sources.get(Stat::Active), None);
  }
}
