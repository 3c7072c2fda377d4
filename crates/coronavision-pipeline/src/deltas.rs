//! Day-over-day deltas.

use std::collections::HashMap;

use chrono::NaiveDate;
use coronavision_core::{
  location::LocationKey,
  stat::{Stat, Stats},
  store::{RecordFilter, RecordStore},
};

use crate::{Error, Result};

/// Stats whose delta is recomputed against the previous day.
const TRACKED: [(Stat, Stat); 4] = [
  (Stat::Active, Stat::DActive),
  (Stat::Confirmed, Stat::DConfirmed),
  (Stat::Deaths, Stat::DDeaths),
  (Stat::Recovered, Stat::DRecovered),
];

/// The first day any source has data for.
pub fn history_start() -> NaiveDate {
  NaiveDate::from_ymd_opt(2020, 1, 22).unwrap_or(NaiveDate::MIN)
}

/// Recompute `active` and the tracked deltas for every record on `day`.
///
/// A record with no counterpart on the previous calendar day keeps whatever
/// deltas it already has. Returns the number of records rewritten.
pub fn update_deltas<S: RecordStore>(store: &mut S, day: NaiveDate) -> Result<usize> {
  let today = store.find(&RecordFilter::on(day)).map_err(Error::store)?;
  let yesterday: HashMap<LocationKey, Stats> = match day.pred_opt() {
    Some(prev) => store
      .find(&RecordFilter::on(prev))
      .map_err(Error::store)?
      .into_iter()
      .map(|dp| (dp.key, dp.stats))
      .collect(),
    None => HashMap::new(),
  };

  let mut written = 0;
  for mut dp in today {
    let before = dp.stats;

    dp.stats.active = dp.stats.derived_active();
    if let Some(prev) = yesterday.get(&dp.key) {
      for (stat, delta) in TRACKED {
        dp.stats.set(delta, dp.stats.get(stat) - prev.get(stat));
      }
    }

    if dp.stats != before {
      store.put(&dp).map_err(Error::store)?;
      written += 1;
    }
  }

  tracing::debug!(%day, written, "deltas updated");
  Ok(written)
}

/// Run [`update_deltas`] for every day from `from` to `to` inclusive, in
/// order, so each day sees the already-updated previous one.
pub fn update_all_deltas<S: RecordStore>(
  store: &mut S,
  from: NaiveDate,
  to: NaiveDate,
) -> Result<usize> {
  let mut written = 0;
  for day in from.iter_days().take_while(|day| *day <= to) {
    written += update_deltas(store, day)?;
  }
  tracing::info!(%from, %to, written, "recomputed deltas");
  Ok(written)
}
