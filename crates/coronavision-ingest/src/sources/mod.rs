//! Source adapters. Each turns one [`DataSource`] into raw rows for the
//! pipeline's normalizer.

mod json;
pub mod select;

use std::{sync::Arc, time::Duration};

use chrono::NaiveDate;
use coronavision_core::standards::Standards;
use coronavision_pipeline::RawRow;

use crate::{
  Result,
  registry::{DataSource, Method},
};

pub use json::{JsonArgs, JsonFileArgs};

/// Everything an adapter needs besides its own arguments.
#[derive(Clone)]
pub struct FetchContext {
  pub client:    reqwest::Client,
  pub standards: Arc<dyn Standards>,
  /// The day date-templated URLs are expanded with.
  pub today:     NaiveDate,
}

impl FetchContext {
  pub fn new(
    standards: Arc<dyn Standards>,
    timeout: Duration,
    today: NaiveDate,
  ) -> Result<Self> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { client, standards, today })
  }
}

/// Fetch the rows of `source`, before disallow filtering.
pub async fn fetch(source: &DataSource, ctx: &FetchContext) -> Result<Vec<RawRow>> {
  match source.method {
    Method::Json => {
      let args: JsonArgs = serde_json::from_value(source.args.clone())?;
      json::fetch_url(&args, ctx).await
    }
    Method::JsonFile => {
      let args: JsonFileArgs = serde_json::from_value(source.args.clone())?;
      json::read_file(&args, ctx).await
    }
    Method::UpdateAllDeltas => Ok(Vec::new()),
  }
}
