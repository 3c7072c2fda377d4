//! The `json` and `json_file` adapters.

use std::path::PathBuf;

use chrono::format::{Item, StrftimeItems};
use coronavision_pipeline::RawRow;
use serde::Deserialize;
use serde_json::Value;

use super::{
  FetchContext,
  select::{ExtractArgs, extract},
};
use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct JsonArgs {
  pub url:         String,
  /// Expand strftime placeholders in `url` with today's date.
  #[serde(default)]
  pub use_datestr: bool,
  #[serde(flatten)]
  pub extract:     ExtractArgs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonFileArgs {
  pub path:    PathBuf,
  #[serde(flatten)]
  pub extract: ExtractArgs,
}

pub async fn fetch_url(args: &JsonArgs, ctx: &FetchContext) -> Result<Vec<RawRow>> {
  let url = if args.use_datestr {
    expand_date(&args.url, ctx)?
  } else {
    args.url.clone()
  };

  tracing::debug!(%url, "fetching");
  let document: Value = ctx
    .client
    .get(&url)
    .send()
    .await?
    .error_for_status()?
    .json()
    .await?;

  extract(&document, &args.extract, ctx.standards.as_ref())
}

pub async fn read_file(args: &JsonFileArgs, ctx: &FetchContext) -> Result<Vec<RawRow>> {
  let text = tokio::fs::read_to_string(&args.path)
    .await
    .map_err(|source| Error::Io { path: args.path.clone(), source })?;
  let document: Value = serde_json::from_str(&text)?;
  extract(&document, &args.extract, ctx.standards.as_ref())
}

/// Format `template` as a strftime pattern for `ctx.today`.
fn expand_date(template: &str, ctx: &FetchContext) -> Result<String> {
  let items: Vec<Item<'_>> = StrftimeItems::new(template).collect();
  if items.iter().any(|item| matches!(item, Item::Error)) {
    return Err(Error::InvalidTemplate(template.to_owned()));
  }
  Ok(ctx.today.format_with_items(items.into_iter()).to_string())
}
