//! `kittydex missing`: ids in the range without a stored record.

use anyhow::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use kittydex_core::{HarvestConfig, IdRange, RecordId, storage};
use serde_json::json;

use crate::cli::OutputFormat;

/// Existence checks in flight at once.
const LOOKUP_CONCURRENCY: usize = 16;

/// Print every id in `[start, stop)` lacking `{id}.json`, in ascending order.
pub async fn list_missing(config: &HarvestConfig, format: OutputFormat) -> Result<()> {
    config.validate()?;
    let storage = storage::from_config(config)?;
    let range = IdRange::new(config.start_id, config.stop_id);

    let missing: Vec<u64> = stream::iter(range.ids())
        .map(|id: RecordId| {
            let storage = storage.clone();
            async move {
                let present = storage.exists(&id.record_key()).await?;
                Ok::<_, kittydex_core::Error>((!present).then_some(id.get()))
            }
        })
        .buffered(LOOKUP_CONCURRENCY)
        .try_filter_map(|id| async move { Ok(id) })
        .try_collect()
        .await?;

    match format {
        OutputFormat::Json => {
            let body = json!({
                "start": range.start,
                "end": range.end,
                "checked": range.len(),
                "missing": missing,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        },
        OutputFormat::Text => {
            for id in &missing {
                println!("{id}");
            }
            eprintln!("{} of {} ids missing", missing.len(), range.len());
        },
    }
    Ok(())
}
