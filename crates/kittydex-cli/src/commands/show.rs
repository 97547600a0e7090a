//! `kittydex show`: print a stored record and the assets stored with it.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use kittydex_core::{AssetKind, HarvestConfig, Record, RecordId, storage};
use serde_json::json;

use crate::cli::OutputFormat;

/// Print record `id` from the configured storage.
pub async fn show_record(config: &HarvestConfig, id: u64, format: OutputFormat) -> Result<()> {
    config.validate()?;
    let storage = storage::from_config(config)?;
    let id = RecordId(id);
    let key = id.record_key();

    if !storage.exists(&key).await? {
        bail!("no record stored for {id} in {}", storage.describe());
    }
    let bytes = storage.get(&key).await?;
    let record = Record::from_json_bytes(&bytes).with_context(|| format!("parsing {key}"))?;

    let mut assets = Vec::new();
    for kind in [AssetKind::Vector, AssetKind::Image] {
        let asset_key = id.asset_key(kind);
        if storage.exists(&asset_key).await? {
            assets.push(asset_key);
        }
    }

    match format {
        OutputFormat::Json => {
            let body = json!({
                "id": id,
                "record": record,
                "assets": assets,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        },
        OutputFormat::Text => {
            println!("{} {}", "Record".bold(), id.to_string().cyan());
            println!("  owner: {}", record.owner);
            println!("  gen:   {}", record.generation);
            println!("  genes: {}", record.genome_hex);
            if assets.is_empty() {
                println!("  assets: {}", "none".dimmed());
            } else {
                println!("  assets: {}", assets.join(", "));
            }
        },
    }
    Ok(())
}
