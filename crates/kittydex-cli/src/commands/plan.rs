//! `kittydex plan`: show the partition without fetching anything.

use anyhow::Result;
use kittydex_core::{HarvestConfig, partition};
use serde::Serialize;

use crate::cli::OutputFormat;

#[derive(Serialize)]
struct PlannedRange {
    worker: usize,
    start: u64,
    end: u64,
    len: u64,
}

/// Print the ranges each worker would own.
pub fn print_plan(config: &HarvestConfig, format: OutputFormat) -> Result<()> {
    let ranges = partition(config.start_id, config.stop_id, config.workers)?;
    let planned: Vec<PlannedRange> = ranges
        .iter()
        .enumerate()
        .map(|(worker, range)| PlannedRange {
            worker,
            start: range.start,
            end: range.end,
            len: range.len(),
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&planned)?),
        OutputFormat::Text => {
            for range in &planned {
                println!(
                    "worker {}: [{}, {}) {} ids",
                    range.worker, range.start, range.end, range.len
                );
            }
        },
    }
    Ok(())
}
