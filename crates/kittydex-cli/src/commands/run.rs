//! `kittydex run`: harvest the configured range.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use kittydex_core::render::chromium::ChromiumRenderer;
use kittydex_core::{HarvestConfig, Orchestrator, Renderer, Summary, WorkerOutcome, storage};
use tracing::info;

use crate::cli::OutputFormat;

/// Validate the configuration, run the orchestrator and print its summary.
pub async fn run_harvest(config: HarvestConfig, format: OutputFormat) -> Result<()> {
    config.validate()?;
    let storage = storage::from_config(&config).context("setting up storage")?;
    let renderer: Arc<dyn Renderer> = Arc::new(ChromiumRenderer::new(config.render.clone()));

    info!(
        environment = %config.environment,
        start = config.start_id,
        stop = config.stop_id,
        workers = config.workers,
        "harvest configured"
    );

    let (start, stop, workers) = (config.start_id, config.stop_id, config.workers);
    let summary = Orchestrator::new(storage, renderer, config)
        .run(start, stop, workers)
        .await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => print_summary(&summary),
    }
    Ok(())
}

fn print_summary(summary: &Summary) {
    let totals = &summary.totals;
    let headline = format!(
        "Harvested [{}, {}) in {:.1}s",
        summary.start,
        summary.end,
        Duration::from_millis(summary.elapsed_ms).as_secs_f64()
    );
    if summary.is_clean() {
        println!("{}", headline.green().bold());
    } else {
        println!("{}", headline.yellow().bold());
    }
    println!(
        "  persisted {}  skipped {}  failed {}  assets {}",
        totals.persisted, totals.skipped, totals.failed, totals.assets_written
    );

    for worker in &summary.workers {
        let status = match &worker.outcome {
            WorkerOutcome::Completed => "completed".green().to_string(),
            WorkerOutcome::Crashed {
                resume_from,
                reason,
            } => format!("{} at {resume_from}: {reason}", "crashed".red()),
        };
        let restarts = if worker.restarts > 0 {
            format!(" after {} restart(s)", worker.restarts)
        } else {
            String::new()
        };
        println!(
            "  worker {} {}: {}{}",
            worker.worker, worker.range, status, restarts
        );
    }

    let failures: Vec<_> = summary.failures().collect();
    if !failures.is_empty() {
        println!("{}", "Failed ids:".bold());
        for failure in failures {
            println!(
                "  {} [{}] {}",
                failure.id,
                failure.stage,
                failure.message.dimmed()
            );
        }
    }
}
