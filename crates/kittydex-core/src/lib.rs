//! # kittydex-core
//!
//! Core pipeline for kittydex: a partitioned, idempotent harvester for records
//! that are only visible after full page rendering.
//!
//! The record id space `[start, end)` is split across parallel workers. Each
//! worker walks its own range in ascending order, skips ids that already have
//! a stored `{id}.json`, renders the record's page, extracts the owner,
//! generation and genome, and persists the captured image assets followed by
//! the JSON record.
//!
//! ## Architecture
//!
//! - **Partitioning**: [`partition`] splits the id space into contiguous ranges
//! - **Storage**: the [`Storage`] trait over a local directory or an S3 bucket
//! - **Rendering**: the [`Renderer`]/[`Session`] traits, with a headless
//!   Chromium backend behind the `chromium` feature
//! - **Extraction**: [`extract::extract`] turns a rendered page into a [`Record`]
//! - **Workers**: [`FetchWorker`] runs the per-id state machine
//! - **Orchestration**: [`Orchestrator`] fans workers out and collects a [`Summary`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kittydex_core::{HarvestConfig, Orchestrator, storage};
//!
//! # async fn example(renderer: Arc<dyn kittydex_core::Renderer>) -> kittydex_core::Result<()> {
//! let config = HarvestConfig::default();
//! config.validate()?;
//! let storage = storage::from_config(&config)?;
//!
//! let orchestrator = Orchestrator::new(storage, renderer, config.clone());
//! let summary = orchestrator.run(config.start_id, config.stop_id, config.workers).await?;
//! println!("persisted {} records", summary.totals.persisted);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`]. Per-record failures never
//! surface from [`Orchestrator::run`]; they are logged and counted in the
//! [`Summary`]. Only configuration problems abort a run.

/// Harvest configuration, defaults and file loading
pub mod config;
/// Error types and result aliases
pub mod error;
/// Turning a rendered page into a record and its assets
pub mod extract;
/// Parallel worker fan-out and run summaries
pub mod orchestrator;
/// Splitting the record id space across workers
pub mod partition;
/// Rendering engine capability
pub mod render;
/// Object storage backends
pub mod storage;
/// Core data types
pub mod types;
/// Per-range fetch loop
pub mod worker;

// Re-export commonly used types
pub use config::{Credentials, Environment, HarvestConfig, RenderOptions};
pub use error::{Error, ExtractError, Result, StorageError};
pub use extract::{Extraction, assemble_genome};
pub use orchestrator::{Orchestrator, Summary, Totals, WorkerOutcome, WorkerSummary};
pub use partition::{IdRange, partition};
pub use render::{ObservedResponse, Renderer, Session};
pub use storage::{LocalStorage, ObjectStorage, RemoteStorageConfig, Storage};
pub use types::*;
pub use worker::{FetchWorker, ItemOutcome, Progress, Stage, WorkerReport};
