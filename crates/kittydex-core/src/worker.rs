//! Per-range fetch loop.
//!
//! A [`FetchWorker`] owns one [`IdRange`] and one rendering session. It walks
//! the range in ascending order and moves every id through the same stages:
//!
//! ```text
//! CHECK_EXISTS ──exists──▶ SKIP
//!      │
//!      ▼
//!  FETCHING ──▶ EXTRACTING ──▶ PERSISTING ──▶ DONE
//!      │             │              │
//!      └─────────────┴──────────────┴──▶ FAILED (logged, next id)
//! ```
//!
//! Only two things stop a worker early: failing to open the session, and the
//! session reporting [`Error::SessionLost`]. In both cases the report carries
//! the first id that was not processed.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::extract::{self, capture_assets};
use crate::render::{Renderer, Session};
use crate::storage::Storage;
use crate::{Asset, Error, HarvestConfig, IdRange, RecordId, Result};

/// Step of the per-id state machine where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Looking up the completion marker.
    CheckExists,
    /// Navigating and waiting for network idle.
    Fetching,
    /// Reading the record out of the page.
    Extracting,
    /// Writing assets and the record.
    Persisting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CheckExists => "check_exists",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Persisting => "persisting",
        })
    }
}

/// What happened to one id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The record and its assets were written.
    Persisted {
        /// Number of asset objects written.
        assets: usize,
    },
    /// `{id}.json` already existed; nothing was fetched.
    Skipped,
    /// The id was abandoned for this run.
    Failed {
        /// Stage that failed.
        stage: Stage,
        /// Error category, see [`Error::category`].
        category: String,
        /// Error description.
        message: String,
        /// Assets written anyway when failed assets are kept.
        assets: usize,
    },
}

/// One failed id, as listed in a [`WorkerReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Record id.
    pub id: u64,
    /// Stage that failed.
    pub stage: Stage,
    /// Error category.
    pub category: String,
    /// Error description.
    pub message: String,
}

/// Counters for one worker run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    /// Worker index.
    pub worker: usize,
    /// Range the worker was assigned.
    pub range: IdRange,
    /// Ids whose record was written.
    pub persisted: u64,
    /// Ids skipped because their record already existed.
    pub skipped: u64,
    /// Ids that failed.
    pub failed: u64,
    /// Asset objects written.
    pub assets_written: u64,
    /// Details of every failed id.
    pub failures: Vec<ItemFailure>,
    /// Why the worker stopped early, if it did.
    pub fatal: Option<String>,
    /// First id not yet processed; equals `range.end` when the range is done.
    pub next_id: u64,
}

impl WorkerReport {
    /// Empty report for a worker about to start on `range`.
    #[must_use]
    pub const fn new(worker: usize, range: IdRange) -> Self {
        Self {
            worker,
            range,
            persisted: 0,
            skipped: 0,
            failed: 0,
            assets_written: 0,
            failures: Vec::new(),
            fatal: None,
            next_id: range.start,
        }
    }

    /// Whether the whole range was walked.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.fatal.is_none() && self.next_id >= self.range.end
    }

    /// Number of ids that were processed, whatever their outcome.
    #[must_use]
    pub const fn processed(&self) -> u64 {
        self.persisted + self.skipped + self.failed
    }

    fn record(&mut self, id: RecordId, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Persisted { assets } => {
                self.persisted += 1;
                self.assets_written += *assets as u64;
            },
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Failed {
                stage,
                category,
                message,
                assets,
            } => {
                self.failed += 1;
                self.assets_written += *assets as u64;
                self.failures.push(ItemFailure {
                    id: id.get(),
                    stage: *stage,
                    category: category.clone(),
                    message: message.clone(),
                });
            },
        }
    }

    /// Fold a resumed attempt's counters into this report.
    pub fn absorb(&mut self, later: Self) {
        self.persisted += later.persisted;
        self.skipped += later.skipped;
        self.failed += later.failed;
        self.assets_written += later.assets_written;
        self.failures.extend(later.failures);
        self.fatal = later.fatal;
        self.next_id = later.next_id;
    }
}

/// Live report of a running worker.
///
/// Updated after every id, and held outside the worker task so the
/// orchestrator can still read it if the task panics. `next_id` doubles as
/// the resume cursor: it is the first id not yet fully processed.
#[derive(Debug)]
pub struct Progress {
    report: Mutex<WorkerReport>,
}

impl Progress {
    /// Fresh progress for a worker about to start on `range`.
    #[must_use]
    pub const fn new(worker: usize, range: IdRange) -> Self {
        Self {
            report: Mutex::new(WorkerReport::new(worker, range)),
        }
    }

    /// Copy of the report as it stands.
    #[must_use]
    pub fn snapshot(&self) -> WorkerReport {
        self.update(|report| report.clone())
    }

    /// First id that has not been fully processed.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.update(|report| report.next_id)
    }

    // Every update leaves the report whole, so a poisoned lock is still
    // safe to read.
    fn update<R>(&self, f: impl FnOnce(&mut WorkerReport) -> R) -> R {
        let mut report = self.report.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut report)
    }
}

/// Walks one id range with a dedicated rendering session.
pub struct FetchWorker {
    index: usize,
    range: IdRange,
    storage: Arc<dyn Storage>,
    renderer: Arc<dyn Renderer>,
    config: Arc<HarvestConfig>,
    progress: Arc<Progress>,
}

impl FetchWorker {
    /// Create a worker for `range`.
    #[must_use]
    pub fn new(
        index: usize,
        range: IdRange,
        storage: Arc<dyn Storage>,
        renderer: Arc<dyn Renderer>,
        config: Arc<HarvestConfig>,
    ) -> Self {
        Self {
            index,
            range,
            storage,
            renderer,
            config,
            progress: Arc::new(Progress::new(index, range)),
        }
    }

    /// Handle on the worker's live report.
    #[must_use]
    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    /// Walk the whole range.
    ///
    /// Per-id failures are recorded in the report. A fatal session failure
    /// ends the walk early with [`WorkerReport::fatal`] set.
    pub async fn run(self) -> WorkerReport {
        let span = info_span!("worker", worker = self.index, range = %self.range);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(self) -> WorkerReport {
        if self.range.is_empty() {
            debug!("empty range; nothing to do");
            self.progress.update(|report| report.next_id = self.range.end);
            return self.progress.snapshot();
        }

        let mut session = match self.renderer.open().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "failed to open rendering session");
                let fatal = self.fatal(&e);
                self.progress.update(|report| report.fatal = Some(fatal));
                return self.progress.snapshot();
            },
        };

        info!(storage = %self.storage.describe(), "worker started");
        for id in self.range.ids() {
            match self.process(session.as_mut(), id).await {
                Ok(outcome) => self.progress.update(|report| {
                    report.record(id, &outcome);
                    report.next_id = id.get() + 1;
                }),
                Err(e) => {
                    warn!(id = %id, error = %e, "session lost; stopping worker");
                    let fatal = self.fatal(&e);
                    self.progress.update(|report| report.fatal = Some(fatal));
                    break;
                },
            }
        }

        if let Err(e) = session.close().await {
            warn!(error = %e, "failed to close rendering session");
        }
        let report = self.progress.snapshot();
        info!(
            persisted = report.persisted,
            skipped = report.skipped,
            failed = report.failed,
            "worker finished"
        );
        report
    }

    fn fatal(&self, cause: &Error) -> String {
        Error::WorkerFatal {
            worker: self.index,
            reason: cause.to_string(),
        }
        .to_string()
    }

    /// Move one id through the state machine.
    ///
    /// Returns `Err` only for worker-fatal errors.
    async fn process(&self, session: &mut dyn Session, id: RecordId) -> Result<ItemOutcome> {
        let record_key = id.record_key();

        match self.storage.exists(&record_key).await {
            Ok(true) => {
                debug!(id = %id, "record exists; skipping");
                return Ok(ItemOutcome::Skipped);
            },
            Ok(false) => {},
            Err(e) => return Ok(failed(id, Stage::CheckExists, &e, 0)),
        }

        let url = self.config.record_url(id);
        if let Err(e) = session.navigate(&url).await {
            if e.is_worker_fatal() {
                return Err(e);
            }
            return Ok(failed(id, Stage::Fetching, &e, 0));
        }

        let extraction = match extract::extract(session).await {
            Ok(extraction) => extraction,
            Err(e) if e.is_worker_fatal() => return Err(e),
            Err(e) => {
                let mut kept = 0;
                if self.config.keep_failed_assets {
                    let assets = capture_assets(session.observed_responses());
                    kept = self.write_assets(id, &assets).await.unwrap_or_else(|(n, _)| n);
                }
                return Ok(failed(id, Stage::Extracting, &e, kept));
            },
        };

        let assets = match self.write_assets(id, &extraction.assets).await {
            Ok(n) => n,
            Err((n, e)) => return Ok(failed(id, Stage::Persisting, &e, n)),
        };

        let bytes = match extraction.record.to_json_bytes() {
            Ok(bytes) => bytes,
            Err(e) => return Ok(failed(id, Stage::Persisting, &e, assets)),
        };
        if let Err(e) = self.storage.put(&record_key, &bytes).await {
            return Ok(failed(id, Stage::Persisting, &e, assets));
        }

        info!(id = %id, assets, "persisted record");
        Ok(ItemOutcome::Persisted { assets })
    }

    /// Write each distinct asset key once, first observed wins.
    ///
    /// On failure returns how many objects were written before the error.
    async fn write_assets(
        &self,
        id: RecordId,
        assets: &[Asset],
    ) -> std::result::Result<usize, (usize, Error)> {
        let mut seen = HashSet::new();
        let mut written = 0;
        for asset in assets {
            let key = id.asset_key(asset.kind);
            if !seen.insert(key.clone()) {
                debug!(key, source = %asset.source_url, "duplicate asset ignored");
                continue;
            }
            self.storage
                .put(&key, &asset.bytes)
                .await
                .map_err(|e| (written, e))?;
            written += 1;
        }
        Ok(written)
    }
}

fn failed(id: RecordId, stage: Stage, err: &Error, assets: usize) -> ItemOutcome {
    warn!(id = %id, %stage, category = err.category(), error = %err, "record failed");
    ItemOutcome::Failed {
        stage,
        category: err.category().to_string(),
        message: err.to_string(),
        assets,
    }
}
