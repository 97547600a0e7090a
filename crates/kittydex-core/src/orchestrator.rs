//! Parallel worker fan-out and run summaries.
//!
//! The orchestrator partitions the requested interval, starts one
//! [`FetchWorker`] per range as its own tokio task, and waits for all of them.
//! Workers share nothing but the storage and renderer handles.
//!
//! A worker that dies, whether from a lost session or a panic, is logged and
//! its siblings keep going. With `max_restarts > 0` the dead worker is
//! relaunched from its last published progress; the dedup check makes
//! re-running an id harmless. Counters of an attempt that panicked are kept up
//! to the id it died on.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

use crate::render::Renderer;
use crate::storage::Storage;
use crate::worker::{FetchWorker, ItemFailure, Progress, WorkerReport};
use crate::{HarvestConfig, IdRange, Result, partition};

/// How a worker's range ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerOutcome {
    /// Every id in the range was processed.
    Completed,
    /// The worker died and was not (or no longer) restarted.
    Crashed {
        /// First id that was not processed.
        resume_from: u64,
        /// Why the last attempt died.
        reason: String,
    },
}

/// Final state of one worker slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSummary {
    /// Worker index.
    pub worker: usize,
    /// Assigned range.
    pub range: IdRange,
    /// Completion state.
    pub outcome: WorkerOutcome,
    /// Relaunches performed for this slot.
    pub restarts: u32,
    /// Counters accumulated across all attempts.
    pub report: WorkerReport,
}

/// Totals across all workers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Records written.
    pub persisted: u64,
    /// Ids skipped because their record existed.
    pub skipped: u64,
    /// Ids that failed.
    pub failed: u64,
    /// Asset objects written.
    pub assets_written: u64,
    /// Workers that ended crashed.
    pub crashed_workers: usize,
}

/// Result of one orchestrated run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    /// First requested id.
    pub start: u64,
    /// One past the last requested id.
    pub end: u64,
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// When the last worker finished.
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: u64,
    /// Per-worker results, ordered by worker index.
    pub workers: Vec<WorkerSummary>,
    /// Aggregated counters.
    pub totals: Totals,
}

impl Summary {
    /// Whether every worker completed and no id failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.totals.failed == 0 && self.totals.crashed_workers == 0
    }

    /// Every failed id across workers, in worker order.
    pub fn failures(&self) -> impl Iterator<Item = &ItemFailure> {
        self.workers.iter().flat_map(|w| w.report.failures.iter())
    }
}

/// Per-slot bookkeeping while workers run.
struct Slot {
    range: IdRange,
    /// Live report of the slot's current attempt.
    progress: Arc<Progress>,
    restarts: u32,
    report: Option<WorkerReport>,
    outcome: Option<WorkerOutcome>,
}

/// Runs a harvest across parallel workers.
pub struct Orchestrator {
    storage: Arc<dyn Storage>,
    renderer: Arc<dyn Renderer>,
    config: Arc<HarvestConfig>,
}

impl Orchestrator {
    /// Create an orchestrator over shared backends.
    #[must_use]
    pub fn new(
        storage: Arc<dyn Storage>,
        renderer: Arc<dyn Renderer>,
        config: HarvestConfig,
    ) -> Self {
        Self {
            storage,
            renderer,
            config: Arc::new(config),
        }
    }

    /// Harvest `[start, end)` with `worker_count` parallel workers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) when the
    /// interval cannot be partitioned; no worker is started in that case.
    /// Failures after that point are reported in the [`Summary`].
    pub async fn run(&self, start: u64, end: u64, worker_count: usize) -> Result<Summary> {
        let ranges = partition(start, end, worker_count)?;
        let started_at = Utc::now();
        let clock = Instant::now();
        info!(
            start,
            end,
            workers = worker_count,
            storage = %self.storage.describe(),
            "starting harvest"
        );

        let mut tasks = JoinSet::new();
        let mut task_slots = HashMap::new();
        let mut slots: Vec<Slot> = ranges
            .iter()
            .enumerate()
            .map(|(index, range)| Slot {
                range: *range,
                progress: self.spawn(&mut tasks, &mut task_slots, index, *range),
                restarts: 0,
                report: None,
                outcome: None,
            })
            .collect();

        while let Some(joined) = tasks.join_next_with_id().await {
            let (index, attempt) = match joined {
                Ok((task_id, report)) => (task_slots.remove(&task_id), Ok(report)),
                Err(err) => (task_slots.remove(&err.id()), Err(err)),
            };
            let Some(index) = index else {
                warn!("finished task has no worker slot");
                continue;
            };

            let slot = &mut slots[index];
            let (report, reason) = match attempt {
                Ok(report) => {
                    let reason = report.fatal.clone();
                    (report, reason)
                },
                Err(err) => {
                    let reason = panic_reason(err);
                    error!(worker = index, reason = %reason, "worker panicked");
                    // Counters up to the id that panicked survive in the
                    // shared progress.
                    let mut report = slot.progress.snapshot();
                    report.fatal = Some(reason.clone());
                    (report, Some(reason))
                },
            };
            let resume_from = report.next_id;
            absorb(&mut slot.report, report);

            match reason {
                None => slot.outcome = Some(WorkerOutcome::Completed),
                Some(reason) if slot.restarts < self.config.max_restarts => {
                    slot.restarts += 1;
                    let tail = slot.range.resume_from(resume_from);
                    warn!(
                        worker = index,
                        restart = slot.restarts,
                        resume_from,
                        reason = %reason,
                        "restarting worker"
                    );
                    slot.progress = self.spawn(&mut tasks, &mut task_slots, index, tail);
                },
                Some(reason) => {
                    error!(worker = index, resume_from, reason = %reason, "worker crashed");
                    slot.outcome = Some(WorkerOutcome::Crashed {
                        resume_from,
                        reason,
                    });
                },
            }
        }

        let summary = build_summary(start, end, started_at, clock, slots);
        info!(
            persisted = summary.totals.persisted,
            skipped = summary.totals.skipped,
            failed = summary.totals.failed,
            crashed = summary.totals.crashed_workers,
            elapsed_ms = summary.elapsed_ms,
            "harvest finished"
        );
        Ok(summary)
    }

    fn spawn(
        &self,
        tasks: &mut JoinSet<WorkerReport>,
        task_slots: &mut HashMap<tokio::task::Id, usize>,
        index: usize,
        range: IdRange,
    ) -> Arc<Progress> {
        let worker = FetchWorker::new(
            index,
            range,
            Arc::clone(&self.storage),
            Arc::clone(&self.renderer),
            Arc::clone(&self.config),
        );
        let progress = worker.progress();
        let handle = tasks.spawn(worker.run());
        task_slots.insert(handle.id(), index);
        progress
    }
}

/// Merge an attempt into the slot's running report.
fn absorb(current: &mut Option<WorkerReport>, attempt: WorkerReport) {
    match current {
        Some(report) => report.absorb(attempt),
        None => *current = Some(attempt),
    }
}

fn panic_reason(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .map_or_else(|| "worker panicked".to_string(), |msg| format!("panicked: {msg}"))
}

fn build_summary(
    start: u64,
    end: u64,
    started_at: DateTime<Utc>,
    clock: Instant,
    slots: Vec<Slot>,
) -> Summary {
    let mut totals = Totals::default();
    let workers: Vec<WorkerSummary> = slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            let report = slot
                .report
                .unwrap_or_else(|| WorkerReport::new(index, slot.range));
            let outcome = slot.outcome.unwrap_or_else(|| WorkerOutcome::Crashed {
                resume_from: report.next_id,
                reason: "worker did not report".to_string(),
            });
            totals.persisted += report.persisted;
            totals.skipped += report.skipped;
            totals.failed += report.failed;
            totals.assets_written += report.assets_written;
            if matches!(outcome, WorkerOutcome::Crashed { .. }) {
                totals.crashed_workers += 1;
            }
            WorkerSummary {
                worker: index,
                range: slot.range,
                outcome,
                restarts: slot.restarts,
                report,
            }
        })
        .collect();

    Summary {
        start,
        end,
        started_at,
        finished_at: Utc::now(),
        elapsed_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
        workers,
        totals,
    }
}
