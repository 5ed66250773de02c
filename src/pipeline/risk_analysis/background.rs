//! Recurring worker loop.
//!
//! Each cycle opens the database, runs [`run_cycle`], then sleeps for the
//! cycle interval. A cycle that fails as a whole is followed by the shorter
//! fatal cooldown instead. Bounded runs stop after `max_cycles` without a
//! final sleep; continuous runs (`max_cycles = 0`) stop on shutdown only.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::AnalysisError;
use super::runner::{run_cycle, PipelineContext};
use super::types::{CyclePhase, CycleReport};
use crate::config::WorkerConfig;
use crate::db::open_database;

/// Sleep granularity for shutdown responsiveness (5 seconds).
const SLEEP_GRANULARITY: Duration = Duration::from_secs(5);

/// Totals over a worker run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerSummary {
    pub cycles: u32,
    pub failed_cycles: u32,
    pub analyzed: usize,
    pub failed: usize,
    pub archived: usize,
}

impl WorkerSummary {
    fn record(&mut self, report: &CycleReport) {
        self.analyzed += report.analyzed;
        self.failed += report.failed;
        self.archived += report.archived;
    }
}

/// Handle for the worker task.
///
/// Dropping it requests shutdown; the in-flight candidate still completes.
pub struct WorkerHandle {
    shutdown: Arc<AtomicBool>,
    task: Option<tokio::task::JoinHandle<Result<WorkerSummary, AnalysisError>>>,
}

impl WorkerHandle {
    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Wait for the worker to exit. Cancel-safe: dropping the future leaves
    /// the worker running and the handle usable.
    pub async fn wait(
        &mut self,
    ) -> Result<Result<WorkerSummary, AnalysisError>, tokio::task::JoinError> {
        let Some(task) = self.task.as_mut() else {
            return Ok(Ok(WorkerSummary::default()));
        };
        let result = task.await;
        self.task = None;
        result
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Start the worker on tokio's blocking pool.
///
/// The pipeline context, and with it every HTTP client, is built on the
/// worker thread.
pub fn spawn_worker(config: WorkerConfig) -> WorkerHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();

    let task = tokio::task::spawn_blocking(move || {
        let ctx = PipelineContext::from_config(&config, flag)?;
        tracing::info!(
            backends = %config.chain_description(),
            batch_size = config.batch_size,
            interval_secs = config.cycle_interval.as_secs(),
            max_cycles = config.max_cycles,
            "Risk analysis worker started"
        );
        Ok(run_worker(&config, &ctx))
    });

    WorkerHandle {
        shutdown,
        task: Some(task),
    }
}

/// Run cycles until `max_cycles` is reached or shutdown is requested.
pub fn run_worker(config: &WorkerConfig, ctx: &PipelineContext) -> WorkerSummary {
    let mut summary = WorkerSummary::default();
    let mut cycle: u32 = 0;

    loop {
        if ctx.shutdown_requested() {
            break;
        }

        cycle += 1;
        summary.cycles = cycle;

        let outcome = open_database(&config.database_path)
            .map_err(AnalysisError::from)
            .and_then(|conn| run_cycle(&conn, ctx, cycle));

        let pause = match outcome {
            Ok(report) => {
                summary.record(&report);
                config.cycle_interval
            }
            Err(e) => {
                summary.failed_cycles += 1;
                tracing::error!(cycle, error = %e, "Cycle failed");
                config.fatal_cooldown
            }
        };

        if config.max_cycles > 0 && cycle >= config.max_cycles {
            tracing::info!(cycles = cycle, "Reached configured cycle limit");
            break;
        }

        tracing::debug!(cycle, phase = CyclePhase::Sleeping.as_str(), secs = pause.as_secs(), "Cycle phase");
        if !interruptible_sleep(pause, &ctx.shutdown) {
            break;
        }
        tracing::debug!(phase = CyclePhase::Idle.as_str(), "Cycle phase");
    }

    tracing::info!(
        cycles = summary.cycles,
        failed_cycles = summary.failed_cycles,
        analyzed = summary.analyzed,
        failed = summary.failed,
        archived = summary.archived,
        "Risk analysis worker stopped"
    );
    summary
}

/// Sleep for `total` in small increments. Returns `false` if shutdown was
/// requested before the time elapsed.
pub fn interruptible_sleep(total: Duration, shutdown: &AtomicBool) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if shutdown.load(Ordering::Relaxed) {
            return false;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return true;
        }
        std::thread::sleep(remaining.min(SLEEP_GRANULARITY));
    }
}
