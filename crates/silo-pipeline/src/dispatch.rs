//! Priority dispatcher.
//!
//! Scans the input, sorts files by priority, groups small text files
//! into batch units, routes every unit to the I/O or CPU pool and
//! collects results under per-task deadlines. Exactly one result per
//! submitted file comes out, with synthetic `Timeout`, `Internal` or
//! shutdown errors filling in for tasks that never reported back.

use crate::checkpoint::CheckpointManager;
use crate::governor::FailureGovernor;
use crate::ingest::{FileOutcome, IngestContext};
use crate::priority::{file_priority, is_batchable, routes_to_cpu, SMALL_FILE_BATCH_LIMIT};
use crate::stats::RunStats;
use crate::worker::{Task, TaskOutcome, WorkerPool};
use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, RecvTimeoutError};
use silo_core::{EntryKind, FileMeta, SiloError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Upper bound on one collector wait, so a shutdown request is noticed
/// promptly even while all deadlines are far away.
const COLLECT_POLL: Duration = Duration::from_millis(200);

/// Tuning knobs of a dispatcher run.
#[derive(Debug, Clone)]
pub struct DispatcherOptions {
    /// I/O pool size; the CPU pool is capped at `min(max_workers, 4)`.
    pub max_workers: usize,
    /// Per-task completion deadline.
    pub task_timeout: Duration,
    /// Grace period for in-flight tasks after a shutdown request.
    pub shutdown_timeout: Duration,
    /// Outcome window of the failure governor.
    pub failure_window: usize,
    /// Failures within the window that trip the breaker.
    pub failure_threshold: usize,
    /// Skip files recorded in this input's checkpoint.
    pub resume: bool,
    /// Emit a periodic progress heartbeat while collecting.
    pub monitoring: bool,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            max_workers: 4,
            task_timeout: Duration::from_secs(3600),
            shutdown_timeout: Duration::from_secs(10),
            failure_window: 100,
            failure_threshold: 50,
            resume: false,
            monitoring: true,
        }
    }
}

/// Interval of the monitoring heartbeat.
const MONITOR_INTERVAL: Duration = Duration::from_secs(5);

/// Everything a finished run reports.
#[derive(Debug)]
pub struct RunReport {
    pub stats: RunStats,
    pub outcomes: Vec<FileOutcome>,
    pub breaker_tripped: bool,
}

struct PendingTask {
    files: Vec<FileMeta>,
    deadline: Instant,
}

/// Priority-scheduled, two-pool ingestion dispatcher.
pub struct IngestDispatcher {
    ctx: Arc<IngestContext>,
    checkpoints: CheckpointManager,
    options: DispatcherOptions,
}

impl IngestDispatcher {
    /// Build a dispatcher over a prepared ingestion context.
    #[must_use]
    pub fn new(
        ctx: Arc<IngestContext>,
        checkpoints: CheckpointManager,
        options: DispatcherOptions,
    ) -> Self {
        Self { ctx, checkpoints, options }
    }

    /// Ingest a file or a directory tree.
    ///
    /// # Errors
    /// Fails only when the input path cannot be scanned; per-file
    /// failures are reported inside the [`RunReport`].
    pub fn run(&self, input: &Path) -> Result<RunReport> {
        let root = FileMeta::scan(input)
            .with_context(|| format!("cannot read input path: {}", input.display()))?;
        let mut files = match root.kind {
            EntryKind::File => vec![root],
            EntryKind::Directory => FileMeta::scan_tree(input),
            EntryKind::Other => anyhow::bail!("not a file or directory: {}", input.display()),
        };

        let checkpoint_id = CheckpointManager::id_for_input(input);
        if self.options.resume {
            let processed = self.checkpoints.processed_set(&checkpoint_id);
            if !processed.is_empty() {
                let before = files.len();
                files.retain(|f| !processed.contains(&f.path.to_string_lossy().into_owned()));
                tracing::info!(
                    skipped = before - files.len(),
                    remaining = files.len(),
                    "resuming from checkpoint"
                );
            }
        }

        let mut stats = RunStats { original_files: files.len() as u64, ..RunStats::default() };
        stats.start_time = Some(chrono::Utc::now());
        self.ctx.log.record(
            "INFO",
            "SYSTEM",
            "run started",
            serde_json::json!({
                "input": input.display().to_string(),
                "files": files.len(),
                "max_workers": self.options.max_workers,
            }),
        );

        let report = self.run_files(files, stats, &checkpoint_id)?;

        self.ctx.log.record(
            "INFO",
            "SYSTEM",
            "run finished",
            serde_json::json!({
                "total": report.stats.total,
                "completed": report.stats.completed,
                "failed": report.stats.failed,
                "duplicates": report.stats.duplicates,
                "breaker_tripped": report.breaker_tripped,
            }),
        );
        Ok(report)
    }

    fn run_files(
        &self,
        files: Vec<FileMeta>,
        mut stats: RunStats,
        checkpoint_id: &str,
    ) -> Result<RunReport> {
        if files.is_empty() {
            stats.end_time = Some(chrono::Utc::now());
            return Ok(RunReport { stats, outcomes: Vec::new(), breaker_tripped: false });
        }
        let total_input = files.len();

        // Plan task units: small text files batch, everything else is
        // its own unit. Units are submitted in priority order.
        let mut batchable: Vec<FileMeta> = Vec::new();
        let mut individual: Vec<FileMeta> = Vec::new();
        for meta in files {
            if is_batchable(&meta) {
                batchable.push(meta);
            } else {
                individual.push(meta);
            }
        }

        let mut units: Vec<(Vec<FileMeta>, u8, bool)> = Vec::new();
        for chunk in batchable.chunks(SMALL_FILE_BATCH_LIMIT) {
            let priority = chunk.iter().map(file_priority).min().unwrap_or(1);
            units.push((chunk.to_vec(), priority, false));
        }
        for meta in individual {
            let priority = file_priority(&meta);
            let cpu = routes_to_cpu(&meta);
            units.push((vec![meta], priority, cpu));
        }
        units.sort_by_key(|(_, priority, _)| *priority);

        let mut priority_histogram: HashMap<u8, usize> = HashMap::new();
        for (unit, priority, _) in &units {
            *priority_histogram.entry(*priority).or_insert(0) += unit.len();
        }
        tracing::info!(?priority_histogram, units = units.len(), "scheduling plan ready");

        // Pools share one result channel.
        let (io_tx, io_rx) = unbounded::<Task>();
        let (cpu_tx, cpu_rx) = unbounded::<Task>();
        let (result_tx, result_rx) = unbounded::<TaskOutcome>();

        let io_workers = self.options.max_workers.max(1);
        let cpu_workers = self.options.max_workers.clamp(1, 4);
        let _io_pool =
            WorkerPool::spawn("silo-io", io_workers, io_rx, result_tx.clone(), Arc::clone(&self.ctx));
        let _cpu_pool =
            WorkerPool::spawn("silo-cpu", cpu_workers, cpu_rx, result_tx, Arc::clone(&self.ctx));

        let mut pending: HashMap<u64, PendingTask> = HashMap::new();
        for (task_id, (unit, priority, cpu)) in units.into_iter().enumerate() {
            let task_id = task_id as u64;
            let deadline = Instant::now() + self.options.task_timeout;
            let task = Task { id: task_id, files: unit.clone(), priority };
            let sender = if cpu { &cpu_tx } else { &io_tx };
            if sender.send(task).is_err() {
                anyhow::bail!("worker pool rejected task submission");
            }
            pending.insert(task_id, PendingTask { files: unit, deadline });
        }
        drop(io_tx);
        drop(cpu_tx);

        // Collect until every task resolved, by result or by deadline.
        let mut governor =
            FailureGovernor::with_limits(self.options.failure_window, self.options.failure_threshold);
        let mut breaker_tripped = false;
        let mut outcomes: Vec<FileOutcome> = Vec::new();
        let mut processed_paths: Vec<String> = Vec::new();
        let mut shutdown_deadline: Option<Instant> = None;
        let mut last_heartbeat = Instant::now();

        while !pending.is_empty() {
            if self.options.monitoring && last_heartbeat.elapsed() >= MONITOR_INTERVAL {
                last_heartbeat = Instant::now();
                tracing::info!(
                    pending = pending.len(),
                    completed = stats.completed,
                    failed = stats.failed,
                    "ingestion progress"
                );
            }
            if self.ctx.is_shutting_down() && shutdown_deadline.is_none() {
                tracing::warn!("shutdown requested, draining in-flight tasks");
                shutdown_deadline = Some(Instant::now() + self.options.shutdown_timeout);
            }

            let now = Instant::now();
            let next_deadline = pending
                .values()
                .map(|p| p.deadline)
                .chain(shutdown_deadline)
                .min()
                .expect("pending is non-empty");
            let wait = next_deadline.saturating_duration_since(now).min(COLLECT_POLL);

            match result_rx.recv_timeout(wait) {
                Ok(task_outcome) => {
                    if pending.remove(&task_outcome.task_id).is_none() {
                        tracing::debug!(task = task_outcome.task_id, "discarding late result");
                        continue;
                    }
                    for outcome in task_outcome.outcomes {
                        if governor.record(outcome.is_failure()) {
                            breaker_tripped = true;
                            self.ctx.log.record(
                                "WARNING",
                                "CIRCUIT_BREAKER",
                                "failure rate threshold reached; continuing",
                                serde_json::json!({
                                    "recent_failures": governor.recent_failures(),
                                    "window": self.options.failure_window,
                                }),
                            );
                        }
                        stats.record(
                            &outcome.extension,
                            outcome.is_failure(),
                            outcome.duplicate,
                            outcome.is_extracted_child(),
                        );
                        if !outcome.is_extracted_child() {
                            processed_paths.push(outcome.path.clone());
                        }
                        outcomes.push(outcome);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    let now = Instant::now();
                    let expired: Vec<u64> = pending
                        .iter()
                        .filter(|(_, p)| p.deadline <= now)
                        .map(|(&id, _)| id)
                        .collect();
                    for task_id in expired {
                        let task = pending.remove(&task_id).expect("expired task present");
                        let message =
                            SiloError::Timeout(self.options.task_timeout.as_secs()).to_string();
                        tracing::error!(task = task_id, "task deadline exceeded");
                        for meta in &task.files {
                            let outcome = FileOutcome::synthetic_error(meta, &message);
                            if governor.record(true) {
                                breaker_tripped = true;
                            }
                            stats.record(&outcome.extension, true, false, false);
                            outcomes.push(outcome);
                        }
                    }

                    if let Some(deadline) = shutdown_deadline {
                        if now >= deadline && !pending.is_empty() {
                            tracing::warn!(
                                abandoned = pending.len(),
                                "shutdown grace elapsed, abandoning in-flight tasks"
                            );
                            for task in pending.drain().map(|(_, task)| task) {
                                for meta in &task.files {
                                    let outcome = FileOutcome::synthetic_error(
                                        meta,
                                        "abandoned at shutdown",
                                    );
                                    stats.record(&outcome.extension, true, false, false);
                                    outcomes.push(outcome);
                                }
                            }
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::error!("worker pools terminated unexpectedly");
                    for task in pending.drain().map(|(_, task)| task) {
                        for meta in &task.files {
                            let outcome = FileOutcome::synthetic_error(
                                meta,
                                "internal error: worker pool terminated",
                            );
                            stats.record(&outcome.extension, true, false, false);
                            outcomes.push(outcome);
                        }
                    }
                }
            }
        }

        // Deferred batch inserts (word-path edges queued below their
        // threshold) are written out before anything reads the report.
        if let Err(e) = self.ctx.storage.drain() {
            tracing::warn!(error = %e, "batch buffer drain failed");
        }

        stats.end_time = Some(chrono::Utc::now());

        // Persist or clear the checkpoint for this input.
        if processed_paths.len() >= total_input {
            self.checkpoints.delete(checkpoint_id);
        } else if let Err(e) =
            self.checkpoints.save(checkpoint_id, &processed_paths, total_input)
        {
            tracing::warn!(error = %e, "could not save checkpoint");
        }

        Ok(RunReport { stats, outcomes, breaker_tripped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actionlog::ActionLog;
    use silo_extract::ExtractorRegistry;
    use silo_store::{Store, StoragePipeline};
    use std::sync::atomic::AtomicBool;

    fn dispatcher(dir: &tempfile::TempDir, options: DispatcherOptions) -> IngestDispatcher {
        let store = Arc::new(Store::in_memory().unwrap());
        let ctx = Arc::new(IngestContext {
            registry: ExtractorRegistry::new(dir.path().join("staging")),
            storage: StoragePipeline::new(store, "S1", "A", 0.5).unwrap(),
            shutdown: Arc::new(AtomicBool::new(false)),
            log: ActionLog::disabled(),
        });
        IngestDispatcher::new(
            ctx,
            CheckpointManager::new(dir.path().join("checkpoints")),
            options,
        )
    }

    fn write_corpus(dir: &tempfile::TempDir, count: usize) -> std::path::PathBuf {
        let input = dir.path().join("input");
        std::fs::create_dir_all(&input).unwrap();
        for i in 0..count {
            std::fs::write(input.join(format!("doc{i}.txt")), format!("document number {i}"))
                .unwrap();
        }
        input
    }

    #[test]
    fn every_file_yields_exactly_one_result() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_corpus(&dir, 25);
        let dispatcher = dispatcher(&dir, DispatcherOptions::default());

        let report = dispatcher.run(&input).unwrap();
        assert_eq!(report.outcomes.len(), 25);
        assert_eq!(report.stats.total, 25);
        assert_eq!(report.stats.completed, 25);
        assert_eq!(report.stats.failed, 0);
    }

    #[test]
    fn mixed_corpus_still_reports_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_corpus(&dir, 5);
        // Files that will fail extraction, in both pools.
        std::fs::write(input.join("broken.pdf"), "not a pdf").unwrap();
        std::fs::write(input.join("mystery.qqq"), "???").unwrap();

        let dispatcher = dispatcher(&dir, DispatcherOptions::default());
        let report = dispatcher.run(&input).unwrap();
        assert_eq!(report.outcomes.len(), 7);
        assert_eq!(report.stats.failed, 2);
        assert_eq!(report.stats.completed, 5);
    }

    #[test]
    fn zero_deadline_produces_synthetic_results_for_all() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_corpus(&dir, 20);
        let dispatcher = dispatcher(
            &dir,
            DispatcherOptions { task_timeout: Duration::ZERO, ..DispatcherOptions::default() },
        );

        let report = dispatcher.run(&input).unwrap();
        // Completeness holds whether a task finished before its instant
        // deadline or was synthesized as a timeout.
        assert_eq!(report.outcomes.len(), 20);
        for outcome in &report.outcomes {
            assert!(outcome.error.is_some() || outcome.path_id.is_some());
        }
    }

    #[test]
    fn second_run_reports_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_corpus(&dir, 6);
        let dispatcher = dispatcher(&dir, DispatcherOptions::default());

        let first = dispatcher.run(&input).unwrap();
        assert_eq!(first.stats.duplicates, 0);

        let second = dispatcher.run(&input).unwrap();
        assert_eq!(second.stats.duplicates, 6);
        assert_eq!(second.stats.completed, 6);
        assert_eq!(second.stats.failed, 0);
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(&dir, DispatcherOptions::default());
        assert!(dispatcher.run(Path::new("/no/such/path")).is_err());
    }
}
