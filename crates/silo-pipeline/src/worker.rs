//! Worker pools over crossbeam channels.
//!
//! Two pools share one result channel: the I/O pool for cheap formats
//! and small-text batches, the CPU pool for compute-heavy extraction.
//! Workers catch panics at the task boundary, so a crashing extractor
//! produces `Internal` error results instead of taking the pool down.

use crate::ingest::{process_file, FileOutcome, IngestContext};
use crossbeam_channel::{Receiver, Sender};
use silo_core::FileMeta;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

/// One unit of work: a single file, or a batch of small text files
/// processed sequentially in submission order.
#[derive(Debug)]
pub struct Task {
    pub id: u64,
    pub files: Vec<FileMeta>,
    pub priority: u8,
}

/// Completed unit of work.
#[derive(Debug)]
pub struct TaskOutcome {
    pub task_id: u64,
    pub outcomes: Vec<FileOutcome>,
}

/// Handles of a spawned pool. Threads are detached on drop: a task
/// stuck past its deadline must not block dispatcher shutdown.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` workers consuming `tasks` and reporting on
    /// `results`.
    #[must_use]
    pub fn spawn(
        name: &str,
        count: usize,
        tasks: Receiver<Task>,
        results: Sender<TaskOutcome>,
        ctx: Arc<IngestContext>,
    ) -> Self {
        let mut handles = Vec::with_capacity(count.max(1));
        for index in 0..count.max(1) {
            let tasks = tasks.clone();
            let results = results.clone();
            let ctx = Arc::clone(&ctx);
            let thread_name = format!("{name}-{index}");
            let handle = std::thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || worker_loop(&tasks, &results, &ctx))
                .unwrap_or_else(|e| panic!("cannot spawn worker {thread_name}: {e}"));
            handles.push(handle);
        }
        Self { handles }
    }

    /// Number of worker threads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

fn worker_loop(tasks: &Receiver<Task>, results: &Sender<TaskOutcome>, ctx: &IngestContext) {
    for task in tasks.iter() {
        let outcome = if ctx.is_shutting_down() {
            TaskOutcome {
                task_id: task.id,
                outcomes: task
                    .files
                    .iter()
                    .map(|meta| FileOutcome::synthetic_error(meta, "shutdown requested"))
                    .collect(),
            }
        } else {
            run_task(&task, ctx)
        };
        if results.send(outcome).is_err() {
            // Dispatcher is gone; nothing left to report to.
            return;
        }
    }
}

/// Run one task with panic isolation.
fn run_task(task: &Task, ctx: &IngestContext) -> TaskOutcome {
    let result = catch_unwind(AssertUnwindSafe(|| {
        let mut outcomes = Vec::with_capacity(task.files.len());
        for meta in &task.files {
            process_file(ctx, meta, 0, None, None, &mut outcomes);
        }
        outcomes
    }));

    let outcomes = match result {
        Ok(outcomes) => outcomes,
        Err(panic) => {
            let message = panic_message(&panic);
            tracing::error!(task = task.id, message, "worker panicked, isolating failure");
            task.files
                .iter()
                .map(|meta| {
                    FileOutcome::synthetic_error(meta, format!("internal worker error: {message}"))
                })
                .collect()
        }
    };
    TaskOutcome { task_id: task.id, outcomes }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actionlog::ActionLog;
    use crossbeam_channel::unbounded;
    use silo_extract::ExtractorRegistry;
    use silo_store::{Store, StoragePipeline};
    use std::sync::atomic::AtomicBool;

    fn context(dir: &tempfile::TempDir) -> Arc<IngestContext> {
        let store = Arc::new(Store::in_memory().unwrap());
        Arc::new(IngestContext {
            registry: ExtractorRegistry::new(dir.path().join("staging")),
            storage: StoragePipeline::new(store, "S1", "A", 0.5).unwrap(),
            shutdown: Arc::new(AtomicBool::new(false)),
            log: ActionLog::disabled(),
        })
    }

    #[test]
    fn pool_processes_queued_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);

        let mut files = Vec::new();
        for i in 0..4 {
            let path = dir.path().join(format!("f{i}.txt"));
            std::fs::write(&path, format!("file number {i}")).unwrap();
            files.push(FileMeta::scan(&path).unwrap());
        }

        let (task_tx, task_rx) = unbounded();
        let (result_tx, result_rx) = unbounded();
        let _pool = WorkerPool::spawn("io", 2, task_rx, result_tx, ctx);

        for (i, meta) in files.into_iter().enumerate() {
            task_tx.send(Task { id: i as u64, files: vec![meta], priority: 1 }).unwrap();
        }
        drop(task_tx);

        let mut seen = Vec::new();
        for _ in 0..4 {
            let outcome = result_rx.recv_timeout(std::time::Duration::from_secs(10)).unwrap();
            assert_eq!(outcome.outcomes.len(), 1);
            assert!(!outcome.outcomes[0].is_failure());
            seen.push(outcome.task_id);
        }
        seen.sort_unstable();
        assert_eq!(seen, [0, 1, 2, 3]);
    }

    #[test]
    fn batch_task_reports_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);

        let mut files = Vec::new();
        for i in 0..3 {
            let path = dir.path().join(format!("b{i}.txt"));
            std::fs::write(&path, "batched").unwrap();
            files.push(FileMeta::scan(&path).unwrap());
        }

        let (task_tx, task_rx) = unbounded();
        let (result_tx, result_rx) = unbounded();
        let _pool = WorkerPool::spawn("io", 1, task_rx, result_tx, ctx);
        task_tx.send(Task { id: 9, files, priority: 1 }).unwrap();
        drop(task_tx);

        let outcome = result_rx.recv_timeout(std::time::Duration::from_secs(10)).unwrap();
        assert_eq!(outcome.task_id, 9);
        assert_eq!(outcome.outcomes.len(), 3);
        // Batch files process sequentially in submission order.
        assert_eq!(outcome.outcomes[0].name, "b0.txt");
        assert_eq!(outcome.outcomes[2].name, "b2.txt");
    }
}
