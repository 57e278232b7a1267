//! # Silo Pipeline - Priority-Scheduled Ingestion
//!
//! The dispatcher scans an input path, computes a priority per file,
//! routes each file to the I/O or CPU worker pool, enforces per-task
//! deadlines, and re-enters the pipeline for children staged by
//! container formats. Every submitted file yields exactly one result,
//! synthetic error results included.

mod actionlog;
mod checkpoint;
mod dispatch;
mod governor;
mod ingest;
mod priority;
mod stats;
mod worker;

pub use actionlog::ActionLog;
pub use checkpoint::{Checkpoint, CheckpointManager};
pub use dispatch::{DispatcherOptions, IngestDispatcher, RunReport};
pub use governor::FailureGovernor;
pub use ingest::{FileOutcome, IngestContext, MAX_RECURSION_DEPTH};
pub use priority::{file_priority, is_batchable, routes_to_cpu, SMALL_FILE_BATCH_LIMIT};
pub use stats::RunStats;
