//! Per-file ingestion and recursive container handling.
//!
//! A worker processes a file by extracting its content and handing it
//! to the storage pipeline. Container formats (archives, emails) stage
//! child files; those are repaired from magic bytes, then ingested
//! in-line with the container's path id as their parent, so children
//! are only ever stored after the container row exists.

use crate::actionlog::ActionLog;
use silo_core::{magic, ExtractedContent, FileMeta, SiloError};
use silo_extract::ExtractorRegistry;
use silo_store::StoragePipeline;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Maximum container nesting depth.
pub const MAX_RECURSION_DEPTH: usize = 5;

/// Everything a worker needs to process files.
pub struct IngestContext {
    pub registry: ExtractorRegistry,
    pub storage: StoragePipeline,
    pub shutdown: Arc<AtomicBool>,
    pub log: ActionLog,
}

impl IngestContext {
    /// Whether a shutdown was requested.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

/// Result record for one processed file (original or staged child).
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub name: String,
    /// Display path; staged children carry `parent::child` strings.
    pub path: String,
    pub extension: String,
    pub size_bytes: u64,
    /// Container nesting depth; zero for original input files.
    pub depth: usize,
    pub duplicate: bool,
    pub path_id: Option<i64>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl FileOutcome {
    /// Whether this file counts as failed for statistics.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// Whether this outcome belongs to a staged child.
    #[must_use]
    pub const fn is_extracted_child(&self) -> bool {
        self.depth > 0
    }

    /// Synthetic result for a file whose task never completed
    /// (timeout, worker panic, shutdown).
    #[must_use]
    pub fn synthetic_error(meta: &FileMeta, message: impl Into<String>) -> Self {
        Self {
            name: meta.name.clone(),
            path: meta.path.to_string_lossy().into_owned(),
            extension: meta.extension.clone(),
            size_bytes: meta.size_bytes,
            depth: 0,
            duplicate: false,
            path_id: None,
            error: Some(message.into()),
            elapsed_ms: 0,
        }
    }
}

/// Process one file and, recursively, the children it stages.
///
/// Appends one [`FileOutcome`] per touched file to `outcomes`,
/// container first, children after.
pub fn process_file(
    ctx: &IngestContext,
    meta: &FileMeta,
    depth: usize,
    parent_path_id: Option<i64>,
    hierarchy_path: Option<&str>,
    outcomes: &mut Vec<FileOutcome>,
) {
    let started = Instant::now();

    let content = if depth > MAX_RECURSION_DEPTH {
        tracing::warn!(file = %meta.name, depth, "maximum recursion depth exceeded");
        ExtractedContent::Failed { error: SiloError::MaxDepthExceeded(MAX_RECURSION_DEPTH) }
    } else {
        ctx.registry.dispatch(meta)
    };

    let response = ctx.storage.store_file(meta, &content, parent_path_id, hierarchy_path);

    let error = content
        .error()
        .map(ToString::to_string)
        .or_else(|| response.error_message.clone());
    let display_path =
        hierarchy_path.map_or_else(|| meta.path.to_string_lossy().into_owned(), ToString::to_string);

    let outcome = FileOutcome {
        name: meta.name.clone(),
        path: display_path.clone(),
        extension: meta.extension.clone(),
        size_bytes: meta.size_bytes,
        depth,
        duplicate: response.is_duplicate(),
        path_id: response.effective_path_id(),
        error,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    let level = if outcome.is_failure() { "WARNING" } else { "INFO" };
    ctx.log.record(
        level,
        "FILE_OP",
        &format!("processed {}", outcome.name),
        serde_json::json!({
            "path": outcome.path,
            "depth": depth,
            "duplicate": outcome.duplicate,
            "path_id": outcome.path_id,
            "error": outcome.error,
            "elapsed_ms": outcome.elapsed_ms,
        }),
    );

    let staged = content.staged_children().cloned();
    let parent_id = response.effective_path_id();
    outcomes.push(outcome);

    // Children only after the container row is persisted.
    let Some(staged_dir) = staged else {
        return;
    };
    if parent_id.is_none() {
        tracing::warn!(file = %meta.name, "container has no path id, skipping staged children");
        return;
    }

    let children: Vec<FileMeta> = FileMeta::scan_tree(&staged_dir);
    if !children.is_empty() {
        ctx.log.record(
            "INFO",
            "EXTRACTION",
            &format!("ingesting {} staged children of {}", children.len(), meta.name),
            serde_json::json!({"staging_dir": staged_dir.display().to_string()}),
        );
    }

    for child in children {
        if ctx.is_shutting_down() {
            outcomes.push(FileOutcome {
                depth: depth + 1,
                ..FileOutcome::synthetic_error(&child, "shutdown requested")
            });
            continue;
        }
        let child = repair_staged_name(child);
        let child_hierarchy = format!("{display_path}::{}", child.name);
        process_file(ctx, &child, depth + 1, parent_id, Some(&child_hierarchy), outcomes);
    }
}

/// Rename a staged file when its magic bytes disagree with its
/// extension, so dispatch picks the right extractor.
fn repair_staged_name(meta: FileMeta) -> FileMeta {
    let head = match read_head(&meta) {
        Some(head) => head,
        None => return meta,
    };
    let corrected = magic::corrected_file_name(&meta.name, &head);
    if corrected == meta.name {
        return meta;
    }

    let target = meta.path.with_file_name(&corrected);
    if target.exists() {
        return meta;
    }
    match std::fs::rename(&meta.path, &target) {
        Ok(()) => {
            tracing::debug!(from = %meta.name, to = %corrected, "repaired staged file name");
            FileMeta::scan(&target).unwrap_or(meta)
        }
        Err(e) => {
            tracing::warn!(file = %meta.name, error = %e, "could not repair staged name");
            meta
        }
    }
}

fn read_head(meta: &FileMeta) -> Option<Vec<u8>> {
    use std::io::Read as _;
    let file = std::fs::File::open(&meta.path).ok()?;
    let mut head = Vec::with_capacity(magic::SNIFF_WINDOW);
    file.take(magic::SNIFF_WINDOW as u64).read_to_end(&mut head).ok()?;
    Some(head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use silo_store::Store;
    use std::io::Write as _;

    fn context(dir: &tempfile::TempDir) -> IngestContext {
        let store = Arc::new(Store::in_memory().unwrap());
        IngestContext {
            registry: ExtractorRegistry::new(dir.path().join("staging")),
            storage: StoragePipeline::new(store, "S1", "A", 0.5).unwrap(),
            shutdown: Arc::new(AtomicBool::new(false)),
            log: ActionLog::disabled(),
        }
    }

    #[test]
    fn single_text_file_yields_one_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        let path = dir.path().join("note.txt");
        std::fs::write(&path, "some words here").unwrap();
        let meta = FileMeta::scan(&path).unwrap();

        let mut outcomes = Vec::new();
        process_file(&ctx, &meta, 0, None, None, &mut outcomes);
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].is_failure());
        assert!(outcomes[0].path_id.is_some());
    }

    #[test]
    fn zip_children_are_ingested_with_hierarchy_paths() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);

        let zip_path = dir.path().join("bundle.zip");
        let file = std::fs::File::create(&zip_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("inner.txt", options).unwrap();
        writer.write_all(b"inner words").unwrap();
        writer.finish().unwrap();

        let meta = FileMeta::scan(&zip_path).unwrap();
        let mut outcomes = Vec::new();
        process_file(&ctx, &meta, 0, None, None, &mut outcomes);

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].name, "bundle.zip");
        assert_eq!(outcomes[1].name, "inner.txt");
        assert_eq!(outcomes[1].depth, 1);
        assert!(outcomes[1].path.contains("bundle.zip::inner.txt"), "{}", outcomes[1].path);
        assert!(outcomes[1].path_id.is_some());
    }

    #[test]
    fn depth_overflow_is_recorded_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        let path = dir.path().join("deep.txt");
        std::fs::write(&path, "depth test").unwrap();
        let meta = FileMeta::scan(&path).unwrap();

        let mut outcomes = Vec::new();
        process_file(&ctx, &meta, MAX_RECURSION_DEPTH + 1, None, None, &mut outcomes);
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_failure());
        assert!(outcomes[0].error.as_ref().unwrap().contains("depth"));
        // The file is still persisted, just without content.
        assert!(outcomes[0].path_id.is_some());
    }

    #[test]
    fn unsupported_files_fail_but_produce_results() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        let path = dir.path().join("mystery.xyz");
        std::fs::write(&path, "???").unwrap();
        let meta = FileMeta::scan(&path).unwrap();

        let mut outcomes = Vec::new();
        process_file(&ctx, &meta, 0, None, None, &mut outcomes);
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_failure());
        assert!(outcomes[0].path_id.is_some());
    }
}
