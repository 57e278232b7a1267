//! Per-file storage workflow.
//!
//! The order is fixed: hash resolution, duplicate check, hash insert,
//! metadata insert, content tokenization and persistence, word
//! frequencies, title, status promotion. Failures in the content, title
//! or status steps degrade to warnings and keep the file's `Success`
//! response; hash and metadata failures fail the file.

use crate::batch::BatchSet;
use crate::codec::TokenTuple;
use crate::db::Store;
use crate::ops::keyword::match_keywords;
use crate::retry::with_backoff;
use anyhow::{Context, Result};
use silo_core::{digest, meta::sha256_file, meta::HASH_SIZE_LIMIT, ExtractedContent, FileMeta};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Maximum stored title length in characters.
const MAX_TITLE_LEN: usize = 200;

/// Outcome class of a storage call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageResult {
    /// File stored.
    Success,
    /// File is a true duplicate of an existing path.
    Duplicate,
    /// Hash or metadata persistence failed.
    Error,
    /// Digest missing and uncomputable.
    InvalidHash,
    /// Extractor payload was structurally unusable.
    InvalidData,
}

/// Detailed response of [`StoragePipeline::store_file`].
#[derive(Debug, Clone)]
pub struct StorageResponse {
    pub result: StorageResult,
    /// Path id of the newly stored file.
    pub path_id: Option<i64>,
    /// Path id of the pre-existing duplicate.
    pub duplicate_path_id: Option<i64>,
    pub error_message: Option<String>,
}

impl StorageResponse {
    fn success(path_id: i64) -> Self {
        Self {
            result: StorageResult::Success,
            path_id: Some(path_id),
            duplicate_path_id: None,
            error_message: None,
        }
    }

    fn duplicate(existing: Option<i64>) -> Self {
        Self {
            result: StorageResult::Duplicate,
            path_id: None,
            duplicate_path_id: existing,
            error_message: None,
        }
    }

    fn error(result: StorageResult, message: impl Into<String>) -> Self {
        Self { result, path_id: None, duplicate_path_id: None, error_message: Some(message.into()) }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.result, StorageResult::Success)
    }

    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self.result, StorageResult::Duplicate)
    }

    /// The id a caller should link children against: the stored path or
    /// the duplicate it resolved to.
    #[must_use]
    pub const fn effective_path_id(&self) -> Option<i64> {
        match self.path_id {
            Some(id) => Some(id),
            None => self.duplicate_path_id,
        }
    }
}

/// Running counters of a pipeline instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub duplicates: u64,
}

/// The per-file persistence workflow bound to one `(source, side)` pair.
pub struct StoragePipeline {
    store: Arc<Store>,
    source_id: i64,
    side_id: i64,
    /// Keyword definitions loaded once at construction.
    keywords: HashMap<i64, Vec<u32>>,
    /// Batch buffers shared by every worker driving this pipeline.
    batches: BatchSet,
    stats: Mutex<StorageStats>,
}

impl StoragePipeline {
    /// Bind a pipeline to a source and side, creating both lazily, and
    /// warm the punctuation and keyword caches.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn new(
        store: Arc<Store>,
        source_name: &str,
        side_name: &str,
        side_importance: f64,
    ) -> Result<Self> {
        let source_id = store.sources().get_or_create(source_name, "", "", 0.5)?;
        let side_id = store.sides().get_or_create(side_name, side_importance)?;
        let preloaded = store.punctuations().preload()?;
        tracing::debug!(preloaded, "punctuation cache warmed");
        let keywords = store.keywords().load_all()?;
        let batches = BatchSet::new(store.batch_size);
        Ok(Self {
            store,
            source_id,
            side_id,
            keywords,
            batches,
            stats: Mutex::new(StorageStats::default()),
        })
    }

    /// Flush everything still queued in the batch buffers.
    ///
    /// The dispatcher calls this once per run after the last result;
    /// deferred word-path edges only become visible to readers here.
    ///
    /// # Errors
    /// Fails when a flush cannot complete.
    pub fn drain(&self) -> Result<()> {
        self.batches.drain(&self.store)
    }

    /// The bound source id.
    #[must_use]
    pub const fn source_id(&self) -> i64 {
        self.source_id
    }

    /// The bound side id.
    #[must_use]
    pub const fn side_id(&self) -> i64 {
        self.side_id
    }

    /// Snapshot of the running counters.
    #[must_use]
    pub fn stats(&self) -> StorageStats {
        *self.stats.lock().expect("stats lock")
    }

    /// Store one file: metadata, content, words, title.
    ///
    /// `hierarchy_path` replaces the stored file path for staged
    /// children (`parent.zip::child.txt`); `parent_path_id` links the
    /// child's title under the container's title.
    pub fn store_file(
        &self,
        meta: &FileMeta,
        content: &ExtractedContent,
        parent_path_id: Option<i64>,
        hierarchy_path: Option<&str>,
    ) -> StorageResponse {
        self.bump(|s| s.total += 1);

        // 1. Hash resolution.
        let file_digest = match self.resolve_digest(meta) {
            Ok(d) => d,
            Err(response) => {
                self.bump(|s| s.failed += 1);
                return response;
            }
        };

        // 2. Duplicate check.
        match self.store.hashes().lookup_duplicate(&file_digest, self.source_id, self.side_id) {
            Ok((true, existing)) => {
                tracing::debug!(file = %meta.name, ?existing, "skipping duplicate");
                self.bump(|s| {
                    s.duplicates += 1;
                    // Duplicates were successfully processed, just not re-stored.
                    s.completed += 1;
                });
                return StorageResponse::duplicate(existing);
            }
            Ok((false, _)) => {}
            Err(e) => {
                self.bump(|s| s.failed += 1);
                return StorageResponse::error(
                    StorageResult::Error,
                    format!("duplicate check failed: {e}"),
                );
            }
        }

        // 3. Hash insert (reuses an orphan row when present).
        let hash_id = match self.resolve_hash_id(&file_digest) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(file = %meta.name, error = %e, "hash storage failed");
                self.bump(|s| s.failed += 1);
                return StorageResponse::error(
                    StorageResult::Error,
                    format!("hash storage failed: {e}"),
                );
            }
        };

        // 4. Metadata insert, Unread until content lands.
        let path_id =
            match self.store.paths().insert(meta, hash_id, "Unread", hierarchy_path) {
                Ok(id) => id,
                Err(e) => {
                    tracing::error!(file = %meta.name, error = %e, "metadata storage failed");
                    self.bump(|s| s.failed += 1);
                    return StorageResponse::error(
                        StorageResult::Error,
                        format!("metadata storage failed: {e}"),
                    );
                }
            };

        // 5-7. Content, word frequencies, keywords.
        let mut has_readable_content = false;
        if !content.is_failed() {
            let text = content.flatten_text();
            if !text.trim().is_empty() {
                match self.store_content(&text, path_id) {
                    Ok(stored) => has_readable_content = stored,
                    Err(e) => {
                        tracing::warn!(file = %meta.name, error = %e, "content storage failed");
                    }
                }
            }
        }

        // 8. Title.
        if let Err(e) = self.store_title(meta, content, path_id, parent_path_id) {
            tracing::warn!(file = %meta.name, error = %e, "title storage failed");
        }

        // 9. Status promotion.
        let status = if has_readable_content { "Read" } else { "Unread" };
        if let Err(e) = self.store.paths().set_status(path_id, status) {
            tracing::warn!(file = %meta.name, error = %e, "status update failed");
        }

        self.bump(|s| s.completed += 1);
        tracing::debug!(file = %meta.name, path_id, status, "stored");
        StorageResponse::success(path_id)
    }

    /// Route the hash insert through the batch queue. The flush is an
    /// explicit drain point (the path row needs the id immediately) and
    /// also writes any triples queued by other workers meanwhile.
    fn resolve_hash_id(&self, file_digest: &str) -> Result<i64> {
        self.batches.hashes.add(file_digest, self.source_id, self.side_id);
        let flushed = self.batches.hashes.flush(&self.store)?;
        if let Some(&id) =
            flushed.get(&(file_digest.to_string(), self.source_id, self.side_id))
        {
            return Ok(id);
        }
        // A concurrent flush already covered this triple.
        with_backoff(|| self.store.hashes().ensure(file_digest, self.source_id, self.side_id))
    }

    /// Tokenize and persist content; returns whether anything was stored.
    fn store_content(&self, text: &str, path_id: i64) -> Result<bool> {
        let tokens = silo_tokenize::tokenize(text);
        if tokens.is_empty() {
            return Ok(false);
        }

        let distinct: Vec<String> = {
            let mut words: Vec<String> = tokens.iter().map(|t| t.word.clone()).collect();
            words.sort_unstable();
            words.dedup();
            words
        };
        // Stage this file's vocabulary; the flush interns every word
        // queued by any worker since the last drain. Tuple building
        // needs the ids now, so this is an explicit drain point; the
        // resolution afterwards is cache-hot.
        for word in &distinct {
            self.batches.words.add(word);
        }
        self.batches.words.flush(&self.store)?;
        let word_ids = self.store.words().batch_ensure(&distinct)?;

        let mut tuples = Vec::with_capacity(tokens.len());
        for token in &tokens {
            let word_id = word_ids
                .get(&token.word)
                .copied()
                .with_context(|| format!("no id for word {:?}", token.word))?;
            tuples.push(TokenTuple {
                word_id: to_u32(word_id)?,
                punct_before_id: self.intern_punct(&token.punct_before)?,
                punct_after_id: self.intern_punct(&token.punct_after)?,
                spacing_id: self.intern_punct(&token.spacing)?,
            });
        }

        self.store.contents().store_chunks(&tuples, path_id)?;

        // Word-path edges accumulate across files and flush at the
        // batch threshold or age; the end-of-run drain writes the rest.
        let frequencies = silo_tokenize::word_frequencies(&tokens);
        let mut flush_due = false;
        for (word, count) in &frequencies {
            let word_id = word_ids
                .get(word)
                .copied()
                .with_context(|| format!("no id for word {word:?}"))?;
            flush_due |= self.batches.word_paths.add(path_id, word_id, *count);
        }
        if flush_due {
            self.batches.word_paths.flush(&self.store)?;
        }

        if !self.keywords.is_empty() {
            let document_ids: Vec<u32> = tuples.iter().map(|t| t.word_id).collect();
            let matches = match_keywords(&document_ids, &self.keywords);
            self.store.keywords().store_frequencies(path_id, &matches)?;
        }
        Ok(true)
    }

    /// Derive and persist the title: content title or subject, else the
    /// file name, truncated to 200 characters.
    fn store_title(
        &self,
        meta: &FileMeta,
        content: &ExtractedContent,
        path_id: i64,
        parent_path_id: Option<i64>,
    ) -> Result<()> {
        let raw = content.title().unwrap_or(&meta.name);
        let title: String = raw.chars().take(MAX_TITLE_LEN).collect();
        let words = silo_tokenize::tokenize_words(&title);
        if words.is_empty() {
            return Ok(());
        }
        let ids = self.store.words().batch_ensure(&words)?;
        let mut word_ids = Vec::with_capacity(words.len());
        for word in &words {
            let id = ids.get(word).copied().with_context(|| format!("no id for word {word:?}"))?;
            word_ids.push(to_u32(id)?);
        }
        self.store.titles().store(&word_ids, path_id, parent_path_id)?;
        Ok(())
    }

    fn intern_punct(&self, text: &str) -> Result<Option<u32>> {
        match self.store.punctuations().ensure(text)? {
            Some(id) => Ok(Some(to_u32(id)?)),
            None => Ok(None),
        }
    }

    /// Re-derive the digest when the scan left a sentinel.
    fn resolve_digest(&self, meta: &FileMeta) -> std::result::Result<String, StorageResponse> {
        if !digest::is_sentinel(&meta.digest) {
            return Ok(meta.digest.clone());
        }
        if meta.digest == digest::SKIPPED_LARGE_FILE || meta.size_bytes >= HASH_SIZE_LIMIT {
            return Err(StorageResponse::error(
                StorageResult::InvalidHash,
                format!("file exceeds hashing limit: {}", meta.name),
            ));
        }
        if !meta.path.exists() {
            return Err(StorageResponse::error(
                StorageResult::InvalidHash,
                format!("invalid hash and file is gone: {}", meta.path.display()),
            ));
        }
        sha256_file(&meta.path).map_err(|e| {
            StorageResponse::error(
                StorageResult::InvalidHash,
                format!("hash calculation failed: {e}"),
            )
        })
    }

    fn bump(&self, update: impl FnOnce(&mut StorageStats)) {
        update(&mut self.stats.lock().expect("stats lock"));
    }
}

fn to_u32(id: i64) -> Result<u32> {
    u32::try_from(id).context("row id exceeds token id range")
}

#[cfg(test)]
mod tests {
    use super::*;
    use silo_core::EntryKind;
    use std::io::Write;

    fn pipeline(store: &Arc<Store>) -> StoragePipeline {
        StoragePipeline::new(Arc::clone(store), "S1", "A", 0.5).unwrap()
    }

    fn disk_file(dir: &tempfile::TempDir, name: &str, body: &str) -> FileMeta {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        FileMeta::scan(&path).unwrap()
    }

    #[test]
    fn text_file_is_stored_and_promoted_to_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::in_memory().unwrap());
        let pipe = pipeline(&store);

        let meta = disk_file(&dir, "notes.txt", "Hello, world! Visit https://example.com on 2024-01-15.");
        let content = ExtractedContent::Text { body: "Hello, world! Visit https://example.com on 2024-01-15.".into() };
        let response = pipe.store_file(&meta, &content, None, None);
        assert!(response.is_success());
        pipe.drain().unwrap();

        let path_id = response.path_id.unwrap();
        let record = store.paths().get(path_id).unwrap().unwrap();
        assert_eq!(record.file_status, "Read");

        let tuples = store.contents().retrieve(path_id).unwrap();
        assert_eq!(tuples.len(), 6);

        let freqs = store.words().frequencies(path_id).unwrap();
        assert_eq!(freqs["hello"], 1);
        assert_eq!(freqs["https://example.com"], 1);
        assert_eq!(freqs["2024-01-15"], 1);

        // WordPath count law: every frequency equals the tuple count for
        // that word id.
        for (word, count) in &freqs {
            let word_id = store.words().ensure(word).unwrap() as u32;
            let in_stream = tuples.iter().filter(|t| t.word_id == word_id).count() as u32;
            assert_eq!(in_stream, *count, "law violated for {word:?}");
        }
    }

    #[test]
    fn second_ingestion_is_a_duplicate_with_unchanged_counts() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::in_memory().unwrap());
        let pipe = pipeline(&store);

        let meta = disk_file(&dir, "notes.txt", "same content");
        let content = ExtractedContent::Text { body: "same content".into() };

        let first = pipe.store_file(&meta, &content, None, None);
        assert!(first.is_success());
        pipe.drain().unwrap();
        let counts_before: Vec<i64> = ["hashes", "paths", "contents", "words", "words_paths"]
            .iter()
            .map(|t| store.row_count(t).unwrap())
            .collect();

        let second = pipe.store_file(&meta, &content, None, None);
        assert!(second.is_duplicate());
        assert_eq!(second.duplicate_path_id, first.path_id);
        pipe.drain().unwrap();

        let counts_after: Vec<i64> = ["hashes", "paths", "contents", "words", "words_paths"]
            .iter()
            .map(|t| store.row_count(t).unwrap())
            .collect();
        assert_eq!(counts_before, counts_after);

        let stats = pipe.stats();
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.completed, 2);
    }

    #[test]
    fn same_content_different_side_stores_again() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::in_memory().unwrap());
        let pipe_a = pipeline(&store);
        let pipe_b = StoragePipeline::new(Arc::clone(&store), "S1", "B", 0.5).unwrap();

        let meta = disk_file(&dir, "notes.txt", "shared bytes");
        let content = ExtractedContent::Text { body: "shared bytes".into() };

        let first = pipe_a.store_file(&meta, &content, None, None);
        let second = pipe_b.store_file(&meta, &content, None, None);
        assert!(first.is_success());
        assert!(second.is_success());
        assert_ne!(first.path_id, second.path_id);
        assert_eq!(store.row_count("hashes").unwrap(), 2);
        assert_eq!(store.row_count("paths").unwrap(), 2);

        // Each side still resolves to its own path.
        let (dup_a, path_a) = store
            .hashes()
            .lookup_duplicate(&meta.digest, pipe_a.source_id(), pipe_a.side_id())
            .unwrap();
        assert!(dup_a);
        assert_eq!(path_a, first.path_id);
        let (dup_b, path_b) = store
            .hashes()
            .lookup_duplicate(&meta.digest, pipe_b.source_id(), pipe_b.side_id())
            .unwrap();
        assert!(dup_b);
        assert_eq!(path_b, second.path_id);
    }

    #[test]
    fn empty_content_stays_unread_without_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::in_memory().unwrap());
        let pipe = pipeline(&store);

        let meta = disk_file(&dir, "tiny.png", "not really a png");
        let content = ExtractedContent::ImageOcr {
            text: String::new(),
            width: 32,
            height: 32,
            skipped: true,
            skip_reason: Some("too_small".into()),
        };
        let response = pipe.store_file(&meta, &content, None, None);
        assert!(response.is_success());

        let path_id = response.path_id.unwrap();
        let record = store.paths().get(path_id).unwrap().unwrap();
        assert_eq!(record.file_status, "Unread");
        assert_eq!(store.contents().stats(path_id).unwrap().chunk_count, 0);
        assert!(store.words().frequencies(path_id).unwrap().is_empty());
        // Title still lands, derived from the file name.
        assert!(store.titles().retrieve(path_id).unwrap().is_some());
    }

    #[test]
    fn failed_extraction_is_persisted_without_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::in_memory().unwrap());
        let pipe = pipeline(&store);

        let meta = disk_file(&dir, "broken.xyz", "whatever");
        let content = ExtractedContent::Failed {
            error: silo_core::SiloError::UnsupportedType("xyz".into()),
        };
        let response = pipe.store_file(&meta, &content, None, None);
        assert!(response.is_success());
        let record = store.paths().get(response.path_id.unwrap()).unwrap().unwrap();
        assert_eq!(record.file_status, "Unread");
    }

    #[test]
    fn child_title_links_under_parent() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::in_memory().unwrap());
        let pipe = pipeline(&store);

        let parent_meta = disk_file(&dir, "bundle.zip", "zipbytes");
        let parent = pipe.store_file(
            &parent_meta,
            &ExtractedContent::Archive { extraction_dir: dir.path().to_path_buf() },
            None,
            None,
        );
        let parent_id = parent.path_id.unwrap();

        let child_meta = disk_file(&dir, "doc.txt", "inner text");
        let child = pipe.store_file(
            &child_meta,
            &ExtractedContent::Text { body: "inner text".into() },
            Some(parent_id),
            Some("bundle.zip::doc.txt"),
        );
        let child_id = child.path_id.unwrap();

        let parent_title = store.titles().retrieve(parent_id).unwrap().unwrap();
        let child_title = store.titles().retrieve(child_id).unwrap().unwrap();
        assert_eq!(parent_title.status, "Main");
        assert_eq!(child_title.status, "Branch");
        assert_eq!(child_title.parent_title_id, Some(parent_title.id));

        let record = store.paths().get(child_id).unwrap().unwrap();
        assert_eq!(record.file_path, "bundle.zip::doc.txt");
    }

    #[test]
    fn sentinel_digest_without_file_is_invalid_hash() {
        let store = Arc::new(Store::in_memory().unwrap());
        let pipe = pipeline(&store);
        let meta = FileMeta {
            name: "ghost.txt".into(),
            path: "/nonexistent/ghost.txt".into(),
            kind: EntryKind::File,
            extension: "txt".into(),
            size_bytes: 10,
            digest: "N/A".into(),
            modified: chrono::Utc::now(),
        };
        let response =
            pipe.store_file(&meta, &ExtractedContent::Text { body: "x".into() }, None, None);
        assert_eq!(response.result, StorageResult::InvalidHash);
        assert_eq!(pipe.stats().failed, 1);
    }

    #[test]
    fn word_path_edges_accumulate_until_drain() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::in_memory().unwrap());
        let pipe = pipeline(&store);

        let meta = disk_file(&dir, "queued.txt", "alpha beta alpha");
        let response = pipe
            .store_file(&meta, &ExtractedContent::Text { body: "alpha beta alpha".into() }, None, None);
        let path_id = response.path_id.unwrap();

        // Content and words land immediately; the word-path edges sit
        // in the batch buffer below its threshold.
        assert!(store.contents().stats(path_id).unwrap().chunk_count > 0);
        assert!(store.words().frequencies(path_id).unwrap().is_empty());

        pipe.drain().unwrap();
        let freqs = store.words().frequencies(path_id).unwrap();
        assert_eq!(freqs["alpha"], 2);
        assert_eq!(freqs["beta"], 1);
    }

    #[test]
    fn keywords_match_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::in_memory().unwrap());
        // Define a keyword over word ids before the pipeline loads them.
        let alpha = store.words().ensure("alpha").unwrap() as u32;
        let beta = store.words().ensure("beta").unwrap() as u32;
        let keyword_id = store.keywords().define(&[alpha, beta], None).unwrap();

        let pipe = pipeline(&store);
        let meta = disk_file(&dir, "k.txt", "alpha beta alpha");
        let response = pipe.store_file(
            &meta,
            &ExtractedContent::Text { body: "alpha beta alpha".into() },
            None,
            None,
        );
        let path_id = response.path_id.unwrap();

        let conn = store.conn().unwrap();
        let count: u32 = conn
            .query_row(
                "SELECT word_count FROM keywords_paths WHERE path_id = ?1 AND keyword_id = ?2",
                rusqlite::params![path_id, keyword_id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1); // min(alpha: 2, beta: 1)
    }
}
