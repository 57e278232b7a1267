//! Batch buffers for small, high-frequency inserts.
//!
//! Words, hashes and word-path edges arrive one at a time from worker
//! threads but are cheapest to write in bulk. Each buffer accumulates up
//! to a size threshold or a maximum age and flushes transactionally;
//! flushes are idempotent (insert-if-absent, upsert for counts) so a
//! retried flush never duplicates rows.

use crate::db::Store;
use crate::retry::with_backoff;
use anyhow::Result;
use rusqlite::params;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A buffer older than this wants flushing regardless of fill level.
const MAX_BATCH_AGE: Duration = Duration::from_secs(5);

/// Items queued for one buffer, with the age of the oldest entry.
struct Pending<T> {
    items: Vec<T>,
    first_queued: Option<Instant>,
}

impl<T> Pending<T> {
    const fn new() -> Self {
        Self { items: Vec::new(), first_queued: None }
    }

    fn push(&mut self, item: T) {
        if self.items.is_empty() {
            self.first_queued = Some(Instant::now());
        }
        self.items.push(item);
    }

    /// Size threshold reached, or the oldest entry aged out.
    fn wants_flush(&self, threshold: usize) -> bool {
        self.items.len() >= threshold
            || self.first_queued.is_some_and(|t| t.elapsed() >= MAX_BATCH_AGE)
    }

    fn clear(&mut self) {
        self.items.clear();
        self.first_queued = None;
    }
}

/// Buffer of words awaiting interning.
pub struct WordBatch {
    pending: Mutex<Pending<String>>,
    threshold: usize,
}

impl WordBatch {
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self { pending: Mutex::new(Pending::new()), threshold }
    }

    /// Queue a word; returns true when the buffer should be flushed.
    pub fn add(&self, word: &str) -> bool {
        let word = word.to_lowercase();
        let mut pending = self.pending.lock().expect("batch lock");
        if !pending.items.contains(&word) {
            pending.push(word);
        }
        pending.wants_flush(self.threshold)
    }

    /// Flush queued words, returning the id mapping.
    ///
    /// # Errors
    /// Fails when the flush (with retries) cannot complete; the queue is
    /// left intact in that case.
    pub fn flush(&self, store: &Store) -> Result<HashMap<String, i64>> {
        let snapshot: Vec<String> = self.pending.lock().expect("batch lock").items.clone();
        if snapshot.is_empty() {
            return Ok(HashMap::new());
        }
        let ids = with_backoff(|| store.words().batch_ensure(&snapshot))?;
        self.pending.lock().expect("batch lock").clear();
        Ok(ids)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.lock().expect("batch lock").items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Buffer of `(digest, source_id, side_id)` triples awaiting insertion.
pub struct HashBatch {
    pending: Mutex<Pending<(String, i64, i64)>>,
    threshold: usize,
}

impl HashBatch {
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self { pending: Mutex::new(Pending::new()), threshold }
    }

    /// Queue a triple; returns true when the buffer should be flushed.
    pub fn add(&self, digest: &str, source_id: i64, side_id: i64) -> bool {
        let mut pending = self.pending.lock().expect("batch lock");
        pending.push((digest.to_string(), source_id, side_id));
        pending.wants_flush(self.threshold)
    }

    /// Flush queued triples, returning ids keyed by triple.
    ///
    /// # Errors
    /// Fails when the flush (with retries) cannot complete.
    pub fn flush(&self, store: &Store) -> Result<HashMap<(String, i64, i64), i64>> {
        let snapshot: Vec<(String, i64, i64)> =
            self.pending.lock().expect("batch lock").items.clone();
        if snapshot.is_empty() {
            return Ok(HashMap::new());
        }
        let ids = with_backoff(|| {
            let mut out = HashMap::new();
            for (digest, source_id, side_id) in &snapshot {
                let id = store.hashes().ensure(digest, *source_id, *side_id)?;
                out.insert((digest.clone(), *source_id, *side_id), id);
            }
            Ok(out)
        })?;
        self.pending.lock().expect("batch lock").clear();
        Ok(ids)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.lock().expect("batch lock").items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Buffer of `(path_id, word_id, count)` edges awaiting upsert.
pub struct WordPathBatch {
    pending: Mutex<Pending<(i64, i64, u32)>>,
    threshold: usize,
}

impl WordPathBatch {
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self { pending: Mutex::new(Pending::new()), threshold }
    }

    /// Queue an edge; returns true when the buffer should be flushed.
    pub fn add(&self, path_id: i64, word_id: i64, count: u32) -> bool {
        let mut pending = self.pending.lock().expect("batch lock");
        pending.push((path_id, word_id, count));
        pending.wants_flush(self.threshold)
    }

    /// Flush queued edges in one transaction.
    ///
    /// # Errors
    /// Fails when the flush (with retries) cannot complete.
    pub fn flush(&self, store: &Store) -> Result<usize> {
        let snapshot: Vec<(i64, i64, u32)> =
            self.pending.lock().expect("batch lock").items.clone();
        if snapshot.is_empty() {
            return Ok(0);
        }
        with_backoff(|| {
            let mut conn = store.conn()?;
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO words_paths (path_id, word_id, word_count) VALUES (?1, ?2, ?3)
                     ON CONFLICT(path_id, word_id) DO UPDATE SET word_count = excluded.word_count",
                )?;
                for (path_id, word_id, count) in &snapshot {
                    stmt.execute(params![path_id, word_id, count])?;
                }
            }
            tx.commit()?;
            Ok(())
        })?;
        let flushed = snapshot.len();
        self.pending.lock().expect("batch lock").clear();
        Ok(flushed)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.lock().expect("batch lock").items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The three batch buffers bundled, with a single drain point.
pub struct BatchSet {
    pub words: WordBatch,
    pub hashes: HashBatch,
    pub word_paths: WordPathBatch,
}

impl BatchSet {
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self {
            words: WordBatch::new(threshold),
            hashes: HashBatch::new(threshold),
            word_paths: WordPathBatch::new(threshold),
        }
    }

    /// Flush everything still queued, in dependency order.
    ///
    /// # Errors
    /// Fails on the first buffer whose flush cannot complete.
    pub fn drain(&self, store: &Store) -> Result<()> {
        self.words.flush(store)?;
        self.hashes.flush(store)?;
        self.word_paths.flush(store)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silo_core::{EntryKind, FileMeta};

    #[test]
    fn word_batch_flushes_at_threshold() {
        let store = Store::in_memory().unwrap();
        let batch = WordBatch::new(3);
        assert!(!batch.add("one"));
        assert!(!batch.add("two"));
        assert!(batch.add("three"));
        let ids = batch.flush(&store).unwrap();
        assert_eq!(ids.len(), 3);
        assert!(batch.is_empty());
        assert_eq!(store.row_count("words").unwrap(), 3);
    }

    #[test]
    fn word_batch_dedupes_queued_words() {
        let store = Store::in_memory().unwrap();
        let batch = WordBatch::new(500);
        batch.add("same");
        batch.add("SAME");
        assert_eq!(batch.len(), 1);
        let ids = batch.flush(&store).unwrap();
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn aged_buffer_wants_flushing() {
        let mut pending: Pending<u32> = Pending::new();
        pending.push(1);
        assert!(!pending.wants_flush(10));
        // Backdate the first entry past the age limit.
        pending.first_queued = Some(Instant::now() - MAX_BATCH_AGE * 2);
        assert!(pending.wants_flush(10));
        pending.clear();
        assert!(!pending.wants_flush(10));
    }

    #[test]
    fn hash_batch_flush_is_idempotent() {
        let store = Store::in_memory().unwrap();
        let source = store.sources().get_or_create("s", "", "", 0.5).unwrap();
        let side = store.sides().get_or_create("a", 0.5).unwrap();
        let digest = "e".repeat(64);

        let batch = HashBatch::new(500);
        batch.add(&digest, source, side);
        batch.add(&digest, source, side);
        let ids = batch.flush(&store).unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.row_count("hashes").unwrap(), 1);
    }

    #[test]
    fn word_path_batch_upserts() {
        let store = Store::in_memory().unwrap();
        let source = store.sources().get_or_create("s", "", "", 0.5).unwrap();
        let side = store.sides().get_or_create("a", 0.5).unwrap();
        let hash = store.hashes().ensure(&"f".repeat(64), source, side).unwrap();
        let meta = FileMeta {
            name: "x.txt".into(),
            path: "/x.txt".into(),
            kind: EntryKind::File,
            extension: "txt".into(),
            size_bytes: 1,
            digest: "f".repeat(64),
            modified: chrono::Utc::now(),
        };
        let path_id = store.paths().insert(&meta, hash, "Unread", None).unwrap();
        let word_id = store.words().ensure("tick").unwrap();

        let batch = WordPathBatch::new(500);
        batch.add(path_id, word_id, 2);
        batch.add(path_id, word_id, 5);
        assert_eq!(batch.flush(&store).unwrap(), 2);
        assert_eq!(store.words().frequencies(path_id).unwrap()["tick"], 5);
        assert_eq!(store.row_count("words_paths").unwrap(), 1);
    }
}
