//! Operations on the `words` and `words_paths` tables.
//!
//! Word rows are append-only and unique by text. Ids are cached in a
//! bounded in-memory map shared through the [`Store`]; stale entries are
//! harmless because ids never change once assigned.

use crate::db::Store;
use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension};
use silo_tokenize::sanitize;
use std::collections::HashMap;

/// Operations on the word inventory.
pub struct WordOps<'a> {
    store: &'a Store,
}

impl<'a> WordOps<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Get or create the id for one word, lowercased and sanitized.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn ensure(&self, word: &str) -> Result<i64> {
        let word = sanitize(&word.to_lowercase());

        if let Some(&id) = self.store.word_cache.lock().expect("cache lock").get(&word) {
            return Ok(id);
        }

        let conn = self.store.conn()?;
        let id = match conn
            .query_row("SELECT id FROM words WHERE word = ?1", params![word], |row| row.get(0))
            .optional()?
        {
            Some(id) => id,
            None => conn
                .query_row(
                    "INSERT INTO words (word) VALUES (?1)
                     ON CONFLICT(word) DO UPDATE SET word = excluded.word
                     RETURNING id",
                    params![word],
                    |row| row.get(0),
                )
                .context("word insert returned no id")?,
        };
        drop(conn);

        self.cache_insert(&word, id);
        Ok(id)
    }

    /// Resolve ids for many words in one round trip, creating the
    /// missing ones.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn batch_ensure(&self, words: &[String]) -> Result<HashMap<String, i64>> {
        let mut resolved: HashMap<String, i64> = HashMap::new();
        let mut missing: Vec<String> = Vec::new();
        {
            let cache = self.store.word_cache.lock().expect("cache lock");
            for word in words {
                let word = sanitize(&word.to_lowercase());
                if resolved.contains_key(&word) || missing.contains(&word) {
                    continue;
                }
                match cache.get(&word) {
                    Some(&id) => {
                        resolved.insert(word, id);
                    }
                    None => missing.push(word),
                }
            }
        }
        if missing.is_empty() {
            return Ok(resolved);
        }

        let conn = self.store.conn()?;
        {
            let mut select = conn.prepare("SELECT id FROM words WHERE word = ?1")?;
            let mut insert = conn.prepare(
                "INSERT INTO words (word) VALUES (?1)
                 ON CONFLICT(word) DO UPDATE SET word = excluded.word
                 RETURNING id",
            )?;
            for word in &missing {
                let id: i64 = match select
                    .query_row(params![word], |row| row.get(0))
                    .optional()?
                {
                    Some(id) => id,
                    None => insert.query_row(params![word], |row| row.get(0))?,
                };
                resolved.insert(word.clone(), id);
            }
        }
        drop(conn);

        for word in &missing {
            if let Some(&id) = resolved.get(word) {
                self.cache_insert(word, id);
            }
        }
        Ok(resolved)
    }

    /// Upsert per-path word frequencies.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn store_frequencies(&self, path_id: i64, counts: &HashMap<String, u32>) -> Result<()> {
        if counts.is_empty() {
            return Ok(());
        }
        let words: Vec<String> = counts.keys().cloned().collect();
        let ids = self.batch_ensure(&words)?;

        let mut conn = self.store.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO words_paths (path_id, word_id, word_count) VALUES (?1, ?2, ?3)
                 ON CONFLICT(path_id, word_id) DO UPDATE SET word_count = excluded.word_count",
            )?;
            for (word, count) in counts {
                let key = sanitize(&word.to_lowercase());
                let id = ids
                    .get(&key)
                    .copied()
                    .with_context(|| format!("no id resolved for word {key:?}"))?;
                stmt.execute(params![path_id, id, count])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Word frequencies recorded for a path.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn frequencies(&self, path_id: i64) -> Result<HashMap<String, u32>> {
        let conn = self.store.conn()?;
        let mut stmt = conn.prepare(
            "SELECT w.word, wp.word_count FROM words_paths wp
             JOIN words w ON w.id = wp.word_id
             WHERE wp.path_id = ?1",
        )?;
        let rows = stmt.query_map(params![path_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u32))
        })?;
        let mut out = HashMap::new();
        for row in rows {
            let (word, count) = row?;
            out.insert(word, count);
        }
        Ok(out)
    }

    fn cache_insert(&self, word: &str, id: i64) {
        let mut cache = self.store.word_cache.lock().expect("cache lock");
        if cache.len() < self.store.word_cache_capacity {
            cache.insert(word.to_string(), id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_is_case_insensitive() {
        let store = Store::in_memory().unwrap();
        let a = store.words().ensure("Hello").unwrap();
        let b = store.words().ensure("hello").unwrap();
        assert_eq!(a, b);
        assert_eq!(store.row_count("words").unwrap(), 1);
    }

    #[test]
    fn batch_ensure_mixes_new_and_existing() {
        let store = Store::in_memory().unwrap();
        let existing = store.words().ensure("alpha").unwrap();
        let ids = store
            .words()
            .batch_ensure(&["alpha".into(), "beta".into(), "beta".into()])
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids["alpha"], existing);
        assert_eq!(store.row_count("words").unwrap(), 2);
    }

    #[test]
    fn frequencies_roundtrip() {
        let store = Store::in_memory().unwrap();
        let source = store.sources().get_or_create("s", "", "", 0.5).unwrap();
        let side = store.sides().get_or_create("a", 0.5).unwrap();
        let hash = store.hashes().ensure(&"c".repeat(64), source, side).unwrap();
        let meta = silo_core::FileMeta {
            name: "f.txt".into(),
            path: "/f.txt".into(),
            kind: silo_core::EntryKind::File,
            extension: "txt".into(),
            size_bytes: 1,
            digest: "c".repeat(64),
            modified: chrono::Utc::now(),
        };
        let path_id = store.paths().insert(&meta, hash, "Unread", None).unwrap();

        let counts: HashMap<String, u32> =
            [("tick".to_string(), 2), ("tock".to_string(), 1)].into_iter().collect();
        store.words().store_frequencies(path_id, &counts).unwrap();
        assert_eq!(store.words().frequencies(path_id).unwrap(), counts);

        // Upsert replaces, never accumulates.
        store.words().store_frequencies(path_id, &counts).unwrap();
        assert_eq!(store.words().frequencies(path_id).unwrap(), counts);
    }
}
