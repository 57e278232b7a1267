//! Deduplication index: operations on the `hashes` table.
//!
//! A file is a duplicate only when digest, source and side all match an
//! existing hash row that already owns a path. A hash row without a path
//! (an orphan, left behind by an interrupted run) is not a duplicate;
//! the insert path below reuses it.

use crate::db::Store;
use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension};
use silo_core::digest;

/// Operations on the deduplication index.
pub struct HashOps<'a> {
    store: &'a Store,
}

impl<'a> HashOps<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Insert-if-absent for the `(digest, source_id, side_id)` triple.
    ///
    /// Race-safe: a concurrent insert of the same triple loses the
    /// conflict and the existing id is re-selected.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn ensure(&self, file_digest: &str, source_id: i64, side_id: i64) -> Result<i64> {
        let conn = self.store.conn()?;
        if let Some(id) = conn
            .query_row(
                "SELECT id FROM hashes WHERE digest = ?1 AND source_id = ?2 AND side_id = ?3",
                params![file_digest, source_id, side_id],
                |row| row.get(0),
            )
            .optional()?
        {
            return Ok(id);
        }
        conn.execute(
            "INSERT INTO hashes (digest, source_id, side_id) VALUES (?1, ?2, ?3)
             ON CONFLICT(digest, source_id, side_id) DO NOTHING",
            params![file_digest, source_id, side_id],
        )?;
        conn.query_row(
            "SELECT id FROM hashes WHERE digest = ?1 AND source_id = ?2 AND side_id = ?3",
            params![file_digest, source_id, side_id],
            |row| row.get(0),
        )
        .context("hash row vanished after insert")
    }

    /// Duplicate check for the triple.
    ///
    /// Returns `(true, Some(path_id))` only when a hash row exists for
    /// the triple *and* some path already owns it. Orphan hashes and
    /// sentinel digests return `(false, None)`.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn lookup_duplicate(
        &self,
        file_digest: &str,
        source_id: i64,
        side_id: i64,
    ) -> Result<(bool, Option<i64>)> {
        if digest::is_sentinel(file_digest) {
            return Ok((false, None));
        }

        let conn = self.store.conn()?;
        let hash_id: Option<i64> = conn
            .query_row(
                "SELECT id FROM hashes WHERE digest = ?1 AND source_id = ?2 AND side_id = ?3",
                params![file_digest, source_id, side_id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(hash_id) = hash_id else {
            return Ok((false, None));
        };

        let path_id: Option<i64> = conn
            .query_row(
                "SELECT id FROM paths WHERE hash_id = ?1 ORDER BY id DESC LIMIT 1",
                params![hash_id],
                |row| row.get(0),
            )
            .optional()?;

        match path_id {
            Some(path_id) => Ok((true, Some(path_id))),
            None => Ok((false, None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    fn setup() -> (Store, i64, i64) {
        let store = Store::in_memory().unwrap();
        let source_id = store.sources().get_or_create("s1", "", "", 0.5).unwrap();
        let side_id = store.sides().get_or_create("a", 0.5).unwrap();
        (store, source_id, side_id)
    }

    #[test]
    fn ensure_reuses_existing_triple() {
        let (store, source_id, side_id) = setup();
        let first = store.hashes().ensure(DIGEST, source_id, side_id).unwrap();
        let second = store.hashes().ensure(DIGEST, source_id, side_id).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.row_count("hashes").unwrap(), 1);
    }

    #[test]
    fn different_side_makes_a_new_row() {
        let (store, source_id, side_id) = setup();
        let other_side = store.sides().get_or_create("b", 0.5).unwrap();
        let first = store.hashes().ensure(DIGEST, source_id, side_id).unwrap();
        let second = store.hashes().ensure(DIGEST, source_id, other_side).unwrap();
        assert_ne!(first, second);
        assert_eq!(store.row_count("hashes").unwrap(), 2);
    }

    #[test]
    fn orphan_hash_is_not_a_duplicate() {
        let (store, source_id, side_id) = setup();
        store.hashes().ensure(DIGEST, source_id, side_id).unwrap();
        let (dup, path_id) = store.hashes().lookup_duplicate(DIGEST, source_id, side_id).unwrap();
        assert!(!dup);
        assert!(path_id.is_none());
    }

    #[test]
    fn sentinel_digests_short_circuit() {
        let (store, source_id, side_id) = setup();
        for sentinel in ["", "N/A", "SKIPPED_LARGE_FILE", "ERROR", "deadbeef"] {
            let (dup, path_id) =
                store.hashes().lookup_duplicate(sentinel, source_id, side_id).unwrap();
            assert!(!dup, "sentinel {sentinel:?} must not be a duplicate");
            assert!(path_id.is_none());
        }
    }
}
