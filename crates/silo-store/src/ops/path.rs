//! Operations on the `paths` table.
//!
//! Path rows carry no uniqueness on name or path: the same textual path
//! may appear many times with different hashes. Deduplication happens at
//! the hash level only.

use crate::db::Store;
use anyhow::Result;
use rusqlite::{params, OptionalExtension};
use silo_core::FileMeta;

/// Maximum stored length for names and paths.
const MAX_PATH_LEN: usize = 500;
/// Maximum stored length for the file type tag.
const MAX_TYPE_LEN: usize = 100;

/// One row of the `paths` table.
#[derive(Debug, Clone, PartialEq)]
pub struct PathRecord {
    pub id: i64,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub file_type: String,
    pub file_status: String,
    pub hash_id: i64,
}

/// Operations on file metadata rows.
pub struct PathOps<'a> {
    store: &'a Store,
}

impl<'a> PathOps<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Insert a path row for an ingested file.
    ///
    /// `display_path` overrides the filesystem path for staged children,
    /// carrying the `parent::child` hierarchy string instead.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn insert(
        &self,
        meta: &FileMeta,
        hash_id: i64,
        status: &str,
        display_path: Option<&str>,
    ) -> Result<i64> {
        let status = if matches!(status, "Read" | "Unread") { status } else { "Unread" };
        let file_path = display_path
            .map(ToString::to_string)
            .unwrap_or_else(|| meta.path.to_string_lossy().into_owned());

        let conn = self.store.conn()?;
        conn.execute(
            "INSERT INTO paths
                 (file_name, file_path, file_size, file_type, file_status, file_date, hash_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                truncate(&meta.name, MAX_PATH_LEN),
                truncate(&file_path, MAX_PATH_LEN),
                meta.size_bytes as i64,
                truncate(&format!("FILE{}", meta.dotted_extension()), MAX_TYPE_LEN),
                status,
                meta.modified.date_naive().to_string(),
                hash_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Update the read status of a path.
    ///
    /// # Errors
    /// Fails on database errors; invalid status values are rejected.
    pub fn set_status(&self, path_id: i64, status: &str) -> Result<bool> {
        anyhow::ensure!(matches!(status, "Read" | "Unread"), "invalid status: {status}");
        let conn = self.store.conn()?;
        let rows = conn.execute(
            "UPDATE paths SET file_status = ?1 WHERE id = ?2",
            params![status, path_id],
        )?;
        Ok(rows > 0)
    }

    /// Whether any row for this textual path has already been read.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn is_processed(&self, file_path: &str) -> Result<bool> {
        let conn = self.store.conn()?;
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM paths WHERE file_path = ?1 AND file_status = 'Read' LIMIT 1",
                params![file_path],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.is_some())
    }

    /// Fetch one path row.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn get(&self, path_id: i64) -> Result<Option<PathRecord>> {
        let conn = self.store.conn()?;
        conn.query_row(
            "SELECT id, file_name, file_path, file_size, file_type, file_status, hash_id
             FROM paths WHERE id = ?1",
            params![path_id],
            |row| {
                Ok(PathRecord {
                    id: row.get(0)?,
                    file_name: row.get(1)?,
                    file_path: row.get(2)?,
                    file_size: row.get(3)?,
                    file_type: row.get(4)?,
                    file_status: row.get(5)?,
                    hash_id: row.get(6)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    /// All paths owning a given hash.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn by_hash(&self, hash_id: i64) -> Result<Vec<PathRecord>> {
        let conn = self.store.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, file_name, file_path, file_size, file_type, file_status, hash_id
             FROM paths WHERE hash_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![hash_id], |row| {
            Ok(PathRecord {
                id: row.get(0)?,
                file_name: row.get(1)?,
                file_path: row.get(2)?,
                file_size: row.get(3)?,
                file_type: row.get(4)?,
                file_status: row.get(5)?,
                hash_id: row.get(6)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn truncate(value: &str, max: usize) -> String {
    if value.len() <= max {
        value.to_string()
    } else {
        let mut end = max;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        value[..end].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use silo_core::EntryKind;
    use std::path::PathBuf;

    fn meta(name: &str) -> FileMeta {
        FileMeta {
            name: name.to_string(),
            path: PathBuf::from(format!("/data/{name}")),
            kind: EntryKind::File,
            extension: "txt".into(),
            size_bytes: 42,
            digest: "b".repeat(64),
            modified: Utc::now(),
        }
    }

    fn hash_id(store: &Store) -> i64 {
        let source = store.sources().get_or_create("s", "", "", 0.5).unwrap();
        let side = store.sides().get_or_create("a", 0.5).unwrap();
        store.hashes().ensure(&"b".repeat(64), source, side).unwrap()
    }

    #[test]
    fn insert_defaults_to_unread() {
        let store = Store::in_memory().unwrap();
        let hid = hash_id(&store);
        let pid = store.paths().insert(&meta("a.txt"), hid, "bogus", None).unwrap();
        let record = store.paths().get(pid).unwrap().unwrap();
        assert_eq!(record.file_status, "Unread");
        assert_eq!(record.file_type, "FILE.txt");
    }

    #[test]
    fn same_path_twice_is_legal() {
        let store = Store::in_memory().unwrap();
        let hid = hash_id(&store);
        store.paths().insert(&meta("a.txt"), hid, "Unread", None).unwrap();
        store.paths().insert(&meta("a.txt"), hid, "Unread", None).unwrap();
        assert_eq!(store.row_count("paths").unwrap(), 2);
    }

    #[test]
    fn display_path_overrides_filesystem_path() {
        let store = Store::in_memory().unwrap();
        let hid = hash_id(&store);
        let pid = store
            .paths()
            .insert(&meta("inner.txt"), hid, "Unread", Some("/data/outer.zip::inner.txt"))
            .unwrap();
        let record = store.paths().get(pid).unwrap().unwrap();
        assert_eq!(record.file_path, "/data/outer.zip::inner.txt");
    }

    #[test]
    fn set_status_promotes_to_read() {
        let store = Store::in_memory().unwrap();
        let hid = hash_id(&store);
        let pid = store.paths().insert(&meta("a.txt"), hid, "Unread", None).unwrap();
        assert!(store.paths().set_status(pid, "Read").unwrap());
        assert!(store.paths().is_processed("/data/a.txt").unwrap());
        assert!(store.paths().set_status(pid, "Skimmed").is_err());
    }
}
