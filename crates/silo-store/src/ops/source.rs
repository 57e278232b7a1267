//! Operations on the `sources` table.

use crate::db::Store;
use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension};

/// One row of the `sources` table.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub id: i64,
    pub name: String,
    pub country: String,
    pub job: String,
    pub importance: f64,
    pub created_on: String,
}

/// Operations on provenance sources.
pub struct SourceOps<'a> {
    store: &'a Store,
}

impl<'a> SourceOps<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Get or lazily create a source by its unique name.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn get_or_create(
        &self,
        name: &str,
        country: &str,
        job: &str,
        importance: f64,
    ) -> Result<i64> {
        let conn = self.store.conn()?;
        if let Some(id) = conn
            .query_row("SELECT id FROM sources WHERE name = ?1", params![name], |row| row.get(0))
            .optional()?
        {
            return Ok(id);
        }
        let importance = importance.clamp(0.0, 1.0);
        conn.execute(
            "INSERT INTO sources (name, country, job, importance) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO NOTHING",
            params![name, country, job, importance],
        )?;
        // Re-select instead of last_insert_rowid: a concurrent insert may
        // have won the conflict.
        conn.query_row("SELECT id FROM sources WHERE name = ?1", params![name], |row| row.get(0))
            .context("source row vanished after insert")
    }

    /// List sources, optionally filtered by a case-insensitive substring
    /// over name, country and job.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn list(&self, search: Option<&str>, limit: usize) -> Result<Vec<SourceRecord>> {
        let conn = self.store.conn()?;
        let mut out = Vec::new();
        let map = |row: &rusqlite::Row<'_>| {
            Ok(SourceRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                country: row.get(2)?,
                job: row.get(3)?,
                importance: row.get(4)?,
                created_on: row.get(5)?,
            })
        };
        if let Some(term) = search {
            let pattern = format!("%{term}%");
            let mut stmt = conn.prepare(
                "SELECT id, name, country, job, importance, created_on FROM sources
                 WHERE name LIKE ?1 OR country LIKE ?1 OR job LIKE ?1
                 ORDER BY name LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![pattern, limit as i64], map)?;
            for row in rows {
                out.push(row?);
            }
        } else {
            let mut stmt = conn.prepare(
                "SELECT id, name, country, job, importance, created_on FROM sources
                 ORDER BY name LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], map)?;
            for row in rows {
                out.push(row?);
            }
        }
        Ok(out)
    }
}
