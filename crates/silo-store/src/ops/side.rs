//! Operations on the `sides` table.

use crate::db::Store;
use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension};

/// One row of the `sides` table.
#[derive(Debug, Clone, PartialEq)]
pub struct SideRecord {
    pub id: i64,
    pub name: String,
    pub importance: f64,
    pub created_on: String,
}

/// Operations on the secondary partitioning dimension.
pub struct SideOps<'a> {
    store: &'a Store,
}

impl<'a> SideOps<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Get or lazily create a side by its unique name. Importance is
    /// clamped to `[0, 1]`.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn get_or_create(&self, name: &str, importance: f64) -> Result<i64> {
        let conn = self.store.conn()?;
        if let Some(id) = conn
            .query_row("SELECT id FROM sides WHERE name = ?1", params![name], |row| row.get(0))
            .optional()?
        {
            return Ok(id);
        }
        let importance = importance.clamp(0.0, 1.0);
        conn.execute(
            "INSERT INTO sides (name, importance) VALUES (?1, ?2)
             ON CONFLICT(name) DO NOTHING",
            params![name, importance],
        )?;
        conn.query_row("SELECT id FROM sides WHERE name = ?1", params![name], |row| row.get(0))
            .context("side row vanished after insert")
    }

    /// List sides, optionally filtered by a case-insensitive substring.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn list(&self, search: Option<&str>, limit: usize) -> Result<Vec<SideRecord>> {
        let conn = self.store.conn()?;
        let mut out = Vec::new();
        let map = |row: &rusqlite::Row<'_>| {
            Ok(SideRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                importance: row.get(2)?,
                created_on: row.get(3)?,
            })
        };
        if let Some(term) = search {
            let pattern = format!("%{term}%");
            let mut stmt = conn.prepare(
                "SELECT id, name, importance, created_on FROM sides
                 WHERE name LIKE ?1 ORDER BY name LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![pattern, limit as i64], map)?;
            for row in rows {
                out.push(row?);
            }
        } else {
            let mut stmt = conn.prepare(
                "SELECT id, name, importance, created_on FROM sides ORDER BY name LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], map)?;
            for row in rows {
                out.push(row?);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sides_are_unique_by_name() {
        let store = Store::in_memory().unwrap();
        let a = store.sides().get_or_create("A", 0.5).unwrap();
        let b = store.sides().get_or_create("A", 0.9).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.row_count("sides").unwrap(), 1);
    }

    #[test]
    fn negative_importance_clamps_to_zero() {
        let store = Store::in_memory().unwrap();
        store.sides().get_or_create("cold", -3.0).unwrap();
        let listed = store.sides().list(None, 10).unwrap();
        assert!(listed[0].importance.abs() < f64::EPSILON);
    }
}
