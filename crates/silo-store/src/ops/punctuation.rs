//! Operations on the `punctuations` table.
//!
//! Punctuation runs and spacing strings around words are interned here;
//! content tuples reference them by id. The set is tiny in practice, so
//! the whole table is preloaded into the cache at pipeline startup.

use crate::db::Store;
use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension};
use silo_tokenize::sanitize;

/// Operations on interned punctuation.
pub struct PunctuationOps<'a> {
    store: &'a Store,
}

impl<'a> PunctuationOps<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Load every existing punctuation row into the cache.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn preload(&self) -> Result<usize> {
        let conn = self.store.conn()?;
        let mut stmt = conn.prepare("SELECT id, punctuation FROM punctuations")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut cache = self.store.punctuation_cache.lock().expect("cache lock");
        let mut loaded = 0;
        for row in rows {
            let (id, text) = row?;
            cache.insert(text, id);
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Get or create the id for a punctuation or spacing run.
    ///
    /// Returns `None` for the empty string: empty runs are stored as
    /// NULL in content tuples, not interned.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn ensure(&self, text: &str) -> Result<Option<i64>> {
        let text = sanitize(text);
        if text.is_empty() {
            return Ok(None);
        }

        if let Some(&id) = self.store.punctuation_cache.lock().expect("cache lock").get(&text) {
            return Ok(Some(id));
        }

        let conn = self.store.conn()?;
        let id: i64 = match conn
            .query_row(
                "SELECT id FROM punctuations WHERE punctuation = ?1",
                params![text],
                |row| row.get(0),
            )
            .optional()?
        {
            Some(id) => id,
            None => conn
                .query_row(
                    "INSERT INTO punctuations (punctuation) VALUES (?1)
                     ON CONFLICT(punctuation) DO UPDATE SET punctuation = excluded.punctuation
                     RETURNING id",
                    params![text],
                    |row| row.get(0),
                )
                .context("punctuation insert returned no id")?,
        };
        drop(conn);

        self.store.punctuation_cache.lock().expect("cache lock").insert(text, id);
        Ok(Some(id))
    }

    /// Resolve the text for an interned id.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn get(&self, id: i64) -> Result<Option<String>> {
        let conn = self.store.conn()?;
        conn.query_row(
            "SELECT punctuation FROM punctuations WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }
}
