//! Operations on the `keywords` and `keywords_paths` tables.
//!
//! A keyword is a compressed list of word ids. A document matches a
//! keyword when every one of its word ids occurs in the document; the
//! match count is the minimum frequency across those words.

use crate::codec::{decode_word_ids, encode_word_ids};
use crate::db::Store;
use anyhow::Result;
use rusqlite::params;
use std::collections::HashMap;

/// Operations on keyword definitions and matches.
pub struct KeywordOps<'a> {
    store: &'a Store,
}

impl<'a> KeywordOps<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Define a keyword from word ids.
    ///
    /// # Errors
    /// Fails on codec or database errors.
    pub fn define(&self, word_ids: &[u32], category_id: Option<i64>) -> Result<i64> {
        let conn = self.store.conn()?;
        conn.execute(
            "INSERT INTO keywords (keyword_data, category_id) VALUES (?1, ?2)",
            params![encode_word_ids(word_ids)?, category_id],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Load all keyword definitions, decoded. Corrupt rows are skipped.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn load_all(&self) -> Result<HashMap<i64, Vec<u32>>> {
        let conn = self.store.conn()?;
        let mut stmt = conn.prepare("SELECT id, keyword_data FROM keywords")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;
        let mut out = HashMap::new();
        for row in rows {
            let (id, blob) = row?;
            match decode_word_ids(&blob) {
                Ok(word_ids) => {
                    out.insert(id, word_ids);
                }
                Err(e) => {
                    tracing::warn!(keyword_id = id, error = %e, "skipping corrupt keyword");
                }
            }
        }
        Ok(out)
    }

    /// Upsert per-path keyword match counts.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn store_frequencies(&self, path_id: i64, counts: &HashMap<i64, u32>) -> Result<()> {
        if counts.is_empty() {
            return Ok(());
        }
        let mut conn = self.store.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO keywords_paths (path_id, keyword_id, word_count)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(path_id, keyword_id) DO UPDATE SET word_count = excluded.word_count",
            )?;
            for (keyword_id, count) in counts {
                stmt.execute(params![path_id, keyword_id, count])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

/// Match a document's word ids against keyword definitions.
///
/// A keyword matches when all its words occur in the document; the
/// match count is the minimum occurrence count across those words.
#[must_use]
pub fn match_keywords(
    document_word_ids: &[u32],
    keywords: &HashMap<i64, Vec<u32>>,
) -> HashMap<i64, u32> {
    if keywords.is_empty() || document_word_ids.is_empty() {
        return HashMap::new();
    }
    let mut occurrences: HashMap<u32, u32> = HashMap::new();
    for &id in document_word_ids {
        *occurrences.entry(id).or_insert(0) += 1;
    }

    let mut matches = HashMap::new();
    for (&keyword_id, word_ids) in keywords {
        if word_ids.is_empty() {
            continue;
        }
        let min_count = word_ids.iter().map(|id| occurrences.get(id).copied().unwrap_or(0)).min();
        if let Some(count) = min_count {
            if count > 0 {
                matches.insert(keyword_id, count);
            }
        }
    }
    matches
}
