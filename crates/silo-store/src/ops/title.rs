//! Operations on the `titles` table.
//!
//! Titles are stored as compressed word-id lists and form a tree:
//! children of a container file get `Branch` status pointing at the
//! container's title, standalone files get `Main`.

use crate::codec::{decode_word_ids, encode_word_ids};
use crate::db::Store;
use anyhow::Result;
use rusqlite::{params, OptionalExtension};

/// Operations on title rows.
pub struct TitleOps<'a> {
    store: &'a Store,
}

/// One row of the `titles` table, decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleRecord {
    pub id: i64,
    pub word_ids: Vec<u32>,
    pub status: String,
    pub parent_title_id: Option<i64>,
}

impl<'a> TitleOps<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Store a title for a path.
    ///
    /// With `parent_path_id` set and a title row existing for that
    /// parent, the new title is a `Branch` under it. A missing parent
    /// title degrades to `Main`: `Branch` rows always reference a live
    /// parent title.
    ///
    /// # Errors
    /// Fails on codec or database errors.
    pub fn store(
        &self,
        word_ids: &[u32],
        path_id: i64,
        parent_path_id: Option<i64>,
    ) -> Result<Option<i64>> {
        if word_ids.is_empty() {
            return Ok(None);
        }
        let blob = encode_word_ids(word_ids)?;

        let conn = self.store.conn()?;
        let parent_title_id: Option<i64> = match parent_path_id {
            Some(parent) => conn
                .query_row(
                    "SELECT id FROM titles WHERE path_id = ?1 LIMIT 1",
                    params![parent],
                    |row| row.get(0),
                )
                .optional()?,
            None => None,
        };
        let status = if parent_title_id.is_some() { "Branch" } else { "Main" };
        if parent_path_id.is_some() && parent_title_id.is_none() {
            tracing::debug!(path_id, "parent has no title row, storing title as Main");
        }

        conn.execute(
            "INSERT INTO titles (title_data, title_status, parent_title_id, path_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![blob, status, parent_title_id, path_id],
        )?;
        Ok(Some(conn.last_insert_rowid()))
    }

    /// Retrieve the decoded title for a path.
    ///
    /// # Errors
    /// Fails on codec or database errors.
    pub fn retrieve(&self, path_id: i64) -> Result<Option<TitleRecord>> {
        let conn = self.store.conn()?;
        let row = conn
            .query_row(
                "SELECT id, title_data, title_status, parent_title_id
                 FROM titles WHERE path_id = ?1 LIMIT 1",
                params![path_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                    ))
                },
            )
            .optional()?;
        match row {
            Some((id, blob, status, parent_title_id)) => Ok(Some(TitleRecord {
                id,
                word_ids: decode_word_ids(&blob)?,
                status,
                parent_title_id,
            })),
            None => Ok(None),
        }
    }
}
