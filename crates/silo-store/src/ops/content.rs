//! Operations on the `contents` table.
//!
//! Token streams are chunked, compressed and stored one row per chunk.
//! Chunk order is the insertion order; retrieval concatenates chunks
//! ordered by id, so the stream round-trips exactly.

use crate::codec::{decode_tuples, encode_tuples, TokenTuple};
use crate::db::Store;
use anyhow::Result;
use rusqlite::params;

/// Regular chunk size.
const CHUNK_SIZE: usize = 100_000;
/// Chunk size for very large documents.
const CHUNK_SIZE_LARGE_DOC: usize = 5_000;
/// Stream length above which the small chunk size applies.
const LARGE_DOC_THRESHOLD: usize = 1_000_000;

/// Aggregate statistics about a path's stored content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentStats {
    pub chunk_count: u64,
    pub total_compressed_bytes: u64,
}

/// Operations on compressed content chunks.
pub struct ContentOps<'a> {
    store: &'a Store,
}

impl<'a> ContentOps<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Chunk, compress and store a token stream for a path.
    ///
    /// Streams up to one million tuples use 100k-tuple chunks; larger
    /// streams switch to 5k chunks to bound per-row memory.
    ///
    /// # Errors
    /// Fails on codec or database errors.
    pub fn store_chunks(&self, tuples: &[TokenTuple], path_id: i64) -> Result<()> {
        if tuples.is_empty() {
            return Ok(());
        }
        let chunk_size =
            if tuples.len() > LARGE_DOC_THRESHOLD { CHUNK_SIZE_LARGE_DOC } else { CHUNK_SIZE };

        let mut conn = self.store.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO contents (content_data, path_id) VALUES (?1, ?2)",
            )?;
            for chunk in tuples.chunks(chunk_size) {
                stmt.execute(params![encode_tuples(chunk)?, path_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Retrieve the full token stream for a path, chunks concatenated in
    /// id order.
    ///
    /// # Errors
    /// Fails on codec or database errors.
    pub fn retrieve(&self, path_id: i64) -> Result<Vec<TokenTuple>> {
        let conn = self.store.conn()?;
        let mut stmt =
            conn.prepare("SELECT content_data FROM contents WHERE path_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![path_id], |row| row.get::<_, Vec<u8>>(0))?;
        let mut tuples = Vec::new();
        for blob in rows {
            tuples.extend(decode_tuples(&blob?)?);
        }
        Ok(tuples)
    }

    /// Chunk count and compressed byte total for a path.
    ///
    /// # Errors
    /// Fails on database errors.
    pub fn stats(&self, path_id: i64) -> Result<ContentStats> {
        let conn = self.store.conn()?;
        conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(LENGTH(content_data)), 0)
             FROM contents WHERE path_id = ?1",
            params![path_id],
            |row| {
                Ok(ContentStats {
                    chunk_count: row.get::<_, i64>(0)? as u64,
                    total_compressed_bytes: row.get::<_, i64>(1)? as u64,
                })
            },
        )
        .map_err(Into::into)
    }
}
