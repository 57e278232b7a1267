//! Database handle and connection pool.
//!
//! Schema:
//! - sources, sides: provenance dimensions
//! - hashes: (digest, source_id, side_id) unique triple
//! - paths: file metadata, FK to hashes
//! - contents: compressed token chunks, FK to paths (cascade)
//! - words, words_paths, punctuations: token inventory
//! - titles: compressed title word ids with a parent tree
//! - keywords, keywords_paths: keyword matching

use anyhow::{Context, Result};
use rusqlite::Connection;
use silo_core::Config;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    country TEXT NOT NULL DEFAULT '',
    job TEXT NOT NULL DEFAULT '',
    importance REAL NOT NULL DEFAULT 0.5,
    created_on TEXT NOT NULL DEFAULT (date('now'))
);

CREATE TABLE IF NOT EXISTS sides (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    importance REAL NOT NULL DEFAULT 0.5,
    created_on TEXT NOT NULL DEFAULT (date('now'))
);

CREATE TABLE IF NOT EXISTS hashes (
    id INTEGER PRIMARY KEY,
    digest TEXT NOT NULL,
    source_id INTEGER NOT NULL REFERENCES sources(id),
    side_id INTEGER NOT NULL REFERENCES sides(id),
    UNIQUE(digest, source_id, side_id)
);

CREATE TABLE IF NOT EXISTS paths (
    id INTEGER PRIMARY KEY,
    file_name TEXT NOT NULL,
    file_path TEXT NOT NULL,
    file_size INTEGER NOT NULL DEFAULT 0,
    file_type TEXT NOT NULL DEFAULT 'FILE',
    file_status TEXT NOT NULL DEFAULT 'Unread' CHECK (file_status IN ('Read', 'Unread')),
    file_date TEXT,
    created_on TEXT NOT NULL DEFAULT (date('now')),
    hash_id INTEGER NOT NULL REFERENCES hashes(id)
);

CREATE TABLE IF NOT EXISTS contents (
    id INTEGER PRIMARY KEY,
    content_data BLOB NOT NULL,
    content_date TEXT NOT NULL DEFAULT (date('now')),
    path_id INTEGER NOT NULL REFERENCES paths(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS words (
    id INTEGER PRIMARY KEY,
    word TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS words_paths (
    path_id INTEGER NOT NULL REFERENCES paths(id) ON DELETE CASCADE,
    word_id INTEGER NOT NULL REFERENCES words(id),
    word_count INTEGER NOT NULL,
    PRIMARY KEY (path_id, word_id)
);

CREATE TABLE IF NOT EXISTS punctuations (
    id INTEGER PRIMARY KEY,
    punctuation TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS titles (
    id INTEGER PRIMARY KEY,
    title_data BLOB NOT NULL,
    title_status TEXT NOT NULL CHECK (title_status IN ('Main', 'Branch')),
    parent_title_id INTEGER REFERENCES titles(id),
    path_id INTEGER NOT NULL REFERENCES paths(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS keywords (
    id INTEGER PRIMARY KEY,
    keyword_data BLOB NOT NULL,
    category_id INTEGER
);

CREATE TABLE IF NOT EXISTS keywords_paths (
    path_id INTEGER NOT NULL REFERENCES paths(id) ON DELETE CASCADE,
    keyword_id INTEGER NOT NULL REFERENCES keywords(id),
    word_count INTEGER NOT NULL,
    PRIMARY KEY (path_id, keyword_id)
);

CREATE INDEX IF NOT EXISTS idx_hashes_triple ON hashes(digest, source_id, side_id);
CREATE INDEX IF NOT EXISTS idx_paths_hash_id ON paths(hash_id);
CREATE INDEX IF NOT EXISTS idx_paths_file_path ON paths(file_path);
CREATE INDEX IF NOT EXISTS idx_contents_path_id ON contents(path_id);
CREATE INDEX IF NOT EXISTS idx_titles_path_id ON titles(path_id);
";

struct PoolState {
    idle: Vec<Connection>,
    /// Connections currently alive, idle or checked out.
    total: usize,
}

/// Bounded connection pool.
///
/// Connections are created lazily up to `max`; `acquire` blocks when the
/// pool is exhausted. Each checked-out connection is returned on drop.
struct ConnectionPool {
    state: Mutex<PoolState>,
    available: Condvar,
    max: usize,
    /// `None` for the in-memory store, which keeps its single connection
    /// alive for the lifetime of the pool.
    db_path: Option<PathBuf>,
}

impl ConnectionPool {
    fn open(db_path: &Path, min: usize, max: usize) -> Result<Self> {
        let max = max.max(1);
        let min = min.clamp(1, max);

        let mut idle = Vec::with_capacity(min);
        for _ in 0..min {
            idle.push(open_connection(db_path)?);
        }
        Ok(Self {
            state: Mutex::new(PoolState { total: idle.len(), idle }),
            available: Condvar::new(),
            max,
            db_path: Some(db_path.to_path_buf()),
        })
    }

    fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            state: Mutex::new(PoolState { idle: vec![conn], total: 1 }),
            available: Condvar::new(),
            max: 1,
            db_path: None,
        })
    }

    fn acquire(&self) -> Result<Connection> {
        let mut state = self.state.lock().expect("pool lock poisoned");
        loop {
            if let Some(conn) = state.idle.pop() {
                return Ok(conn);
            }
            if state.total < self.max {
                let path = self
                    .db_path
                    .as_ref()
                    .expect("in-memory pool never grows past its one connection");
                state.total += 1;
                drop(state);
                return match open_connection(path) {
                    Ok(conn) => Ok(conn),
                    Err(e) => {
                        self.state.lock().expect("pool lock poisoned").total -= 1;
                        self.available.notify_one();
                        Err(e)
                    }
                };
            }
            state = self.available.wait(state).expect("pool lock poisoned");
        }
    }

    fn release(&self, conn: Connection) {
        let mut state = self.state.lock().expect("pool lock poisoned");
        state.idle.push(conn);
        drop(state);
        self.available.notify_one();
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database: {}", path.display()))?;
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(conn)
}

/// Connection checked out from the pool; returned on drop.
pub struct PooledConnection<'a> {
    store: &'a Store,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection taken")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection taken")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.store.pool.release(conn);
        }
    }
}

/// Database handle shared by all operation types.
///
/// Cheap to share behind an `Arc`; every operation checks a connection
/// out of the pool for its own transaction, so transactions never span
/// files.
pub struct Store {
    pool: ConnectionPool,
    pub(crate) word_cache: Mutex<HashMap<String, i64>>,
    pub(crate) word_cache_capacity: usize,
    pub(crate) punctuation_cache: Mutex<HashMap<String, i64>>,
    pub(crate) batch_size: usize,
}

impl Store {
    /// Open (or create) the database configured by `config`.
    ///
    /// # Errors
    /// Fails when the database file cannot be created or the schema
    /// cannot be applied.
    pub fn open(config: &Config) -> Result<Self> {
        Self::open_at(&config.database_path(), config)
    }

    /// Open (or create) a database at an explicit path.
    ///
    /// # Errors
    /// Fails when the database file cannot be created or the schema
    /// cannot be applied.
    pub fn open_at(path: &Path, config: &Config) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory: {}", parent.display()))?;
            }
        }

        let pool = ConnectionPool::open(path, config.db_min_connections, config.db_max_connections)?;
        {
            let conn = pool.acquire()?;
            conn.execute_batch(SCHEMA).context("failed to apply schema")?;
            pool.release(conn);
        }
        Ok(Self {
            pool,
            word_cache: Mutex::new(HashMap::new()),
            word_cache_capacity: config.word_cache_size,
            punctuation_cache: Mutex::new(HashMap::new()),
            batch_size: config.batch_size,
        })
    }

    /// In-memory database for tests.
    ///
    /// # Errors
    /// Fails when SQLite cannot allocate the database.
    pub fn in_memory() -> Result<Self> {
        let config = Config::default();
        Ok(Self {
            pool: ConnectionPool::in_memory()?,
            word_cache: Mutex::new(HashMap::new()),
            word_cache_capacity: config.word_cache_size,
            punctuation_cache: Mutex::new(HashMap::new()),
            batch_size: config.batch_size,
        })
    }

    /// Check a connection out of the pool.
    ///
    /// # Errors
    /// Fails when a new connection cannot be opened.
    pub fn conn(&self) -> Result<PooledConnection<'_>> {
        Ok(PooledConnection { store: self, conn: Some(self.pool.acquire()?) })
    }

    /// Operations on the `sources` table.
    #[must_use]
    pub fn sources(&self) -> crate::ops::source::SourceOps<'_> {
        crate::ops::source::SourceOps::new(self)
    }

    /// Operations on the `sides` table.
    #[must_use]
    pub fn sides(&self) -> crate::ops::side::SideOps<'_> {
        crate::ops::side::SideOps::new(self)
    }

    /// Operations on the `hashes` table (deduplication index).
    #[must_use]
    pub fn hashes(&self) -> crate::ops::hash::HashOps<'_> {
        crate::ops::hash::HashOps::new(self)
    }

    /// Operations on the `paths` table.
    #[must_use]
    pub fn paths(&self) -> crate::ops::path::PathOps<'_> {
        crate::ops::path::PathOps::new(self)
    }

    /// Operations on the `contents` table.
    #[must_use]
    pub fn contents(&self) -> crate::ops::content::ContentOps<'_> {
        crate::ops::content::ContentOps::new(self)
    }

    /// Operations on the `words` and `words_paths` tables.
    #[must_use]
    pub fn words(&self) -> crate::ops::word::WordOps<'_> {
        crate::ops::word::WordOps::new(self)
    }

    /// Operations on the `punctuations` table.
    #[must_use]
    pub fn punctuations(&self) -> crate::ops::punctuation::PunctuationOps<'_> {
        crate::ops::punctuation::PunctuationOps::new(self)
    }

    /// Operations on the `titles` table.
    #[must_use]
    pub fn titles(&self) -> crate::ops::title::TitleOps<'_> {
        crate::ops::title::TitleOps::new(self)
    }

    /// Operations on the `keywords` tables.
    #[must_use]
    pub fn keywords(&self) -> crate::ops::keyword::KeywordOps<'_> {
        crate::ops::keyword::KeywordOps::new(self)
    }

    /// Number of rows in a table, for tests and diagnostics.
    ///
    /// # Errors
    /// Fails on unknown table names.
    pub fn row_count(&self, table: &str) -> Result<i64> {
        // Table names cannot be bound; restrict to the known schema.
        const TABLES: &[&str] = &[
            "sources", "sides", "hashes", "paths", "contents", "words", "words_paths",
            "punctuations", "titles", "keywords", "keywords_paths",
        ];
        anyhow::ensure!(TABLES.contains(&table), "unknown table: {table}");
        let conn = self.conn()?;
        let count =
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count)
    }
}
