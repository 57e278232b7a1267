//! # Silo Store - SQLite Persistence for the Ingestion Engine
//!
//! Layout:
//! - `sources` / `sides`: provenance dimensions, created lazily
//! - `hashes`: content digests, unique per `(digest, source_id, side_id)`
//! - `paths`: one row per ingested file, FK to `hashes`
//! - `contents`: compressed token-tuple chunks per path
//! - `words` / `words_paths`: word inventory and per-path frequencies
//! - `punctuations`: interned punctuation runs referenced by tuples
//! - `titles`: compressed title word ids forming a parent/child tree
//! - `keywords` / `keywords_paths`: keyword definitions and matches
//!
//! The [`StoragePipeline`] drives the per-file persistence workflow on
//! top of the table-level operation types.

mod batch;
mod codec;
mod db;
mod ops;
mod pipeline;
mod retry;

pub use batch::{BatchSet, HashBatch, WordBatch, WordPathBatch};
pub use codec::{decode_tuples, decode_word_ids, encode_tuples, encode_word_ids, TokenTuple};
pub use db::{PooledConnection, Store};
pub use ops::content::ContentStats;
pub use ops::keyword::match_keywords;
pub use ops::path::PathRecord;
pub use ops::title::TitleRecord;
pub use ops::side::SideRecord;
pub use ops::source::SourceRecord;
pub use pipeline::{StoragePipeline, StorageResponse, StorageResult, StorageStats};
pub use retry::with_backoff;
