//! # Silo Core - Shared Types for the Filesilo Ingestion Engine
//!
//! This crate defines the vocabulary shared by every other filesilo crate:
//!
//! - [`FileMeta`] - standardized file metadata with SHA-256 digests
//! - [`ExtractedContent`] - the tagged result every extractor produces
//! - [`SiloError`] - the error taxonomy of the whole pipeline
//! - [`FormatGroup`] - extension-to-extractor grouping
//! - [`Config`] - environment-driven configuration
//! - [`magic`] - file-type detection from leading bytes
//!
//! No I/O beyond filesystem metadata and hashing happens here; format
//! parsing lives in `silo-extract`, persistence in `silo-store`.

pub mod config;
pub mod content;
pub mod error;
pub mod format;
pub mod magic;
pub mod meta;

pub use config::Config;
pub use content::{EmailMessage, ExtractedContent, Page, Sheet, Slide, Table};
pub use error::{ErrorKind, SiloError};
pub use format::FormatGroup;
pub use meta::{digest, EntryKind, FileMeta};

/// Convenient result alias used across the workspace.
pub type Result<T> = std::result::Result<T, SiloError>;
