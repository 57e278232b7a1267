//! Standardized file metadata and content hashing.
//!
//! Every file entering the pipeline is described by a [`FileMeta`] built
//! here, including its SHA-256 digest. Files above [`HASH_SIZE_LIMIT`]
//! receive the `SKIPPED_LARGE_FILE` sentinel instead of a digest;
//! unreadable files receive `ERROR`.

use chrono::{DateTime, Utc};
use sha2::{Digest as _, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Files larger than this are never hashed (100 MiB).
pub const HASH_SIZE_LIMIT: u64 = 100 * 1024 * 1024;

/// Sentinel digest values and validation.
pub mod digest {
    /// Digest was not computed.
    pub const NOT_AVAILABLE: &str = "N/A";
    /// File exceeded the hashing size limit.
    pub const SKIPPED_LARGE_FILE: &str = "SKIPPED_LARGE_FILE";
    /// Hashing failed with an I/O error.
    pub const ERROR: &str = "ERROR";

    /// Whether a digest string is unusable for deduplication.
    ///
    /// Covers the empty string, every sentinel, and anything that is not
    /// a 64-character hex digest.
    #[must_use]
    pub fn is_sentinel(value: &str) -> bool {
        value.is_empty()
            || value == NOT_AVAILABLE
            || value == SKIPPED_LARGE_FILE
            || value == ERROR
            || value.len() != 64
    }
}

/// Filesystem entry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Other,
}

/// Standardized metadata for a single filesystem entry.
#[derive(Debug, Clone)]
pub struct FileMeta {
    /// Base name including extension.
    pub name: String,
    /// Absolute path.
    pub path: PathBuf,
    /// Entry kind; only `File` entries are ingested.
    pub kind: EntryKind,
    /// Lowercased extension without the dot; empty when absent.
    pub extension: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// SHA-256 hex digest, or one of the [`digest`] sentinels.
    pub digest: String,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

impl FileMeta {
    /// Build metadata for a single path, hashing the content when the
    /// entry is a readable file under the size limit.
    ///
    /// # Errors
    /// Returns an error when the path cannot be stat'ed.
    pub fn scan(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let stat = std::fs::metadata(path)?;

        let kind = if stat.is_file() {
            EntryKind::File
        } else if stat.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::Other
        };

        let digest = if kind == EntryKind::File {
            if stat.len() < HASH_SIZE_LIMIT {
                sha256_file(path).unwrap_or_else(|e| {
                    tracing::warn!(path = %path.display(), error = %e, "hashing failed");
                    digest::ERROR.to_string()
                })
            } else {
                digest::SKIPPED_LARGE_FILE.to_string()
            }
        } else {
            digest::NOT_AVAILABLE.to_string()
        };

        let modified = stat
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(Self {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: path
                .canonicalize()
                .unwrap_or_else(|_| path.to_path_buf()),
            kind,
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_default(),
            size_bytes: stat.len(),
            digest,
            modified,
        })
    }

    /// Recursively scan a directory, returning metadata for every file.
    ///
    /// Entries that cannot be stat'ed are skipped with a warning; the
    /// walk itself never fails.
    #[must_use]
    pub fn scan_tree(dir: impl AsRef<Path>) -> Vec<Self> {
        let mut out = Vec::new();
        walk(dir.as_ref(), &mut out);
        out
    }

    /// Whether this entry is a regular file.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Extension with a leading dot, for display.
    #[must_use]
    pub fn dotted_extension(&self) -> String {
        if self.extension.is_empty() {
            String::new()
        } else {
            format!(".{}", self.extension)
        }
    }
}

fn walk(dir: &Path, out: &mut Vec<FileMeta>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "cannot read directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        match FileMeta::scan(&path) {
            Ok(meta) => {
                let is_dir = meta.kind == EntryKind::Directory;
                if meta.is_file() {
                    out.push(meta);
                }
                if is_dir {
                    walk(&path, out);
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot stat entry");
            }
        }
    }
}

/// SHA-256 of a file's content as lowercase hex, read in 8 KiB chunks.
///
/// # Errors
/// Returns an error when the file cannot be opened or read.
pub fn sha256_file(path: impl AsRef<Path>) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Human-readable file size, e.g. `"1.50 MB"`.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    for unit in UNITS {
        if value < 1024.0 {
            return format!("{value:.2} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.2} PB")
}

/// Replace characters that are invalid in file names.
///
/// Attachment names arriving from email containers are untrusted; this
/// keeps them writable on every platform.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if (c as u32) < 0x20 => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim_matches(['.', ' ']).to_string();
    if trimmed.is_empty() {
        "unnamed_attachment".to_string()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn scan_computes_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        let mut f = File::create(&path).unwrap();
        f.write_all(b"hello world").unwrap();

        let meta = FileMeta::scan(&path).unwrap();
        assert_eq!(meta.name, "notes.txt");
        assert_eq!(meta.extension, "txt");
        assert_eq!(meta.size_bytes, 11);
        // sha256("hello world")
        assert_eq!(
            meta.digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert!(!digest::is_sentinel(&meta.digest));
    }

    #[test]
    fn scan_tree_finds_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("sub/b.json"), "{}").unwrap();

        let files = FileMeta::scan_tree(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(FileMeta::is_file));
    }

    #[test]
    fn sentinels_are_invalid_digests() {
        assert!(digest::is_sentinel(""));
        assert!(digest::is_sentinel("N/A"));
        assert!(digest::is_sentinel("SKIPPED_LARGE_FILE"));
        assert!(digest::is_sentinel("ERROR"));
        assert!(digest::is_sentinel("abc123"));
        assert!(!digest::is_sentinel(&"a".repeat(64)));
    }

    #[test]
    fn sanitize_replaces_invalid_characters() {
        assert_eq!(sanitize_file_name("in<voice>.pdf"), "in_voice_.pdf");
        assert_eq!(sanitize_file_name(""), "unnamed_attachment");
        assert_eq!(sanitize_file_name("..."), "unnamed_attachment");
    }

    #[test]
    fn format_size_picks_unit() {
        assert_eq!(format_size(512), "512.00 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }
}
