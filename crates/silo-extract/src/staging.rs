//! Staging directories for container extraction.
//!
//! Each archive or email gets its own directory under the extraction
//! root, named after the file stem with a monotonic `_N` suffix on
//! collision. Cleanup of staged trees is the operator's concern, not the
//! pipeline's.

use std::path::{Path, PathBuf};

/// Create a unique staging directory for a container file.
///
/// # Errors
/// Fails when the directory cannot be created.
pub fn unique_extraction_dir(root: &Path, file_path: &Path) -> std::io::Result<PathBuf> {
    let stem = file_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "extracted".to_string());

    let mut candidate = root.join(&stem);
    let mut counter = 1;
    while candidate.exists() {
        candidate = root.join(format!("{stem}_{counter}"));
        counter += 1;
    }
    std::fs::create_dir_all(&candidate)?;
    Ok(candidate)
}
