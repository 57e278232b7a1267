//! Run checkpoints for resuming interrupted ingestions.
//!
//! A checkpoint records which input files have already produced a
//! result. On resume, the dispatcher skips them and only processes the
//! remainder.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One saved checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub checkpoint_id: String,
    pub created_at: String,
    pub processed_files: Vec<String>,
    pub total_files: usize,
    pub progress: f64,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Loads and saves checkpoints under a directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Manager rooted at `dir`; the directory is created lazily on the
    /// first save.
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Derive a stable checkpoint id from an input path.
    #[must_use]
    pub fn id_for_input(input: &Path) -> String {
        let mut id: String = input
            .to_string_lossy()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        id.truncate(120);
        id.trim_matches('_').to_string()
    }

    /// Save a checkpoint.
    ///
    /// # Errors
    /// Fails when the checkpoint file cannot be written.
    pub fn save(
        &self,
        checkpoint_id: &str,
        processed_files: &[String],
        total_files: usize,
    ) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("cannot create checkpoint dir: {}", self.dir.display()))?;
        let checkpoint = Checkpoint {
            checkpoint_id: checkpoint_id.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            processed_files: processed_files.to_vec(),
            total_files,
            progress: if total_files == 0 {
                0.0
            } else {
                processed_files.len() as f64 / total_files as f64
            },
            metadata: serde_json::Value::Null,
        };
        let path = self.path_for(checkpoint_id);
        let body = serde_json::to_string_pretty(&checkpoint)?;
        std::fs::write(&path, body)
            .with_context(|| format!("cannot write checkpoint: {}", path.display()))?;
        Ok(())
    }

    /// Load a checkpoint; `None` when absent or unreadable.
    #[must_use]
    pub fn load(&self, checkpoint_id: &str) -> Option<Checkpoint> {
        let body = std::fs::read_to_string(self.path_for(checkpoint_id)).ok()?;
        match serde_json::from_str(&body) {
            Ok(checkpoint) => Some(checkpoint),
            Err(e) => {
                tracing::warn!(checkpoint_id, error = %e, "ignoring corrupt checkpoint");
                None
            }
        }
    }

    /// Processed-file set of a checkpoint, for fast membership checks.
    #[must_use]
    pub fn processed_set(&self, checkpoint_id: &str) -> HashSet<String> {
        self.load(checkpoint_id)
            .map(|c| c.processed_files.into_iter().collect())
            .unwrap_or_default()
    }

    /// Remove a checkpoint once its run completed.
    pub fn delete(&self, checkpoint_id: &str) {
        let _ = std::fs::remove_file(self.path_for(checkpoint_id));
    }

    fn path_for(&self, checkpoint_id: &str) -> PathBuf {
        self.dir.join(format!("{checkpoint_id}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().to_path_buf());
        manager
            .save("run1", &["/a.txt".to_string(), "/b.txt".to_string()], 4)
            .unwrap();

        let loaded = manager.load("run1").unwrap();
        assert_eq!(loaded.processed_files.len(), 2);
        assert!((loaded.progress - 0.5).abs() < f64::EPSILON);

        let set = manager.processed_set("run1");
        assert!(set.contains("/a.txt"));
        assert!(!set.contains("/c.txt"));
    }

    #[test]
    fn missing_checkpoint_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().to_path_buf());
        assert!(manager.load("absent").is_none());
        assert!(manager.processed_set("absent").is_empty());
    }

    #[test]
    fn delete_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().to_path_buf());
        manager.save("gone", &[], 0).unwrap();
        manager.delete("gone");
        assert!(manager.load("gone").is_none());
    }

    #[test]
    fn input_ids_are_filesystem_safe() {
        let id = CheckpointManager::id_for_input(Path::new("/data/in box/run#1"));
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        assert!(!id.starts_with('_'));
    }
}
