//! Append-only JSON-lines action log, one file per run.
//!
//! Every entry is flushed immediately so a crash loses nothing. The log
//! is an explicit context object handed into constructors; a disabled
//! log swallows writes, which keeps tests quiet.

use serde_json::{json, Value};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// JSON-lines action log for one pipeline run.
pub struct ActionLog {
    file: Option<Mutex<File>>,
    path: Option<PathBuf>,
}

impl ActionLog {
    /// Create `logs/action_log_<timestamp>.txt` under `log_dir`.
    ///
    /// # Errors
    /// Fails when the directory or file cannot be created.
    pub fn create(log_dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(log_dir)?;
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = log_dir.join(format!("action_log_{stamp}.txt"));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let log = Self { file: Some(Mutex::new(file)), path: Some(path) };
        log.record("INFO", "SYSTEM", "recording started", json!({}));
        Ok(log)
    }

    /// A log that drops every entry.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { file: None, path: None }
    }

    /// Path of the log file, when enabled.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one entry and flush.
    ///
    /// Logging failures are swallowed: the action log must never break
    /// the pipeline.
    pub fn record(&self, level: &str, kind: &str, description: &str, details: Value) {
        let Some(file) = &self.file else {
            return;
        };
        let entry = json!({
            "timestamp": chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            "level": level,
            "type": kind,
            "description": description,
            "details": details,
        });
        let mut guard = file.lock().expect("log lock");
        if writeln!(guard, "{entry}").and_then(|()| guard.flush()).is_err() {
            tracing::debug!("action log write failed");
        }
    }
}
