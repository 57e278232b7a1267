//! Environment-driven configuration.
//!
//! Every knob is optional; unset variables fall back to the defaults
//! below. The configuration is an explicit value passed into
//! constructors, never a global.

use std::path::PathBuf;

/// Default worker count for both executor pools.
pub const DEFAULT_MAX_WORKERS: usize = 4;
/// Default batch buffer threshold.
pub const DEFAULT_BATCH_SIZE: usize = 500;
/// Default word cache capacity.
pub const DEFAULT_WORD_CACHE_SIZE: usize = 50_000;

/// Runtime configuration for the database, caches and worker pools.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database host; opaque to the SQLite backend.
    pub db_host: String,
    /// Database port; opaque to the SQLite backend.
    pub db_port: u16,
    /// Database name. The SQLite backend uses `<db_name>.db` as the
    /// database file path.
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    /// Connection pool lower bound.
    pub db_min_connections: usize,
    /// Connection pool upper bound.
    pub db_max_connections: usize,
    /// Word id cache capacity.
    pub word_cache_size: usize,
    /// Batch buffer flush threshold.
    pub batch_size: usize,
    /// Root directory for container staging; defaults to
    /// `extracted_files/` under the working directory.
    pub extraction_folder: PathBuf,
    /// Directory for run checkpoints; defaults to `.checkpoints/`.
    pub checkpoint_dir: PathBuf,
    /// Worker count for the I/O pool (the CPU pool is capped at 4).
    pub max_workers: usize,
    /// Whether periodic health monitoring is enabled.
    pub monitoring: bool,
}

impl Config {
    /// Build a configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            db_host: env_string("DB_HOST", "localhost"),
            db_port: env_parse("DB_PORT", 5432),
            db_name: env_string("DB_NAME", "filesilo"),
            db_user: env_string("DB_USER", "filesilo"),
            db_password: env_string("DB_PASSWORD", ""),
            db_min_connections: env_parse("DB_MIN_CONNECTIONS", 2),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", 10),
            word_cache_size: env_parse("WORD_CACHE_SIZE", DEFAULT_WORD_CACHE_SIZE),
            batch_size: env_parse("BATCH_SIZE", DEFAULT_BATCH_SIZE),
            extraction_folder: env_path("EXTRACTION_FOLDER", "extracted_files"),
            checkpoint_dir: env_path("CHECKPOINT_DIR", ".checkpoints"),
            max_workers: env_parse("THREAD_MAX_WORKERS", DEFAULT_MAX_WORKERS),
            monitoring: env_string("THREAD_MONITORING", "true").eq_ignore_ascii_case("true"),
        }
    }

    /// Path of the SQLite database file derived from `db_name`.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.db", self.db_name))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_host: "localhost".into(),
            db_port: 5432,
            db_name: "filesilo".into(),
            db_user: "filesilo".into(),
            db_password: String::new(),
            db_min_connections: 2,
            db_max_connections: 10,
            word_cache_size: DEFAULT_WORD_CACHE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            extraction_folder: PathBuf::from("extracted_files"),
            checkpoint_dir: PathBuf::from(".checkpoints"),
            max_workers: DEFAULT_MAX_WORKERS,
            monitoring: true,
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key).map_or_else(|_| PathBuf::from(default), PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.db_min_connections, 2);
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.word_cache_size, 50_000);
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.max_workers, 4);
        assert!(config.monitoring);
    }

    #[test]
    fn database_path_derives_from_name() {
        let config = Config { db_name: "analysis".into(), ..Config::default() };
        assert_eq!(config.database_path(), PathBuf::from("analysis.db"));
    }
}
