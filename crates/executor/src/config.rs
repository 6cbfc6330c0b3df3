//! Executor configuration via `docsession.toml`
//!
//! A server embedding the executor keeps one config file next to its data.
//! On first start a commented default file is written; to change settings,
//! edit the file and restart.

use serde::{Deserialize, Serialize};
use std::path::Path;

use docsession_core::{Error, Result};

/// Config file name placed in the server's data directory.
pub const CONFIG_FILE_NAME: &str = "docsession.toml";

/// Worker pool settings, the `[pool]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound on worker threads, and so on concurrently open sessions
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Per-worker queue bound; a full queue rejects submissions
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Worker threads are named `<prefix>-<index>`
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

fn default_max_workers() -> usize {
    16
}

fn default_queue_capacity() -> usize {
    4096
}

fn default_thread_name_prefix() -> String {
    "docsession-worker".to_string()
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            queue_capacity: default_queue_capacity(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

/// Cursor settings, the `[cursor]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CursorConfig {
    /// Documents fetched per storage read while draining a cursor
    #[serde(default = "default_read_all_batch_size")]
    pub read_all_batch_size: usize,
}

fn default_read_all_batch_size() -> usize {
    256
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            read_all_batch_size: default_read_all_batch_size(),
        }
    }
}

/// Executor configuration loaded from `docsession.toml`.
///
/// # Example
///
/// ```toml
/// database_name = "docsession"
///
/// [pool]
/// max_workers = 16
/// queue_capacity = 4096
///
/// [cursor]
/// read_all_batch_size = 256
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Database scope passed to `get_databases`
    #[serde(default = "default_database_name")]
    pub database_name: String,
    /// Worker pool settings
    #[serde(default)]
    pub pool: PoolConfig,
    /// Cursor settings
    #[serde(default)]
    pub cursor: CursorConfig,
}

fn default_database_name() -> String {
    "docsession".to_string()
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            database_name: default_database_name(),
            pool: PoolConfig::default(),
            cursor: CursorConfig::default(),
        }
    }
}

impl ExecutorConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# docsession executor configuration
#
# Database scope listed by get_databases (default: "docsession")
database_name = "docsession"

[pool]
# Maximum number of worker threads. Every open session leases one worker,
# so this also bounds the number of concurrently open sessions.
max_workers = 16
# Jobs a single session may have queued before submissions are rejected.
queue_capacity = 4096
# Worker threads are named "<prefix>-<index>".
thread_name_prefix = "docsession-worker"

[cursor]
# Documents read from storage per batch when a cursor is drained.
read_all_batch_size = 256
"#
    }

    /// Check that every bound is usable.
    ///
    /// # Errors
    ///
    /// Returns `IllegalArgument` for a zero worker count, queue capacity or
    /// batch size.
    pub fn validate(&self) -> Result<()> {
        if self.pool.max_workers == 0 {
            return Err(Error::illegal_argument("pool.max_workers must be at least 1"));
        }
        if self.pool.queue_capacity == 0 {
            return Err(Error::illegal_argument(
                "pool.queue_capacity must be at least 1",
            ));
        }
        if self.cursor.read_all_batch_size == 0 {
            return Err(Error::illegal_argument(
                "cursor.read_all_batch_size must be at least 1",
            ));
        }
        Ok(())
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, `Serialization` if it cannot
    /// be parsed and `IllegalArgument` if it fails validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Io {
            reason: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;
        let config: ExecutorConfig = toml::from_str(&content).map_err(|e| Error::Serialization {
            reason: format!("Failed to parse config file '{}': {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| Error::Io {
                reason: format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ),
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Serialization {
            reason: format!("Failed to serialize config: {}", e),
        })?;
        std::fs::write(path, content).map_err(|e| Error::Io {
            reason: format!("Failed to write config file '{}': {}", path.display(), e),
        })
    }
}
