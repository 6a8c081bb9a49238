//! Configuration loading and management
//!
//! Handles parsing of `.taskq.toml` and resolving where the queue lives.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;

/// Name of the config file looked up in the working directory
pub const CONFIG_FILE: &str = ".taskq.toml";

/// Name of the lock file inside the queue directory
pub const LOCK_FILE: &str = "queue.lock";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Queue storage configuration
    #[serde(default)]
    pub queue: QueueConfig,
}

/// Where the queue's logs live and how long to wait for the queue lock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueConfig {
    /// Directory holding both logs and the lock file
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// File name of the pending log
    #[serde(default = "default_pending_file")]
    pub pending_file: String,

    /// File name of the completed log
    #[serde(default = "default_completed_file")]
    pub completed_file: String,

    /// Maximum wait for the queue lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_dir() -> PathBuf {
    PathBuf::from(".taskq")
}

fn default_pending_file() -> String {
    "pending.jsonl".to_string()
}

fn default_completed_file() -> String {
    "completed.jsonl".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            pending_file: default_pending_file(),
            completed_file: default_completed_file(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl QueueConfig {
    /// Queue rooted at `dir` with default file names.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn pending_path(&self) -> PathBuf {
        self.dir.join(&self.pending_file)
    }

    pub fn completed_path(&self) -> PathBuf {
        self.dir.join(&self.completed_file)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "queue.dir cannot be empty".to_string(),
            ));
        }
        validate_file_name(&self.pending_file, "queue.pending_file")?;
        validate_file_name(&self.completed_file, "queue.completed_file")?;
        if self.pending_file.trim() == self.completed_file.trim() {
            return Err(Error::InvalidConfig(format!(
                "queue.pending_file and queue.completed_file must differ (both '{}')",
                self.pending_file
            )));
        }
        if self.pending_file == LOCK_FILE || self.completed_file == LOCK_FILE {
            return Err(Error::InvalidConfig(format!(
                "'{LOCK_FILE}' is reserved for the queue lock"
            )));
        }
        if self.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "queue.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_file_name(name: &str, field: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidConfig(format!("{field} cannot be empty")));
    }
    if trimmed != name {
        return Err(Error::InvalidConfig(format!(
            "{field} '{name}' has surrounding whitespace"
        )));
    }
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(Error::InvalidConfig(format!(
            "{field} '{name}' must be a plain file name"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// A relative `queue.dir` is resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        if config.queue.dir.is_relative() {
            if let Some(base) = path.parent() {
                config.queue.dir = base.join(&config.queue.dir);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Load `.taskq.toml` from `root`, or return defaults rooted there
    ///
    /// Only a missing file falls back to defaults; a present but invalid
    /// file is an error.
    pub fn load_from_dir(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self {
                queue: QueueConfig::in_dir(root.join(default_dir())),
            })
        }
    }

    fn validate(&self) -> Result<()> {
        self.queue.validate()
    }
}

/// Resolve the queue configuration for a CLI invocation.
///
/// Precedence: `dir_override` beats the config file's `queue.dir`; an
/// explicit `config_path` must exist, the implicit `.taskq.toml` in `cwd`
/// is optional.
pub fn resolve(
    cwd: &Path,
    config_path: Option<&Path>,
    dir_override: Option<&Path>,
) -> Result<QueueConfig> {
    let config = match config_path {
        Some(path) => {
            let path = if path.is_relative() {
                cwd.join(path)
            } else {
                path.to_path_buf()
            };
            Config::load(&path)?
        }
        None => Config::load_from_dir(cwd)?,
    };

    let mut queue = config.queue;
    if let Some(dir) = dir_override {
        queue.dir = if dir.is_relative() {
            cwd.join(dir)
        } else {
            dir.to_path_buf()
        };
    }
    queue.validate()?;
    tracing::debug!(dir = %queue.dir.display(), "queue config resolved");
    Ok(queue)
}
