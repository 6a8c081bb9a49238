//! Durable task logs
//!
//! Each log is a JSON Lines file: one [`Task`] per line, in log order.
//!
//! ```text
//! .taskq/
//!   pending.jsonl     # tasks not yet dispatched, arrival order
//!   completed.jsonl   # dispatched tasks, dispatch order (append-only)
//!   queue.lock        # advisory lock guarding read-modify-write
//! ```
//!
//! Loading is strict: the first line that fails to decode aborts the load
//! with [`Error::Parse`]. A missing file is an empty log.

use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::lock;
use crate::task::Task;

/// Parse a log into records, preserving order.
pub fn load(path: &Path) -> Result<Vec<Task>> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(log = %path.display(), "log missing, treating as empty");
            return Ok(Vec::new());
        }
        Err(err) => return Err(err.into()),
    };

    let reader = BufReader::new(file);
    let mut tasks = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let task: Task = serde_json::from_str(trimmed).map_err(|err| Error::Parse {
            path: path.to_path_buf(),
            line: idx + 1,
            message: err.to_string(),
        })?;
        tasks.push(task);
    }

    tracing::debug!(log = %path.display(), records = tasks.len(), "log loaded");
    Ok(tasks)
}

/// Replace a log's content with `tasks`, atomically.
pub fn save(path: &Path, tasks: &[Task]) -> Result<()> {
    let buffer = encode(tasks)?;
    lock::write_atomic(path, &buffer)?;
    tracing::debug!(log = %path.display(), records = tasks.len(), "log saved");
    Ok(())
}

fn encode(tasks: &[Task]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    for task in tasks {
        serde_json::to_writer(&mut buffer, task)?;
        buffer.push(b'\n');
    }
    Ok(buffer)
}

/// A log file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLog {
    path: PathBuf,
}

impl TaskLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<Task>> {
        load(&self.path)
    }

    pub fn save(&self, tasks: &[Task]) -> Result<()> {
        save(&self.path, tasks)
    }

    /// Raw bytes of the log, `None` when absent.
    pub fn snapshot(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Put the log back to a previous [`snapshot`](Self::snapshot).
    pub fn restore(&self, snapshot: Option<&[u8]>) -> Result<()> {
        match snapshot {
            Some(bytes) => lock::write_atomic(&self.path, bytes),
            None => match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err.into()),
            },
        }
    }
}
