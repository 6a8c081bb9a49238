//! Error types for taskq
//!
//! Exit codes:
//! - 0: Success
//! - 1: Nothing ready to dispatch, or unknown command
//! - 2: User error (bad args, invalid task, duplicate id, dependency cycle)
//! - 4: Operation failed (I/O, malformed log, lock contention)

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::resolver::BlockedTask;

/// Exit codes for the taskq CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const NOT_READY: i32 = 1;
    pub const USAGE: i32 = 1;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Why `dispatch` had nothing to hand out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unavailable {
    /// The pending log holds no tasks.
    Empty,
    /// Every pending task waits on at least one unmet dependency.
    Blocked(Vec<BlockedTask>),
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailable::Empty => write!(f, "queue is empty"),
            Unavailable::Blocked(blocked) => {
                write!(f, "all {} pending task(s) are blocked", blocked.len())
            }
        }
    }
}

/// Main error type for taskq operations
#[derive(Error, Debug)]
pub enum Error {
    // Nothing to dispatch (exit code 1)
    #[error("No tasks available: {0}")]
    EmptyOrBlocked(Unavailable),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Task already exists: {0}")]
    DuplicateTask(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Dependency cycle: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    // Operation failures (exit code 4)
    #[error("Malformed record in {} at line {line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Atomic replace failed: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::EmptyOrBlocked(_) => exit_codes::NOT_READY,
            Error::UnknownCommand(_) => exit_codes::USAGE,

            Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::InvalidTask(_)
            | Error::DuplicateTask(_)
            | Error::TaskNotFound(_)
            | Error::DependencyCycle { .. } => exit_codes::USER_ERROR,

            Error::Parse { .. }
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::Persist(_)
            | Error::LockFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for JSON error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::EmptyOrBlocked(Unavailable::Empty) => {
                Some(serde_json::json!({ "reason": "empty" }))
            }
            Error::EmptyOrBlocked(Unavailable::Blocked(blocked)) => Some(serde_json::json!({
                "reason": "blocked",
                "blocked": blocked,
            })),
            Error::Parse {
                path,
                line,
                message,
            } => Some(serde_json::json!({
                "path": path.display().to_string(),
                "line": line,
                "message": message,
            })),
            Error::DependencyCycle { cycle } => Some(serde_json::json!({ "cycle": cycle })),
            Error::DuplicateTask(id) | Error::TaskNotFound(id) => {
                Some(serde_json::json!({ "id": id }))
            }
            Error::LockFailed(path) => {
                Some(serde_json::json!({ "lock": path.display().to_string() }))
            }
            Error::InvalidConfig(message) => Some(serde_json::json!({ "message": message })),
            _ => None,
        }
    }

    /// True when `dispatch` found nothing ready.
    pub fn is_empty_or_blocked(&self) -> bool {
        matches!(self, Error::EmptyOrBlocked(_))
    }
}

/// Result type alias for taskq operations
pub type Result<T> = std::result::Result<T, Error>;
