//! taskq - dependency-aware task queue
//!
//! Tasks wait in an append-ordered pending log until every id they depend on
//! appears in the completed log. Dispatch moves the first ready task across
//! under an exclusive file lock, so concurrent processes never hand out the
//! same task twice.
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Queue location and `.taskq.toml` loading
//! - `error`: Error types, exit codes and result alias
//! - `graph`: Dependency graph checks (cycles)
//! - `lock`: File locking and atomic writes
//! - `output`: Human and JSON output envelopes
//! - `queue`: Queue service (status, list, dispatch, enqueue, show, doctor)
//! - `resolver`: Readiness of a task against the completed set
//! - `store`: JSONL task log load/save
//! - `task`: Task record and task types

pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod lock;
pub mod output;
pub mod queue;
pub mod resolver;
pub mod store;
pub mod task;

pub use config::QueueConfig;
pub use error::{Error, Result};
pub use queue::Queue;
pub use task::{NewTask, Task, TaskStatus, TaskType};
