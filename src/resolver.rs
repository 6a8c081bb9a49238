//! Readiness of pending tasks against the set of completed ids.
//!
//! Pure functions; no I/O and no cycle detection. A cycle among pending
//! tasks simply keeps every member blocked (see [`crate::graph`]).

use std::collections::HashSet;

use serde::Serialize;

use crate::task::Task;

/// True when every dependency of `task` is in `completed_ids`.
pub fn is_ready(task: &Task, completed_ids: &HashSet<String>) -> bool {
    task.depends_on.iter().all(|dep| completed_ids.contains(dep))
}

/// Dependencies of `task` not yet completed, in declaration order.
pub fn unmet(task: &Task, completed_ids: &HashSet<String>) -> Vec<String> {
    task.depends_on
        .iter()
        .filter(|dep| !completed_ids.contains(*dep))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Readiness {
    Ready,
    Blocked { unmet: Vec<String> },
}

impl Readiness {
    pub fn label(&self) -> &'static str {
        match self {
            Readiness::Ready => "READY",
            Readiness::Blocked { .. } => "BLOCKED",
        }
    }
}

pub fn readiness(task: &Task, completed_ids: &HashSet<String>) -> Readiness {
    let missing = unmet(task, completed_ids);
    if missing.is_empty() {
        Readiness::Ready
    } else {
        Readiness::Blocked { unmet: missing }
    }
}

/// A pending task that cannot run yet, with what it waits on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedTask {
    pub id: String,
    pub title: String,
    pub unmet: Vec<String>,
}

/// Collect the completed-id set from a completed log.
pub fn completed_ids(completed: &[Task]) -> HashSet<String> {
    completed.iter().map(|task| task.id.clone()).collect()
}
