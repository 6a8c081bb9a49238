//! Queue service: admission, readiness reporting and dispatch.
//!
//! Every operation runs under the queue lock (`<dir>/queue.lock`), so the
//! read-modify-write in [`Queue::dispatch`] and [`Queue::enqueue`] is a single
//! critical section across threads and processes, and readers never see one
//! log updated without the other.
//!
//! Dispatch writes the completed log before the pending log. A crash between
//! the two renames leaves the moved task in both logs; loading reconciles
//! that by treating the completed record as authoritative, and the next write
//! to the pending log drops the stale copy.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::QueueConfig;
use crate::error::{Error, Result, Unavailable};
use crate::graph;
use crate::lock::FileLock;
use crate::resolver::{self, BlockedTask, Readiness};
use crate::store::TaskLog;
use crate::task::{NewTask, Task, TaskType};

/// Both logs as seen under the lock.
#[derive(Debug)]
struct QueueState {
    pending: Vec<Task>,
    completed: Vec<Task>,
}

impl QueueState {
    fn completed_ids(&self) -> HashSet<String> {
        resolver::completed_ids(&self.completed)
    }

    fn contains(&self, id: &str) -> bool {
        self.pending.iter().any(|t| t.id == id) || self.completed.iter().any(|t| t.id == id)
    }

    fn last_completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed.iter().filter_map(|t| t.completed_at).max()
    }
}

/// One pending task's line in a status report.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskStatusLine {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub state: &'static str,
    pub unmet: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    pub pending: usize,
    pub completed: usize,
    pub ready: usize,
    pub blocked: usize,
    pub tasks: Vec<TaskStatusLine>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cycles: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Pending,
    Completed,
}

/// A task looked up by id, with its readiness when still pending.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub log: LogKind,
    pub task: Task,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness: Option<Readiness>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    DuplicateId,
    InBothLogs,
    PendingMarkedCompleted,
    CompletedNotMarked,
    CompletedOutOfOrder,
    DependencyCycle,
    UnknownDependency,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DoctorIssue {
    pub kind: IssueKind,
    pub ids: Vec<String>,
    pub message: String,
}

impl DoctorIssue {
    fn new(kind: IssueKind, ids: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            ids,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DoctorReport {
    pub pending: usize,
    pub completed: usize,
    /// Violations of the queue's invariants.
    pub problems: Vec<DoctorIssue>,
    /// Legal but worth knowing (forward references).
    pub warnings: Vec<DoctorIssue>,
}

impl DoctorReport {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Dependency-aware task queue over a pending and a completed log.
#[derive(Debug, Clone)]
pub struct Queue {
    config: QueueConfig,
    pending: TaskLog,
    completed: TaskLog,
}

impl Queue {
    pub fn new(config: QueueConfig) -> Self {
        let pending = TaskLog::new(config.pending_path());
        let completed = TaskLog::new(config.completed_path());
        Self {
            config,
            pending,
            completed,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn pending_log(&self) -> &TaskLog {
        &self.pending
    }

    pub fn completed_log(&self) -> &TaskLog {
        &self.completed
    }

    fn lock(&self) -> Result<FileLock> {
        FileLock::acquire(self.config.lock_path(), self.config.lock_timeout_ms)
    }

    /// Lock for a read-only operation; a queue directory that does not exist
    /// yet has nothing to guard and is not created.
    fn read_lock(&self) -> Result<Option<FileLock>> {
        if !self.config.dir.exists() {
            return Ok(None);
        }
        self.lock().map(Some)
    }

    fn load_state(&self) -> Result<QueueState> {
        let mut pending = self.pending.load()?;
        let completed = self.completed.load()?;

        let done = resolver::completed_ids(&completed);
        let before = pending.len();
        pending.retain(|task| {
            let stale = done.contains(&task.id);
            if stale {
                tracing::warn!(id = %task.id, "task present in both logs, treating as completed");
            }
            !stale
        });
        if pending.len() != before {
            tracing::debug!(
                dropped = before - pending.len(),
                "reconciled pending log against completed log"
            );
        }

        Ok(QueueState { pending, completed })
    }

    /// Counts and per-task readiness of the pending log.
    pub fn status(&self) -> Result<StatusReport> {
        let _lock = self.read_lock()?;
        let state = self.load_state()?;
        let done = state.completed_ids();

        let tasks: Vec<TaskStatusLine> = state
            .pending
            .iter()
            .map(|task| {
                let readiness = resolver::readiness(task, &done);
                let state_label = readiness.label();
                let unmet = match readiness {
                    Readiness::Ready => Vec::new(),
                    Readiness::Blocked { unmet } => unmet,
                };
                TaskStatusLine {
                    id: task.id.clone(),
                    title: task.title.clone(),
                    task_type: task.task_type.clone(),
                    state: state_label,
                    unmet,
                }
            })
            .collect();

        let ready = tasks.iter().filter(|line| line.unmet.is_empty()).count();
        Ok(StatusReport {
            pending: state.pending.len(),
            completed: state.completed.len(),
            ready,
            blocked: tasks.len() - ready,
            tasks,
            cycles: graph::find_cycles(&state.pending),
        })
    }

    /// Pending tasks in arrival order.
    pub fn list(&self) -> Result<Vec<Task>> {
        let _lock = self.read_lock()?;
        Ok(self.load_state()?.pending)
    }

    /// Move the first ready pending task to the completed log and return it.
    pub fn dispatch(&self) -> Result<Task> {
        let _lock = self.lock()?;
        let mut state = self.load_state()?;
        let done = state.completed_ids();

        let Some(index) = state
            .pending
            .iter()
            .position(|task| resolver::is_ready(task, &done))
        else {
            if state.pending.is_empty() {
                tracing::debug!("dispatch: queue empty");
                return Err(Error::EmptyOrBlocked(Unavailable::Empty));
            }
            let blocked = state
                .pending
                .iter()
                .map(|task| BlockedTask {
                    id: task.id.clone(),
                    title: task.title.clone(),
                    unmet: resolver::unmet(task, &done),
                })
                .collect::<Vec<_>>();
            tracing::debug!(blocked = blocked.len(), "dispatch: every pending task blocked");
            return Err(Error::EmptyOrBlocked(Unavailable::Blocked(blocked)));
        };

        // Never stamp earlier than the previous dispatch, even if the clock
        // stepped backwards.
        let now = Utc::now();
        let stamp = match state.last_completed_at() {
            Some(last) if last > now => last,
            _ => now,
        };

        let mut task = state.pending.remove(index);
        task.complete(stamp);
        state.completed.push(task.clone());

        let previous = self.completed.snapshot()?;
        persist_move(&self.completed, &self.pending, &state, previous.as_deref())?;

        tracing::info!(id = %task.id, remaining = state.pending.len(), "task dispatched");
        Ok(task)
    }

    /// Admit a new task at the end of the pending log.
    ///
    /// Rejects ids already present in either log and dependencies that would
    /// close a cycle among pending tasks.
    pub fn enqueue(&self, new_task: NewTask) -> Result<Task> {
        let task = new_task.into_task(Utc::now())?;

        let _lock = self.lock()?;
        let mut state = self.load_state()?;

        if state.contains(&task.id) {
            return Err(Error::DuplicateTask(task.id));
        }
        if let Some(cycle) = graph::cycle_with(&state.pending, &task) {
            return Err(Error::DependencyCycle { cycle });
        }

        state.pending.push(task.clone());
        self.pending.save(&state.pending)?;

        tracing::info!(id = %task.id, depends_on = task.depends_on.len(), "task enqueued");
        Ok(task)
    }

    /// Look a task up in either log.
    pub fn show(&self, id: &str) -> Result<TaskView> {
        let _lock = self.read_lock()?;
        let state = self.load_state()?;

        if let Some(task) = state.completed.iter().find(|t| t.id == id) {
            return Ok(TaskView {
                log: LogKind::Completed,
                task: task.clone(),
                readiness: None,
            });
        }

        let done = state.completed_ids();
        state
            .pending
            .iter()
            .find(|t| t.id == id)
            .map(|task| TaskView {
                log: LogKind::Pending,
                task: task.clone(),
                readiness: Some(resolver::readiness(task, &done)),
            })
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }

    /// Check both logs against the queue's invariants without changing them.
    pub fn doctor(&self) -> Result<DoctorReport> {
        let _lock = self.read_lock()?;
        let pending = self.pending.load()?;
        let completed = self.completed.load()?;

        let mut problems = Vec::new();
        let mut warnings = Vec::new();

        for (log, tasks) in [("pending", &pending), ("completed", &completed)] {
            let mut seen: HashMap<&str, usize> = HashMap::new();
            for task in tasks.iter() {
                *seen.entry(task.id.as_str()).or_default() += 1;
            }
            let mut dups: Vec<String> = seen
                .into_iter()
                .filter(|(_, count)| *count > 1)
                .map(|(id, _)| id.to_string())
                .collect();
            dups.sort();
            for id in dups {
                problems.push(DoctorIssue::new(
                    IssueKind::DuplicateId,
                    vec![id.clone()],
                    format!("'{id}' appears more than once in the {log} log"),
                ));
            }
        }

        let done = resolver::completed_ids(&completed);
        let mut in_both: Vec<String> = pending
            .iter()
            .filter(|t| done.contains(&t.id))
            .map(|t| t.id.clone())
            .collect();
        in_both.sort();
        in_both.dedup();
        for id in in_both {
            problems.push(DoctorIssue::new(
                IssueKind::InBothLogs,
                vec![id.clone()],
                format!("'{id}' is in both logs (interrupted dispatch?)"),
            ));
        }

        for task in pending.iter().filter(|t| t.is_completed()) {
            problems.push(DoctorIssue::new(
                IssueKind::PendingMarkedCompleted,
                vec![task.id.clone()],
                format!("pending task '{}' is marked completed", task.id),
            ));
        }

        for task in completed
            .iter()
            .filter(|t| !t.is_completed() || t.completed_at.is_none())
        {
            problems.push(DoctorIssue::new(
                IssueKind::CompletedNotMarked,
                vec![task.id.clone()],
                format!(
                    "completed task '{}' lacks completed status or timestamp",
                    task.id
                ),
            ));
        }

        let mut last: Option<(&str, DateTime<Utc>)> = None;
        for task in completed.iter() {
            let Some(at) = task.completed_at else {
                continue;
            };
            if let Some((prev_id, prev_at)) = last {
                if at < prev_at {
                    problems.push(DoctorIssue::new(
                        IssueKind::CompletedOutOfOrder,
                        vec![prev_id.to_string(), task.id.clone()],
                        format!(
                            "'{}' completed before '{}' but is logged after it",
                            task.id, prev_id
                        ),
                    ));
                }
            }
            last = Some((task.id.as_str(), at));
        }

        let live: Vec<Task> = pending
            .iter()
            .filter(|t| !done.contains(&t.id))
            .cloned()
            .collect();
        for cycle in graph::find_cycles(&live) {
            let message = format!("tasks wait on each other: {}", cycle.join(", "));
            problems.push(DoctorIssue::new(IssueKind::DependencyCycle, cycle, message));
        }

        let known: HashSet<&str> = pending
            .iter()
            .chain(completed.iter())
            .map(|t| t.id.as_str())
            .collect();
        for task in live.iter() {
            let unknown: Vec<String> = task
                .depends_on
                .iter()
                .filter(|dep| !known.contains(dep.as_str()))
                .cloned()
                .collect();
            if !unknown.is_empty() {
                let message = format!(
                    "'{}' waits on ids not in either log: {}",
                    task.id,
                    unknown.join(", ")
                );
                let mut ids = vec![task.id.clone()];
                ids.extend(unknown);
                warnings.push(DoctorIssue::new(IssueKind::UnknownDependency, ids, message));
            }
        }

        Ok(DoctorReport {
            pending: pending.len(),
            completed: completed.len(),
            problems,
            warnings,
        })
    }
}

/// Write the completed log, then the pending log.
///
/// If the pending write fails the completed log is put back to `previous`
/// (`None` removes it), so a failed dispatch leaves both logs as they were.
fn persist_move(
    completed: &TaskLog,
    pending: &TaskLog,
    state: &QueueState,
    previous: Option<&[u8]>,
) -> Result<()> {
    completed.save(&state.completed)?;
    if let Err(err) = pending.save(&state.pending) {
        match completed.restore(previous) {
            Ok(()) => tracing::warn!(error = %err, "pending log write failed, dispatch rolled back"),
            Err(restore_err) => tracing::error!(
                error = %err,
                restore_error = %restore_err,
                "pending log write failed and completed log could not be restored"
            ),
        }
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use tempfile::TempDir;

    fn queue() -> (TempDir, Queue) {
        let dir = TempDir::new().unwrap();
        let queue = Queue::new(QueueConfig::in_dir(dir.path().join("q")));
        (dir, queue)
    }

    fn add(queue: &Queue, id: &str, deps: &[&str]) -> Task {
        queue
            .enqueue(
                NewTask::new(format!("Task {id}"))
                    .with_id(id)
                    .depends_on(deps.iter().copied())
                    .with_prompt(format!("do {id}")),
            )
            .unwrap()
    }

    #[test]
    fn read_operations_do_not_create_queue_dir() {
        let (_dir, queue) = queue();
        assert!(queue.list().unwrap().is_empty());
        let report = queue.status().unwrap();
        assert_eq!((report.pending, report.completed), (0, 0));
        assert!(!queue.config().dir.exists());
    }

    #[test]
    fn enqueue_appends_in_arrival_order() {
        let (_dir, queue) = queue();
        add(&queue, "b", &[]);
        add(&queue, "a", &[]);
        let ids: Vec<String> = queue.list().unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn enqueue_rejects_duplicate_across_logs() {
        let (_dir, queue) = queue();
        add(&queue, "a", &[]);
        assert!(matches!(
            queue.enqueue(NewTask::new("again").with_id("a")),
            Err(Error::DuplicateTask(id)) if id == "a"
        ));

        queue.dispatch().unwrap();
        assert!(matches!(
            queue.enqueue(NewTask::new("again").with_id("a")),
            Err(Error::DuplicateTask(_))
        ));
    }

    #[test]
    fn enqueue_rejects_cycle_and_leaves_log_untouched() {
        let (_dir, queue) = queue();
        add(&queue, "a", &["c"]);
        add(&queue, "b", &["a"]);
        let before = queue.pending_log().snapshot().unwrap();

        let err = queue
            .enqueue(NewTask::new("closes loop").with_id("c").depends_on(["b"]))
            .unwrap_err();
        match err {
            Error::DependencyCycle { cycle } => assert_eq!(cycle, vec!["c", "b", "a", "c"]),
            other => panic!("expected cycle, got {other:?}"),
        }
        assert_eq!(queue.pending_log().snapshot().unwrap(), before);
    }

    #[test]
    fn dependency_on_completed_task_is_not_a_cycle() {
        let (_dir, queue) = queue();
        add(&queue, "a", &[]);
        queue.dispatch().unwrap();
        add(&queue, "b", &["a"]);
        assert_eq!(queue.dispatch().unwrap().id, "b");
    }

    #[test]
    fn status_reports_readiness_per_task() {
        let (_dir, queue) = queue();
        add(&queue, "a", &[]);
        add(&queue, "b", &["a", "z"]);

        let report = queue.status().unwrap();
        assert_eq!(report.pending, 2);
        assert_eq!(report.ready, 1);
        assert_eq!(report.blocked, 1);
        assert_eq!(report.tasks[0].state, "READY");
        assert_eq!(report.tasks[1].state, "BLOCKED");
        assert_eq!(report.tasks[1].unmet, vec!["a", "z"]);
    }

    #[test]
    fn dispatch_stamps_completion() {
        let (_dir, queue) = queue();
        add(&queue, "a", &[]);
        let task = queue.dispatch().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.completed_at.is_some());
        assert_eq!(task.prompt, "do a");

        let completed = queue.completed_log().load().unwrap();
        assert_eq!(completed, vec![task]);
        assert!(queue.list().unwrap().is_empty());
    }

    #[test]
    fn dispatch_distinguishes_empty_from_blocked() {
        let (_dir, queue) = queue();
        assert!(matches!(
            queue.dispatch(),
            Err(Error::EmptyOrBlocked(Unavailable::Empty))
        ));

        add(&queue, "c", &["z"]);
        match queue.dispatch() {
            Err(Error::EmptyOrBlocked(Unavailable::Blocked(blocked))) => {
                assert_eq!(
                    blocked,
                    vec![BlockedTask {
                        id: "c".to_string(),
                        title: "Task c".to_string(),
                        unmet: vec!["z".to_string()],
                    }]
                );
            }
            other => panic!("expected blocked, got {other:?}"),
        }
    }

    #[test]
    fn failed_pending_write_rolls_back_completed_log() {
        let (dir, queue) = queue();
        add(&queue, "a", &[]);
        add(&queue, "b", &[]);
        add(&queue, "c", &[]);
        queue.dispatch().unwrap();

        let before_completed = queue.completed_log().snapshot().unwrap();
        let before_pending = queue.pending_log().snapshot().unwrap();

        let mut state = queue.load_state().unwrap();
        let mut moved = state.pending.remove(0);
        moved.complete(Utc::now());
        state.completed.push(moved);

        // Renaming a file over a non-empty directory fails, even for root.
        let unwritable = dir.path().join("unwritable");
        std::fs::create_dir_all(unwritable.join("inner")).unwrap();
        let result = persist_move(
            queue.completed_log(),
            &TaskLog::new(unwritable),
            &state,
            before_completed.as_deref(),
        );

        assert!(result.is_err());
        assert_eq!(queue.completed_log().snapshot().unwrap(), before_completed);
        assert_eq!(queue.pending_log().snapshot().unwrap(), before_pending);
        assert_eq!(queue.dispatch().unwrap().id, "b");
    }

    #[test]
    fn failed_pending_write_removes_new_completed_log() {
        let (dir, queue) = queue();
        add(&queue, "a", &[]);

        let mut state = queue.load_state().unwrap();
        let mut moved = state.pending.remove(0);
        moved.complete(Utc::now());
        state.completed.push(moved);

        let unwritable = dir.path().join("unwritable");
        std::fs::create_dir_all(unwritable.join("inner")).unwrap();
        persist_move(queue.completed_log(), &TaskLog::new(unwritable), &state, None).unwrap_err();

        assert_eq!(queue.completed_log().snapshot().unwrap(), None);
        assert_eq!(queue.list().unwrap().len(), 1);
    }

    #[test]
    fn interrupted_dispatch_is_reconciled() {
        let (_dir, queue) = queue();
        add(&queue, "a", &[]);
        add(&queue, "b", &["a"]);

        // Completed log written, pending log not yet rewritten.
        let mut pending = queue.pending_log().load().unwrap();
        let mut moved = pending[0].clone();
        moved.complete(Utc::now());
        queue.completed_log().save(&[moved]).unwrap();
        assert_eq!(pending.len(), 2);

        let ids: Vec<String> = queue.list().unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["b"]);

        let doctor = queue.doctor().unwrap();
        assert!(doctor
            .problems
            .iter()
            .any(|issue| issue.kind == IssueKind::InBothLogs));

        assert_eq!(queue.dispatch().unwrap().id, "b");
        pending = queue.pending_log().load().unwrap();
        assert!(pending.is_empty());
        assert!(queue.doctor().unwrap().is_clean());
    }

    #[test]
    fn show_finds_task_in_either_log() {
        let (_dir, queue) = queue();
        add(&queue, "a", &[]);
        add(&queue, "b", &["a"]);
        queue.dispatch().unwrap();

        let a = queue.show("a").unwrap();
        assert_eq!(a.log, LogKind::Completed);
        assert!(a.readiness.is_none());

        let b = queue.show("b").unwrap();
        assert_eq!(b.log, LogKind::Pending);
        assert_eq!(b.readiness, Some(Readiness::Ready));

        assert!(matches!(queue.show("nope"), Err(Error::TaskNotFound(_))));
    }

    #[test]
    fn doctor_flags_cycles_written_by_other_producers() {
        let (_dir, queue) = queue();
        let mut x = NewTask::new("x").with_id("x").depends_on(["y"]).into_task(Utc::now()).unwrap();
        let y = NewTask::new("y").with_id("y").depends_on(["x"]).into_task(Utc::now()).unwrap();
        x.prompt = "loop".to_string();
        queue.pending_log().save(&[x, y]).unwrap();

        let report = queue.doctor().unwrap();
        assert!(!report.is_clean());
        assert_eq!(report.problems[0].kind, IssueKind::DependencyCycle);
        assert_eq!(report.problems[0].ids, vec!["x", "y"]);

        let status = queue.status().unwrap();
        assert_eq!(status.cycles, vec![vec!["x".to_string(), "y".to_string()]]);
    }

    #[test]
    fn doctor_warns_on_forward_references_only() {
        let (_dir, queue) = queue();
        add(&queue, "c", &["z"]);
        let report = queue.doctor().unwrap();
        assert!(report.is_clean());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind, IssueKind::UnknownDependency);
        assert_eq!(report.warnings[0].ids, vec!["c", "z"]);
    }
}
