//! Task records as stored in the queue logs.
//!
//! `status` and `type` are closed enums in memory and plain strings on disk.
//! Older producers wrote `queued`/`flushed` and `flushed_at`, `target` for
//! `repo` and `payload` for `prompt`; those spellings still decode.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ulid::Ulid;

use crate::error::{Error, Result};

/// Category of work a task represents.
///
/// Producers define the tag. The common ones are typed; anything else is
/// kept verbatim in `Custom` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TaskType {
    Bugfix,
    Feature,
    Docs,
    Refactor,
    Rename,
    Format,
    Mechanical,
    Investigation,
    #[default]
    Other,
    Custom(String),
}

impl TaskType {
    pub const KNOWN: [TaskType; 9] = [
        TaskType::Bugfix,
        TaskType::Feature,
        TaskType::Docs,
        TaskType::Refactor,
        TaskType::Rename,
        TaskType::Format,
        TaskType::Mechanical,
        TaskType::Investigation,
        TaskType::Other,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            TaskType::Bugfix => "bugfix",
            TaskType::Feature => "feature",
            TaskType::Docs => "docs",
            TaskType::Refactor => "refactor",
            TaskType::Rename => "rename",
            TaskType::Format => "format",
            TaskType::Mechanical => "mechanical",
            TaskType::Investigation => "investigation",
            TaskType::Other => "other",
            TaskType::Custom(tag) => tag.as_str(),
        }
    }

    /// Map a stored tag onto a known type, case-insensitively.
    fn from_tag(tag: &str) -> Self {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            return TaskType::Other;
        }
        let wanted = trimmed.to_lowercase();
        TaskType::KNOWN
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .unwrap_or_else(|| TaskType::Custom(trimmed.to_string()))
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(Error::InvalidArgument(format!(
                "invalid type '{s}': must be a single word (known: {})",
                TaskType::KNOWN
                    .iter()
                    .map(TaskType::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        Ok(TaskType::from_tag(trimmed))
    }
}

impl Serialize for TaskType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(TaskType::from_tag(&tag))
    }
}

/// Lifecycle state; the only transition is `Pending -> Completed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    #[serde(alias = "queued")]
    Pending,
    #[serde(alias = "flushed")]
    Completed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => f.write_str("pending"),
            TaskStatus::Completed => f.write_str("completed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(rename = "type", default)]
    pub task_type: TaskType,
    #[serde(default, alias = "target")]
    pub repo: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default, alias = "payload")]
    pub prompt: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(
        default,
        alias = "flushed_at",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Stamp the pending -> completed transition.
    pub(crate) fn complete(&mut self, at: DateTime<Utc>) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(at);
    }
}

/// Producer-side description of a task to enqueue.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub id: Option<String>,
    pub title: String,
    pub task_type: TaskType,
    pub repo: String,
    pub depends_on: Vec<String>,
    pub prompt: String,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Validate fields and build the pending record.
    pub(crate) fn into_task(self, now: DateTime<Utc>) -> Result<Task> {
        let id = match self.id {
            Some(id) => id.trim().to_string(),
            None => Ulid::new().to_string().to_lowercase(),
        };
        if id.is_empty() {
            return Err(Error::InvalidTask("id cannot be empty".to_string()));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(Error::InvalidTask(format!(
                "id '{id}' cannot contain whitespace"
            )));
        }

        let title = self.title.trim();
        if title.is_empty() {
            return Err(Error::InvalidTask("title cannot be empty".to_string()));
        }

        let mut depends_on: Vec<String> = Vec::with_capacity(self.depends_on.len());
        for dep in self.depends_on {
            let dep = dep.trim().to_string();
            if dep.is_empty() {
                return Err(Error::InvalidTask(format!(
                    "task '{id}' has an empty dependency id"
                )));
            }
            if dep == id {
                return Err(Error::InvalidTask(format!(
                    "task '{id}' cannot depend on itself"
                )));
            }
            if depends_on.contains(&dep) {
                return Err(Error::InvalidTask(format!(
                    "task '{id}' lists dependency '{dep}' more than once"
                )));
            }
            depends_on.push(dep);
        }

        Ok(Task {
            id,
            title: title.to_string(),
            task_type: self.task_type,
            repo: self.repo.trim().to_string(),
            depends_on,
            prompt: self.prompt,
            status: TaskStatus::Pending,
            completed_at: None,
            created_at: Some(now),
        })
    }
}
