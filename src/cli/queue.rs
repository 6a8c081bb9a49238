//! taskq command implementations.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::queue::{LogKind, Queue};
use crate::resolver::Readiness;
use crate::task::{NewTask, Task, TaskType};

/// Global flags shared by every command.
pub struct QueueContext {
    pub dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

impl QueueContext {
    fn open(&self) -> Result<Queue> {
        let cwd = std::env::current_dir()?;
        let queue_config = config::resolve(&cwd, self.config.as_deref(), self.dir.as_deref())?;
        Ok(Queue::new(queue_config))
    }

    fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }
}

pub struct AddOptions {
    pub title: String,
    pub id: Option<String>,
    pub task_type: String,
    pub repo: String,
    pub depends_on: Vec<String>,
    pub prompt: Option<String>,
    pub prompt_file: Option<PathBuf>,
}

#[derive(Serialize)]
struct TaskListOutput {
    total: usize,
    tasks: Vec<Task>,
}

pub fn run_status(ctx: QueueContext) -> Result<()> {
    let queue = ctx.open()?;
    let report = queue.status()?;

    let mut human = HumanOutput::new("Task queue status");
    human.push_summary("Pending", report.pending.to_string());
    human.push_summary("Completed", report.completed.to_string());
    human.push_summary("Ready", report.ready.to_string());
    human.push_summary("Blocked", report.blocked.to_string());

    if report.tasks.is_empty() {
        human.push_detail("No tasks queued.");
    }
    for line in &report.tasks {
        let icon = if line.unmet.is_empty() { ">" } else { "x" };
        let mut text = format!(
            "[{icon}] {} {} [{}] {}",
            line.id, line.title, line.task_type, line.state
        );
        if !line.unmet.is_empty() {
            text.push_str(&format!(" (waiting: {})", line.unmet.join(", ")));
        }
        human.push_detail(text);
    }
    for cycle in &report.cycles {
        human.push_warning(format!("dependency cycle: {}", cycle.join(", ")));
    }
    if !report.cycles.is_empty() {
        human.push_next_step("taskq doctor");
    }

    emit_success(ctx.output(), "status", &report, Some(&human))
}

pub fn run_list(ctx: QueueContext) -> Result<()> {
    let queue = ctx.open()?;
    let tasks = queue.list()?;

    let mut human = if tasks.is_empty() {
        HumanOutput::new("No tasks queued.")
    } else {
        HumanOutput::new("Queued tasks")
    };
    for task in &tasks {
        let mut line = format!("{}: {} [{}]", task.id, task.title, task.task_type);
        if !task.repo.is_empty() {
            line.push_str(&format!(" repo={}", task.repo));
        }
        if !task.depends_on.is_empty() {
            line.push_str(&format!(" after={}", task.depends_on.join(",")));
        }
        human.push_detail(line);
    }

    let output = TaskListOutput {
        total: tasks.len(),
        tasks,
    };
    emit_success(ctx.output(), "list", &output, Some(&human))
}

pub fn run_dispatch(ctx: QueueContext) -> Result<()> {
    let queue = ctx.open()?;
    let task = queue.dispatch()?;

    let mut human = HumanOutput::new(format!("=== Dispatched: {} - {} ===", task.id, task.title));
    human.push_summary("Repo", task.repo.clone());
    human.push_summary("Type", task.task_type.to_string());
    if let Some(at) = task.completed_at {
        human.push_summary("Completed at", at.to_rfc3339());
    }
    human.set_body(task.prompt.clone());

    emit_success(ctx.output(), "dispatch", &task, Some(&human))
}

pub fn run_add(ctx: QueueContext, options: AddOptions) -> Result<()> {
    let task_type: TaskType = options.task_type.parse()?;
    let prompt = match (options.prompt, options.prompt_file) {
        (Some(prompt), _) => prompt,
        (None, Some(path)) => read_prompt(&path)?,
        (None, None) => String::new(),
    };

    let queue = ctx.open()?;
    let task = queue.enqueue(NewTask {
        id: options.id,
        title: options.title,
        task_type,
        repo: options.repo,
        depends_on: options.depends_on,
        prompt,
    })?;

    let mut human = HumanOutput::new("Task queued");
    human.push_summary("ID", task.id.clone());
    human.push_summary("Type", task.task_type.to_string());
    if !task.repo.is_empty() {
        human.push_summary("Repo", task.repo.clone());
    }
    if !task.depends_on.is_empty() {
        human.push_summary("Depends on", task.depends_on.join(", "));
    }

    emit_success(ctx.output(), "add", &task, Some(&human))
}

fn read_prompt(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    std::fs::read_to_string(path).map_err(|err| {
        Error::InvalidArgument(format!(
            "cannot read prompt file {}: {err}",
            path.display()
        ))
    })
}

pub fn run_show(ctx: QueueContext, id: String) -> Result<()> {
    let queue = ctx.open()?;
    let view = queue.show(id.trim())?;
    let task = &view.task;

    let mut human = HumanOutput::new(format!("{}: {}", task.id, task.title));
    let log = match view.log {
        LogKind::Pending => "pending",
        LogKind::Completed => "completed",
    };
    human.push_summary("Log", log);
    human.push_summary("Type", task.task_type.to_string());
    if !task.repo.is_empty() {
        human.push_summary("Repo", task.repo.clone());
    }
    if !task.depends_on.is_empty() {
        human.push_summary("Depends on", task.depends_on.join(", "));
    }
    match view.readiness.as_ref() {
        Some(Readiness::Ready) => human.push_summary("State", "READY"),
        Some(Readiness::Blocked { unmet }) => {
            human.push_summary("State", format!("BLOCKED (waiting: {})", unmet.join(", ")))
        }
        None => {}
    }
    if let Some(at) = task.completed_at {
        human.push_summary("Completed at", at.to_rfc3339());
    }
    human.set_body(task.prompt.clone());

    emit_success(ctx.output(), "show", &view, Some(&human))
}

pub fn run_doctor(ctx: QueueContext) -> Result<()> {
    let queue = ctx.open()?;
    let report = queue.doctor()?;

    let header = if report.is_clean() {
        "Queue check: ok"
    } else {
        "Queue check: problems found"
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("Pending", report.pending.to_string());
    human.push_summary("Completed", report.completed.to_string());
    human.push_summary("Problems", report.problems.len().to_string());

    for issue in &report.problems {
        human.push_detail(issue.message.clone());
    }
    for issue in &report.warnings {
        human.push_warning(issue.message.clone());
    }

    emit_success(ctx.output(), "doctor", &report, Some(&human))
}
