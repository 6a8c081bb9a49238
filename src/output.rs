//! Shared output formatting for taskq CLI commands.

use serde::Serialize;

use crate::error::{exit_codes, Error, Result, Unavailable};

pub const SCHEMA_VERSION: &str = "taskq.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    body: Option<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            details: Vec::new(),
            body: None,
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }

    /// Free text printed verbatim after the summary (task prompts).
    pub fn set_body(&mut self, value: impl Into<String>) {
        self.body = Some(value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let warnings = human.map(|h| h.warnings.clone()).unwrap_or_default();
        let next_steps = human.map(|h| h.next_steps.clone()).unwrap_or_default();

        #[derive(Serialize)]
        struct Envelope<'a, T: Serialize> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            data: &'a T,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            warnings: Vec<String>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            next_steps: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data,
            warnings,
            next_steps,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if options.quiet {
        // Quiet drops decoration, never a payload the caller cannot get back.
        if let Some(text) = human.and_then(format_quiet) {
            println!("{text}");
        }
        return Ok(());
    }

    if let Some(human) = human {
        println!("{}", format_human(human));
    }

    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);
    if json {
        #[derive(Serialize)]
        struct ErrorBody<'a> {
            message: &'a str,
            code: i32,
            kind: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<serde_json::Value>,
        }

        #[derive(Serialize)]
        struct Envelope<'a> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            error: ErrorBody<'a>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            next_steps: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            error: ErrorBody {
                message: &err.to_string(),
                code: err.exit_code(),
                kind: error_kind(err),
                details: err.details(),
            },
            next_steps,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Error::EmptyOrBlocked(Unavailable::Blocked(blocked)) = err {
        for task in blocked {
            eprintln!(
                "  [x] {} {} (waiting: {})",
                task.id,
                task.title,
                task.unmet.join(", ")
            );
        }
    }
    if let Some(hint) = next_steps.first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = Vec::new();
    lines.push(output.header.clone());

    push_summary(&mut lines, &output.summary);
    push_section(&mut lines, "Details", &output.details);
    if let Some(body) = output.body.as_ref() {
        lines.push(String::new());
        lines.push(body.trim_end().to_string());
    }
    push_section(&mut lines, "Warnings", &output.warnings);
    push_section(&mut lines, "Next steps", &output.next_steps);

    lines.join("\n")
}

/// Header and body only, for `--quiet`; `None` when there is no body.
pub fn format_quiet(output: &HumanOutput) -> Option<String> {
    let body = output.body.as_ref()?;
    Some(format!("{}\n\n{}", output.header, body.trim_end()))
}

/// First non-flag argument, used to label error envelopes before clap runs.
pub fn infer_command_name_from_args() -> String {
    let mut args = std::env::args().skip(1);
    let mut takes_value = false;

    while let Some(arg) = args.next() {
        if takes_value {
            takes_value = false;
            continue;
        }
        if arg == "--dir" || arg == "--config" {
            takes_value = true;
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        return match arg.as_str() {
            "pop" => "dispatch".to_string(),
            _ => arg,
        };
    }

    "taskq".to_string()
}

fn error_kind(err: &Error) -> &'static str {
    match err {
        _ if err.is_empty_or_blocked() => "not_ready",
        Error::UnknownCommand(_) => "usage",
        _ if err.exit_code() == exit_codes::USER_ERROR => "user_error",
        _ => "operation_failed",
    }
}

fn error_next_steps(err: &Error) -> Vec<String> {
    match err {
        Error::EmptyOrBlocked(Unavailable::Empty) => {
            vec!["taskq add --title \"...\" --prompt \"...\"".to_string()]
        }
        Error::EmptyOrBlocked(Unavailable::Blocked(_)) => vec!["taskq status".to_string()],
        Error::DependencyCycle { .. } => vec!["taskq doctor".to_string()],
        Error::Parse { path, line, .. } => {
            vec![format!("fix line {line} of {} then retry", path.display())]
        }
        Error::InvalidConfig(_) => vec!["fix .taskq.toml then retry".to_string()],
        Error::LockFailed(_) => vec!["another taskq process holds the queue; retry".to_string()],
        _ => Vec::new(),
    }
}

fn push_summary(lines: &mut Vec<String>, summary: &[(String, String)]) {
    if summary.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push("Summary:".to_string());
    for (key, value) in summary {
        if value.is_empty() {
            lines.push(format!("- {key}"));
        } else {
            lines.push(format!("- {key}: {value}"));
        }
    }
}

fn push_section(lines: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push(format!("{title}:"));
    for item in items {
        lines.push(format!("- {item}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_output_sections_in_order() {
        let mut human = HumanOutput::new("Dispatched");
        human.push_summary("ID", "a");
        human.push_summary("Ready", "");
        human.push_detail("line");
        human.set_body("prompt text\n\n");
        human.push_warning("careful");
        human.push_next_step("taskq status");

        let text = format_human(&human);
        assert_eq!(
            text,
            "Dispatched\n\nSummary:\n- ID: a\n- Ready\n\nDetails:\n- line\n\nprompt text\n\nWarnings:\n- careful\n\nNext steps:\n- taskq status"
        );
    }

    #[test]
    fn quiet_output_keeps_header_and_body() {
        let mut human = HumanOutput::new("=== Dispatched: a - A ===");
        human.push_summary("Repo", "web");
        human.push_warning("careful");
        assert_eq!(format_quiet(&human), None);

        human.set_body("the prompt\n");
        assert_eq!(
            format_quiet(&human).as_deref(),
            Some("=== Dispatched: a - A ===\n\nthe prompt")
        );
    }

    #[test]
    fn error_kinds_follow_exit_codes() {
        assert_eq!(
            error_kind(&Error::EmptyOrBlocked(Unavailable::Empty)),
            "not_ready"
        );
        assert_eq!(error_kind(&Error::UnknownCommand("x".into())), "usage");
        assert_eq!(error_kind(&Error::DuplicateTask("a".into())), "user_error");
        assert_eq!(
            error_kind(&Error::LockFailed("queue.lock".into())),
            "operation_failed"
        );
    }
}
