//! Command-line interface for taskq
//!
//! This module defines the CLI structure using clap derive macros.
//! Command implementations live in [`queue`].

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;

mod queue;

/// taskq - dependency-aware task queue
///
/// Stores pending work in a JSONL log and hands out the next task whose
/// dependencies have all completed.
#[derive(Parser, Debug)]
#[command(name = "taskq")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Queue directory holding the pending and completed logs
    #[arg(long, global = true, env = "TASKQ_DIR")]
    pub dir: Option<PathBuf>,

    /// Config file (defaults to .taskq.toml in the current directory)
    #[arg(long, global = true, env = "TASKQ_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show queue counts and per-task readiness
    Status,

    /// List pending tasks in arrival order
    List,

    /// Move the next ready task to the completed log and print its prompt
    #[command(alias = "pop")]
    Dispatch,

    /// Append a task to the pending log
    Add {
        /// Human-readable title
        #[arg(long)]
        title: String,

        /// Task id (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Task type (bugfix, feature, docs, refactor, rename, format, mechanical,
        /// investigation, other, or any other single-word tag)
        #[arg(long = "type", default_value = "other")]
        task_type: String,

        /// Subject of the task (repository, service, path)
        #[arg(long, default_value = "")]
        repo: String,

        /// Ids that must complete first (repeatable)
        #[arg(long = "depends-on", value_delimiter = ',')]
        depends_on: Vec<String>,

        /// Prompt delivered on dispatch
        #[arg(long, conflicts_with = "prompt_file")]
        prompt: Option<String>,

        /// Read the prompt from a file ("-" for stdin)
        #[arg(long)]
        prompt_file: Option<PathBuf>,
    },

    /// Show one task from either log
    Show {
        /// Task id
        id: String,
    },

    /// Check both logs for duplicated ids, interrupted dispatches and cycles
    Doctor,
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let ctx = queue::QueueContext {
            dir: self.dir,
            config: self.config,
            json: self.json,
            quiet: self.quiet,
        };

        match self.command {
            Commands::Status => queue::run_status(ctx),
            Commands::List => queue::run_list(ctx),
            Commands::Dispatch => queue::run_dispatch(ctx),
            Commands::Add {
                title,
                id,
                task_type,
                repo,
                depends_on,
                prompt,
                prompt_file,
            } => queue::run_add(
                ctx,
                queue::AddOptions {
                    title,
                    id,
                    task_type,
                    repo,
                    depends_on,
                    prompt,
                    prompt_file,
                },
            ),
            Commands::Show { id } => queue::run_show(ctx, id),
            Commands::Doctor => queue::run_doctor(ctx),
        }
    }
}
