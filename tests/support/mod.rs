#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use taskq::config::QueueConfig;
use taskq::queue::Queue;
use taskq::store;
use taskq::task::{NewTask, Task};
use tempfile::TempDir;

/// A queue rooted in a throwaway directory.
pub struct TestQueue {
    dir: TempDir,
}

impl TestQueue {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    /// Working directory for CLI invocations.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn queue_dir(&self) -> PathBuf {
        self.dir.path().join(".taskq")
    }

    pub fn config(&self) -> QueueConfig {
        QueueConfig::in_dir(self.queue_dir())
    }

    pub fn queue(&self) -> Queue {
        Queue::new(self.config())
    }

    pub fn pending_path(&self) -> PathBuf {
        self.config().pending_path()
    }

    pub fn completed_path(&self) -> PathBuf {
        self.config().completed_path()
    }

    pub fn add(&self, id: &str, deps: &[&str]) -> Task {
        self.queue()
            .enqueue(
                NewTask::new(format!("task {id}"))
                    .with_id(id)
                    .depends_on(deps.iter().copied())
                    .with_prompt(format!("do {id}")),
            )
            .expect("enqueue")
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn write_pending_raw(&self, contents: &str) -> PathBuf {
        self.write_file(".taskq/pending.jsonl", contents)
    }

    pub fn write_completed_raw(&self, contents: &str) -> PathBuf {
        self.write_file(".taskq/completed.jsonl", contents)
    }

    pub fn pending(&self) -> Vec<Task> {
        store::load(&self.pending_path()).expect("load pending")
    }

    pub fn completed(&self) -> Vec<Task> {
        store::load(&self.completed_path()).expect("load completed")
    }

    /// Raw bytes of both logs, `None` for a missing file.
    pub fn snapshot(&self) -> (Option<Vec<u8>>, Option<Vec<u8>>) {
        (
            fs::read(self.pending_path()).ok(),
            fs::read(self.completed_path()).ok(),
        )
    }

    /// `taskq` command running inside the queue root with a clean environment.
    pub fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::cargo_bin("taskq").expect("binary");
        cmd.current_dir(self.root())
            .env_remove("TASKQ_DIR")
            .env_remove("TASKQ_CONFIG")
            .env_remove("RUST_LOG");
        cmd
    }
}
