//! Launching sync actions and tracking them until they exit.

use std::fmt;
use std::fs::OpenOptions;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use chrono::{DateTime, Utc};
use tokio::process::{Child, Command};

use lsync_core::{Action, RootName};

use crate::error::{io_err, EngineError};

// ---------------------------------------------------------------------------
// Labels and outcomes
// ---------------------------------------------------------------------------

/// What a spawned action was for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLabel {
    pub root: RootName,
    pub path: PathBuf,
    /// `startup` or an event kind name.
    pub trigger: String,
}

impl TaskLabel {
    pub fn new(root: &RootName, path: impl Into<PathBuf>, trigger: impl Into<String>) -> Self {
        Self {
            root: root.clone(),
            path: path.into(),
            trigger: trigger.into(),
        }
    }
}

impl fmt::Display for TaskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.trigger, self.root, self.path.display())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Exited(i32),
    Signaled(i32),
    /// The exit status could not be collected.
    WaitFailed(String),
    /// No process was started (policy or spawn failure).
    NotStarted(String),
}

impl TaskOutcome {
    pub fn success(&self) -> bool {
        matches!(self, TaskOutcome::Exited(0))
    }
}

impl From<ExitStatus> for TaskOutcome {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => TaskOutcome::Exited(code),
            (None, Some(signal)) => TaskOutcome::Signaled(signal),
            (None, None) => TaskOutcome::WaitFailed(status.to_string()),
        }
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Exited(code) => write!(f, "exit {code}"),
            TaskOutcome::Signaled(signal) => write!(f, "signal {signal}"),
            TaskOutcome::WaitFailed(msg) => write!(f, "wait failed: {msg}"),
            TaskOutcome::NotStarted(msg) => write!(f, "not started: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Spawner
// ---------------------------------------------------------------------------

/// Starts actions as child processes. Arguments go to the program verbatim;
/// no shell is involved.
#[derive(Debug, Clone, Default)]
pub struct Spawner {
    action_log: Option<PathBuf>,
}

impl Spawner {
    /// With `action_log` set, child stdout and stderr are appended to that
    /// file; otherwise they are inherited.
    pub fn new(action_log: Option<PathBuf>) -> Self {
        Self { action_log }
    }

    pub fn spawn(&self, action: &Action, label: TaskLabel) -> Result<PendingTask, EngineError> {
        let mut cmd = Command::new(&action.binary);
        cmd.args(&action.args).stdin(Stdio::null());

        if let Some(log) = &self.action_log {
            let out = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log)
                .map_err(|e| io_err(log, e))?;
            let err = out.try_clone().map_err(|e| io_err(log, e))?;
            cmd.stdout(out).stderr(err);
        }

        let child = cmd.spawn().map_err(|source| EngineError::Spawn {
            binary: action.binary.clone(),
            source,
        })?;
        let pid = child.id().unwrap_or_default();
        tracing::info!(pid, label = %label, action = %action, "spawned action");
        Ok(PendingTask {
            pid,
            label,
            spawned_at: Utc::now(),
            child,
        })
    }
}

#[derive(Debug)]
pub struct PendingTask {
    pub pid: u32,
    pub label: TaskLabel,
    pub spawned_at: DateTime<Utc>,
    child: Child,
}

#[derive(Debug, Clone)]
pub struct Completed {
    pub pid: u32,
    pub label: TaskLabel,
    pub outcome: TaskOutcome,
    pub elapsed_ms: i64,
}

impl PendingTask {
    fn complete(self, outcome: TaskOutcome) -> Completed {
        Completed {
            pid: self.pid,
            elapsed_ms: (Utc::now() - self.spawned_at).num_milliseconds(),
            label: self.label,
            outcome,
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessTable
// ---------------------------------------------------------------------------

/// Children that have been started and not yet collected.
#[derive(Debug, Default)]
pub struct ProcessTable {
    tasks: Vec<PendingTask>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: PendingTask) {
        self.tasks.push(task);
    }

    /// Move every task of `other` into this table.
    pub fn absorb(&mut self, other: ProcessTable) {
        self.tasks.extend(other.tasks);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Collect the children that have already exited, without blocking.
    pub fn reap(&mut self) -> Vec<Completed> {
        let mut done = Vec::new();
        let mut still_running = Vec::with_capacity(self.tasks.len());
        for mut task in self.tasks.drain(..) {
            match task.child.try_wait() {
                Ok(Some(status)) => done.push(task.complete(status.into())),
                Ok(None) => still_running.push(task),
                Err(err) => done.push(task.complete(TaskOutcome::WaitFailed(err.to_string()))),
            }
        }
        self.tasks = still_running;
        done
    }

    /// Wait for every child to exit.
    pub async fn wait_all(&mut self) -> Vec<Completed> {
        let mut done = Vec::with_capacity(self.tasks.len());
        for mut task in std::mem::take(&mut self.tasks) {
            let outcome = match task.child.wait().await {
                Ok(status) => status.into(),
                Err(err) => TaskOutcome::WaitFailed(err.to_string()),
            };
            done.push(task.complete(outcome));
        }
        done
    }
}
