//! Initial walk: watch every directory under every root, run the startup
//! actions, and wait for all of them before events are processed.

use std::path::{Path, PathBuf};
use std::time::Instant;

use lsync_core::{RootName, SyncRoot};

use crate::engine::{Engine, ResolvedRoot, SkippedPath};
use crate::error::EngineError;
use crate::paths::resolve_directory;
use crate::spawn::{ProcessTable, TaskLabel, TaskOutcome};
use crate::watch::{Notifier, RootId};

#[derive(Debug, Clone)]
pub struct StartupFailure {
    pub label: TaskLabel,
    pub outcome: TaskOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct StartupReport {
    /// Roots whose top directory is watched.
    pub roots: usize,
    pub watched: usize,
    pub spawned: usize,
    pub skipped: Vec<SkippedPath>,
    pub failures: Vec<StartupFailure>,
    /// The walk stopped early because the reset flag was raised.
    pub aborted: bool,
    pub duration_ms: u128,
}

impl<N: Notifier> Engine<N> {
    /// Build the watch tree for `roots` and run their startup actions.
    ///
    /// Returns once every startup action has exited, including when the walk
    /// was cut short by a reset. A root whose source overlaps an earlier root
    /// is skipped. Fails with [`EngineError::NoRoots`] when not a single root
    /// could be watched.
    pub async fn startup(&mut self, roots: &[SyncRoot]) -> Result<StartupReport, EngineError> {
        let started = Instant::now();
        let mut report = StartupReport::default();
        let mut barrier = ProcessTable::new();

        for root in roots {
            if self.reset.is_set() {
                report.aborted = true;
                break;
            }
            let source = match resolve_directory(&root.source) {
                Ok(source) => source,
                Err(err) => {
                    tracing::error!(root = %root.name, error = %err, "cannot resolve root");
                    report.skipped.push(SkippedPath::new(&root.source, &err));
                    continue;
                }
            };
            if let Err(err) = self.check_overlap(&root.name, &source) {
                tracing::error!(root = %root.name, error = %err, "root overlaps another root");
                report.skipped.push(SkippedPath::new(&source, &err));
                continue;
            }
            let id = RootId(self.roots.len());
            self.roots.push(ResolvedRoot {
                name: root.name.clone(),
                source: source.clone(),
            });
            tracing::info!(root = %root.name, source = %source.display(), "walking root");
            if self.walk_startup(id, source, &mut report, &mut barrier) {
                report.aborted = true;
                break;
            }
        }

        assert_eq!(
            barrier.len(),
            report.spawned,
            "startup wait-set out of step with spawned actions"
        );
        if !barrier.is_empty() {
            tracing::info!(count = barrier.len(), "waiting for startup actions");
        }
        for done in barrier.wait_all().await {
            if done.outcome.success() {
                tracing::debug!(label = %done.label, elapsed_ms = done.elapsed_ms, "startup action finished");
            } else {
                tracing::warn!(label = %done.label, outcome = %done.outcome, "startup action failed");
                report.failures.push(StartupFailure {
                    label: done.label,
                    outcome: done.outcome,
                });
            }
        }

        report.watched = self.watches.len();
        report.duration_ms = started.elapsed().as_millis();
        if report.roots == 0 && !report.aborted {
            return Err(EngineError::NoRoots);
        }
        Ok(report)
    }

    /// Depth-first, parents before children. Returns `true` when the reset
    /// flag cut the walk short.
    fn walk_startup(
        &mut self,
        root: RootId,
        top: PathBuf,
        report: &mut StartupReport,
        barrier: &mut ProcessTable,
    ) -> bool {
        let mut stack = vec![top];
        let mut first = true;
        while let Some(dir) = stack.pop() {
            if self.reset.is_set() {
                return true;
            }
            if !self.watch_directory(root, &dir, &mut report.skipped) {
                first = false;
                continue;
            }
            if first {
                report.roots += 1;
                first = false;
            }

            let label = TaskLabel::new(self.root_name(root), dir.clone(), "startup");
            match self.policy.startup_action(self.root_ref(root), &dir) {
                Ok(Some(action)) => match self.spawner.spawn(&action, label.clone()) {
                    Ok(task) => {
                        report.spawned += 1;
                        barrier.push(task);
                    }
                    Err(err) => {
                        tracing::error!(label = %label, error = %err, "startup action not started");
                        report.failures.push(StartupFailure {
                            label,
                            outcome: TaskOutcome::NotStarted(err.to_string()),
                        });
                    }
                },
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(label = %label, error = %err, "policy failed");
                    report.failures.push(StartupFailure {
                        label,
                        outcome: TaskOutcome::NotStarted(err.to_string()),
                    });
                }
            }

            let children = self.subdirectories(&dir, &mut report.skipped);
            stack.extend(children.into_iter().rev());
        }
        // Enumeration stops quietly on reset, so an empty stack is not proof
        // the tree was walked in full.
        self.reset.is_set()
    }

    /// A directory belongs to exactly one root. Fails when `source` equals,
    /// contains or lies inside a root already established in this generation.
    fn check_overlap(&self, name: &RootName, source: &Path) -> Result<(), EngineError> {
        match self
            .roots
            .iter()
            .find(|other| source.starts_with(&other.source) || other.source.starts_with(source))
        {
            Some(other) => Err(EngineError::OverlappingRoots {
                root: name.clone(),
                other: other.name.clone(),
                path: source.to_path_buf(),
            }),
            None => Ok(()),
        }
    }
}
