//! The watch engine: one generation of the watch tree plus the children it
//! has spawned.
//!
//! Startup lives in [`crate::startup`], event dispatch in
//! [`crate::event_loop`]. Both operate on [`Engine`].

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lsync_core::{EventKind, RootName};
use lsync_policy::{Policy, RootRef};

use crate::enumerate::list_subdirectories;
use crate::error::EngineError;
use crate::paths::child_dir;
use crate::reset::ResetFlag;
use crate::spawn::{ProcessTable, Spawner, TaskLabel};
use crate::watch::{Notifier, RootId, WatchManager};

/// A root whose source directory resolved successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoot {
    pub name: RootName,
    pub source: PathBuf,
}

/// Path that was left out of the watch tree, and why.
#[derive(Debug, Clone)]
pub struct SkippedPath {
    pub path: PathBuf,
    pub reason: String,
}

impl SkippedPath {
    pub(crate) fn new(path: &Path, err: &EngineError) -> Self {
        Self {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

pub struct Engine<N: Notifier> {
    pub(crate) watches: WatchManager<N>,
    pub(crate) policy: Arc<dyn Policy>,
    pub(crate) spawner: Spawner,
    pub(crate) pending: ProcessTable,
    pub(crate) roots: Vec<ResolvedRoot>,
    pub(crate) reset: ResetFlag,
}

impl<N: Notifier> Engine<N> {
    pub fn new(notifier: N, policy: Arc<dyn Policy>, spawner: Spawner, reset: ResetFlag) -> Self {
        Self {
            watches: WatchManager::new(notifier),
            policy,
            spawner,
            pending: ProcessTable::new(),
            roots: Vec::new(),
            reset,
        }
    }

    /// Carry children spawned by a previous generation.
    pub fn with_pending(mut self, pending: ProcessTable) -> Self {
        self.pending.absorb(pending);
        self
    }

    pub fn watches(&self) -> &WatchManager<N> {
        &self.watches
    }

    pub fn pending(&self) -> &ProcessTable {
        &self.pending
    }

    pub fn roots(&self) -> &[ResolvedRoot] {
        &self.roots
    }

    /// Drop every watch and hand back the children still running.
    pub fn into_pending(mut self) -> ProcessTable {
        self.watches.clear();
        self.pending
    }

    pub(crate) fn root_ref(&self, root: RootId) -> RootRef<'_> {
        let resolved = &self.roots[root.0];
        RootRef {
            name: &resolved.name,
            source: &resolved.source,
        }
    }

    pub(crate) fn root_name(&self, root: RootId) -> &RootName {
        &self.roots[root.0].name
    }

    /// Watch `dir`, logging and recording the failure when it cannot be.
    pub(crate) fn watch_directory(
        &mut self,
        root: RootId,
        dir: &Path,
        skipped: &mut Vec<SkippedPath>,
    ) -> bool {
        match self.watches.add_watch(dir, root) {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(path = %dir.display(), error = %err, "skipping subtree");
                skipped.push(SkippedPath::new(dir, &err));
                false
            }
        }
    }

    /// Full paths of the subdirectories of `dir`. An unreadable directory
    /// yields nothing and is recorded.
    pub(crate) fn subdirectories(&self, dir: &Path, skipped: &mut Vec<SkippedPath>) -> Vec<PathBuf> {
        match list_subdirectories(dir, &self.reset) {
            Ok(names) => names.map(|name| child_dir(dir, &name)).collect(),
            Err(err) => {
                tracing::warn!(path = %dir.display(), error = %err, "cannot list directory");
                skipped.push(SkippedPath::new(dir, &err));
                Vec::new()
            }
        }
    }

    /// Ask the policy about one event kind and spawn whatever it decides.
    pub(crate) fn dispatch(
        &mut self,
        root: RootId,
        directory: &Path,
        kind: EventKind,
        name: Option<&OsStr>,
    ) {
        let decided = self
            .policy
            .decide_action(self.root_ref(root), directory, kind, name);
        let action = match decided {
            Ok(Some(action)) => action,
            Ok(None) => return,
            Err(err) => {
                tracing::error!(dir = %directory.display(), kind = %kind, error = %err, "policy failed");
                return;
            }
        };
        let path = match name {
            Some(name) => directory.join(name),
            None => directory.to_path_buf(),
        };
        let label = TaskLabel::new(self.root_name(root), path, kind.as_str());
        match self.spawner.spawn(&action, label) {
            Ok(task) => self.pending.push(task),
            Err(err) => tracing::error!(error = %err, "action not started"),
        }
    }

    /// Collect finished children and log how they went.
    pub(crate) fn reap(&mut self) {
        for done in self.pending.reap() {
            if done.outcome.success() {
                tracing::debug!(pid = done.pid, label = %done.label, elapsed_ms = done.elapsed_ms, "action finished");
            } else {
                tracing::warn!(pid = done.pid, label = %done.label, outcome = %done.outcome, "action failed");
            }
        }
    }
}
