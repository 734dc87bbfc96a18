#![allow(dead_code)]

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use lsync_core::{Action, EventKind, RootName, SyncRoot};
use lsync_engine::{Engine, MemoryNotifier, Notifier, ResetFlag, Spawner};
use lsync_policy::{Policy, PolicyError, RootRef};

/// One call the engine made into the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub directory: PathBuf,
    /// `None` for startup calls.
    pub kind: Option<EventKind>,
    pub name: Option<OsString>,
}

/// Policy that records every call and answers with fixed shell scripts.
///
/// Scripts run as `/bin/sh -c <script> lsync <directory>`.
#[derive(Default)]
pub struct Recording {
    pub startup_script: Option<String>,
    pub event_script: Option<String>,
    calls: Mutex<Vec<Call>>,
}

impl Recording {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_startup(script: &str) -> Arc<Self> {
        Arc::new(Self {
            startup_script: Some(script.to_string()),
            ..Self::default()
        })
    }

    pub fn with_events(script: &str) -> Arc<Self> {
        Arc::new(Self {
            event_script: Some(script.to_string()),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn event_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.kind.is_some()).collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

fn script_action(script: &Option<String>, directory: &Path) -> Option<Action> {
    script.as_ref().map(|script| {
        Action::new("/bin/sh")
            .arg("-c")
            .arg(script.clone())
            .arg("lsync")
            .arg(directory.to_string_lossy().into_owned())
    })
}

impl Policy for Recording {
    fn startup_action(
        &self,
        _root: RootRef<'_>,
        directory: &Path,
    ) -> Result<Option<Action>, PolicyError> {
        self.record(Call {
            directory: directory.to_path_buf(),
            kind: None,
            name: None,
        });
        Ok(script_action(&self.startup_script, directory))
    }

    fn decide_action(
        &self,
        _root: RootRef<'_>,
        directory: &Path,
        kind: EventKind,
        name: Option<&OsStr>,
    ) -> Result<Option<Action>, PolicyError> {
        self.record(Call {
            directory: directory.to_path_buf(),
            kind: Some(kind),
            name: name.map(OsStr::to_os_string),
        });
        Ok(script_action(&self.event_script, directory))
    }
}

pub fn root(name: &str, source: &Path) -> SyncRoot {
    SyncRoot {
        name: RootName::from(name),
        source: source.to_path_buf(),
        target: String::new(),
        startup: Default::default(),
        startup_action: None,
        action: None,
    }
}

pub fn memory_engine(policy: Arc<Recording>, reset: ResetFlag) -> Engine<MemoryNotifier> {
    Engine::new(MemoryNotifier::new(), policy, Spawner::default(), reset)
}

pub fn mkdirs(base: &Path, dirs: &[&str]) {
    for dir in dirs {
        fs::create_dir_all(base.join(dir)).expect("mkdir");
    }
}

/// Canonical form of `path` with a trailing separator, as the engine stores it.
pub fn dir(path: &Path) -> PathBuf {
    lsync_engine::resolve_directory(path).expect("resolve")
}

pub fn watched_paths<N: Notifier>(engine: &Engine<N>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = engine
        .watches()
        .table()
        .iter()
        .map(|(_, entry)| entry.path.clone())
        .collect();
    paths.sort();
    paths
}
