use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the watch engine, the process spawner and the runtime.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("path not found: {path}")]
    NotFound { path: PathBuf },

    #[error("not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("cannot open directory {path}: {source}")]
    OpenDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot watch {path}: {source}")]
    WatchRegistration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot remove watch for {path}: {source}")]
    WatchRemoval {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot spawn {binary}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot create inotify instance: {0}")]
    NotifierUnavailable(#[source] std::io::Error),

    #[error("change notification stream failed: {0}")]
    EventStream(#[source] std::io::Error),

    #[error("change notification stream ended")]
    EventStreamClosed,

    #[error("root '{root}' at {path} overlaps root '{other}'")]
    OverlappingRoots {
        root: lsync_core::RootName,
        other: lsync_core::RootName,
        path: PathBuf,
    },

    #[error("no sync root could be established")]
    NoRoots,

    #[error("config error: {0}")]
    Config(#[from] lsync_core::ConfigError),

    #[error("policy error: {0}")]
    Policy(#[from] lsync_policy::PolicyError),

    #[error("runtime error: {0}")]
    Runtime(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.into(),
        source,
    }
}
