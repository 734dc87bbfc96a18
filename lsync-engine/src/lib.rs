//! Watch engine for lsync: keeps an inotify watch on every directory under
//! the configured roots and runs the policy's actions as child processes.

mod backend;
mod engine;
pub mod enumerate;
mod error;
pub mod event;
mod event_loop;
pub mod memory;
pub mod paths;
pub mod reset;
mod runtime;
pub mod spawn;
mod startup;
pub mod watch;

pub use backend::{open as open_inotify, EventSource, InotifyNotifier};
pub use engine::{Engine, ResolvedRoot, SkippedPath};
pub use enumerate::{list_subdirectories, Subdirectories};
pub use error::EngineError;
pub use event::{ChangeEvent, Notification};
pub use memory::MemoryNotifier;
pub use paths::resolve_directory;
pub use reset::{ResetFlag, ResetReason};
pub use runtime::{run, start_blocking};
pub use spawn::{Completed, PendingTask, ProcessTable, Spawner, TaskLabel, TaskOutcome};
pub use startup::{StartupFailure, StartupReport};
pub use watch::{Notifier, RootId, WatchEntry, WatchId, WatchManager, WatchTable};
