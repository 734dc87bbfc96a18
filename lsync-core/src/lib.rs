//! lsync core library: domain types, configuration persistence, errors.
//!
//! Public API surface:
//! - [`types`]: newtypes, event kinds and the [`Action`] command record
//! - [`error`]: [`ConfigError`]
//! - [`config`]: load / save / validate the YAML configuration

pub mod config;
pub mod error;
pub mod types;

pub use config::{ActionTemplate, Config, Settings, StartupGranularity, SyncRoot};
pub use error::ConfigError;
pub use types::{Action, EventKind, EventKinds, RootName};
