pub mod check;
pub mod init;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};

/// `--config` when given, otherwise `~/.lsync/lsync.yaml`.
pub fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => lsync_core::config::config_path().context("could not determine home directory"),
    }
}
