//! `lsync run`: foreground daemon.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use lsync_core::config;
use lsync_engine::start_blocking;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Config file to load.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let path = super::config_path(self.config)?;
        let config = config::load_at(&path)
            .with_context(|| format!("failed to load config — run `lsync init` first ({})", path.display()))?;
        start_blocking(config).context("daemon exited with error")
    }
}
