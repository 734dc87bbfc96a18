//! `lsync init <source> <target> [--name <name>] [--per-directory]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use lsync_core::{config, RootName, StartupGranularity, SyncRoot};

/// Add an rsync-backed root to the configuration.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to mirror.
    pub source: PathBuf,

    /// rsync destination, e.g. `backup:/srv/docs/`.
    pub target: String,

    /// Root name; defaults to the source directory's name.
    #[arg(long, short = 'n')]
    pub name: Option<String>,

    /// Run the startup sync once per directory instead of once per root.
    #[arg(long)]
    pub per_directory: bool,

    /// Config file to create or extend.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let path = super::config_path(self.config)?;
        let source = self
            .source
            .canonicalize()
            .with_context(|| format!("cannot resolve source '{}'", self.source.display()))?;

        let name = match self.name {
            Some(name) => name,
            None => source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .context("cannot derive a root name from the source; pass --name")?,
        };

        let mut root = SyncRoot::rsync(RootName::from(name.clone()), source.clone(), self.target);
        if self.per_directory {
            root.startup = StartupGranularity::PerDirectory;
        }
        let config = config::add_root_at(&path, root)
            .with_context(|| format!("failed to add root '{name}' to {}", path.display()))?;

        println!("✓ Added root '{}' for {}", name, source.display());
        println!(
            "  Saved to: {} ({} root{})",
            path.display(),
            config.roots.len(),
            if config.roots.len() == 1 { "" } else { "s" }
        );
        Ok(())
    }
}
