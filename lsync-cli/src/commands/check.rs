//! `lsync check`: validate the configuration against the filesystem.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use lsync_core::{config, Config, StartupGranularity, SyncRoot};
use lsync_engine::{list_subdirectories, paths::child_dir, resolve_directory, ResetFlag};
use lsync_policy::TemplatePolicy;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    /// Config file to check.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let path = super::config_path(self.config)?;
        let config = config::load_at(&path)
            .with_context(|| format!("failed to load config — run `lsync init` first ({})", path.display()))?;
        config.validate().context("config is invalid")?;
        TemplatePolicy::new(&config).context("failed to compile action templates")?;

        let report = build_report(&path, &config);
        let broken = report.roots.iter().filter(|r| r.error.is_some()).count();
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize check JSON")?
            );
        } else {
            print_table(&report);
        }

        if broken == report.roots.len() {
            bail!("no root can be watched");
        }
        if broken > 0 {
            bail!("{broken} of {} roots cannot be watched", report.roots.len());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct CheckReport {
    config: PathBuf,
    roots: Vec<RootCheck>,
}

#[derive(Debug, Serialize)]
struct RootCheck {
    name: String,
    source: PathBuf,
    resolved: Option<PathBuf>,
    target: String,
    startup: StartupGranularity,
    directories: usize,
    unreadable: usize,
    has_startup_action: bool,
    has_action: bool,
    error: Option<String>,
}

#[derive(Tabled)]
struct CheckTableRow {
    #[tabled(rename = "root")]
    name: String,
    #[tabled(rename = "source")]
    source: String,
    #[tabled(rename = "target")]
    target: String,
    #[tabled(rename = "startup")]
    startup: String,
    #[tabled(rename = "directories")]
    directories: String,
    #[tabled(rename = "status")]
    status: String,
}

fn build_report(path: &Path, config: &Config) -> CheckReport {
    let mut roots: Vec<RootCheck> = config.roots.iter().map(check_root).collect();
    flag_overlaps(&mut roots);
    CheckReport {
        config: path.to_path_buf(),
        roots,
    }
}

/// The daemon keeps the first of two overlapping roots and skips the other.
fn flag_overlaps(roots: &mut [RootCheck]) {
    for i in 0..roots.len() {
        let Some(source) = roots[i].resolved.clone() else {
            continue;
        };
        let earlier = roots[..i]
            .iter()
            .find(|other| {
                other.error.is_none()
                    && other
                        .resolved
                        .as_ref()
                        .is_some_and(|o| source.starts_with(o) || o.starts_with(&source))
            })
            .map(|other| other.name.clone());
        if let Some(other) = earlier {
            roots[i].error = Some(format!("overlaps root '{other}'"));
        }
    }
}

fn check_root(root: &SyncRoot) -> RootCheck {
    let mut check = RootCheck {
        name: root.name.to_string(),
        source: root.source.clone(),
        resolved: None,
        target: root.target.clone(),
        startup: root.startup,
        directories: 0,
        unreadable: 0,
        has_startup_action: root.startup_action.is_some(),
        has_action: root.action.is_some(),
        error: None,
    };
    match resolve_directory(&root.source) {
        Ok(resolved) => {
            let (directories, unreadable) = count_directories(&resolved);
            check.directories = directories;
            check.unreadable = unreadable;
            check.resolved = Some(resolved);
        }
        Err(err) => check.error = Some(err.to_string()),
    }
    check
}

/// Walk the tree the way the daemon's startup does. Returns how many
/// directories would be watched and how many could not be listed.
fn count_directories(top: &Path) -> (usize, usize) {
    let reset = ResetFlag::new();
    let mut directories = 0;
    let mut unreadable = 0;
    let mut stack = vec![top.to_path_buf()];
    while let Some(dir) = stack.pop() {
        directories += 1;
        match list_subdirectories(&dir, &reset) {
            Ok(names) => stack.extend(names.map(|name| child_dir(&dir, &name))),
            Err(_) => unreadable += 1,
        }
    }
    (directories, unreadable)
}

fn print_table(report: &CheckReport) {
    println!(
        "lsync v{} | {} | {} roots",
        env!("CARGO_PKG_VERSION"),
        report.config.display(),
        report.roots.len(),
    );

    let rows: Vec<CheckTableRow> = report
        .roots
        .iter()
        .map(|root| CheckTableRow {
            name: root.name.clone(),
            source: root
                .resolved
                .as_ref()
                .unwrap_or(&root.source)
                .display()
                .to_string(),
            target: root.target.clone(),
            startup: match root.startup {
                StartupGranularity::PerRoot => "per root".to_string(),
                StartupGranularity::PerDirectory => "per directory".to_string(),
            },
            directories: if root.error.is_some() {
                "-".to_string()
            } else {
                root.directories.to_string()
            },
            status: status_label(root),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn status_label(root: &RootCheck) -> String {
    match (&root.error, root.unreadable) {
        (Some(err), _) => format!("{} {err}", "ERROR".red().bold()),
        (None, 0) => "OK".green().to_string(),
        (None, n) => format!("{} {n} unreadable", "WARN".yellow()),
    }
}
