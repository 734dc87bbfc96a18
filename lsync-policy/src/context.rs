//! Template context: the variables an action template can reference.

use std::ffi::OsStr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use lsync_core::EventKind;

use crate::error::PolicyError;

/// Flat rendering payload for one action.
///
/// Directory-valued fields keep the trailing separator produced by the path
/// resolver, so `{{ target }}{{ relative }}` concatenates cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionContext {
    /// Root name from the config.
    pub root: String,
    /// Resolved source directory of the root.
    pub source: String,
    /// Target string from the config, untouched.
    pub target: String,
    /// Absolute directory the event happened in.
    pub directory: String,
    /// `directory` relative to `source`; empty for the root itself.
    pub relative: String,
    /// Entry name inside `directory`; empty when the event concerns the directory itself.
    pub name: String,
    /// `directory` joined with `name`.
    pub path: String,
    /// Event kind, or `startup` for the initial pass.
    pub event: String,
}

impl ActionContext {
    /// Context for the startup pass over `directory`.
    pub fn startup(root: &str, source: &Path, target: &str, directory: &Path) -> Self {
        let directory_str = dir_string(directory);
        Self {
            root: root.to_string(),
            source: dir_string(source),
            target: target.to_string(),
            relative: relative_to(source, directory),
            path: directory_str.clone(),
            directory: directory_str,
            name: String::new(),
            event: "startup".to_string(),
        }
    }

    /// Context for a change event of `kind` on `name` inside `directory`.
    pub fn event(
        root: &str,
        source: &Path,
        target: &str,
        directory: &Path,
        kind: EventKind,
        name: Option<&OsStr>,
    ) -> Self {
        let mut ctx = Self::startup(root, source, target, directory);
        ctx.event = kind.as_str().to_string();
        if let Some(name) = name {
            ctx.name = name.to_string_lossy().into_owned();
            ctx.path = directory.join(name).to_string_lossy().into_owned();
        }
        ctx
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, PolicyError> {
        tera::Context::from_serialize(self).map_err(PolicyError::from)
    }
}

fn dir_string(path: &Path) -> String {
    let mut s = path.to_string_lossy().into_owned();
    if !s.ends_with('/') {
        s.push('/');
    }
    s
}

fn relative_to(source: &Path, directory: &Path) -> String {
    match directory.strip_prefix(source) {
        Ok(rel) if rel.as_os_str().is_empty() => String::new(),
        Ok(rel) => dir_string(rel),
        Err(_) => String::new(),
    }
}
