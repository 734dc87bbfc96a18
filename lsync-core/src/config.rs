//! YAML configuration: which trees to watch and which commands to run.
//!
//! # Storage layout
//!
//! ```text
//! ~/.lsync/
//!   lsync.yaml   (mode 0600, directory mode 0700)
//! ```
//!
//! # API pattern
//!
//! Every function that locates the file has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{EventKind, EventKinds, RootName};

pub const CONFIG_DIR: &str = ".lsync";
pub const CONFIG_FILE: &str = "lsync.yaml";

const RSYNC: &str = "/usr/bin/rsync";

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Root of the YAML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub roots: Vec<SyncRoot>,
}

/// Daemon-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Settings {
    /// File that receives stdout/stderr of every spawned action (appended).
    /// When absent, children inherit the daemon's streams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_log: Option<PathBuf>,
}

/// How many startup actions a root gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StartupGranularity {
    /// One startup action for the root directory only.
    #[default]
    PerRoot,
    /// One startup action for every watched directory.
    PerDirectory,
}

/// A command whose binary and arguments are Tera templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTemplate {
    pub binary: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Kinds that trigger this action; `None` means every kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<EventKind>>,
}

impl ActionTemplate {
    /// The `events` filter as a set.
    pub fn event_kinds(&self) -> EventKinds {
        match &self.events {
            Some(kinds) => kinds.iter().copied().collect(),
            None => EventKinds::all(),
        }
    }
}

/// One watched source tree and the target it is mirrored to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRoot {
    pub name: RootName,
    /// Source directory; relative paths resolve against the daemon's cwd.
    pub source: PathBuf,
    /// Opaque destination string handed to the templates (`{{ target }}`).
    pub target: String,
    #[serde(default)]
    pub startup: StartupGranularity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_action: Option<ActionTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionTemplate>,
}

impl SyncRoot {
    /// An rsync-based root: full sync at startup, per-directory sync on change.
    pub fn rsync(name: RootName, source: PathBuf, target: impl Into<String>) -> Self {
        Self {
            name,
            source,
            target: target.into(),
            startup: StartupGranularity::PerRoot,
            startup_action: Some(ActionTemplate {
                binary: RSYNC.to_string(),
                args: vec![
                    "-a".to_string(),
                    "--delete".to_string(),
                    "{{ source }}".to_string(),
                    "{{ target }}".to_string(),
                ],
                events: None,
            }),
            action: Some(ActionTemplate {
                binary: RSYNC.to_string(),
                args: vec![
                    "-a".to_string(),
                    "-d".to_string(),
                    "--delete".to_string(),
                    "{{ directory }}".to_string(),
                    "{{ target }}{{ relative }}".to_string(),
                ],
                events: Some(vec![
                    EventKind::Attrib,
                    EventKind::Create,
                    EventKind::Delete,
                    EventKind::CloseWrite,
                    EventKind::MovedFrom,
                    EventKind::MovedTo,
                ]),
            }),
        }
    }
}

impl Config {
    /// Reject configurations the engine cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roots.is_empty() {
            return Err(ConfigError::Invalid("no roots configured".to_string()));
        }
        let mut seen = HashSet::new();
        for root in &self.roots {
            if root.name.0.trim().is_empty() {
                return Err(ConfigError::Invalid("root with empty name".to_string()));
            }
            if !seen.insert(&root.name) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate root name '{}'",
                    root.name
                )));
            }
            if root.source.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "root '{}' has an empty source",
                    root.name
                )));
            }
            for template in [&root.startup_action, &root.action].into_iter().flatten() {
                if template.binary.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "root '{}' has an action with an empty binary",
                        root.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn root(&self, name: &RootName) -> Option<&SyncRoot> {
        self.roots.iter().find(|root| &root.name == name)
    }
}

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.lsync/lsync.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// `<home>/.lsync/lsync.yaml` (convenience: uses `dirs::home_dir()`).
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_path_at(&home()?))
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load a config file from an explicit path.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load `<home>/.lsync/lsync.yaml`.
pub fn load_default_at(home: &Path) -> Result<Config, ConfigError> {
    load_at(&config_path_at(home))
}

/// `load_default_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_default_at(&home()?)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save a config to `path`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
/// `.tmp` is always in the same directory as the target (same filesystem).
pub fn save_at(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
            set_dir_permissions(dir)?;
        }
    }
    let mut tmp_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| CONFIG_FILE.into());
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Save to `<home>/.lsync/lsync.yaml`.
pub fn save_default_at(home: &Path, config: &Config) -> Result<(), ConfigError> {
    save_at(&config_path_at(home), config)
}

// ---------------------------------------------------------------------------
// 4. Add root (scaffold)
// ---------------------------------------------------------------------------

/// Append `root` to the config at `path`, creating the file if needed.
///
/// Fails with `ConfigError::Invalid` if a root with the same name exists.
pub fn add_root_at(path: &Path, root: SyncRoot) -> Result<Config, ConfigError> {
    let mut config = match load_at(path) {
        Ok(config) => config,
        Err(ConfigError::ConfigNotFound { .. }) => Config::default(),
        Err(err) => return Err(err),
    };
    if config.root(&root.name).is_some() {
        return Err(ConfigError::Invalid(format!(
            "root '{}' already exists in {}",
            root.name,
            path.display()
        )));
    }
    config.roots.push(root);
    config.validate()?;
    save_at(path, &config)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
