//! [`Policy`] trait and the Tera-backed [`TemplatePolicy`].
//!
//! # Template names
//!
//! | Template                         | Source in config                |
//! |----------------------------------|---------------------------------|
//! | `<root>/startup/binary`          | `roots[].startup_action.binary` |
//! | `<root>/startup/arg/<n>`         | `roots[].startup_action.args[n]`|
//! | `<root>/action/binary`           | `roots[].action.binary`         |
//! | `<root>/action/arg/<n>`          | `roots[].action.args[n]`        |

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tera::Tera;

use lsync_core::{
    config::{ActionTemplate, Config, StartupGranularity},
    Action, EventKind, EventKinds, RootName,
};

use crate::context::ActionContext;
use crate::error::PolicyError;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// The root a directory belongs to, as the engine knows it.
#[derive(Debug, Clone, Copy)]
pub struct RootRef<'a> {
    pub name: &'a RootName,
    /// Resolved source directory (trailing separator included).
    pub source: &'a Path,
}

/// Decision logic mapping a directory (and an event) to a command.
///
/// Implementations must be pure: no filesystem or process side effects.
pub trait Policy: Send + Sync {
    /// Command for the initial sync of `directory`, if any.
    ///
    /// Called once for every directory the startup walk watches; returning
    /// `None` for non-root directories gives per-root granularity.
    fn startup_action(
        &self,
        root: RootRef<'_>,
        directory: &Path,
    ) -> Result<Option<Action>, PolicyError>;

    /// Command for one `kind` of change on `name` inside `directory`, if any.
    fn decide_action(
        &self,
        root: RootRef<'_>,
        directory: &Path,
        kind: EventKind,
        name: Option<&OsStr>,
    ) -> Result<Option<Action>, PolicyError>;
}

// ---------------------------------------------------------------------------
// TemplatePolicy
// ---------------------------------------------------------------------------

struct CompiledAction {
    binary: String,
    args: Vec<String>,
    events: EventKinds,
}

struct CompiledRoot {
    target: String,
    startup: StartupGranularity,
    startup_action: Option<CompiledAction>,
    action: Option<CompiledAction>,
}

/// Config-driven policy: every binary and argument is a Tera template.
///
/// Templates are compiled once in [`TemplatePolicy::new`]; a syntax error in
/// any of them fails construction.
pub struct TemplatePolicy {
    tera: Tera,
    roots: HashMap<RootName, CompiledRoot>,
}

impl TemplatePolicy {
    pub fn new(config: &Config) -> Result<Self, PolicyError> {
        let mut tera = Tera::default();
        let mut roots = HashMap::new();
        for root in &config.roots {
            let startup_action = root
                .startup_action
                .as_ref()
                .map(|t| compile(&mut tera, &root.name, "startup", t))
                .transpose()?;
            let action = root
                .action
                .as_ref()
                .map(|t| compile(&mut tera, &root.name, "action", t))
                .transpose()?;
            roots.insert(
                root.name.clone(),
                CompiledRoot {
                    target: root.target.clone(),
                    startup: root.startup,
                    startup_action,
                    action,
                },
            );
        }
        Ok(Self { tera, roots })
    }

    fn compiled(&self, name: &RootName) -> Result<&CompiledRoot, PolicyError> {
        self.roots
            .get(name)
            .ok_or_else(|| PolicyError::UnknownRoot(name.clone()))
    }

    fn render(
        &self,
        root: &RootName,
        action: &CompiledAction,
        ctx: &ActionContext,
    ) -> Result<Action, PolicyError> {
        let tera_ctx = ctx.to_tera_context()?;
        let binary = self.tera.render(&action.binary, &tera_ctx)?;
        if binary.trim().is_empty() {
            return Err(PolicyError::EmptyBinary { root: root.clone() });
        }
        let mut args = Vec::with_capacity(action.args.len());
        for name in &action.args {
            args.push(self.tera.render(name, &tera_ctx)?);
        }
        Ok(Action {
            binary: PathBuf::from(binary),
            args,
        })
    }
}

impl Policy for TemplatePolicy {
    fn startup_action(
        &self,
        root: RootRef<'_>,
        directory: &Path,
    ) -> Result<Option<Action>, PolicyError> {
        let compiled = self.compiled(root.name)?;
        let Some(action) = &compiled.startup_action else {
            return Ok(None);
        };
        if compiled.startup == StartupGranularity::PerRoot && !same_dir(directory, root.source) {
            return Ok(None);
        }
        let ctx = ActionContext::startup(&root.name.0, root.source, &compiled.target, directory);
        self.render(root.name, action, &ctx).map(Some)
    }

    fn decide_action(
        &self,
        root: RootRef<'_>,
        directory: &Path,
        kind: EventKind,
        name: Option<&OsStr>,
    ) -> Result<Option<Action>, PolicyError> {
        let compiled = self.compiled(root.name)?;
        let Some(action) = &compiled.action else {
            return Ok(None);
        };
        if !action.events.contains(EventKinds::from(kind)) {
            return Ok(None);
        }
        let ctx = ActionContext::event(
            &root.name.0,
            root.source,
            &compiled.target,
            directory,
            kind,
            name,
        );
        self.render(root.name, action, &ctx).map(Some)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn compile(
    tera: &mut Tera,
    root: &RootName,
    slot: &str,
    template: &ActionTemplate,
) -> Result<CompiledAction, PolicyError> {
    let binary = format!("{root}/{slot}/binary");
    tera.add_raw_template(&binary, &template.binary)?;

    let mut args = Vec::with_capacity(template.args.len());
    for (n, arg) in template.args.iter().enumerate() {
        let name = format!("{root}/{slot}/arg/{n}");
        tera.add_raw_template(&name, arg)?;
        args.push(name);
    }

    Ok(CompiledAction {
        binary,
        args,
        events: template.event_kinds(),
    })
}

/// Path equality that ignores a trailing separator on either side.
fn same_dir(a: &Path, b: &Path) -> bool {
    a.components().eq(b.components())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
