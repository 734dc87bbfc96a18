//! # lsync-policy
//!
//! Decides which external command runs for a startup pass or a change event.
//!
//! The engine only sees the [`Policy`] trait. [`TemplatePolicy`] is the
//! configuration-driven implementation: every binary and argument in the
//! config is a Tera template rendered against an [`ActionContext`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use lsync_core::{config, EventKind};
//! use lsync_policy::{Policy, RootRef, TemplatePolicy};
//!
//! fn show(cfg: &config::Config) {
//!     let policy = TemplatePolicy::new(cfg).expect("templates compile");
//!     let root = &cfg.roots[0];
//!     let source = Path::new("/srv/docs/");
//!     let root_ref = RootRef { name: &root.name, source };
//!     if let Ok(Some(action)) =
//!         policy.decide_action(root_ref, Path::new("/srv/docs/a/"), EventKind::CloseWrite, None)
//!     {
//!         println!("{action}");
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::ActionContext;
pub use engine::{Policy, RootRef, TemplatePolicy};
pub use error::PolicyError;
