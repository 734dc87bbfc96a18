//! Error types for lsync-policy.

use thiserror::Error;

use lsync_core::RootName;

/// All errors that can arise while compiling or rendering action templates.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Tera template engine error (syntax at load, missing variable at render).
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// The engine asked about a root the policy was not built with.
    #[error("unknown root '{0}'")]
    UnknownRoot(RootName),

    /// A binary template rendered to an empty string.
    #[error("action binary for root '{root}' rendered empty")]
    EmptyBinary { root: RootName },
}
