//! Domain types shared by the policy layer and the watch engine.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::fmt;
use std::path::PathBuf;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a sync root in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RootName(pub String);

impl fmt::Display for RootName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RootName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RootName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// A single kind of change reported for a watched directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Attrib,
    Create,
    Delete,
    CloseWrite,
    MovedFrom,
    MovedTo,
    DeleteSelf,
}

impl EventKind {
    /// All kinds in the order the engine hands them to the policy.
    pub fn all() -> &'static [EventKind] {
        &[
            EventKind::Attrib,
            EventKind::Create,
            EventKind::Delete,
            EventKind::CloseWrite,
            EventKind::MovedFrom,
            EventKind::MovedTo,
            EventKind::DeleteSelf,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Attrib => "attrib",
            EventKind::Create => "create",
            EventKind::Delete => "delete",
            EventKind::CloseWrite => "close_write",
            EventKind::MovedFrom => "moved_from",
            EventKind::MovedTo => "moved_to",
            EventKind::DeleteSelf => "delete_self",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Set of [`EventKind`]s carried by one change notification.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventKinds: u32 {
        const ATTRIB = 1 << 0;
        const CREATE = 1 << 1;
        const DELETE = 1 << 2;
        const CLOSE_WRITE = 1 << 3;
        const MOVED_FROM = 1 << 4;
        const MOVED_TO = 1 << 5;
        const DELETE_SELF = 1 << 6;
    }
}

impl From<EventKind> for EventKinds {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Attrib => EventKinds::ATTRIB,
            EventKind::Create => EventKinds::CREATE,
            EventKind::Delete => EventKinds::DELETE,
            EventKind::CloseWrite => EventKinds::CLOSE_WRITE,
            EventKind::MovedFrom => EventKinds::MOVED_FROM,
            EventKind::MovedTo => EventKinds::MOVED_TO,
            EventKind::DeleteSelf => EventKinds::DELETE_SELF,
        }
    }
}

impl FromIterator<EventKind> for EventKinds {
    fn from_iter<I: IntoIterator<Item = EventKind>>(iter: I) -> Self {
        iter.into_iter()
            .fold(EventKinds::empty(), |acc, kind| acc | EventKinds::from(kind))
    }
}

impl EventKinds {
    /// Iterate the contained kinds in [`EventKind::all`] order.
    pub fn kinds(self) -> impl Iterator<Item = EventKind> {
        EventKind::all()
            .iter()
            .copied()
            .filter(move |kind| self.contains(EventKinds::from(*kind)))
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// A concrete external command: binary path plus literal arguments.
///
/// Arguments are never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub binary: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Action {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.binary.display())?;
        for arg in &self.args {
            write!(f, " {arg:?}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
