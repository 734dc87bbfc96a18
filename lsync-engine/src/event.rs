use std::ffi::OsString;

use lsync_core::EventKinds;

/// One decoded change notification for a watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent<D> {
    pub descriptor: D,
    pub kinds: EventKinds,
    /// Entry name inside the watched directory; absent for events on the
    /// directory itself.
    pub name: Option<OsString>,
    /// The entry named by `name` is a directory.
    pub is_dir: bool,
    /// The kernel dropped this watch (`IN_IGNORED`).
    pub watch_dropped: bool,
}

impl<D> ChangeEvent<D> {
    pub fn new(descriptor: D, kinds: EventKinds) -> Self {
        Self {
            descriptor,
            kinds,
            name: None,
            is_dir: false,
            watch_dropped: false,
        }
    }

    pub fn named(mut self, name: impl Into<OsString>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn dir(mut self) -> Self {
        self.is_dir = true;
        self
    }

    pub fn dropped(descriptor: D) -> Self {
        Self {
            watch_dropped: true,
            ..Self::new(descriptor, EventKinds::empty())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification<D> {
    Change(ChangeEvent<D>),
    /// The kernel queue overflowed and events were lost.
    Overflow,
}
