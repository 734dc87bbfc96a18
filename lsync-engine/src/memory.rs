//! In-process [`Notifier`] that hands out integer descriptors.
//!
//! It checks that the path is a directory, like the kernel does for
//! `IN_ONLYDIR`, but never produces events; callers feed the engine
//! [`Notification`](crate::event::Notification)s themselves.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::watch::Notifier;

#[derive(Debug, Default, Clone)]
pub struct MemoryNotifier {
    next: i32,
    live: HashMap<PathBuf, i32>,
    rejected: HashSet<PathBuf>,
    removed: Vec<i32>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make registration of `path` fail with `PermissionDenied`.
    pub fn reject(&mut self, path: impl Into<PathBuf>) {
        self.rejected.insert(path.into());
    }

    pub fn descriptor_of(&self, path: &Path) -> Option<i32> {
        self.live.get(path).copied()
    }

    /// Number of registered watches.
    pub fn live(&self) -> usize {
        self.live.len()
    }

    /// Descriptors removed so far, in order.
    pub fn removed(&self) -> &[i32] {
        &self.removed
    }
}

impl Notifier for MemoryNotifier {
    type Descriptor = i32;

    fn add_watch(&mut self, path: &Path) -> io::Result<i32> {
        if self.rejected.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "watch rejected",
            ));
        }
        if !fs::metadata(path)?.is_dir() {
            return Err(io::Error::new(io::ErrorKind::Other, "not a directory"));
        }
        if let Some(&wd) = self.live.get(path) {
            return Ok(wd);
        }
        self.next += 1;
        self.live.insert(path.to_path_buf(), self.next);
        Ok(self.next)
    }

    fn remove_watch(&mut self, descriptor: i32) -> io::Result<()> {
        let path = self
            .live
            .iter()
            .find(|(_, &wd)| wd == descriptor)
            .map(|(path, _)| path.clone());
        match path {
            Some(path) => {
                self.live.remove(&path);
                self.removed.push(descriptor);
                Ok(())
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unknown watch descriptor",
            )),
        }
    }
}
