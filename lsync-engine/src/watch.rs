//! Watch bookkeeping.
//!
//! [`WatchTable`] is a generational arena mapping kernel watch descriptors to
//! the directory and root they belong to. [`WatchManager`] pairs the table
//! with a [`Notifier`] so that kernel registration and table membership move
//! together.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Kernel-facing half of a change-notification backend.
pub trait Notifier {
    type Descriptor: Clone + Eq + Hash + fmt::Debug;

    /// Register `path`. Registering a path that is already watched returns
    /// the existing descriptor.
    fn add_watch(&mut self, path: &Path) -> io::Result<Self::Descriptor>;

    fn remove_watch(&mut self, descriptor: Self::Descriptor) -> io::Result<()>;
}

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

/// Index of a resolved root inside one engine generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootId(pub usize);

/// Handle to a table entry. A handle to a removed entry never resolves again,
/// even after its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEntry<D> {
    pub descriptor: D,
    /// Watched directory, trailing separator included.
    pub path: PathBuf,
    pub root: RootId,
}

// ---------------------------------------------------------------------------
// WatchTable
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Slot<D> {
    generation: u32,
    entry: Option<WatchEntry<D>>,
}

#[derive(Debug)]
pub struct WatchTable<D> {
    slots: Vec<Slot<D>>,
    free: Vec<u32>,
    by_descriptor: HashMap<D, WatchId>,
    by_path: HashMap<PathBuf, WatchId>,
}

impl<D> Default for WatchTable<D> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            by_descriptor: HashMap::new(),
            by_path: HashMap::new(),
        }
    }
}

impl<D: Clone + Eq + Hash> WatchTable<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `descriptor` for `path`. A descriptor already present keeps its
    /// id and gets its path updated.
    pub fn insert(&mut self, descriptor: D, path: PathBuf, root: RootId) -> WatchId {
        if let Some(&id) = self.by_descriptor.get(&descriptor) {
            let old_path = match self.entry_mut(id) {
                Some(entry) => std::mem::replace(&mut entry.path, path.clone()),
                None => path.clone(),
            };
            if self.by_path.get(&old_path) == Some(&id) {
                self.by_path.remove(&old_path);
            }
            self.by_path.insert(path, id);
            return id;
        }

        let entry = WatchEntry {
            descriptor: descriptor.clone(),
            path: path.clone(),
            root,
        };
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(entry);
                WatchId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                WatchId {
                    index,
                    generation: 0,
                }
            }
        };
        self.by_descriptor.insert(descriptor, id);
        self.by_path.insert(path, id);
        id
    }

    pub fn get(&self, id: WatchId) -> Option<&WatchEntry<D>> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, id: WatchId) -> Option<&mut WatchEntry<D>> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    pub fn lookup(&self, descriptor: &D) -> Option<(WatchId, &WatchEntry<D>)> {
        let id = *self.by_descriptor.get(descriptor)?;
        self.get(id).map(|entry| (id, entry))
    }

    pub fn find_path(&self, path: &Path) -> Option<WatchId> {
        self.by_path.get(path).copied()
    }

    pub fn remove(&mut self, id: WatchId) -> Option<WatchEntry<D>> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);

        if self.by_descriptor.get(&entry.descriptor) == Some(&id) {
            self.by_descriptor.remove(&entry.descriptor);
        }
        if self.by_path.get(&entry.path) == Some(&id) {
            self.by_path.remove(&entry.path);
        }
        Some(entry)
    }

    pub fn remove_descriptor(&mut self, descriptor: &D) -> Option<WatchEntry<D>> {
        let id = *self.by_descriptor.get(descriptor)?;
        self.remove(id)
    }

    /// Ids of `path` and every entry below it.
    pub fn ids_under(&self, path: &Path) -> Vec<WatchId> {
        self.iter()
            .filter(|(_, entry)| entry.path.starts_with(path))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (WatchId, &WatchEntry<D>)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.entry.as_ref().map(|entry| {
                (
                    WatchId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    entry,
                )
            })
        })
    }

    pub fn len(&self) -> usize {
        self.by_descriptor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_descriptor.is_empty()
    }
}

// ---------------------------------------------------------------------------
// WatchManager
// ---------------------------------------------------------------------------

pub struct WatchManager<N: Notifier> {
    notifier: N,
    table: WatchTable<N::Descriptor>,
}

impl<N: Notifier> WatchManager<N> {
    pub fn new(notifier: N) -> Self {
        Self {
            notifier,
            table: WatchTable::new(),
        }
    }

    pub fn add_watch(&mut self, path: &Path, root: RootId) -> Result<WatchId, EngineError> {
        let descriptor =
            self.notifier
                .add_watch(path)
                .map_err(|source| EngineError::WatchRegistration {
                    path: path.to_path_buf(),
                    source,
                })?;
        let id = self.table.insert(descriptor, path.to_path_buf(), root);
        tracing::trace!(path = %path.display(), "watch added");
        Ok(id)
    }

    /// Drop the entry and deregister it from the kernel in the same step.
    ///
    /// The entry is gone even when deregistration fails; the failure is
    /// returned so the caller can report it.
    pub fn unwatch(&mut self, id: WatchId) -> Result<Option<PathBuf>, EngineError> {
        let Some(entry) = self.table.remove(id) else {
            return Ok(None);
        };
        self.notifier
            .remove_watch(entry.descriptor)
            .map_err(|source| EngineError::WatchRemoval {
                path: entry.path.clone(),
                source,
            })?;
        Ok(Some(entry.path))
    }

    /// Remove the entry for a descriptor the kernel already dropped.
    pub fn forget(&mut self, descriptor: &N::Descriptor) -> Option<WatchEntry<N::Descriptor>> {
        self.table.remove_descriptor(descriptor)
    }

    /// Unwatch `path` and everything below it. Returns how many entries went.
    pub fn unwatch_tree(&mut self, path: &Path) -> usize {
        let ids = self.table.ids_under(path);
        let count = ids.len();
        for id in ids {
            if let Err(err) = self.unwatch(id) {
                // Usually the kernel dropped the watch before we got here.
                tracing::debug!(error = %err, "watch already gone");
            }
        }
        count
    }

    /// Unwatch everything.
    pub fn clear(&mut self) {
        let ids: Vec<WatchId> = self.table.iter().map(|(id, _)| id).collect();
        for id in ids {
            if let Err(err) = self.unwatch(id) {
                tracing::debug!(error = %err, "watch already gone");
            }
        }
    }

    pub fn lookup(&self, descriptor: &N::Descriptor) -> Option<(WatchId, &WatchEntry<N::Descriptor>)> {
        self.table.lookup(descriptor)
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        self.table.find_path(path).is_some()
    }

    pub fn table(&self) -> &WatchTable<N::Descriptor> {
        &self.table
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
