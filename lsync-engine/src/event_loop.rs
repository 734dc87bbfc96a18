//! Steady state: read notifications, keep the watch tree in step with the
//! filesystem, and dispatch actions.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_stream::{Stream, StreamExt};

use lsync_core::{EventKind, EventKinds};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::event::{ChangeEvent, Notification};
use crate::paths::child_dir;
use crate::reset::{ResetFlag, ResetReason};
use crate::watch::{Notifier, RootId};

const REAP_INTERVAL: Duration = Duration::from_secs(1);

impl<N: Notifier> Engine<N> {
    /// Process `events` until the reset flag is raised.
    ///
    /// Queue overflow raises [`ResetReason::Restart`]. Any other stream
    /// failure, and the stream ending, is fatal.
    pub async fn run<S>(&mut self, mut events: S) -> Result<ResetReason, EngineError>
    where
        S: Stream<Item = io::Result<Notification<N::Descriptor>>> + Unpin,
    {
        let mut reap_tick = tokio::time::interval(REAP_INTERVAL);
        reap_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let reset: ResetFlag = self.reset.clone();

        loop {
            self.reap();
            if let Some(reason) = reset.reason() {
                return Ok(reason);
            }

            let next = tokio::select! {
                reason = reset.raised() => return Ok(reason),
                _ = reap_tick.tick() => continue,
                next = events.next() => next,
            };

            match next {
                None => return Err(EngineError::EventStreamClosed),
                Some(Err(err)) if err.kind() == io::ErrorKind::Interrupted => continue,
                Some(Err(err)) => return Err(EngineError::EventStream(err)),
                Some(Ok(Notification::Overflow)) => {
                    tracing::warn!("event queue overflowed, rebuilding watch tree");
                    reset.raise(ResetReason::Restart);
                }
                Some(Ok(Notification::Change(event))) => self.handle_event(event),
            }
        }
    }

    /// Apply one notification.
    ///
    /// A directory that appears inside a watched directory is watched, along
    /// with everything already below it, before this returns. Every directory
    /// added that way also gets a `create` dispatch of its own, without an
    /// entry name, after the event that revealed it.
    pub fn handle_event(&mut self, event: ChangeEvent<N::Descriptor>) {
        if event.watch_dropped {
            if let Some(entry) = self.watches.forget(&event.descriptor) {
                tracing::debug!(path = %entry.path.display(), "watch dropped by kernel");
            }
            return;
        }

        let Some((_, entry)) = self.watches.lookup(&event.descriptor) else {
            tracing::debug!(descriptor = ?event.descriptor, "event for unknown watch dropped");
            return;
        };
        let directory = entry.path.clone();
        let root = entry.root;

        let mut discovered = Vec::new();
        if let (true, Some(name)) = (event.is_dir, event.name.as_deref()) {
            let child = child_dir(&directory, name);
            if event
                .kinds
                .intersects(EventKinds::CREATE | EventKinds::MOVED_TO)
            {
                discovered = self.watch_new_tree(root, child);
            } else if event
                .kinds
                .intersects(EventKinds::MOVED_FROM | EventKinds::DELETE)
            {
                let removed = self.watches.unwatch_tree(&child);
                tracing::debug!(path = %child.display(), removed, "subtree left the watch tree");
            }
        }
        if event.kinds.contains(EventKinds::DELETE_SELF) {
            self.watches.forget(&event.descriptor);
            tracing::debug!(path = %directory.display(), "watched directory deleted");
        }

        for kind in event.kinds.kinds() {
            self.dispatch(root, &directory, kind, event.name.as_deref());
        }
        for dir in discovered {
            self.dispatch(root, &dir, EventKind::Create, None);
        }
    }

    /// Watch `top` and everything below it. Returns the directories that
    /// were newly watched, parents first.
    ///
    /// A directory already in the table was found by an earlier scan, along
    /// with its subtree, and is left alone.
    fn watch_new_tree(&mut self, root: RootId, top: PathBuf) -> Vec<PathBuf> {
        let mut watched = Vec::new();
        let mut skipped = Vec::new();
        let mut stack = vec![top];
        while let Some(dir) = stack.pop() {
            if self.reset.is_set() {
                break;
            }
            if self.watches.is_watched(&dir) {
                continue;
            }
            if !self.watch_directory(root, &dir, &mut skipped) {
                continue;
            }
            let children = self.subdirectories(&dir, &mut skipped);
            stack.extend(children.into_iter().rev());
            watched.push(dir);
        }
        watched
    }
}
