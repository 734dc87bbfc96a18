//! Linux inotify backend.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::pin::Pin;

use inotify::{EventMask, Inotify, WatchDescriptor, WatchMask, Watches};
use tokio_stream::{Stream, StreamExt};

use lsync_core::EventKinds;

use crate::error::EngineError;
use crate::event::{ChangeEvent, Notification};
use crate::watch::Notifier;

const BUFFER_SIZE: usize = 64 * 1024;

/// Decoded notifications from one inotify instance.
pub type EventSource<D> = Pin<Box<dyn Stream<Item = io::Result<Notification<D>>> + Send>>;

pub struct InotifyNotifier {
    watches: Watches,
}

impl Notifier for InotifyNotifier {
    type Descriptor = WatchDescriptor;

    fn add_watch(&mut self, path: &Path) -> io::Result<WatchDescriptor> {
        self.watches.add(path, watch_mask())
    }

    fn remove_watch(&mut self, descriptor: WatchDescriptor) -> io::Result<()> {
        self.watches.remove(descriptor)
    }
}

/// Create an inotify instance and split it into the registration handle and
/// the event stream.
pub fn open() -> Result<(InotifyNotifier, EventSource<WatchDescriptor>), EngineError> {
    let inotify = Inotify::init().map_err(EngineError::NotifierUnavailable)?;
    let stream = inotify
        .into_event_stream(vec![0u8; BUFFER_SIZE])
        .map_err(EngineError::NotifierUnavailable)?;
    let watches = stream.watches();
    let events = stream.map(|item| item.map(|event| decode(event.wd, event.mask, event.name)));
    Ok((InotifyNotifier { watches }, Box::pin(events)))
}

/// Kinds the engine asks for. Symlinks are not followed and only directories
/// are accepted.
fn watch_mask() -> WatchMask {
    WatchMask::ATTRIB
        | WatchMask::CLOSE_WRITE
        | WatchMask::CREATE
        | WatchMask::DELETE
        | WatchMask::DELETE_SELF
        | WatchMask::MOVED_FROM
        | WatchMask::MOVED_TO
        | WatchMask::DONT_FOLLOW
        | WatchMask::ONLYDIR
}

fn decode(
    wd: WatchDescriptor,
    mask: EventMask,
    name: Option<OsString>,
) -> Notification<WatchDescriptor> {
    if mask.contains(EventMask::Q_OVERFLOW) {
        return Notification::Overflow;
    }
    Notification::Change(ChangeEvent {
        descriptor: wd,
        kinds: kinds_of(mask),
        name,
        is_dir: mask.contains(EventMask::ISDIR),
        watch_dropped: mask.contains(EventMask::IGNORED),
    })
}

fn kinds_of(mask: EventMask) -> EventKinds {
    const TABLE: [(EventMask, EventKinds); 7] = [
        (EventMask::ATTRIB, EventKinds::ATTRIB),
        (EventMask::CREATE, EventKinds::CREATE),
        (EventMask::DELETE, EventKinds::DELETE),
        (EventMask::CLOSE_WRITE, EventKinds::CLOSE_WRITE),
        (EventMask::MOVED_FROM, EventKinds::MOVED_FROM),
        (EventMask::MOVED_TO, EventKinds::MOVED_TO),
        (EventMask::DELETE_SELF, EventKinds::DELETE_SELF),
    ];
    TABLE
        .iter()
        .filter(|(flag, _)| mask.contains(*flag))
        .fold(EventKinds::empty(), |acc, (_, kind)| acc | *kind)
}
