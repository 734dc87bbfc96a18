mod common;

use std::ffi::OsString;
use std::fs;
use std::time::{Duration, Instant};

use lsync_core::EventKind;
use lsync_engine::{open_inotify, Engine, Notification, ResetFlag, Spawner};
use tempfile::TempDir;
use tokio_stream::StreamExt;

use common::{dir, root, Call, Recording};

#[tokio::test]
async fn kernel_events_drive_the_watch_tree() {
    let tmp = TempDir::new().expect("tmp");
    let top = tmp.path().join("top");
    fs::create_dir(&top).expect("mkdir");

    let (notifier, mut events) = open_inotify().expect("inotify");
    let policy = Recording::new();
    let mut engine = Engine::new(notifier, policy.clone(), Spawner::default(), ResetFlag::new());
    engine.startup(&[root("top", &top)]).await.expect("startup");
    assert_eq!(engine.watches().len(), 1);

    fs::create_dir(top.join("fresh")).expect("mkdir fresh");

    let deadline = Instant::now() + Duration::from_secs(5);
    let fresh = dir(&top.join("fresh"));
    let mut wrote = false;
    let expected = Call {
        directory: fresh.clone(),
        kind: Some(EventKind::CloseWrite),
        name: Some(OsString::from("file.txt")),
    };
    while !policy.event_calls().contains(&expected) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let next = tokio::time::timeout(remaining, events.next())
            .await
            .expect("event before deadline")
            .expect("stream open")
            .expect("read event");
        if let Notification::Change(event) = next {
            engine.handle_event(event);
        }
        if !wrote && engine.watches().table().find_path(&fresh).is_some() {
            fs::write(fresh.join("file.txt"), b"hello").expect("write");
            wrote = true;
        }
    }

    assert_eq!(engine.watches().len(), 2);
}
