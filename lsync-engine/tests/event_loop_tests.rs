mod common;

use std::ffi::OsString;
use std::io;
use std::time::Duration;

use lsync_core::{EventKind, EventKinds};
use lsync_engine::{
    ChangeEvent, Engine, EngineError, MemoryNotifier, Notification, ResetFlag, ResetReason,
};
use tempfile::TempDir;
use tokio_stream::StreamExt;

use common::{dir, memory_engine, mkdirs, root, watched_paths, Call, Recording};

type Item = io::Result<Notification<i32>>;

fn change(event: ChangeEvent<i32>) -> Item {
    Ok(Notification::Change(event))
}

async fn started(
    top: &std::path::Path,
    policy: std::sync::Arc<Recording>,
    reset: ResetFlag,
) -> Engine<MemoryNotifier> {
    let mut engine = memory_engine(policy, reset);
    engine.startup(&[root("top", top)]).await.expect("startup");
    engine
}

fn wd(engine: &Engine<MemoryNotifier>, path: &std::path::Path) -> i32 {
    engine
        .watches()
        .notifier()
        .descriptor_of(&dir(path))
        .expect("watched")
}

#[tokio::test]
async fn new_directory_is_watched_before_the_next_event() {
    let tmp = TempDir::new().expect("tmp");
    let top = tmp.path().join("top");
    mkdirs(&top, &[""]);
    let policy = Recording::new();
    let mut engine = started(&top, policy.clone(), ResetFlag::new()).await;
    let top_wd = wd(&engine, &top);

    // The tree appears on disk; the notification for it arrives afterwards.
    mkdirs(&top, &["x/y"]);
    // Descriptors are handed out in registration order: x, then y.
    let x_wd = top_wd + 1;
    let events = tokio_stream::iter(vec![
        change(ChangeEvent::new(top_wd, EventKinds::CREATE).named("x").dir()),
        change(ChangeEvent::new(x_wd, EventKinds::CLOSE_WRITE).named("f.txt")),
    ]);

    let err = engine.run(events).await.unwrap_err();
    assert!(matches!(err, EngineError::EventStreamClosed), "got: {err}");

    assert_eq!(
        watched_paths(&engine),
        vec![dir(&top), dir(&top.join("x")), dir(&top.join("x/y"))]
    );
    let calls = policy.event_calls();
    assert!(calls.contains(&Call {
        directory: dir(&top.join("x")),
        kind: Some(EventKind::CloseWrite),
        name: Some(OsString::from("f.txt")),
    }));
}

#[tokio::test]
async fn new_tree_directories_get_their_own_create() {
    let tmp = TempDir::new().expect("tmp");
    let top = tmp.path().join("top");
    mkdirs(&top, &[""]);
    let policy = Recording::new();
    let mut engine = started(&top, policy.clone(), ResetFlag::new()).await;
    let top_wd = wd(&engine, &top);

    mkdirs(&top, &["moved/inner"]);
    engine.handle_event(ChangeEvent::new(top_wd, EventKinds::MOVED_TO).named("moved").dir());

    assert_eq!(
        policy.event_calls(),
        vec![
            Call {
                directory: dir(&top),
                kind: Some(EventKind::MovedTo),
                name: Some(OsString::from("moved")),
            },
            Call {
                directory: dir(&top.join("moved")),
                kind: Some(EventKind::Create),
                name: None,
            },
            Call {
                directory: dir(&top.join("moved/inner")),
                kind: Some(EventKind::Create),
                name: None,
            },
        ]
    );
}

#[tokio::test]
async fn deleted_directory_is_no_longer_attributable() {
    let tmp = TempDir::new().expect("tmp");
    let top = tmp.path().join("top");
    mkdirs(&top, &["d"]);
    let policy = Recording::new();
    let mut engine = started(&top, policy.clone(), ResetFlag::new()).await;
    let d_wd = wd(&engine, &top.join("d"));

    engine.handle_event(ChangeEvent::new(d_wd, EventKinds::DELETE_SELF));
    engine.handle_event(ChangeEvent::new(d_wd, EventKinds::CLOSE_WRITE).named("late"));
    engine.handle_event(ChangeEvent::dropped(d_wd));

    assert_eq!(watched_paths(&engine), vec![dir(&top)]);
    assert_eq!(
        policy.event_calls(),
        vec![Call {
            directory: dir(&top.join("d")),
            kind: Some(EventKind::DeleteSelf),
            name: None,
        }]
    );
}

#[tokio::test]
async fn moved_away_directory_takes_its_subtree_along() {
    let tmp = TempDir::new().expect("tmp");
    let top = tmp.path().join("top");
    mkdirs(&top, &["a/b", "c"]);
    let policy = Recording::new();
    let mut engine = started(&top, policy.clone(), ResetFlag::new()).await;
    let top_wd = wd(&engine, &top);
    let a_wd = wd(&engine, &top.join("a"));
    let b_wd = wd(&engine, &top.join("a/b"));

    engine.handle_event(ChangeEvent::new(top_wd, EventKinds::MOVED_FROM).named("a").dir());

    assert_eq!(watched_paths(&engine), vec![dir(&top), dir(&top.join("c"))]);
    let mut removed = engine.watches().notifier().removed().to_vec();
    removed.sort();
    assert_eq!(removed, vec![a_wd, b_wd]);
}

#[tokio::test]
async fn kernel_dropped_watch_is_forgotten() {
    let tmp = TempDir::new().expect("tmp");
    let top = tmp.path().join("top");
    mkdirs(&top, &["d"]);
    let policy = Recording::new();
    let mut engine = started(&top, policy.clone(), ResetFlag::new()).await;
    let d_wd = wd(&engine, &top.join("d"));

    engine.handle_event(ChangeEvent::dropped(d_wd));

    assert_eq!(engine.watches().len(), 1);
    assert!(policy.event_calls().is_empty());
}

#[tokio::test]
async fn unknown_descriptor_is_dropped() {
    let tmp = TempDir::new().expect("tmp");
    let top = tmp.path().join("top");
    mkdirs(&top, &[""]);
    let policy = Recording::new();
    let mut engine = started(&top, policy.clone(), ResetFlag::new()).await;

    engine.handle_event(ChangeEvent::new(999, EventKinds::CREATE).named("x"));
    assert!(policy.event_calls().is_empty());
}

#[tokio::test]
async fn every_kind_in_an_event_is_dispatched_in_order() {
    let tmp = TempDir::new().expect("tmp");
    let top = tmp.path().join("top");
    mkdirs(&top, &[""]);
    let policy = Recording::with_events("exit 0");
    let mut engine = started(&top, policy.clone(), ResetFlag::new()).await;
    let top_wd = wd(&engine, &top);

    engine.handle_event(
        ChangeEvent::new(top_wd, EventKinds::ATTRIB | EventKinds::CLOSE_WRITE).named("f"),
    );

    let kinds: Vec<_> = policy.event_calls().into_iter().map(|c| c.kind).collect();
    assert_eq!(kinds, vec![Some(EventKind::Attrib), Some(EventKind::CloseWrite)]);
    assert_eq!(engine.pending().len(), 2);
}

#[tokio::test]
async fn overflow_requests_a_restart() {
    let tmp = TempDir::new().expect("tmp");
    let top = tmp.path().join("top");
    mkdirs(&top, &[""]);
    let reset = ResetFlag::new();
    let mut engine = started(&top, Recording::new(), reset.clone()).await;

    let events = tokio_stream::iter(vec![Ok(Notification::Overflow)])
        .chain(tokio_stream::pending::<Item>());
    let reason = tokio::time::timeout(Duration::from_secs(5), engine.run(events))
        .await
        .expect("run returned")
        .expect("no error");
    assert_eq!(reason, ResetReason::Restart);
}

#[tokio::test]
async fn raised_flag_stops_an_idle_loop() {
    let tmp = TempDir::new().expect("tmp");
    let top = tmp.path().join("top");
    mkdirs(&top, &[""]);
    let reset = ResetFlag::new();
    let mut engine = started(&top, Recording::new(), reset.clone()).await;

    let raiser = {
        let reset = reset.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            reset.raise(ResetReason::Shutdown);
        })
    };
    let reason = tokio::time::timeout(
        Duration::from_secs(5),
        engine.run(tokio_stream::pending::<Item>()),
    )
    .await
    .expect("run returned")
    .expect("no error");
    raiser.await.expect("join");
    assert_eq!(reason, ResetReason::Shutdown);
}

#[tokio::test]
async fn interrupted_read_is_retried_and_other_errors_are_fatal() {
    let tmp = TempDir::new().expect("tmp");
    let top = tmp.path().join("top");
    mkdirs(&top, &[""]);
    let policy = Recording::new();
    let mut engine = started(&top, policy.clone(), ResetFlag::new()).await;
    let top_wd = wd(&engine, &top);

    let events = tokio_stream::iter(vec![
        Err(io::Error::new(io::ErrorKind::Interrupted, "EINTR")),
        change(ChangeEvent::new(top_wd, EventKinds::CLOSE_WRITE).named("f")),
        Err(io::Error::new(io::ErrorKind::Other, "EIO")),
    ]);
    let err = engine.run(events).await.unwrap_err();

    assert!(matches!(err, EngineError::EventStream(_)), "got: {err}");
    assert_eq!(policy.event_calls().len(), 1);
}

#[tokio::test]
async fn deleted_subdirectory_takes_its_subtree_along() {
    let tmp = TempDir::new().expect("tmp");
    let top = tmp.path().join("top");
    mkdirs(&top, &["a/b", "c"]);
    let policy = Recording::new();
    let mut engine = started(&top, policy.clone(), ResetFlag::new()).await;
    let top_wd = wd(&engine, &top);
    let a_wd = wd(&engine, &top.join("a"));
    let b_wd = wd(&engine, &top.join("a/b"));

    engine.handle_event(ChangeEvent::new(top_wd, EventKinds::DELETE).named("a").dir());

    assert_eq!(watched_paths(&engine), vec![dir(&top), dir(&top.join("c"))]);
    let mut removed = engine.watches().notifier().removed().to_vec();
    removed.sort();
    assert_eq!(removed, vec![a_wd, b_wd]);
    assert_eq!(
        policy.event_calls(),
        vec![Call {
            directory: dir(&top),
            kind: Some(EventKind::Delete),
            name: Some(OsString::from("a")),
        }]
    );
}

#[tokio::test]
async fn rename_inside_the_tree_leaves_one_entry_at_the_new_path() {
    let tmp = TempDir::new().expect("tmp");
    let top = tmp.path().join("top");
    mkdirs(&top, &["old/sub"]);
    let policy = Recording::new();
    let mut engine = started(&top, policy.clone(), ResetFlag::new()).await;
    let top_wd = wd(&engine, &top);

    std::fs::rename(top.join("old"), top.join("new")).expect("rename");
    engine.handle_event(ChangeEvent::new(top_wd, EventKinds::MOVED_FROM).named("old").dir());
    engine.handle_event(ChangeEvent::new(top_wd, EventKinds::MOVED_TO).named("new").dir());

    assert_eq!(
        watched_paths(&engine),
        vec![dir(&top), dir(&top.join("new")), dir(&top.join("new/sub"))]
    );
    assert_eq!(engine.watches().notifier().live(), 3);
    assert_eq!(engine.watches().notifier().removed().len(), 2);
}

#[tokio::test]
async fn directory_found_by_an_earlier_scan_is_not_announced_twice() {
    let tmp = TempDir::new().expect("tmp");
    let top = tmp.path().join("top");
    mkdirs(&top, &[""]);
    let policy = Recording::new();
    let mut engine = started(&top, policy.clone(), ResetFlag::new()).await;
    let top_wd = wd(&engine, &top);

    // `mkdir -p x/y`: the scan triggered by x already finds y, then the
    // kernel reports y's creation as well.
    mkdirs(&top, &["x/y"]);
    engine.handle_event(ChangeEvent::new(top_wd, EventKinds::CREATE).named("x").dir());
    let x_wd = wd(&engine, &top.join("x"));
    engine.handle_event(ChangeEvent::new(x_wd, EventKinds::CREATE).named("y").dir());

    assert_eq!(engine.watches().len(), 3);
    let announced: Vec<_> = policy
        .event_calls()
        .into_iter()
        .filter(|c| c.kind == Some(EventKind::Create) && c.name.is_none())
        .map(|c| c.directory)
        .collect();
    assert_eq!(announced, vec![dir(&top.join("x")), dir(&top.join("x/y"))]);
}
