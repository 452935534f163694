use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind};
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::broadcast::error::TryRecvError;

use variants_codec::parse;
use variants_core::{Config, UnitName};
use variants_daemon::protocol::ChangeReason;
use variants_daemon::{Command, Debouncer, DispatchKey, Orchestrator, Reconcile, ServerMessage};

const WINDOW: Duration = Duration::from_millis(20);

fn created(path: &Path) -> Event {
    Event::new(EventKind::Create(CreateKind::File)).add_path(path.to_path_buf())
}

fn modified(path: &Path) -> Event {
    Event::new(EventKind::Modify(ModifyKind::Any)).add_path(path.to_path_buf())
}

fn removed(path: &Path) -> Event {
    Event::new(EventKind::Remove(RemoveKind::File)).add_path(path.to_path_buf())
}

async fn started(files: &[&str]) -> (TempDir, PathBuf, Orchestrator) {
    let tmp = TempDir::new().unwrap();
    let root = fs::canonicalize(tmp.path()).unwrap();
    for name in files {
        fs::write(root.join(name), "").unwrap();
    }
    let orchestrator = Orchestrator::new(&root, Config::default()).unwrap();
    orchestrator.discover().await.unwrap();
    (tmp, root, orchestrator)
}

/// Let spawned tasks run until they park on a lock.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

async fn next_change(events: &mut tokio::sync::broadcast::Receiver<ServerMessage>) -> (String, ChangeReason) {
    loop {
        if let ServerMessage::UnitChanged(changed) = events.recv().await.unwrap() {
            return (changed.unit, changed.reason);
        }
    }
}

#[tokio::test]
async fn new_manifest_registers_unit() {
    let (_tmp, root, orchestrator) = started(&[]).await;
    let (mut debouncer, _fired) = Debouncer::<DispatchKey>::new(WINDOW);
    let mut events = orchestrator.subscribe();

    fs::write(root.join("Card.v1.tsx"), "").unwrap();
    fs::write(root.join("Card.manifest.ts"), "").unwrap();
    orchestrator
        .handle_event(created(&root.join("Card.manifest.ts")), &mut debouncer)
        .await;

    assert_eq!(next_change(&mut events).await, ("Card".to_string(), ChangeReason::Created));
    let text = fs::read_to_string(root.join("Card.manifest.ts")).unwrap();
    assert!(parse(&text).contains_key("v1"), "{text}");
    assert_eq!(debouncer.pending(), 0);
}

#[tokio::test]
async fn removed_manifest_unregisters_unit() {
    let (_tmp, root, orchestrator) = started(&["Widget.manifest.ts", "Widget.v1.tsx"]).await;
    let (mut debouncer, _fired) = Debouncer::<DispatchKey>::new(WINDOW);
    let mut events = orchestrator.subscribe();

    fs::remove_file(root.join("Widget.manifest.ts")).unwrap();
    orchestrator
        .handle_event(removed(&root.join("Widget.manifest.ts")), &mut debouncer)
        .await;

    assert_eq!(next_change(&mut events).await, ("Widget".to_string(), ChangeReason::Removed));
    assert!(orchestrator.registry().is_empty().await);
}

#[tokio::test]
async fn version_file_burst_reconciles_once_and_transfers_label() {
    let (_tmp, root, orchestrator) = started(&["Widget.manifest.ts", "Widget.v1.tsx"]).await;
    orchestrator
        .execute(Command::RenameLabel {
            unit: "Widget".into(),
            version: "v1".into(),
            new_label: "Draft".into(),
        })
        .await
        .unwrap();

    let (mut debouncer, mut fired) = Debouncer::<DispatchKey>::new(WINDOW);
    fs::rename(root.join("Widget.v1.tsx"), root.join("Widget.v4.tsx")).unwrap();
    orchestrator
        .handle_event(removed(&root.join("Widget.v1.tsx")), &mut debouncer)
        .await;
    orchestrator
        .handle_event(created(&root.join("Widget.v4.tsx")), &mut debouncer)
        .await;
    assert_eq!(debouncer.pending(), 1);

    let key = fired.recv().await.unwrap();
    assert_eq!(key, (UnitName::from("Widget"), Reconcile::Files));
    assert!(fired.try_recv().is_err());

    orchestrator.reconcile(key).await.unwrap();
    let meta = parse(&fs::read_to_string(root.join("Widget.manifest.ts")).unwrap());
    assert_eq!(meta.len(), 1);
    assert_eq!(meta["v4"].label.as_deref(), Some("Draft"));
}

#[tokio::test]
async fn manifest_edit_schedules_manifest_reconcile() {
    let (_tmp, root, orchestrator) = started(&["Widget.manifest.ts", "Widget.v1.tsx"]).await;
    let (mut debouncer, mut fired) = Debouncer::<DispatchKey>::new(WINDOW);

    let manifest = root.join("Widget.manifest.ts");
    let text = fs::read_to_string(&manifest).unwrap().replace("\"v1\":", "\"v7\":");
    fs::write(&manifest, text).unwrap();
    orchestrator.handle_event(modified(&manifest), &mut debouncer).await;

    let key = fired.recv().await.unwrap();
    assert_eq!(key.1, Reconcile::Manifest);
    orchestrator.reconcile(key).await.unwrap();

    assert!(root.join("Widget.v7.tsx").is_file());
    assert!(!root.join("Widget.v1.tsx").exists());
    let snapshot = orchestrator.snapshot().await.unwrap();
    assert_eq!(serde_json::to_value(&snapshot).unwrap()["units"][0]["versions"], json!(["v7"]));
}

#[tokio::test]
async fn ignored_directories_are_skipped() {
    let (_tmp, root, orchestrator) = started(&[]).await;
    let (mut debouncer, _fired) = Debouncer::<DispatchKey>::new(WINDOW);
    let hidden = root.join("node_modules");
    fs::create_dir_all(&hidden).unwrap();
    fs::write(hidden.join("Lib.manifest.ts"), "").unwrap();

    orchestrator
        .handle_event(created(&hidden.join("Lib.manifest.ts")), &mut debouncer)
        .await;
    assert!(orchestrator.registry().is_empty().await);
}

#[tokio::test]
async fn reconcile_queued_behind_promotion_does_not_revive_unit() {
    let (_tmp, root, orchestrator) = started(&["Widget.manifest.ts", "Widget.v1.tsx", "Widget.v2.tsx"]).await;
    let orchestrator = Arc::new(orchestrator);
    let widget = UnitName::from("Widget");
    let unit = orchestrator.registry().get(&widget).await.unwrap();
    let guard = unit.lock().await;

    let promote = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move {
            orchestrator
                .execute(Command::PromoteVersion {
                    unit: "Widget".into(),
                    version: "v2".into(),
                })
                .await
        }
    });
    settle().await;
    let reconcile = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let key = (widget.clone(), Reconcile::Files);
        async move { orchestrator.reconcile(key).await }
    });
    settle().await;
    drop(guard);

    promote.await.unwrap().unwrap();
    reconcile.await.unwrap().unwrap();
    assert!(root.join("Widget.tsx").is_file());
    assert!(!root.join("Widget.manifest.ts").exists());
    assert!(orchestrator.registry().is_empty().await);
}

#[tokio::test]
async fn reconcile_queued_behind_manifest_removal_does_not_revive_unit() {
    let (_tmp, root, orchestrator) = started(&["Widget.manifest.ts", "Widget.v1.tsx"]).await;
    let orchestrator = Arc::new(orchestrator);
    let widget = UnitName::from("Widget");
    let unit = orchestrator.registry().get(&widget).await.unwrap();
    let guard = unit.lock().await;

    let manifest = root.join("Widget.manifest.ts");
    fs::remove_file(&manifest).unwrap();
    let removal = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move {
            let (mut debouncer, _fired) = Debouncer::<DispatchKey>::new(WINDOW);
            orchestrator.handle_event(removed(&manifest), &mut debouncer).await;
        }
    });
    settle().await;
    let reconcile = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let key = (widget.clone(), Reconcile::Manifest);
        async move { orchestrator.reconcile(key).await }
    });
    settle().await;
    drop(guard);

    removal.await.unwrap();
    reconcile.await.unwrap().unwrap();
    assert!(!root.join("Widget.manifest.ts").exists());
    assert!(orchestrator.registry().is_empty().await);
    assert!(unit.lock().await.is_retired());
}

#[tokio::test]
async fn manifest_event_after_key_rename_is_suppressed() {
    let (_tmp, root, orchestrator) = started(&["Widget.manifest.ts", "Widget.v1.tsx"]).await;
    let mut events = orchestrator.subscribe();
    let key = (UnitName::from("Widget"), Reconcile::Manifest);

    let manifest = root.join("Widget.manifest.ts");
    let text = fs::read_to_string(&manifest).unwrap().replace("\"v1\":", "\"v7\":");
    fs::write(&manifest, text).unwrap();
    orchestrator.reconcile(key.clone()).await.unwrap();
    assert_eq!(next_change(&mut events).await, ("Widget".to_string(), ChangeReason::Updated));
    assert!(root.join("Widget.v7.tsx").is_file());

    let echoed = fs::read_to_string(&manifest).unwrap().replace("\"v7\":", "\"v8\":");
    fs::write(&manifest, echoed).unwrap();
    orchestrator.reconcile(key).await.unwrap();

    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    assert!(root.join("Widget.v7.tsx").is_file());
    assert!(!root.join("Widget.v8.tsx").exists());
}
