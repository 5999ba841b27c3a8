use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};
use worklog_store::{JsonStore, Store};
use worklog_tracker::{
    ActivityEntry, ChangeKind, SessionHistory, SessionStatus, SessionTracker, TrackerConfig,
    TrackerError, TrackerEvent,
};

const WAIT: Duration = Duration::from_secs(5);

struct Fixture {
    _data: TempDir,
    watched: TempDir,
    store: Arc<JsonStore>,
    tracker: SessionTracker,
}

fn fast_config() -> TrackerConfig {
    TrackerConfig::default()
        .with_stability_threshold(Duration::from_millis(200))
        .with_poll_interval(Duration::from_millis(20))
}

fn fixture_with(config: TrackerConfig) -> Fixture {
    let data = TempDir::new().unwrap();
    let watched = TempDir::new().unwrap();
    let store = Arc::new(JsonStore::open(data.path()).unwrap());
    let tracker = SessionTracker::new(SessionHistory::new(store.clone()), config);
    Fixture {
        _data: data,
        watched,
        store,
        tracker,
    }
}

fn fixture() -> Fixture {
    fixture_with(fast_config())
}

async fn next_activity(rx: &mut broadcast::Receiver<TrackerEvent>) -> ActivityEntry {
    loop {
        let event = timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for activity")
            .expect("event channel closed");
        if let TrackerEvent::Activity(entry) = event {
            return entry;
        }
    }
}

async fn wait_for_logs(tracker: &SessionTracker, count: usize) -> usize {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        let len = tracker.current_session().map(|s| s.logs.len()).unwrap_or(0);
        if len >= count || tokio::time::Instant::now() >= deadline {
            return len;
        }
        sleep(Duration::from_millis(20)).await;
    }
}

fn assert_under_root(root: &Path, entry: &ActivityEntry) {
    assert!(!entry.file_path.starts_with('/'));
    assert!(
        entry
            .file_path
            .split('/')
            .all(|part| !part.starts_with('.') && !part.is_empty())
    );
    assert!(root.join(&entry.file_path).starts_with(root));
}

#[tokio::test]
async fn test_new_file_is_recorded_and_persisted() {
    let mut fx = fixture();
    let mut rx = fx.tracker.subscribe();

    let started = fx.tracker.start_session("proj-1", fx.watched.path()).unwrap();
    assert_eq!(started.status, SessionStatus::Active);
    assert_eq!(started.project_id, "proj-1");
    assert!(started.logs.is_empty());

    fs::write(fx.watched.path().join("a.txt"), "hello").unwrap();

    let entry = next_activity(&mut rx).await;
    assert_eq!(entry.file_path, "a.txt");
    assert_eq!(entry.kind, ChangeKind::Added);
    assert!(fx.watched.path().join(&entry.file_path).exists());

    let finished = fx.tracker.stop_session().await.unwrap().unwrap();
    assert_eq!(finished.id, started.id);
    assert_eq!(finished.status, SessionStatus::Completed);
    assert_eq!(finished.logs.len(), 1);
    assert!(finished.duration > 0.0);

    let end = finished.end_time.unwrap();
    assert!(end >= finished.start_time);
    let expected = (end - finished.start_time).num_milliseconds() as f64 / 1000.0;
    assert!((finished.duration - expected).abs() < 1e-9);

    assert!(fx.tracker.current_session().is_none());
    let stored = fx.tracker.sessions_for_project("proj-1").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0], finished);
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let mut fx = fixture();
    let first = fx.tracker.start_session("proj-1", fx.watched.path()).unwrap();

    let other = TempDir::new().unwrap();
    let err = fx.tracker.start_session("proj-2", other.path()).unwrap_err();
    assert!(matches!(
        err,
        TrackerError::AlreadyActive { ref session_id } if *session_id == first.id
    ));

    let current = fx.tracker.current_session().unwrap();
    assert_eq!(current.id, first.id);
    assert_eq!(current.project_id, "proj-1");
    assert_eq!(current.start_time, first.start_time);
    assert!(current.is_active());

    fx.tracker.stop_session().await.unwrap();
}

#[tokio::test]
async fn test_stop_twice() {
    let mut fx = fixture();
    fx.tracker.start_session("proj-1", fx.watched.path()).unwrap();
    assert!(fx.tracker.stop_session().await.unwrap().is_some());
    assert!(fx.tracker.stop_session().await.unwrap().is_none());
    assert_eq!(fx.tracker.sessions_for_project("proj-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_restart_after_stop() {
    let mut fx = fixture();
    let first = fx.tracker.start_session("proj-1", fx.watched.path()).unwrap();
    fx.tracker.stop_session().await.unwrap();
    let second = fx.tracker.start_session("proj-1", fx.watched.path()).unwrap();
    assert_ne!(first.id, second.id);
    fx.tracker.stop_session().await.unwrap();
    assert_eq!(fx.tracker.sessions_for_project("proj-1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_existing_files_are_not_enumerated() {
    let mut fx = fixture();
    fs::write(fx.watched.path().join("existing.txt"), "v1").unwrap();
    fs::create_dir(fx.watched.path().join("src")).unwrap();
    fs::write(fx.watched.path().join("src/lib.rs"), "v1").unwrap();

    fx.tracker.start_session("proj-1", fx.watched.path()).unwrap();
    sleep(Duration::from_millis(500)).await;
    assert!(fx.tracker.current_session().unwrap().logs.is_empty());

    fx.tracker.stop_session().await.unwrap();
}

#[tokio::test]
async fn test_write_burst_settles_to_one_change() {
    let mut fx = fixture();
    let path = fx.watched.path().join("notes.md");
    fs::write(&path, "start").unwrap();

    let mut rx = fx.tracker.subscribe();
    fx.tracker.start_session("proj-1", fx.watched.path()).unwrap();

    for i in 0..5 {
        fs::write(&path, format!("revision {i}")).unwrap();
        sleep(Duration::from_millis(10)).await;
    }

    let entry = next_activity(&mut rx).await;
    assert_eq!(entry.file_path, "notes.md");
    assert_eq!(entry.kind, ChangeKind::Modified);

    sleep(Duration::from_millis(500)).await;
    let finished = fx.tracker.stop_session().await.unwrap().unwrap();
    assert_eq!(finished.logs.len(), 1);
}

#[tokio::test]
async fn test_removal_and_nested_paths() {
    let mut fx = fixture();
    fs::create_dir_all(fx.watched.path().join("src/bin")).unwrap();
    let doomed = fx.watched.path().join("old.txt");
    fs::write(&doomed, "bye").unwrap();

    let mut rx = fx.tracker.subscribe();
    fx.tracker.start_session("proj-1", fx.watched.path()).unwrap();

    fs::remove_file(&doomed).unwrap();
    let entry = next_activity(&mut rx).await;
    assert_eq!(entry.file_path, "old.txt");
    assert_eq!(entry.kind, ChangeKind::Removed);

    fs::write(fx.watched.path().join("src/bin/tool.rs"), "fn main() {}").unwrap();
    let entry = next_activity(&mut rx).await;
    assert_eq!(entry.file_path, "src/bin/tool.rs");
    assert_eq!(entry.kind, ChangeKind::Added);

    let finished = fx.tracker.stop_session().await.unwrap().unwrap();
    for entry in &finished.logs {
        assert_under_root(fx.watched.path(), entry);
    }
}

#[tokio::test]
async fn test_dotfiles_are_ignored() {
    let mut fx = fixture();
    fs::create_dir(fx.watched.path().join(".git")).unwrap();

    let mut rx = fx.tracker.subscribe();
    fx.tracker.start_session("proj-1", fx.watched.path()).unwrap();

    fs::write(fx.watched.path().join(".env"), "SECRET=1").unwrap();
    fs::write(fx.watched.path().join(".git/HEAD"), "ref: main").unwrap();
    fs::write(fx.watched.path().join("visible.txt"), "hi").unwrap();

    let entry = next_activity(&mut rx).await;
    assert_eq!(entry.file_path, "visible.txt");

    sleep(Duration::from_millis(500)).await;
    let finished = fx.tracker.stop_session().await.unwrap().unwrap();
    let paths: Vec<_> = finished.logs.iter().map(|e| e.file_path.as_str()).collect();
    assert_eq!(paths, vec!["visible.txt"]);
}

#[tokio::test]
async fn test_log_is_complete_when_observer_lags() {
    let mut fx = fixture_with(fast_config().with_event_capacity(2));
    let _slow_observer = fx.tracker.subscribe();
    fx.tracker.start_session("proj-1", fx.watched.path()).unwrap();

    for i in 0..25 {
        fs::write(fx.watched.path().join(format!("file-{i}.txt")), "x").unwrap();
    }

    assert_eq!(wait_for_logs(&fx.tracker, 25).await, 25);
    let finished = fx.tracker.stop_session().await.unwrap().unwrap();
    assert_eq!(finished.logs.len(), 25);
}

#[tokio::test]
async fn test_log_is_complete_without_observers() {
    let mut fx = fixture();
    fx.tracker.start_session("proj-1", fx.watched.path()).unwrap();
    fs::write(fx.watched.path().join("solo.txt"), "x").unwrap();
    assert_eq!(wait_for_logs(&fx.tracker, 1).await, 1);
    fx.tracker.stop_session().await.unwrap();
}

#[tokio::test]
async fn test_manual_session_does_not_touch_active_slot() {
    let mut fx = fixture();
    let active = fx.tracker.start_session("proj-1", fx.watched.path()).unwrap();

    let t0 = chrono::Utc::now() - chrono::Duration::hours(2);
    let manual = worklog::Session::manual("p1", t0, t0 + chrono::Duration::hours(1)).with_id("s1");
    fx.tracker.save_manual_session(manual).await.unwrap();

    assert_eq!(fx.tracker.current_session().unwrap().id, active.id);
    let p1 = fx.tracker.sessions_for_project("p1").await.unwrap();
    assert_eq!(p1.len(), 1);
    assert_eq!(p1[0].id, "s1");

    fx.tracker.stop_session().await.unwrap();
    assert_eq!(fx.tracker.history().all().len(), 2);
    assert_eq!(fx.store.keys().unwrap(), vec!["sessions"]);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_root_removal_is_reported_not_fatal() {
    let mut fx = fixture();
    let root = fx.watched.path().join("project");
    fs::create_dir(&root).unwrap();

    let mut rx = fx.tracker.subscribe();
    fx.tracker.start_session("proj-1", &root).unwrap();
    fs::remove_dir(&root).unwrap();

    let message = loop {
        let event = timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for error")
            .expect("event channel closed");
        if let TrackerEvent::Error { message } = event {
            break message;
        }
    };
    assert!(!message.is_empty());
    assert!(fx.tracker.is_active());

    let finished = fx.tracker.stop_session().await.unwrap().unwrap();
    assert_eq!(finished.status, SessionStatus::Completed);
}
