//! Filesystem watch behind an active session.
//!
//! `notify` delivers raw events on its own thread. They are forwarded over an
//! unbounded channel (the notify thread never blocks on us) to a Tokio task
//! that filters them, holds adds and modifications until the file has been
//! quiet for the settle window, and hands settled changes to an
//! [`ActivitySink`].

use crate::config::TrackerConfig;
use notify::event::{CreateKind, MetadataKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use worklog::{ActivityEntry, ChangeKind, Session, TrackerEvent};

// ============================================================================
// Sink
// ============================================================================

/// Destination for settled changes: the session log first, observers second.
#[derive(Clone)]
pub(crate) struct ActivitySink {
    session: Arc<Mutex<Session>>,
    events: broadcast::Sender<TrackerEvent>,
}

impl ActivitySink {
    pub(crate) fn new(
        session: Arc<Mutex<Session>>,
        events: broadcast::Sender<TrackerEvent>,
    ) -> Self {
        Self { session, events }
    }

    fn record(&self, file_path: String, kind: ChangeKind) {
        let entry = ActivityEntry::now(file_path, kind);
        {
            let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
            if !session.record(entry.clone()) {
                return;
            }
        }
        // No receivers is fine; lagging receivers lose notifications, not log entries.
        let _ = self.events.send(TrackerEvent::Activity(entry));
    }

    fn error(&self, message: String) {
        warn!(%message, "file watcher reported an error");
        let _ = self.events.send(TrackerEvent::Error { message });
    }
}

// ============================================================================
// Path filtering
// ============================================================================

/// Maps absolute event paths to `/`-separated paths under the watched root.
#[derive(Debug, Clone)]
pub(crate) struct PathFilter {
    root: PathBuf,
    canonical_root: Option<PathBuf>,
    ignore_dotfiles: bool,
}

impl PathFilter {
    pub(crate) fn new(root: &Path, ignore_dotfiles: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            canonical_root: root.canonicalize().ok(),
            ignore_dotfiles,
        }
    }

    fn is_root(&self, path: &Path) -> bool {
        path == self.root || self.canonical_root.as_deref() == Some(path)
    }

    /// `None` for the root itself, paths outside it, and ignored paths.
    pub(crate) fn relative(&self, path: &Path) -> Option<String> {
        let rel = path
            .strip_prefix(&self.root)
            .ok()
            .or_else(|| {
                self.canonical_root
                    .as_deref()
                    .and_then(|root| path.strip_prefix(root).ok())
            })?;

        let mut parts = Vec::new();
        for component in rel.components() {
            let Component::Normal(part) = component else {
                return None;
            };
            let part = part.to_string_lossy();
            if self.ignore_dotfiles && part.starts_with('.') {
                return None;
            }
            parts.push(part.into_owned());
        }
        if parts.is_empty() {
            return None;
        }
        Some(parts.join("/"))
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Reduce a raw notify event to per-file changes.
///
/// Directory events are dropped: only files are tracked.
fn classify(event: &Event) -> Vec<(&Path, ChangeKind)> {
    let files = |kind| files_of(event, kind);

    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => files(ChangeKind::Added),
        EventKind::Remove(RemoveKind::Folder) => Vec::new(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .map(|p| (p.as_path(), ChangeKind::Removed))
            .collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => match (mode, event.paths.as_slice()) {
            (RenameMode::From, _) => event
                .paths
                .iter()
                .map(|p| (p.as_path(), ChangeKind::Removed))
                .collect(),
            (RenameMode::To, _) => files(ChangeKind::Added),
            (RenameMode::Both, [from, to, ..]) => {
                let mut out = vec![(from.as_path(), ChangeKind::Removed)];
                if !to.is_dir() {
                    out.push((to.as_path(), ChangeKind::Added));
                }
                out
            }
            // Backend could not say which side of the rename this is.
            _ => event
                .paths
                .iter()
                .filter(|p| !p.is_dir())
                .map(|p| {
                    let kind = if p.exists() {
                        ChangeKind::Added
                    } else {
                        ChangeKind::Removed
                    };
                    (p.as_path(), kind)
                })
                .collect(),
        },
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime))
        | EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Any)
        | EventKind::Modify(ModifyKind::Other) => files(ChangeKind::Modified),
        _ => Vec::new(),
    }
}

fn files_of(event: &Event, kind: ChangeKind) -> Vec<(&Path, ChangeKind)> {
    event
        .paths
        .iter()
        .filter(|p| !p.is_dir())
        .map(|p| (p.as_path(), kind))
        .collect()
}

// ============================================================================
// Debounce
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Pending {
    kind: ChangeKind,
    last_seen: Instant,
}

/// Holds adds and modifications until a path has been quiet for `stability`.
#[derive(Debug)]
pub(crate) struct Debouncer {
    pending: HashMap<String, Pending>,
    stability: Duration,
}

impl Debouncer {
    pub(crate) fn new(stability: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            stability,
        }
    }

    /// Feed one change. Returns a change to report immediately, if any.
    ///
    /// Removals bypass the settle window. A pending add absorbs later
    /// writes and stays an add; an add removed before settling vanishes.
    pub(crate) fn observe(
        &mut self,
        path: String,
        kind: ChangeKind,
        now: Instant,
    ) -> Option<(String, ChangeKind)> {
        match kind {
            ChangeKind::Removed => match self.pending.remove(&path) {
                Some(Pending {
                    kind: ChangeKind::Added,
                    ..
                }) => None,
                _ => Some((path, ChangeKind::Removed)),
            },
            ChangeKind::Added | ChangeKind::Modified => {
                self.pending
                    .entry(path)
                    .and_modify(|p| p.last_seen = now)
                    .or_insert(Pending {
                        kind,
                        last_seen: now,
                    });
                None
            }
        }
    }

    /// Drain every change quiet for at least the settle window, oldest first.
    pub(crate) fn settle(&mut self, now: Instant) -> Vec<(String, ChangeKind)> {
        let stability = self.stability;
        let mut ready: Vec<(String, Pending)> = Vec::new();
        self.pending.retain(|path, pending| {
            if now.saturating_duration_since(pending.last_seen) >= stability {
                ready.push((path.clone(), *pending));
                false
            } else {
                true
            }
        });
        ready.sort_by_key(|(_, p)| p.last_seen);
        ready.into_iter().map(|(path, p)| (path, p.kind)).collect()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

// ============================================================================
// Watch task
// ============================================================================

/// Running watch. Dropping it also stops the task.
pub(crate) struct WatchHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Stop the task and release the OS watch. Unsettled changes are dropped.
    ///
    /// Safe to call again, including after an earlier call was cancelled.
    pub(crate) async fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(task) = self.task.as_mut() {
            if let Err(e) = task.await {
                warn!(error = %e, "watch task ended abnormally");
            }
            self.task = None;
        }
    }
}

/// Open a recursive watch on `root` and start forwarding settled changes.
///
/// Only changes made after this returns are reported; existing files are
/// not enumerated.
pub(crate) fn spawn_watch(
    runtime: &tokio::runtime::Handle,
    root: &Path,
    config: &TrackerConfig,
    sink: ActivitySink,
) -> notify::Result<WatchHandle> {
    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher =
        notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = raw_tx.send(res);
        })?;
    watcher.watch(root, RecursiveMode::Recursive)?;

    let filter = PathFilter::new(root, config.ignore_dotfiles);
    let mut debouncer = Debouncer::new(config.stability_threshold);
    let poll_interval = config.poll_interval.max(Duration::from_millis(1));
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let task = runtime.spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // Explicit stop, or the handle was dropped.
                _ = &mut stop_rx => break,

                Some(res) = raw_rx.recv() => match res {
                    Ok(event) => handle_event(&event, &filter, &mut debouncer, &sink),
                    Err(e) => sink.error(e.to_string()),
                },

                _ = ticker.tick() => {
                    for (path, kind) in debouncer.settle(Instant::now()) {
                        sink.record(path, kind);
                    }
                }
            }
        }

        if debouncer.pending_len() > 0 {
            debug!(pending = debouncer.pending_len(), "discarding unsettled changes");
        }
        drop(watcher);
    });

    Ok(WatchHandle {
        stop_tx: Some(stop_tx),
        task: Some(task),
    })
}

fn handle_event(
    event: &Event,
    filter: &PathFilter,
    debouncer: &mut Debouncer,
    sink: &ActivitySink,
) {
    if event.need_rescan() {
        sink.error("file watcher overflowed; some changes may have been missed".to_string());
    }

    if matches!(event.kind, EventKind::Remove(_)) && event.paths.iter().any(|p| filter.is_root(p)) {
        sink.error(format!(
            "watched directory was removed: {}",
            filter.root.display()
        ));
        return;
    }

    let now = Instant::now();
    for (path, kind) in classify(event) {
        let Some(rel) = filter.relative(path) else {
            continue;
        };
        if let Some((rel, kind)) = debouncer.observe(rel, kind, now) {
            sink.record(rel, kind);
        }
    }
}
