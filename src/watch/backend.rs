//! Native watch layer.
//!
//! [`WatchBackend`] is the seam between the session manager and the OS. The
//! default [`NotifyBackend`] uses the `notify` recommended watcher; tests swap
//! in a fake that counts live handles and fires signals by hand.

use crate::error::{EngineError, EngineResult};
use camino::Utf8Path;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;

/// What a native watch reports back to its session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    /// Something in the watched directory changed
    Changed,

    /// The watch can no longer deliver events (directory removed, permission revoked, ...)
    Failed(String),
}

/// Callback a native watch invokes for every signal
///
/// Called from the backend's own thread; implementations must not block.
pub type SignalSink = Arc<dyn Fn(WatchSignal) + Send + Sync>;

/// A live native watch. Dropping it releases the OS handle.
pub trait WatchHandle: Send {}

impl WatchHandle for RecommendedWatcher {}

/// Creates native watches on single directories
pub trait WatchBackend: Send + Sync {
    /// Start watching the immediate children of `target`
    fn watch(&self, target: &Utf8Path, sink: SignalSink) -> EngineResult<Box<dyn WatchHandle>>;
}

/// Native watches backed by `notify`
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifyBackend;

impl WatchBackend for NotifyBackend {
    fn watch(&self, target: &Utf8Path, sink: SignalSink) -> EngineResult<Box<dyn WatchHandle>> {
        let watched = target.as_std_path().to_path_buf();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    if let Some(signal) = classify_event(&watched, &event) {
                        sink(signal);
                    }
                }
                Err(e) => sink(WatchSignal::Failed(e.to_string())),
            }
        })
        .map_err(|e| EngineError::WatchInitFailed {
            path: target.to_path_buf(),
            reason: e.to_string(),
        })?;

        watcher
            .watch(target.as_std_path(), RecursiveMode::NonRecursive)
            .map_err(|e| EngineError::WatchInitFailed {
                path: target.to_path_buf(),
                reason: e.to_string(),
            })?;

        tracing::debug!("Native watch started on {}", target);
        Ok(Box::new(watcher))
    }
}

/// Translate a raw notify event into a session signal.
///
/// Access events are dropped. An event naming the watched directory itself
/// after it has disappeared means the watch is dead.
fn classify_event(watched: &Path, event: &Event) -> Option<WatchSignal> {
    match event.kind {
        EventKind::Access(_) => None,
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
            if event.paths.iter().any(|p| p == watched) && !watched.exists() =>
        {
            Some(WatchSignal::Failed(format!(
                "Watched directory {} is no longer available",
                watched.display()
            )))
        }
        _ => Some(WatchSignal::Changed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, RemoveKind, RenameMode};
    use tempfile::TempDir;

    fn event(kind: EventKind, path: &Path) -> Event {
        Event::new(kind).add_path(path.to_path_buf())
    }

    #[test]
    fn test_access_events_are_ignored() {
        let dir = TempDir::new().unwrap();
        let ev = event(EventKind::Access(AccessKind::Any), &dir.path().join("a"));
        assert_eq!(classify_event(dir.path(), &ev), None);
    }

    #[test]
    fn test_child_changes_are_reported() {
        let dir = TempDir::new().unwrap();
        let child = dir.path().join("Blue Dress");

        let created = event(EventKind::Create(CreateKind::Folder), &child);
        assert_eq!(classify_event(dir.path(), &created), Some(WatchSignal::Changed));

        let removed = event(EventKind::Remove(RemoveKind::Folder), &child);
        assert_eq!(classify_event(dir.path(), &removed), Some(WatchSignal::Changed));
    }

    #[test]
    fn test_removal_of_watched_directory_is_a_failure() {
        let dir = TempDir::new().unwrap();
        let watched = dir.path().join("Alice");

        let removed = event(EventKind::Remove(RemoveKind::Folder), &watched);
        assert!(matches!(
            classify_event(&watched, &removed),
            Some(WatchSignal::Failed(_))
        ));

        let renamed = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &watched,
        );
        assert!(matches!(
            classify_event(&watched, &renamed),
            Some(WatchSignal::Failed(_))
        ));
    }

    #[test]
    fn test_watch_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let missing = Utf8Path::from_path(dir.path()).unwrap().join("missing");
        let sink: SignalSink = Arc::new(|_| {});

        let result = NotifyBackend.watch(&missing, sink);
        assert!(matches!(result, Err(EngineError::WatchInitFailed { .. })));
    }
}
