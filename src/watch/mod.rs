//! Watch session manager.
//!
//! Owns one native watch per subscribed directory, shared by reference count,
//! and turns bursts of raw change signals into one debounced notification per
//! session on the [`EventBus`].
//!
//! # Session lifecycle
//!
//! ```text
//! Unwatched --subscribe--> Active(1) --subscribe--> Active(n+1)
//! Active(n) --unsubscribe--> Active(n-1) | Unwatched (native watch released at 0)
//! Active(n) --native failure--> one `watcher-error`, then Unwatched
//! ```
//!
//! # Concurrency
//!
//! Every mutation of the session table happens under a single mutex. Each
//! session runs its own debounce task fed by a capacity-1 channel: when the
//! channel is full a reset is already pending, so the raw event volume never
//! grows memory. A debounce task re-checks under the lock that its session
//! (same generation) is still active before publishing. Native failures go
//! through a supervisor task so a watch handle is never dropped from inside
//! its own callback.

pub mod backend;
pub mod session;

pub use backend::{NotifyBackend, SignalSink, WatchBackend, WatchHandle, WatchSignal};
pub use session::{ROOT_EVENT, SessionInfo, SessionKey, WatchState};

use crate::error::EngineResult;
use crate::events::{EngineEvent, EventBus};
use crate::metrics::Metrics;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct Session {
    target: Utf8PathBuf,
    ref_count: usize,
    /// Distinguishes this native watch from earlier ones under the same key
    generation: u64,
    handle: Box<dyn WatchHandle>,
    debounce: JoinHandle<()>,
}

#[derive(Default)]
struct SessionTable {
    sessions: IndexMap<SessionKey, Session>,
    next_generation: u64,
}

#[derive(Debug)]
struct WatchFailure {
    key: SessionKey,
    generation: u64,
    message: String,
}

struct Shared {
    table: Mutex<SessionTable>,
    bus: EventBus,
    metrics: Arc<Metrics>,
    failures: mpsc::UnboundedSender<WatchFailure>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, session: Session) {
        session.debounce.abort();
        drop(session.handle);
        self.metrics.record_watch_released();
        tracing::debug!("Released native watch on {}", session.target);
    }

    fn emit_changed(&self, key: &SessionKey, generation: u64) {
        let table = self.lock();
        let active = table
            .sessions
            .get(key)
            .is_some_and(|s| s.generation == generation);

        if active {
            self.metrics.record_notification();
            self.bus.publish(EngineEvent::Changed { key: key.clone() });
        } else {
            self.metrics.record_suppressed();
            tracing::debug!("Dropping change notification for ended session {}", key);
        }
    }

    fn fail_session(&self, failure: WatchFailure) {
        let mut table = self.lock();
        let current = table
            .sessions
            .get(&failure.key)
            .is_some_and(|s| s.generation == failure.generation);

        if !current {
            tracing::debug!("Ignoring stale failure for {}: {}", failure.key, failure.message);
            return;
        }

        if let Some(session) = table.sessions.shift_remove(&failure.key) {
            tracing::warn!(
                "Watch on {} failed, releasing session: {}",
                session.target,
                failure.message
            );
            self.release(session);
            self.metrics.record_watch_error();
            self.bus.publish(EngineEvent::WatcherError {
                key: failure.key,
                message: failure.message,
            });
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let table = self.table.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, session) in table.sessions.drain(..) {
            session.debounce.abort();
            self.metrics.record_watch_released();
        }
    }
}

/// Reference-counted, debounced directory watches
///
/// Cloning the manager shares the same session table.
#[derive(Clone)]
pub struct WatchManager {
    shared: Arc<Shared>,
    backend: Arc<dyn WatchBackend>,
    runtime: Handle,
    debounce: Duration,
}

impl std::fmt::Debug for WatchManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchManager")
            .field("sessions", &self.shared.lock().sessions.len())
            .field("debounce", &self.debounce)
            .finish()
    }
}

impl WatchManager {
    /// Create a manager publishing on `bus`
    ///
    /// # Arguments
    /// * `backend` - Native watch implementation ([`NotifyBackend`] outside tests)
    /// * `bus` - Where debounced notifications and errors are published
    /// * `metrics` - Shared counters; `active_watches` is the native handle probe
    /// * `debounce` - Quiet window before a burst becomes one notification
    /// * `runtime` - Runtime the debounce and supervisor tasks run on
    pub fn new(
        backend: Arc<dyn WatchBackend>,
        bus: EventBus,
        metrics: Arc<Metrics>,
        debounce: Duration,
        runtime: Handle,
    ) -> Self {
        let (failures, failure_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            table: Mutex::new(SessionTable::default()),
            bus,
            metrics,
            failures,
        });

        runtime.spawn(supervise_failures(Arc::downgrade(&shared), failure_rx));

        Self {
            shared,
            backend,
            runtime,
            debounce,
        }
    }

    /// Subscribe to changes of the mod root; notifications use the fixed `changed` name.
    ///
    /// Subscribing with a different path than the active root session moves
    /// the session to the new directory.
    pub fn subscribe_root(&self, root: &Utf8Path) -> EngineResult<SessionKey> {
        self.subscribe_session(SessionKey::root(), root)
    }

    /// Subscribe to changes of a character directory
    ///
    /// `directory` should already be normalized (see [`crate::services::PathGuard`])
    /// so the same folder always yields the same key.
    pub fn subscribe(&self, directory: &Utf8Path) -> EngineResult<SessionKey> {
        self.subscribe_session(SessionKey::for_directory(directory), directory)
    }

    /// Drop one subscriber of a character directory
    ///
    /// Returns false when the directory was not watched.
    pub fn unsubscribe(&self, directory: &Utf8Path) -> bool {
        self.unsubscribe_key(&SessionKey::for_directory(directory))
    }

    pub fn unsubscribe_root(&self) -> bool {
        self.unsubscribe_key(&SessionKey::root())
    }

    pub fn unsubscribe_key(&self, key: &SessionKey) -> bool {
        let mut table = self.shared.lock();
        let Some(session) = table.sessions.get_mut(key) else {
            tracing::debug!("Unsubscribe for unknown session {}", key);
            return false;
        };

        session.ref_count = session.ref_count.saturating_sub(1);
        if session.ref_count > 0 {
            tracing::debug!(
                "Session {} still has {} subscribers",
                session.target,
                session.ref_count
            );
            return true;
        }

        if let Some(session) = table.sessions.shift_remove(key) {
            tracing::info!("Stopped watching {}", session.target);
            self.shared.release(session);
        }
        true
    }

    /// End a session no matter how many subscribers it has
    pub fn release_key(&self, key: &SessionKey) -> bool {
        let mut table = self.shared.lock();
        match table.sessions.shift_remove(key) {
            Some(session) => {
                tracing::info!("Stopped watching {} ({} subscribers dropped)", session.target, session.ref_count);
                self.shared.release(session);
                true
            }
            None => false,
        }
    }

    /// Point an active root session at a new directory, keeping its subscribers
    ///
    /// Returns false when no root session is active. If the new directory
    /// cannot be watched, the old session is released and a `watcher-error`
    /// is published before the error is returned.
    pub fn retarget_root(&self, root: &Utf8Path) -> EngineResult<bool> {
        let key = SessionKey::root();
        let mut table = self.shared.lock();
        let Some(session) = table.sessions.get(&key) else {
            return Ok(false);
        };
        if session.target == root {
            return Ok(true);
        }

        let ref_count = session.ref_count;
        if let Err(e) = self.replace_session(&mut table, &key, root, ref_count) {
            if let Some(old) = table.sessions.shift_remove(&key) {
                tracing::warn!("Root watch could not follow {}, releasing {}", root, old.target);
                self.shared.release(old);
            }
            self.shared.metrics.record_watch_error();
            self.shared.bus.publish(EngineEvent::WatcherError {
                key,
                message: e.to_string(),
            });
            return Err(e);
        }
        Ok(true)
    }

    /// Current lifecycle state of a session
    pub fn state(&self, key: &SessionKey) -> WatchState {
        match self.shared.lock().sessions.get(key) {
            Some(session) => WatchState::Active {
                ref_count: session.ref_count,
            },
            None => WatchState::Unwatched,
        }
    }

    /// Active sessions in the order they were first subscribed
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.shared
            .lock()
            .sessions
            .iter()
            .map(|(key, session)| SessionInfo {
                key: key.clone(),
                target: session.target.clone(),
                ref_count: session.ref_count,
            })
            .collect()
    }

    /// Number of native watches currently held
    pub fn active_watch_count(&self) -> usize {
        self.shared.metrics.active_watches()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.shared.metrics
    }

    pub fn debounce_window(&self) -> Duration {
        self.debounce
    }

    /// Release every session
    pub fn shutdown(&self) {
        let mut table = self.shared.lock();
        let count = table.sessions.len();
        for (_, session) in table.sessions.drain(..) {
            self.shared.release(session);
        }
        tracing::info!("Watch manager shut down, released {} sessions", count);
    }

    fn subscribe_session(&self, key: SessionKey, target: &Utf8Path) -> EngineResult<SessionKey> {
        let mut table = self.shared.lock();
        let existing = table
            .sessions
            .get(&key)
            .map(|s| (s.target == target, s.ref_count));

        match existing {
            Some((true, ref_count)) => {
                if let Some(session) = table.sessions.get_mut(&key) {
                    session.ref_count = ref_count + 1;
                }
                tracing::debug!("Reusing watch on {} ({} subscribers)", target, ref_count + 1);
            }
            Some((false, ref_count)) => {
                self.replace_session(&mut table, &key, target, ref_count + 1)?;
            }
            None => {
                let session = self.start_session(&mut table, &key, target, 1)?;
                table.sessions.insert(key.clone(), session);
            }
        }

        Ok(key)
    }

    /// Swap the native watch behind `key`; the old one is released only once the new one is live
    fn replace_session(
        &self,
        table: &mut SessionTable,
        key: &SessionKey,
        target: &Utf8Path,
        ref_count: usize,
    ) -> EngineResult<()> {
        let session = self.start_session(table, key, target, ref_count)?;
        if let Some(old) = table.sessions.insert(key.clone(), session) {
            tracing::info!("Session {} moved from {} to {}", key, old.target, target);
            self.shared.release(old);
        }
        Ok(())
    }

    fn start_session(
        &self,
        table: &mut SessionTable,
        key: &SessionKey,
        target: &Utf8Path,
        ref_count: usize,
    ) -> EngineResult<Session> {
        let generation = table.next_generation;
        table.next_generation += 1;

        let (tx, rx) = mpsc::channel::<()>(1);
        let debounce = self.runtime.spawn(debounce_loop(
            Arc::downgrade(&self.shared),
            key.clone(),
            generation,
            rx,
            self.debounce,
        ));

        let sink = self.signal_sink(key.clone(), generation, tx);
        match self.backend.watch(target, sink) {
            Ok(handle) => {
                self.shared.metrics.record_watch_created();
                tracing::info!("Watching {} as {}", target, key);
                Ok(Session {
                    target: target.to_path_buf(),
                    ref_count,
                    generation,
                    handle,
                    debounce,
                })
            }
            Err(e) => {
                debounce.abort();
                tracing::warn!("Could not watch {}: {}", target, e);
                Err(e)
            }
        }
    }

    fn signal_sink(
        &self,
        key: SessionKey,
        generation: u64,
        changes: mpsc::Sender<()>,
    ) -> SignalSink {
        let metrics = self.shared.metrics.clone();
        let failures = self.shared.failures.clone();

        Arc::new(move |signal| match signal {
            WatchSignal::Changed => {
                metrics.record_raw_event();
                // Full means a reset is already queued
                let _ = changes.try_send(());
            }
            WatchSignal::Failed(message) => {
                let _ = failures.send(WatchFailure {
                    key: key.clone(),
                    generation,
                    message,
                });
            }
        })
    }
}

async fn debounce_loop(
    shared: Weak<Shared>,
    key: SessionKey,
    generation: u64,
    mut changes: mpsc::Receiver<()>,
    window: Duration,
) {
    while changes.recv().await.is_some() {
        loop {
            match tokio::time::timeout(window, changes.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_quiet) => break,
            }
        }

        let Some(shared) = shared.upgrade() else {
            return;
        };
        shared.emit_changed(&key, generation);
    }
}

async fn supervise_failures(
    shared: Weak<Shared>,
    mut failures: mpsc::UnboundedReceiver<WatchFailure>,
) {
    while let Some(failure) = failures.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.fail_session(failure);
    }
}
