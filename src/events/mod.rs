// Event bus
//
// Delivers debounced change notifications and watcher errors to the
// presentation layer. Built on a tokio broadcast channel so publishing never
// waits on a slow or absent subscriber.

use crate::metrics::Metrics;
use crate::watch::SessionKey;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Event name of watcher failures
pub const WATCHER_ERROR_EVENT: &str = "watcher-error";

/// Events emitted to the presentation layer
///
/// Change events carry no diff: consumers re-scan the directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    /// Something changed in the directory watched by this session
    Changed { key: SessionKey },

    /// The native watch for this session failed and was released
    WatcherError { key: SessionKey, message: String },
}

impl EngineEvent {
    /// The event name consumers listen on
    ///
    /// Root changes are `changed`, directory changes use their session key,
    /// failures are always `watcher-error`.
    pub fn event_name(&self) -> &str {
        match self {
            Self::Changed { key } => key.as_str(),
            Self::WatcherError { .. } => WATCHER_ERROR_EVENT,
        }
    }

    pub fn key(&self) -> &SessionKey {
        match self {
            Self::Changed { key } | Self::WatcherError { key, .. } => key,
        }
    }
}

/// Publish/subscribe registry for [`EngineEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
    metrics: Arc<Metrics>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize, metrics: Arc<Metrics>) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, metrics }
    }

    /// Publish an event; never blocks
    pub fn publish(&self, event: EngineEvent) {
        tracing::debug!("Publishing {}", event.event_name());
        self.metrics.record_broadcast();

        // No receivers is fine: the UI may not be listening yet
        if self.tx.send(event).is_err() {
            self.metrics.record_broadcast_miss();
        }
    }

    /// Subscribe to every event
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Subscribe to events with a single name (`changed`, a session key, or `watcher-error`)
    pub fn subscribe_to(&self, name: impl Into<String>) -> EventSubscription {
        EventSubscription {
            rx: self.tx.subscribe(),
            name: name.into(),
        }
    }
}

/// Receiver filtered to one event name
#[derive(Debug)]
pub struct EventSubscription {
    rx: broadcast::Receiver<EngineEvent>,
    name: String,
}

impl EventSubscription {
    /// Wait for the next matching event; `None` once the bus is gone
    ///
    /// A lagging subscriber skips what it missed. Since change events carry no
    /// payload, the next one received still triggers a full re-scan.
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.event_name() == self.name => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Subscriber for {} lagged by {} events", self.name, skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
