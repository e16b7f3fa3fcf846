//! Lifecycle events and the channel that publishes them.
//!
//! Collaborators observe the registry only through [`RegistryEvent`]s. They
//! can either [`subscribe`](EventChannel::subscribe) for a receiver or
//! register a [`listener`](EventChannel::add_listener) callback. Payloads are
//! owned snapshots; nothing in an event borrows registry memory.
//!
//! Events pass through an ordered outbox. Producers [`enqueue`](EventChannel::enqueue)
//! while they still hold whatever lock orders their changes, then
//! [`flush`](EventChannel::flush) after releasing it. One thread drains at a
//! time, so every observer sees events in the order they were queued.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::registry::{ExtensionMetadata, ExtensionState};

/// An announcement of a lifecycle transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistryEvent {
    /// A manifest was accepted and the extension is now `INSTALLED`.
    ExtensionRegistered { metadata: Box<ExtensionMetadata> },
    /// An extension was removed.
    ExtensionUnregistered { id: String },
    /// An extension became `ENABLED`.
    ExtensionEnabled { id: String },
    /// An extension became `DISABLED`.
    ExtensionDisabled { id: String },
    /// An extension reported a runtime failure.
    ExtensionError { id: String, message: String },
    /// Any change of [`ExtensionState`].
    ExtensionStateChanged {
        id: String,
        old_state: ExtensionState,
        new_state: ExtensionState,
    },
}

impl RegistryEvent {
    /// The wire name of this event (e.g. `EXTENSION_ENABLED`).
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExtensionRegistered { .. } => "EXTENSION_REGISTERED",
            Self::ExtensionUnregistered { .. } => "EXTENSION_UNREGISTERED",
            Self::ExtensionEnabled { .. } => "EXTENSION_ENABLED",
            Self::ExtensionDisabled { .. } => "EXTENSION_DISABLED",
            Self::ExtensionError { .. } => "EXTENSION_ERROR",
            Self::ExtensionStateChanged { .. } => "EXTENSION_STATE_CHANGED",
        }
    }

    /// Id of the extension this event concerns.
    pub fn extension_id(&self) -> &str {
        match self {
            Self::ExtensionRegistered { metadata } => &metadata.manifest.id,
            Self::ExtensionUnregistered { id }
            | Self::ExtensionEnabled { id }
            | Self::ExtensionDisabled { id }
            | Self::ExtensionError { id, .. }
            | Self::ExtensionStateChanged { id, .. } => id,
        }
    }

    pub(crate) fn state_changed(id: &str, old_state: ExtensionState, new_state: ExtensionState) -> Self {
        Self::ExtensionStateChanged {
            id: id.to_string(),
            old_state,
            new_state,
        }
    }
}

impl std::fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExtensionStateChanged {
                id,
                old_state,
                new_state,
            } => write!(f, "{} {id}: {old_state} -> {new_state}", self.name()),
            Self::ExtensionError { id, message } => write!(f, "{} {id}: {message}", self.name()),
            other => write!(f, "{} {}", other.name(), other.extension_id()),
        }
    }
}

/// Callback invoked for every published event.
pub type Listener = Arc<dyn Fn(&RegistryEvent) + Send + Sync>;

/// Events waiting for delivery, and whether some thread is delivering them.
#[derive(Default)]
struct Outbox {
    queue: VecDeque<RegistryEvent>,
    draining: bool,
}

/// Releases the drain flag if a listener panics mid-delivery, so later
/// flushes can pick up what is still queued.
struct DrainGuard<'a>(&'a Mutex<Outbox>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().unwrap_or_else(PoisonError::into_inner).draining = false;
        }
    }
}

/// Publish/subscribe fan-out for [`RegistryEvent`]s.
#[derive(Default)]
pub struct EventChannel {
    subscribers: Mutex<Vec<Sender<RegistryEvent>>>,
    listeners: Mutex<Vec<Listener>>,
    outbox: Mutex<Outbox>,
}

impl EventChannel {
    /// Create a channel with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new receiver that sees every event published from now on.
    pub fn subscribe(&self) -> Receiver<RegistryEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Register a callback invoked synchronously for each event.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Number of live receivers and listeners.
    pub fn subscriber_count(&self) -> usize {
        let receivers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        receivers + listeners
    }

    /// Queue `event` and deliver everything queued so far.
    pub fn publish(&self, event: RegistryEvent) {
        self.publish_all([event]);
    }

    /// Queue a batch of events in order and deliver everything queued so far.
    pub fn publish_all(&self, events: impl IntoIterator<Item = RegistryEvent>) {
        self.enqueue(events);
        self.flush();
    }

    /// Append events to the outbox without delivering them.
    ///
    /// Events are delivered in enqueue order by the next [`flush`](Self::flush)
    /// on any thread.
    pub fn enqueue(&self, events: impl IntoIterator<Item = RegistryEvent>) {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .queue
            .extend(events);
    }

    /// Deliver queued events until the outbox is empty.
    ///
    /// Returns at once if another call is already draining; that call
    /// delivers the events queued here too. A listener that publishes from
    /// inside a delivery therefore has its events delivered right after the
    /// current one, not nested inside it.
    pub fn flush(&self) {
        {
            let mut outbox = self.outbox.lock().unwrap_or_else(PoisonError::into_inner);
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }

        let _guard = DrainGuard(&self.outbox);
        loop {
            let next = {
                let mut outbox = self.outbox.lock().unwrap_or_else(PoisonError::into_inner);
                match outbox.queue.pop_front() {
                    Some(event) => event,
                    None => {
                        // Cleared under the same lock as the empty check, so
                        // a concurrent enqueue either lands before it or sees
                        // the flag down and drains itself.
                        outbox.draining = false;
                        return;
                    }
                }
            };
            self.deliver(next);
        }
    }

    /// Hand one event to every receiver and listener.
    ///
    /// Receivers whose other end was dropped are removed. Listeners run after
    /// the channel's locks are released, so they may subscribe or publish.
    fn deliver(&self, event: RegistryEvent) {
        tracing::debug!(event = event.name(), id = event.extension_id(), "publishing registry event");

        {
            let mut subscribers = self
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }

        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(&event);
        }
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
