//! # Per-process subscription registry.
//!
//! Maps message-type keys to ordered collections of listener records and
//! dispatches envelopes to them through a single mode-matching function.
//!
//! ## Rules
//! - `dispatch` snapshots the listener list before invoking callbacks, so
//!   unsubscription (and re-subscription) during dispatch is safe.
//! - Listeners run in subscription order.
//! - A listener panic is caught, logged and isolated; remaining listeners of
//!   the same delivery still run.
//! - The lock guards only map mutation and snapshotting, never a callback
//!   invocation, and is never held across an await point.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::entry::{ListenerEntry, ListenerMode, RawListener};
use super::subscription::Subscription;

/// Message type → ordered listener records for one process.
///
/// Process-wide state owned by the bus instance; shared with [`Subscription`]
/// handles and relay tasks through `Arc`.
pub(crate) struct SubscriptionRegistry {
    channels: Mutex<HashMap<Arc<str>, Vec<Arc<ListenerEntry>>>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            channels: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        })
    }

    /// Registers a listener and returns its unsubscribe handle.
    ///
    /// The handle carries no registry reference: unsubscribing deactivates
    /// the entry immediately and the map slot is reclaimed lazily on the next
    /// dispatch of that message type.
    pub(crate) fn subscribe(
        &self,
        message_type: impl Into<Arc<str>>,
        mode: ListenerMode,
        listener: RawListener,
    ) -> Subscription {
        let message_type: Arc<str> = message_type.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(ListenerEntry::new(id, mode, listener));

        let mut channels = self.channels.lock().expect("subscription registry poisoned");
        channels
            .entry(Arc::clone(&message_type))
            .or_default()
            .push(Arc::clone(&entry));
        drop(channels);

        Subscription::new(message_type, entry)
    }

    /// Delivers one envelope to every matching listener of `message_type`.
    ///
    /// One-shot slots are consumed atomically before the callback runs, so a
    /// nested dispatch triggered from inside a listener cannot double-fire
    /// them. Source-filtered entries ignore non-matching sources without
    /// consuming their slot.
    pub(crate) fn dispatch(&self, message_type: &str, payload: &Value, source: Option<&str>) {
        let snapshot: Vec<Arc<ListenerEntry>> = {
            let channels = self.channels.lock().expect("subscription registry poisoned");
            match channels.get(message_type) {
                Some(entries) => entries.clone(),
                None => return,
            }
        };

        for entry in &snapshot {
            let fire = match &entry.mode {
                ListenerMode::Persistent => entry.is_active(),
                ListenerMode::Once => entry.consume(),
                ListenerMode::OnceFrom(expected) => {
                    source == Some(expected.as_ref()) && entry.consume()
                }
            };

            if fire {
                invoke(entry, payload, source);
            }
        }

        // Lazy cleanup: consumed one-shots and unsubscribed entries become
        // tombstones until the next dispatch of their type reclaims them.
        if snapshot.iter().any(|e| !e.is_active()) {
            self.purge(message_type);
        }
    }

    /// Drops inactive entries for one message type (and the key itself once
    /// no listeners remain).
    fn purge(&self, message_type: &str) {
        let mut channels = self.channels.lock().expect("subscription registry poisoned");
        if let Some(entries) = channels.get_mut(message_type) {
            entries.retain(|e| e.is_active());
            if entries.is_empty() {
                channels.remove(message_type);
            }
        }
    }

    /// Number of live listeners for a message type.
    pub(crate) fn listener_count(&self, message_type: &str) -> usize {
        let channels = self.channels.lock().expect("subscription registry poisoned");
        channels
            .get(message_type)
            .map(|entries| entries.iter().filter(|e| e.is_active()).count())
            .unwrap_or(0)
    }
}

/// Runs one callback with panic isolation.
fn invoke(entry: &ListenerEntry, payload: &Value, source: Option<&str>) {
    let call = AssertUnwindSafe(|| (entry.listener)(payload, source));
    if let Err(panic_err) = std::panic::catch_unwind(call) {
        tracing::error!(
            listener_id = entry.id,
            panic = ?panic_err,
            "listener panicked during dispatch; continuing with remaining listeners"
        );
    }
}
