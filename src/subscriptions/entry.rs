//! Listener records: mode tags and callback shape.
//!
//! The three subscription flavors (`on`, `once`, `once_from`) are a single
//! listener record tagged with a [`ListenerMode`], dispatched through one
//! matching function in the registry. Keeping them as one tagged variant
//! (rather than three code paths) is what keeps the one-shot and
//! source-filter semantics consistent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Callback shape stored in the registry: `(payload, source) -> ()`.
///
/// The typed `on<T>`/`once<T>` wrappers adapt user closures into this form,
/// deserializing the payload before the call.
pub type RawListener = Box<dyn Fn(&Value, Option<&str>) + Send + Sync + 'static>;

/// How a listener participates in dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListenerMode {
    /// Fires on every matching delivery until unsubscribed.
    Persistent,
    /// Fires at most once, then auto-unsubscribes.
    Once,
    /// Fires at most once, only for deliveries whose source equals the given
    /// process id. Non-matching sources do not consume the slot.
    OnceFrom(Arc<str>),
}

/// One registered listener.
///
/// `active` doubles as the consumption flag for one-shot modes and the
/// tombstone for unsubscription: dispatch re-checks it immediately before
/// invoking, so cancellation takes effect even for deliveries already in
/// flight for other listeners.
pub(crate) struct ListenerEntry {
    pub(crate) id: u64,
    pub(crate) mode: ListenerMode,
    pub(crate) active: AtomicBool,
    pub(crate) listener: RawListener,
}

impl ListenerEntry {
    pub(crate) fn new(id: u64, mode: ListenerMode, listener: RawListener) -> Self {
        Self {
            id,
            mode,
            active: AtomicBool::new(true),
            listener,
        }
    }

    /// Atomically consumes a one-shot slot. Returns false if the entry was
    /// already consumed or unsubscribed.
    #[inline]
    pub(crate) fn consume(&self) -> bool {
        self.active.swap(false, Ordering::SeqCst)
    }

    #[inline]
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    #[inline]
    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Adapts a typed closure into a [`RawListener`].
///
/// Deserialization failures are logged and the callback is skipped; by then
/// the delivery already counted as a match (one-shot slots are consumed), so
/// a type mismatch cannot turn a one-shot listener into a repeating one.
pub(crate) fn typed_listener<T, F>(message_type: Arc<str>, listener: F) -> RawListener
where
    T: DeserializeOwned,
    F: Fn(T, Option<&str>) + Send + Sync + 'static,
{
    Box::new(move |payload: &Value, source: Option<&str>| match serde_json::from_value::<T>(payload.clone()) {
        Ok(decoded) => listener(decoded, source),
        Err(err) => {
            tracing::warn!(
                message_type = %message_type,
                error = %err,
                "listener payload failed to deserialize; delivery skipped"
            );
        }
    })
}
