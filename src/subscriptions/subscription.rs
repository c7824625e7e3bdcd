//! Explicit unsubscribe handle returned by `on`/`once`/`once_from`.

use std::sync::Arc;

use super::entry::ListenerEntry;

/// Handle to one registered listener.
///
/// Calling [`unsubscribe`](Subscription::unsubscribe) removes the listener
/// immediately: no delivery dispatched after the call reaches it, even one
/// already in flight for other listeners of the same type. The vacated map
/// slot is reclaimed on the next dispatch of that message type.
///
/// Dropping the handle without calling `unsubscribe` detaches it and leaves
/// the listener installed for the life of the bus (one-shot listeners still
/// remove themselves after firing).
pub struct Subscription {
    message_type: Arc<str>,
    entry: Arc<ListenerEntry>,
}

impl Subscription {
    pub(crate) fn new(message_type: Arc<str>, entry: Arc<ListenerEntry>) -> Self {
        Self {
            message_type,
            entry,
        }
    }

    /// Removes the listener, effective immediately.
    pub fn unsubscribe(self) {
        self.entry.deactivate();
    }

    /// True while the listener can still fire (not unsubscribed, and for
    /// one-shot modes not yet consumed).
    pub fn is_active(&self) -> bool {
        self.entry.is_active()
    }

    /// The message type this subscription observes.
    pub fn message_type(&self) -> &str {
        &self.message_type
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("message_type", &self.message_type)
            .field("active", &self.entry.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::entry::ListenerMode;
    use super::super::registry::SubscriptionRegistry;

    #[test]
    fn test_is_active_tracks_one_shot_consumption() {
        let reg = SubscriptionRegistry::new();
        let sub = reg.subscribe("tick", ListenerMode::Once, Box::new(|_, _| {}));
        assert!(sub.is_active());

        reg.dispatch("tick", &serde_json::json!(1), None);
        assert!(!sub.is_active());
    }

    #[test]
    fn test_unsubscribed_handle_reports_inactive() {
        let reg = SubscriptionRegistry::new();
        let sub = reg.subscribe("tick", ListenerMode::Persistent, Box::new(|_, _| {}));
        assert_eq!(sub.message_type(), "tick");

        sub.unsubscribe();
        assert_eq!(reg.listener_count("tick"), 0);
    }
}
