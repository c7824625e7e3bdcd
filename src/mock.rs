//! # In-memory mock bus for test contexts.
//!
//! [`MemoryBus`] implements the identical [`Transport`] contract with no
//! process machinery: every delivery is local dispatch. Test code exercises
//! scheduler/logger components against it exactly as against
//! [`ProcessBus`](crate::ProcessBus), swapping only the construction site.
//!
//! Registered child handles are kept (not pumped): registration makes an id a
//! valid `send` destination and contributes a stdio snapshot entry, nothing
//! more. `send` to an unregistered id still fails with
//! destination-not-found, so error-path tests behave as in production.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::TransportError;
use crate::registry::{ChildHandle, WorkerStdio};
use crate::subscriptions::{ListenerMode, RawListener, Subscription, SubscriptionRegistry};
use crate::transport::{Transport, MAIN_PROCESS};

/// In-memory [`Transport`] implementation: one process, local delivery only.
#[derive(Clone)]
pub struct MemoryBus {
    subscriptions: Arc<SubscriptionRegistry>,
    children: Arc<RwLock<HashMap<Arc<str>, ChildHandle>>>,
}

impl MemoryBus {
    /// Creates an empty mock bus.
    pub fn new() -> Self {
        Self {
            subscriptions: SubscriptionRegistry::new(),
            children: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryBus {
    fn subscribe(
        &self,
        message_type: &str,
        mode: ListenerMode,
        listener: RawListener,
    ) -> Subscription {
        self.subscriptions.subscribe(message_type, mode, listener)
    }

    async fn broadcast_value(&self, message_type: &str, payload: Value) {
        self.subscriptions.dispatch(message_type, &payload, None);
    }

    async fn broadcast_from_value(&self, message_type: &str, payload: Value, process_id: &str) {
        self.subscriptions
            .dispatch(message_type, &payload, Some(process_id));
    }

    async fn broadcast_local_value(&self, message_type: &str, payload: Value) {
        self.subscriptions.dispatch(message_type, &payload, None);
    }

    async fn send_value(
        &self,
        target: &str,
        message_type: &str,
        payload: Value,
    ) -> Result<(), TransportError> {
        if target != MAIN_PROCESS && !self.children.read().await.contains_key(target) {
            return Err(TransportError::DestinationNotFound {
                process_id: target.to_string(),
            });
        }
        self.subscriptions.dispatch(message_type, &payload, None);
        Ok(())
    }

    async fn register_child(&self, process_id: &str, handle: ChildHandle) {
        self.children.write().await.insert(process_id.into(), handle);
    }

    async fn remove_child(&self, process_id: &str) -> bool {
        self.children.write().await.remove(process_id).is_some()
    }

    async fn processes(&self) -> Vec<Arc<str>> {
        let children = self.children.read().await;
        let mut ids: Vec<Arc<str>> = children.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    async fn stdio_configs(&self) -> Vec<WorkerStdio> {
        let children = self.children.read().await;
        let mut entries: Vec<WorkerStdio> = children
            .iter()
            .map(|(id, handle)| WorkerStdio {
                process_id: Arc::clone(id),
                stdio: handle.stdio(),
            })
            .collect();
        entries.sort_unstable_by(|a, b| a.process_id.cmp(&b.process_id));
        entries
    }
}
