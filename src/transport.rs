//! # Transport contract and the production bus.
//!
//! [`Transport`] is the public contract consumed by the orchestration layer
//! (scheduler, logger server, recorder). Two implementations ship with the
//! crate:
//!
//! - [`ProcessBus`] — the production bus below, routing across process
//!   boundaries over owned per-worker channels;
//! - [`MemoryBus`](crate::MemoryBus) — the in-memory variant for test
//!   contexts, same contract, local delivery only.
//!
//! Callers never reason about whether a listener is local or remote: the bus
//! resolves delivery transparently.
//!
//! ## Wiring
//! ```text
//!   scheduler / logger ── on/once/once_from ──► SubscriptionRegistry
//!            │                                        ▲
//!            ├── send("w1", ..) ──► ProcessRegistry   │ dispatch
//!            ├── broadcast(..) ───► fan-out snapshot  │
//!            │                          │             │
//!            ▼                          ▼             │
//!   register_child("w1", handle) ── relay task ◄── worker channel
//! ```
//!
//! One relay task per registered child forwards inbound envelopes into local
//! dispatch, tagged with the child's registered id. When a channel closes the
//! relay purges the registry entry (only its own generation of it) and exits;
//! nobody is notified beyond that — lifecycle signalling belongs to the
//! orchestration layer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::envelope::Envelope;
use crate::error::TransportError;
use crate::registry::{ChildHandle, ChildLink, ProcessRegistry, WorkerStdio};
use crate::subscriptions::{typed_listener, ListenerMode, RawListener, Subscription, SubscriptionRegistry};

/// Reserved process id addressing the orchestrator itself.
///
/// `send(MAIN_PROCESS, ..)` dispatches locally; the id is not a valid worker
/// registration target.
pub const MAIN_PROCESS: &str = "main";

/// The message-passing contract between orchestrator and workers.
///
/// The required methods form the raw, `Value`-level surface; the provided
/// methods layer typed serialization on top. Message-type strings are opaque:
/// any string is a valid channel name, nothing is pre-declared.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Registers a raw listener with an explicit mode.
    ///
    /// Prefer the typed [`on`](Transport::on) / [`once`](Transport::once) /
    /// [`once_from`](Transport::once_from) wrappers.
    fn subscribe(&self, message_type: &str, mode: ListenerMode, listener: RawListener)
        -> Subscription;

    /// Delivers to every currently registered worker and all local listeners.
    /// No source tag; per-worker delivery is independent and unordered across
    /// workers.
    async fn broadcast_value(&self, message_type: &str, payload: Value);

    /// As [`broadcast_value`](Transport::broadcast_value), but every delivery
    /// carries `source = process_id` and the originating worker is excluded.
    async fn broadcast_from_value(&self, message_type: &str, payload: Value, process_id: &str);

    /// Delivers to local listeners only; never touches a worker channel.
    async fn broadcast_local_value(&self, message_type: &str, payload: Value);

    /// Delivers to exactly one destination: a worker id, or [`MAIN_PROCESS`]
    /// for the orchestrator itself. Completes once the envelope is handed to
    /// the destination channel.
    ///
    /// # Errors
    /// - [`TransportError::DestinationNotFound`] if the target is not registered.
    /// - [`TransportError::ChannelClosed`] if the channel died (the registry
    ///   entry is purged).
    async fn send_value(
        &self,
        target: &str,
        message_type: &str,
        payload: Value,
    ) -> Result<(), TransportError>;

    /// Binds a worker's channel handle under `process_id`, making it a valid
    /// destination for `send`/`broadcast` and a valid source for filtered
    /// subscriptions. Replaces any prior mapping under the same id.
    async fn register_child(&self, process_id: &str, handle: ChildHandle);

    /// Detaches bookkeeping for `process_id` without closing its channel.
    /// Returns false if the id was not registered.
    async fn remove_child(&self, process_id: &str) -> bool;

    /// Snapshot of currently registered worker ids.
    async fn processes(&self) -> Vec<Arc<str>>;

    /// Snapshot of stdio descriptors for registered workers.
    async fn stdio_configs(&self) -> Vec<WorkerStdio>;

    // ---- Typed convenience layer ----

    /// Persistent subscription; fires on every matching delivery until
    /// unsubscribed.
    fn on<T, F>(&self, message_type: &str, listener: F) -> Subscription
    where
        Self: Sized,
        T: DeserializeOwned,
        F: Fn(T, Option<&str>) + Send + Sync + 'static,
    {
        self.subscribe(
            message_type,
            ListenerMode::Persistent,
            typed_listener(message_type.into(), listener),
        )
    }

    /// One-shot subscription; fires at most once, then auto-unsubscribes.
    fn once<T, F>(&self, message_type: &str, listener: F) -> Subscription
    where
        Self: Sized,
        T: DeserializeOwned,
        F: Fn(T, Option<&str>) + Send + Sync + 'static,
    {
        self.subscribe(
            message_type,
            ListenerMode::Once,
            typed_listener(message_type.into(), listener),
        )
    }

    /// One-shot subscription filtered by source: fires at most once, only for
    /// deliveries whose source equals `process_id`; other sources neither
    /// fire nor consume the slot.
    fn once_from<T, F>(&self, process_id: &str, message_type: &str, listener: F) -> Subscription
    where
        Self: Sized,
        T: DeserializeOwned,
        F: Fn(T, Option<&str>) + Send + Sync + 'static,
    {
        self.subscribe(
            message_type,
            ListenerMode::OnceFrom(process_id.into()),
            typed_listener(message_type.into(), listener),
        )
    }

    /// Typed [`broadcast_value`](Transport::broadcast_value).
    async fn broadcast<T>(&self, message_type: &str, payload: &T) -> Result<(), TransportError>
    where
        Self: Sized,
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(payload)?;
        self.broadcast_value(message_type, value).await;
        Ok(())
    }

    /// Typed [`broadcast_from_value`](Transport::broadcast_from_value).
    async fn broadcast_from<T>(
        &self,
        message_type: &str,
        payload: &T,
        process_id: &str,
    ) -> Result<(), TransportError>
    where
        Self: Sized,
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(payload)?;
        self.broadcast_from_value(message_type, value, process_id)
            .await;
        Ok(())
    }

    /// Typed [`broadcast_local_value`](Transport::broadcast_local_value).
    async fn broadcast_local<T>(&self, message_type: &str, payload: &T) -> Result<(), TransportError>
    where
        Self: Sized,
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(payload)?;
        self.broadcast_local_value(message_type, value).await;
        Ok(())
    }

    /// Typed [`send_value`](Transport::send_value).
    async fn send<T>(
        &self,
        target: &str,
        message_type: &str,
        payload: &T,
    ) -> Result<(), TransportError>
    where
        Self: Sized,
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(payload)?;
        self.send_value(target, message_type, value).await
    }
}

/// Production bus for the orchestrator process.
///
/// Created once per process and held as process-wide state; cheap to clone
/// (clones share the same registries).
#[derive(Clone)]
pub struct ProcessBus {
    subscriptions: Arc<SubscriptionRegistry>,
    processes: Arc<ProcessRegistry>,
}

impl ProcessBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            subscriptions: SubscriptionRegistry::new(),
            processes: ProcessRegistry::new(),
        }
    }

    /// Waits until every registered worker channel has handed off its queued
    /// envelopes, up to `grace`.
    ///
    /// Returns true once all outbound queues are empty, false if the window
    /// elapsed first. Intended for shutdown: drain before retiring workers,
    /// typically with [`TransportConfig::drain_grace`](crate::TransportConfig).
    /// Envelopes already handed to a worker are outside this crate's
    /// visibility; "drained" means handed off, not processed.
    pub async fn drain(&self, grace: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            let targets = self.processes.fanout_snapshot().await;
            if targets
                .iter()
                .all(|(_, channel)| channel.capacity() == channel.max_capacity())
            {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Spawns the standing relay forwarding one child's inbound envelopes
    /// into local dispatch.
    ///
    /// Envelopes arriving without a source are tagged with the child's
    /// registered id; an explicit source (a relayed message) is preserved.
    /// When the channel closes, the relay purges its own generation of the
    /// registry entry and exits.
    fn spawn_relay(
        &self,
        process_id: Arc<str>,
        channel: mpsc::Sender<Envelope>,
        mut inbound: mpsc::Receiver<Envelope>,
    ) {
        let subscriptions = Arc::clone(&self.subscriptions);
        let processes = Arc::clone(&self.processes);

        tokio::spawn(async move {
            while let Some(env) = inbound.recv().await {
                let source = env.source.clone().unwrap_or_else(|| Arc::clone(&process_id));
                subscriptions.dispatch(&env.message_type, &env.payload, Some(source.as_ref()));
            }

            if processes.remove_if_same_channel(&process_id, &channel).await {
                tracing::debug!(process_id = %process_id, "child channel closed; registration purged");
            }
        });
    }
}

impl Default for ProcessBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ProcessBus {
    fn subscribe(
        &self,
        message_type: &str,
        mode: ListenerMode,
        listener: RawListener,
    ) -> Subscription {
        self.subscriptions.subscribe(message_type, mode, listener)
    }

    async fn broadcast_value(&self, message_type: &str, payload: Value) {
        let targets = self.processes.fanout_snapshot().await;
        let env = Envelope::new(message_type, payload);

        for (process_id, channel) in targets {
            if channel.send(env.clone()).await.is_err() {
                tracing::warn!(process_id = %process_id, "broadcast dropped: channel closed");
                self.processes
                    .remove_if_same_channel(&process_id, &channel)
                    .await;
            }
        }

        self.subscriptions.dispatch(&env.message_type, &env.payload, None);
    }

    async fn broadcast_from_value(&self, message_type: &str, payload: Value, process_id: &str) {
        let targets = self.processes.fanout_snapshot().await;
        let env = Envelope::new(message_type, payload).with_source(process_id);

        for (target_id, channel) in targets {
            // The originator already saw its own message; only relay outward.
            if &*target_id == process_id {
                continue;
            }
            if channel.send(env.clone()).await.is_err() {
                tracing::warn!(process_id = %target_id, "broadcast dropped: channel closed");
                self.processes
                    .remove_if_same_channel(&target_id, &channel)
                    .await;
            }
        }

        self.subscriptions
            .dispatch(&env.message_type, &env.payload, env.source_str());
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
        if target == MAIN_PROCESS {
            self.subscriptions.dispatch(message_type, &payload, None);
            return Ok(());
        }

        let link = self.processes.resolve(target).await.ok_or_else(|| {
            TransportError::DestinationNotFound {
                process_id: target.to_string(),
            }
        })?;

        let env = Envelope::new(message_type, payload);
        if link.outbound.send(env).await.is_err() {
            self.processes
                .remove_if_same_channel(target, &link.outbound)
                .await;
            return Err(TransportError::ChannelClosed {
                process_id: target.to_string(),
            });
        }
        Ok(())
    }

    async fn register_child(&self, process_id: &str, handle: ChildHandle) {
        let process_id: Arc<str> = process_id.into();
        let ChildHandle {
            outbound,
            inbound,
            stdio,
        } = handle;

        self.processes
            .register(
                Arc::clone(&process_id),
                ChildLink {
                    outbound: outbound.clone(),
                    stdio,
                },
            )
            .await;
        self.spawn_relay(process_id, outbound, inbound);
    }

    async fn remove_child(&self, process_id: &str) -> bool {
        self.processes.remove(process_id).await
    }

    async fn processes(&self) -> Vec<Arc<str>> {
        self.processes.list().await
    }

    async fn stdio_configs(&self) -> Vec<WorkerStdio> {
        self.processes.stdio_snapshot().await
    }
}
