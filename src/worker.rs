//! # Worker-side stub.
//!
//! [`WorkerBus`] runs inside each worker process. It mirrors the
//! orchestrator's subscription API against messages arriving from the parent
//! and routes outbound messages to the parent only: workers cannot address
//! each other directly, all inter-worker traffic is relayed through the
//! orchestrator via `broadcast_from`.
//!
//! Inbound envelopes are delivered to local listeners exactly as a local
//! broadcast would deliver them, preserving the `source` field if present.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::config::TransportConfig;
use crate::envelope::Envelope;
use crate::error::TransportError;
use crate::registry::ChildEndpoint;
use crate::subscriptions::{typed_listener, ListenerMode, Subscription, SubscriptionRegistry};
use crate::transport::MAIN_PROCESS;
use crate::wire;

/// Transport stub held by a worker process.
///
/// Created once per worker and held as process-wide state, like
/// [`ProcessBus`](crate::ProcessBus) on the orchestrator side.
pub struct WorkerBus {
    subscriptions: Arc<SubscriptionRegistry>,
    to_parent: mpsc::Sender<Envelope>,
}

impl WorkerBus {
    /// Builds the stub over an in-memory endpoint (same-process worker).
    ///
    /// Spawns the pump that feeds inbound envelopes into local dispatch; the
    /// pump ends when the parent side closes.
    pub fn new(endpoint: ChildEndpoint) -> Self {
        let ChildEndpoint {
            to_parent,
            from_parent,
        } = endpoint;
        let bus = Self {
            subscriptions: SubscriptionRegistry::new(),
            to_parent,
        };
        bus.spawn_pump(from_parent);
        bus
    }

    /// Builds the stub over the worker's raw channel to the parent
    /// (typically its own stdio or an IPC pipe pair).
    pub fn over_io<R, W>(reader: R, writer: W, config: &TransportConfig) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let link = wire::spawn_io_link(reader, writer, config);
        let bus = Self {
            subscriptions: SubscriptionRegistry::new(),
            to_parent: link.outbound,
        };
        bus.spawn_pump(link.inbound);
        bus
    }

    fn spawn_pump(&self, mut from_parent: mpsc::Receiver<Envelope>) {
        let subscriptions = Arc::clone(&self.subscriptions);
        tokio::spawn(async move {
            while let Some(env) = from_parent.recv().await {
                subscriptions.dispatch(&env.message_type, &env.payload, env.source_str());
            }
            tracing::debug!("parent channel closed; worker inbound pump stopped");
        });
    }

    /// Persistent subscription to messages arriving from the parent.
    pub fn on<T, F>(&self, message_type: &str, listener: F) -> Subscription
    where
        T: DeserializeOwned,
        F: Fn(T, Option<&str>) + Send + Sync + 'static,
    {
        self.subscriptions.subscribe(
            message_type,
            ListenerMode::Persistent,
            typed_listener(message_type.into(), listener),
        )
    }

    /// One-shot subscription; fires at most once.
    pub fn once<T, F>(&self, message_type: &str, listener: F) -> Subscription
    where
        T: DeserializeOwned,
        F: Fn(T, Option<&str>) + Send + Sync + 'static,
    {
        self.subscriptions.subscribe(
            message_type,
            ListenerMode::Once,
            typed_listener(message_type.into(), listener),
        )
    }

    /// One-shot subscription filtered by originating process id.
    pub fn once_from<T, F>(&self, process_id: &str, message_type: &str, listener: F) -> Subscription
    where
        T: DeserializeOwned,
        F: Fn(T, Option<&str>) + Send + Sync + 'static,
    {
        self.subscriptions.subscribe(
            message_type,
            ListenerMode::OnceFrom(process_id.into()),
            typed_listener(message_type.into(), listener),
        )
    }

    /// Sends a message to the parent. Completes on handoff to the channel.
    ///
    /// The parent's relay tags the delivery with this worker's registered id;
    /// the stub itself does not know (or need to know) its own id.
    ///
    /// # Errors
    /// - [`TransportError::Payload`] if the payload cannot be serialized.
    /// - [`TransportError::ChannelClosed`] if the parent channel is gone.
    pub async fn send<T>(&self, message_type: &str, payload: &T) -> Result<(), TransportError>
    where
        T: Serialize,
    {
        let value = serde_json::to_value(payload)?;
        self.to_parent
            .send(Envelope::new(message_type, value))
            .await
            .map_err(|_| TransportError::ChannelClosed {
                process_id: MAIN_PROCESS.to_string(),
            })
    }

    /// Delivers to this worker's local listeners only.
    pub async fn broadcast_local<T>(
        &self,
        message_type: &str,
        payload: &T,
    ) -> Result<(), TransportError>
    where
        T: Serialize,
    {
        let value = serde_json::to_value(payload)?;
        self.subscriptions.dispatch(message_type, &value, None);
        Ok(())
    }
}
