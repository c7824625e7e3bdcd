//! # Channel handles: the owned endpoint per worker.
//!
//! A [`ChildHandle`] is the orchestrator's half of one worker's duplex
//! channel plus the worker's stdio descriptor. Each handle is exclusively
//! owned: registering it moves it into the bus, which keeps the outbound
//! sender in the process registry and feeds the inbound receiver to a relay
//! task. Removing or replacing the entry destroys that ownership link; there
//! is never a shared channel with ambiguous lifetime.
//!
//! Two constructors cover both deployment shapes:
//! - [`ChildHandle::in_memory`] pairs the handle with a [`ChildEndpoint`] for
//!   a worker living in the same process (tests, single-process mode);
//! - [`ChildHandle::from_io`] adapts a spawned child's pipes through the wire
//!   codec.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::config::TransportConfig;
use crate::envelope::Envelope;
use crate::wire;

use super::stdio::StdioConfig;

/// Orchestrator-side endpoint of one worker's duplex channel.
pub struct ChildHandle {
    pub(crate) outbound: mpsc::Sender<Envelope>,
    pub(crate) inbound: mpsc::Receiver<Envelope>,
    pub(crate) stdio: StdioConfig,
}

/// Worker-side endpoint of an in-memory duplex channel.
///
/// Feed it to [`WorkerBus::new`](crate::WorkerBus::new) inside the worker.
pub struct ChildEndpoint {
    pub(crate) to_parent: mpsc::Sender<Envelope>,
    pub(crate) from_parent: mpsc::Receiver<Envelope>,
}

impl ChildHandle {
    /// Creates a matched in-memory handle/endpoint pair.
    ///
    /// FIFO holds per direction; capacity comes from
    /// [`TransportConfig::channel_capacity`].
    pub fn in_memory(stdio: StdioConfig, config: &TransportConfig) -> (ChildHandle, ChildEndpoint) {
        let capacity = config.channel_capacity_clamped();
        let (to_child, from_parent) = mpsc::channel::<Envelope>(capacity);
        let (to_parent, from_child) = mpsc::channel::<Envelope>(capacity);

        let handle = ChildHandle {
            outbound: to_child,
            inbound: from_child,
            stdio,
        };
        let endpoint = ChildEndpoint {
            to_parent,
            from_parent,
        };
        (handle, endpoint)
    }

    /// Adapts a raw read/write pair (a spawned child's pipes) into a handle.
    ///
    /// The codec tasks this spawns terminate on their own when either side of
    /// the I/O pair closes or a framing fault kills the channel.
    pub fn from_io<R, W>(reader: R, writer: W, stdio: StdioConfig, config: &TransportConfig) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let link = wire::spawn_io_link(reader, writer, config);
        Self {
            outbound: link.outbound,
            inbound: link.inbound,
            stdio,
        }
    }

    /// The worker's stream wiring.
    pub fn stdio(&self) -> StdioConfig {
        self.stdio
    }
}

impl std::fmt::Debug for ChildHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildHandle")
            .field("stdio", &self.stdio)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_in_memory_pair_is_connected_both_ways() {
        let cfg = TransportConfig::default();
        let (mut handle, mut endpoint) = ChildHandle::in_memory(StdioConfig::Piped, &cfg);

        handle
            .outbound
            .send(Envelope::new("to-child", json!(1)))
            .await
            .unwrap();
        let got = endpoint.from_parent.recv().await.unwrap();
        assert_eq!(&*got.message_type, "to-child");

        endpoint
            .to_parent
            .send(Envelope::new("to-parent", json!(2)))
            .await
            .unwrap();
        let got = handle.inbound.recv().await.unwrap();
        assert_eq!(&*got.message_type, "to-parent");
    }
}
