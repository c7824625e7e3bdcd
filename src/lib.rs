//! # procbus
//!
//! **procbus** is the message-passing fabric for a multi-process test-runner:
//! a main orchestrator drives test runs and delegates execution to a pool of
//! worker processes; this crate lets them exchange typed events reliably,
//! address individual workers, and observe channel lifecycle — while the
//! surrounding CLI stays a thin shell on top.
//!
//! ## Architecture
//! ```text
//!  orchestrator process                         worker process "w1"
//! ┌──────────────────────────────────────┐     ┌───────────────────────────┐
//! │ scheduler / logger / recorder        │     │ test executor             │
//! │   │ on/once/once_from  │ send/bcast  │     │   │ on/once   │ send      │
//! │   ▼                    ▼             │     │   ▼           ▼           │
//! │ ┌──────────────┐  ┌───────────────┐  │     │ ┌───────────────────────┐ │
//! │ │ Subscription │  │ ProcessBus    │  │     │ │ WorkerBus (stub)      │ │
//! │ │ Registry     │◄─┤  - registry   │  │     │ │  - local listeners    │ │
//! │ └──────────────┘  │  - relays     │  │     │ │  - send → parent only │ │
//! │        ▲          └──────┬────────┘  │     │ └───────────┬───────────┘ │
//! │        │ relay (per child)│          │     │             │             │
//! └────────┼──────────────────┼──────────┘     └─────────────┼─────────────┘
//!          │                  ▼                              │
//!          │      owned channel per worker  ◄────────────────┘
//!          └──────  (in-memory pair, or wire-framed pipes)
//! ```
//!
//! Delivery resolves transparently: callers never reason about whether a
//! listener is local or remote. Workers cannot address each other; the
//! orchestrator relays inter-worker traffic with
//! [`broadcast_from`](Transport::broadcast_from), which tags every delivery
//! with the originating worker's id and skips the originator.
//!
//! ## Surfaces
//! | Area            | Description                                              | Key types                       |
//! |-----------------|----------------------------------------------------------|---------------------------------|
//! | **Contract**    | Typed pub/sub + directed send + broadcast.               | [`Transport`]                   |
//! | **Production**  | Cross-process routing over owned per-worker channels.    | [`ProcessBus`], [`ChildHandle`] |
//! | **Worker side** | Same subscription API inside the worker.                 | [`WorkerBus`], [`ChildEndpoint`]|
//! | **Testing**     | Identical contract, local delivery only.                 | [`MemoryBus`]                   |
//! | **Data model**  | `(type, payload, source)` unit of transport.             | [`Envelope`]                    |
//! | **Errors**      | Typed failure taxonomy with stable labels.               | [`TransportError`]              |
//!
//! ## Guarantees
//! - FIFO per channel; no ordering across channels.
//! - `send` completes on handoff to the destination channel, not on remote
//!   processing; unknown destinations fail, they are never silently dropped.
//! - One-shot subscriptions fire exactly once; source-filtered one-shots
//!   ignore other sources without consuming their slot.
//! - Unsubscribing takes effect immediately, even mid-dispatch.
//! - A listener panic never reaches the emitter and never starves other
//!   listeners of the same delivery.
//! - Malformed framing kills that one worker's channel, not the process.
//!
//! ## Example
//! ```rust
//! use procbus::{ChildHandle, ProcessBus, StdioConfig, Transport, TransportConfig, WorkerBus};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = ProcessBus::new();
//!     let cfg = TransportConfig::default();
//!
//!     // Spawn-side wiring: one handle per worker. In production the pair
//!     // comes from the spawned child's pipes via `ChildHandle::from_io`.
//!     let (handle, endpoint) = ChildHandle::in_memory(StdioConfig::Piped, &cfg);
//!     bus.register_child("w1", handle).await;
//!     let worker = WorkerBus::new(endpoint);
//!
//!     let _progress = bus.on::<serde_json::Value, _>("progress", |payload, source| {
//!         println!("progress from {source:?}: {payload}");
//!     });
//!
//!     worker.send("progress", &serde_json::json!({ "pct": 50 })).await?;
//!     bus.send("w1", "run-test", &"login.spec.js").await?;
//!     Ok(())
//! }
//! ```

mod config;
mod envelope;
mod error;
mod mock;
mod registry;
mod subscriptions;
mod transport;
mod wire;
mod worker;

// ---- Public re-exports ----

pub use config::{TransportConfig, DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_FRAME_LEN};
pub use envelope::Envelope;
pub use error::TransportError;
pub use mock::MemoryBus;
pub use registry::{ChildEndpoint, ChildHandle, StdioConfig, WorkerStdio};
pub use subscriptions::{ListenerMode, RawListener, Subscription};
pub use transport::{ProcessBus, Transport, MAIN_PROCESS};
pub use worker::WorkerBus;
