//! Subscription side of the bus: listener records and the per-process registry.
//!
//! This module groups the listener **data model** and the **registry** that
//! dispatches envelopes to matching listeners within one process.
//!
//! ## Contents
//! - [`ListenerMode`], [`RawListener`] listener classification and callback shape
//! - [`SubscriptionRegistry`] message type → ordered listener records, with a
//!   single mode-matching `dispatch`
//! - [`Subscription`] explicit unsubscribe handle
//!
//! ## Quick reference
//! - **Writers**: `on`/`once`/`once_from` on the bus and worker stub.
//! - **Readers**: local dispatch (`broadcast_local`, `send` to self) and the
//!   per-child relay feeding inbound envelopes into the same path.

mod entry;
mod registry;
mod subscription;

pub use entry::{ListenerMode, RawListener};
pub use subscription::Subscription;

pub(crate) use entry::typed_listener;
pub(crate) use registry::SubscriptionRegistry;
