//! # Message envelope: the unit of transport.
//!
//! An [`Envelope`] is the `(type, payload, source)` tuple exchanged between
//! the orchestrator and its workers:
//!
//! - `message_type`: opaque string channel name; nothing is pre-declared and
//!   no schema validation happens at this layer.
//! - `payload`: arbitrary serialized value ([`serde_json::Value`]); the
//!   transport never interprets its structure.
//! - `source`: id of the originating process. Absent for traffic that never
//!   crossed a process boundary; populated for worker-to-parent deliveries and
//!   for anything relayed via `broadcast_from`.
//!
//! Envelopes are `serde`-serializable; the wire form is one JSON object per
//! newline-delimited frame.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `(type, payload, source)` tuple carried over every channel.
///
/// Cheap to clone: the type and source are `Arc<str>`, the payload is a
/// `serde_json::Value` (cloned per fan-out target).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// Opaque message-type string (the pub/sub channel name).
    #[serde(rename = "type")]
    pub message_type: Arc<str>,

    /// Uninterpreted payload value.
    pub payload: Value,

    /// Originating process id, if the message crossed a process boundary or
    /// was explicitly tagged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Arc<str>>,
}

impl Envelope {
    /// Creates an untagged envelope (no source).
    pub fn new(message_type: impl Into<Arc<str>>, payload: Value) -> Self {
        Self {
            message_type: message_type.into(),
            payload,
            source: None,
        }
    }

    /// Attaches the originating process id.
    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Source id as a borrowed `&str`, if tagged.
    #[inline]
    pub fn source_str(&self) -> Option<&str> {
        self.source.as_deref()
    }
}
