//! Error types produced by the transport.
//!
//! A single [`TransportError`] enum covers the failure taxonomy of the bus:
//!
//! - [`TransportError::DestinationNotFound`] — directed `send` to an id that
//!   is not (or no longer) registered.
//! - [`TransportError::ChannelClosed`] — the owned channel to a worker died
//!   mid-operation; the registry entry is purged by the caller.
//! - [`TransportError::Payload`] — the payload could not be serialized into
//!   the envelope value form.
//! - [`TransportError::Frame`] — malformed framing on a worker channel; fatal
//!   to that one channel, never to the process.
//!
//! `as_label()` provides short stable labels for logs/metrics.

use thiserror::Error;

/// Errors surfaced by transport operations.
///
/// Only `send` (and typed serialization wrappers) surface errors to callers;
/// broadcast paths are fire-and-forget per channel and resolve delivery
/// failures internally by purging the dead registry entry.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TransportError {
    /// Directed `send` targeted a process id absent from the registry.
    #[error("destination process not found: {process_id}")]
    DestinationNotFound {
        /// The id that failed to resolve.
        process_id: String,
    },

    /// The channel to the destination closed before handoff completed.
    #[error("channel to process '{process_id}' is closed")]
    ChannelClosed {
        /// The id whose channel died.
        process_id: String,
    },

    /// Payload serialization into the envelope value form failed.
    #[error("payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),

    /// A frame read off a worker channel could not be decoded.
    #[error("malformed frame on worker channel: {detail}")]
    Frame {
        /// Human-readable description of the framing fault.
        detail: String,
    },
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use procbus::TransportError;
    ///
    /// let err = TransportError::DestinationNotFound { process_id: "w1".into() };
    /// assert_eq!(err.as_label(), "destination_not_found");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::DestinationNotFound { .. } => "destination_not_found",
            TransportError::ChannelClosed { .. } => "channel_closed",
            TransportError::Payload(_) => "payload_serialization",
            TransportError::Frame { .. } => "malformed_frame",
        }
    }

    /// True if the error indicates the destination is gone (unknown or dead).
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            TransportError::DestinationNotFound { .. } | TransportError::ChannelClosed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        let e = TransportError::ChannelClosed {
            process_id: "w1".into(),
        };
        assert_eq!(e.as_label(), "channel_closed");

        let e = TransportError::Frame {
            detail: "not json".into(),
        };
        assert_eq!(e.as_label(), "malformed_frame");
    }

    #[test]
    fn test_unreachable_covers_lookup_and_channel() {
        let missing = TransportError::DestinationNotFound {
            process_id: "ghost".into(),
        };
        let closed = TransportError::ChannelClosed {
            process_id: "w1".into(),
        };
        assert!(missing.is_unreachable());
        assert!(closed.is_unreachable());

        let bad: TransportError = serde_json::from_str::<serde_json::Value>("{")
            .map_err(TransportError::from)
            .unwrap_err();
        assert!(!bad.is_unreachable());
    }
}
