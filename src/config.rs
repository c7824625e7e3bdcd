//! # Transport configuration.
//!
//! [`TransportConfig`] centralizes the knobs shared by channel handles and the
//! wire codec. It is consumed at handle construction time
//! ([`ChildHandle::in_memory`](crate::ChildHandle::in_memory),
//! [`ChildHandle::from_io`](crate::ChildHandle::from_io),
//! [`WorkerBus::over_io`](crate::WorkerBus::over_io)); the bus itself carries
//! no configuration.
//!
//! ## Sentinel values
//! - `channel_capacity = 0` → clamped to 1 (a channel must hold at least one
//!   in-flight envelope)
//! - `max_frame_len = 0` → clamped to the default frame limit

use std::time::Duration;

/// Default per-worker channel capacity (in-flight envelopes).
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default maximum wire frame length in bytes (1 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Configuration for worker channels and wire framing.
///
/// ## Field semantics
/// - `channel_capacity`: bounded queue depth of each per-worker channel, in
///   both directions. Senders suspend when the queue is full (backpressure,
///   preserving FIFO per channel).
/// - `max_frame_len`: hard limit on a single wire frame; frames beyond it are
///   treated as malformed framing and kill that one channel.
/// - `drain_grace`: how long [`ProcessBus::drain`](crate::ProcessBus::drain)
///   waits for queued envelopes to be handed off before giving up.
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Bounded capacity of each per-worker envelope queue (`0` = clamp to 1).
    pub channel_capacity: usize,

    /// Maximum length of one wire frame in bytes (`0` = default limit).
    pub max_frame_len: usize,

    /// Grace window for [`ProcessBus::drain`](crate::ProcessBus::drain) on
    /// shutdown.
    pub drain_grace: Duration,
}

impl TransportConfig {
    /// Channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn channel_capacity_clamped(&self) -> usize {
        self.channel_capacity.max(1)
    }

    /// Frame limit with the `0` sentinel resolved to the default.
    #[inline]
    pub fn max_frame_len_resolved(&self) -> usize {
        if self.max_frame_len == 0 {
            DEFAULT_MAX_FRAME_LEN
        } else {
            self.max_frame_len
        }
    }
}

impl Default for TransportConfig {
    /// Default configuration:
    ///
    /// - `channel_capacity = 1024`
    /// - `max_frame_len = 1 MiB`
    /// - `drain_grace = 5s`
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            drain_grace: Duration::from_secs(5),
        }
    }
}
