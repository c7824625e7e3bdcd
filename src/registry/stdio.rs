//! Standard-stream wiring descriptors for worker processes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// How a worker's standard streams are wired.
///
/// Read-only metadata, fixed when the worker is registered; the registry never
/// re-wires streams. Callers use it to decide whether readers/writers can be
/// attached to the worker's output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdioConfig {
    /// Streams are piped to the orchestrator (log forwarding possible).
    #[default]
    Piped,
    /// Streams are inherited from the orchestrator's terminal.
    Inherit,
    /// Streams are discarded.
    Ignore,
}

/// One entry of the stdio snapshot returned by `stdio_configs`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerStdio {
    /// The worker this descriptor belongs to.
    pub process_id: Arc<str>,
    /// Its stream wiring.
    pub stdio: StdioConfig,
}
