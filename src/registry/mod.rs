//! Process side of the bus: worker bookkeeping and channel handles.
//!
//! Internal modules:
//! - `stdio`: standard-stream wiring descriptors fixed at registration time;
//! - `handle`: the duplex endpoint the orchestrator owns per worker, with
//!   in-memory and raw-I/O constructors;
//! - `process`: the registry mapping worker ids to live channel links.

mod handle;
mod process;
mod stdio;

pub use handle::{ChildEndpoint, ChildHandle};
pub use stdio::{StdioConfig, WorkerStdio};

pub(crate) use process::{ChildLink, ProcessRegistry};
