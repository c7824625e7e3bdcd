//! # Demo: pool_fanout
//!
//! Minimal orchestrator/worker wiring over in-memory channels.
//!
//! Demonstrates how to:
//! - Attach two workers with [`ChildHandle::in_memory`] + [`WorkerBus::new`].
//! - Collect worker reports on the orchestrator with [`Transport::on`].
//! - Relay reports to the rest of the pool with [`Transport::broadcast_from`]
//!   (the originator is excluded, every delivery is tagged with its id).
//! - Wait for a specific worker with [`Transport::once_from`].
//!
//! ## Flow
//! ```text
//! w1 ── send("report") ──► ProcessBus relay (tags source = "w1")
//!                             └─► "report" listener on main
//!                                   └─► broadcast_from("progress", .., "w1")
//!                                         └─► w2 only (w1 is the originator)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example pool_fanout
//! ```

use std::time::Duration;

use procbus::{ChildHandle, ProcessBus, StdioConfig, Transport, TransportConfig, WorkerBus};
use serde_json::{json, Value};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let bus = ProcessBus::new();
    let cfg = TransportConfig::default();

    // 1. Attach two workers. In production each pair would come from a
    //    spawned child's pipes via `ChildHandle::from_io`.
    let (h1, e1) = ChildHandle::in_memory(StdioConfig::Piped, &cfg);
    let (h2, e2) = ChildHandle::in_memory(StdioConfig::Piped, &cfg);
    bus.register_child("w1", h1).await;
    bus.register_child("w2", h2).await;
    let w1 = WorkerBus::new(e1);
    let w2 = WorkerBus::new(e2);

    println!("[main] pool: {:?}", Transport::processes(&bus).await);

    // 2. The orchestrator turns every worker report into a pool-wide
    //    progress update. The reporting worker does not get its own echo.
    let relay = bus.clone();
    let _reports = bus.on::<Value, _>("report", move |payload, source| {
        let Some(origin) = source.map(str::to_string) else {
            return;
        };
        println!("[main] report from {origin}: {payload}");
        let relay = relay.clone();
        tokio::spawn(async move {
            let _ = relay.broadcast_from("progress", &payload, &origin).await;
        });
    });

    // 3. w2 watches its peers through the relay.
    let _peer = w2.on::<Value, _>("progress", |payload, source| {
        println!("[w2] peer {source:?} reports {payload}");
    });

    // 4. The orchestrator waits for w1 to finish, and only w1.
    let _done = bus.once_from::<Value, _>("w1", "done", |_, _| {
        println!("[main] w1 is done");
    });

    w1.send("report", &json!({ "pct": 50 })).await?;
    w1.send("report", &json!({ "pct": 100 })).await?;
    w1.send("done", &json!(null)).await?;

    // Let the relays drain before exiting the demo.
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
