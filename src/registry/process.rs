//! # Process registry: worker id → live channel link.
//!
//! Lifecycle bookkeeping only. The registry stores each worker's outbound
//! sender and stdio descriptor; it never closes channels itself (whether a
//! worker is being retired or merely lost its channel is the orchestration
//! layer's call).
//!
//! ## Rules
//! - Ids are caller-assigned and unique among live workers; registering an
//!   existing id replaces the prior mapping without tearing it down.
//! - `resolve` never returns a link for an id absent from `list`.
//! - `remove_if_same_channel` lets relay tasks purge only the generation of
//!   the entry they belong to, so a stale relay cannot evict a replacement.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::envelope::Envelope;

use super::stdio::{StdioConfig, WorkerStdio};

/// What the registry keeps per worker: outbound sender plus stdio metadata.
#[derive(Clone)]
pub(crate) struct ChildLink {
    pub(crate) outbound: mpsc::Sender<Envelope>,
    pub(crate) stdio: StdioConfig,
}

/// Table of currently live workers.
pub(crate) struct ProcessRegistry {
    links: RwLock<HashMap<Arc<str>, ChildLink>>,
}

impl ProcessRegistry {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            links: RwLock::new(HashMap::new()),
        })
    }

    /// Binds a link under `process_id`, replacing any prior mapping.
    pub(crate) async fn register(&self, process_id: Arc<str>, link: ChildLink) {
        let mut links = self.links.write().await;
        if links.insert(Arc::clone(&process_id), link).is_some() {
            tracing::debug!(process_id = %process_id, "replaced existing child registration");
        }
    }

    /// Looks up the live link for `process_id`.
    pub(crate) async fn resolve(&self, process_id: &str) -> Option<ChildLink> {
        self.links.read().await.get(process_id).cloned()
    }

    /// Sorted snapshot of live worker ids.
    pub(crate) async fn list(&self) -> Vec<Arc<str>> {
        let links = self.links.read().await;
        let mut ids: Vec<Arc<str>> = links.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Snapshot of `(id, outbound sender)` pairs for fan-out.
    ///
    /// Workers registered after the snapshot do not receive the broadcast the
    /// snapshot was taken for.
    pub(crate) async fn fanout_snapshot(&self) -> Vec<(Arc<str>, mpsc::Sender<Envelope>)> {
        let links = self.links.read().await;
        links
            .iter()
            .map(|(id, link)| (Arc::clone(id), link.outbound.clone()))
            .collect()
    }

    /// Snapshot of stdio descriptors, sorted by worker id.
    pub(crate) async fn stdio_snapshot(&self) -> Vec<WorkerStdio> {
        let links = self.links.read().await;
        let mut entries: Vec<WorkerStdio> = links
            .iter()
            .map(|(id, link)| WorkerStdio {
                process_id: Arc::clone(id),
                stdio: link.stdio,
            })
            .collect();
        entries.sort_unstable_by(|a, b| a.process_id.cmp(&b.process_id));
        entries
    }

    /// Detaches bookkeeping for `process_id`. Does not close the channel.
    pub(crate) async fn remove(&self, process_id: &str) -> bool {
        self.links.write().await.remove(process_id).is_some()
    }

    /// Removes the entry only if it still refers to the given channel.
    ///
    /// Used on channel-closed cleanup: if the id was re-registered with a new
    /// channel in the meantime, the entry stays.
    pub(crate) async fn remove_if_same_channel(
        &self,
        process_id: &str,
        channel: &mpsc::Sender<Envelope>,
    ) -> bool {
        let mut links = self.links.write().await;
        match links.get(process_id) {
            Some(link) if link.outbound.same_channel(channel) => {
                links.remove(process_id);
                true
            }
            _ => false,
        }
    }
}
