//! In-process peers: one content store and one ShardTable per node.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use scatter_core::PeerId;
use scatter_services::{
    BroadcastChannel, BroadcastHub, ContentStore, DirStore, MemoryStore, PeerPool, ShardTable,
};

/// A started node: its id and the ShardInfos it has heard about.
pub struct LocalNode {
    pub id: PeerId,
    pub table: ShardTable,
}

/// Start `count` nodes, subscribe each to `topic`, and return them with the pool.
///
/// With a storage root, node `i` keeps its objects under `{root}/node{i}`;
/// otherwise nodes are memory-only.
pub fn start_nodes(
    count: usize,
    hub: &BroadcastHub,
    topic: &str,
    storage_root: Option<&Path>,
) -> Result<(PeerPool, Vec<LocalNode>)> {
    let mut pool = PeerPool::new();
    let mut nodes = Vec::with_capacity(count);

    for i in 0..count {
        let id = PeerId::new(format!("node{i}"));
        let store: Arc<dyn ContentStore> = match storage_root {
            Some(root) => {
                let dir = root.join(format!("node{i}"));
                Arc::new(
                    DirStore::new(&dir)
                        .with_context(|| format!("failed to open store: {}", dir.display()))?,
                )
            }
            None => Arc::new(MemoryStore::new()),
        };
        pool.add(id.clone(), store)?;

        let table = ShardTable::new();
        hub.join(id.clone())
            .subscribe(topic, table.handler())
            .with_context(|| format!("node {id} failed to subscribe to {topic}"))?;

        tracing::info!(peer = %id, "node started");
        nodes.push(LocalNode { id, table });
    }

    Ok((pool, nodes))
}
