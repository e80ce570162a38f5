//! scatterd: shards a payload across an in-process peer pool, announces the
//! placement, and reassembles the payload from what a peer heard.
//!
//! Usage: scatterd [payload-file]

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bytes::Bytes;

use scatter_core::crypto::Digest;
use scatter_core::{PeerId, ScatterConfig};
use scatter_services::{plan, BroadcastChannel, BroadcastHub, Publisher, Reassembler};

mod node;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = ScatterConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = ScatterConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        ScatterConfig::default()
    });
    let sharding = config
        .sharding_config()
        .context("invalid sharding configuration")?;
    let topic = config.broadcast.topic.clone();

    let payload = match std::env::args().nth(1) {
        Some(path) => Bytes::from(
            std::fs::read(&path).with_context(|| format!("failed to read payload: {path}"))?,
        ),
        None => Bytes::from_static(b"Hello, World!"),
    };
    tracing::info!(
        bytes = payload.len(),
        peers = sharding.peer_count,
        replication = sharding.replication_factor,
        "scatterd starting"
    );

    // Peers
    let hub = BroadcastHub::new();
    let (pool, nodes) = node::start_nodes(
        sharding.peer_count,
        &hub,
        &topic,
        config.storage.root.as_deref(),
    )?;

    // Plan and publish
    let shards = plan(&payload, &sharding)?;
    let channel = Arc::new(hub.join(PeerId::new("planner"))) as Arc<dyn BroadcastChannel>;
    let publisher = Publisher::new(pool.clone(), channel, topic, &sharding)?;
    let infos = publisher
        .publish_all(&shards)
        .await
        .context("failed to publish shards")?;
    tracing::info!(shards = infos.len(), "all shards published");

    // Reassemble from what the first node heard over the broadcast channel
    let Some(listener) = nodes.first() else {
        bail!("no nodes started");
    };
    let heard = listener.table.snapshot();
    tracing::info!(peer = %listener.id, shards = heard.len(), "reassembling from broadcast metadata");

    let reassembler = Reassembler::new(pool, &sharding);
    let recovered = reassembler
        .reassemble(&heard, payload.len() as u64)
        .await
        .context("reassembly failed")?;

    if recovered != payload {
        bail!("reassembled payload differs from source");
    }
    tracing::info!(
        bytes = recovered.len(),
        digest = %Digest::of(&recovered).short(),
        "payload reassembled and verified"
    );
    Ok(())
}
