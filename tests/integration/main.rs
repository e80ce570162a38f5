//! Scatter integration test harness.
//!
//! Each test builds its own in-process cluster: N memory stores, a broadcast
//! hub, and one ShardTable per peer subscribed to the sharding topic. Peers
//! are failed and restored through `Outage` guards.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;

use scatter_core::{PeerId, ShardInfo, ShardingConfig};
use scatter_services::{
    plan, BroadcastChannel, BroadcastHub, ContentStore, DirStore, LocalBroadcast, MemoryStore, PeerPool,
    Publisher, Reassembler, ShardTable,
};

mod failures;
mod roundtrip;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const TOPIC: &str = "sharding";

pub const PEER_TIMEOUT: Duration = Duration::from_millis(250);

/// Generate deterministic, non-repeating test data.
pub fn test_data(size: usize) -> Bytes {
    let mut data = Vec::with_capacity(size);
    let mut state: u32 = 0xDEAD_BEEF;
    for _ in 0..size {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        data.push((state >> 16) as u8);
    }
    Bytes::from(data)
}

pub struct Cluster {
    pub config: ShardingConfig,
    pub stores: Vec<Arc<MemoryStore>>,
    pub pool: PeerPool,
    pub hub: BroadcastHub,
    pub tables: Vec<ShardTable>,
    pub planner: Arc<LocalBroadcast>,
    pub publisher: Publisher,
}

impl Cluster {
    pub fn new(shard_size: usize, max_fragment_size: usize, r: usize, n: usize) -> Self {
        let config = ShardingConfig::new(shard_size, max_fragment_size, r, n, PEER_TIMEOUT)
            .expect("valid test config");

        let stores: Vec<Arc<MemoryStore>> = (0..n).map(|_| Arc::new(MemoryStore::new())).collect();
        let pool = PeerPool::from_peers(stores.iter().enumerate().map(|(i, s)| {
            (peer(i), s.clone() as Arc<dyn ContentStore>)
        }))
        .expect("unique peer ids");

        let hub = BroadcastHub::new();
        let tables: Vec<ShardTable> = (0..n)
            .map(|i| {
                let table = ShardTable::new();
                hub.join(peer(i))
                    .subscribe(TOPIC, table.handler())
                    .expect("subscribe");
                table
            })
            .collect();

        let planner = Arc::new(hub.join(PeerId::new("planner")));
        let publisher = Publisher::new(
            pool.clone(),
            planner.clone() as Arc<dyn BroadcastChannel>,
            TOPIC,
            &config,
        )
        .expect("publisher");

        Self {
            config,
            stores,
            pool,
            hub,
            tables,
            planner,
            publisher,
        }
    }

    /// Plan and publish `payload`, returning the announced ShardInfos.
    pub async fn store(&self, payload: &Bytes) -> Result<Vec<ShardInfo>> {
        let shards = plan(payload, &self.config)?;
        Ok(self.publisher.publish_all(&shards).await?)
    }

    pub fn reassembler(&self) -> Reassembler {
        Reassembler::new(self.pool.clone(), &self.config)
    }

    /// Take the given peers offline until the guard drops.
    pub fn outage(&self, peers: &[usize]) -> Outage {
        let stores: Vec<Arc<MemoryStore>> = peers.iter().map(|&p| self.stores[p].clone()).collect();
        for store in &stores {
            store.set_available(false);
        }
        Outage { stores }
    }

    pub fn store_of(&self, id: &PeerId) -> &Arc<MemoryStore> {
        let ordinal = self
            .pool
            .ids()
            .iter()
            .position(|p| p == id)
            .expect("peer in pool");
        &self.stores[ordinal]
    }
}

pub fn peer(i: usize) -> PeerId {
    PeerId::new(format!("node{i}"))
}

// ── Outage guard ──────────────────────────────────────────────────────────

/// Brings peers back online even if the test panics.
pub struct Outage {
    stores: Vec<Arc<MemoryStore>>,
}

impl Drop for Outage {
    fn drop(&mut self) {
        for store in &self.stores {
            store.set_available(true);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_every_peer_hears_every_shard() {
    let cluster = Cluster::new(8, 4, 2, 5);
    let infos = cluster.store(&test_data(30)).await.unwrap();
    assert_eq!(infos.len(), 4);

    for table in &cluster.tables {
        assert_eq!(table.snapshot(), infos);
    }
    assert_eq!(cluster.hub.subscriber_count(TOPIC), 5);
}
