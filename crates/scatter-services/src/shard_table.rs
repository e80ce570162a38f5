//! ShardInfo table: ingests placement announcements from the broadcast
//! channel.
//!
//! The first valid ShardInfo seen for a shard index wins; later deliveries
//! for the same index are ignored, so redelivery and duplicate announcements
//! are harmless. Messages that fail to decode are logged and dropped.

use std::sync::Arc;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use scatter_core::{PeerId, ShardError, ShardInfo};

use crate::broadcast::MessageHandler;

#[derive(Clone, Default)]
pub struct ShardTable {
    shards: Arc<DashMap<u32, ShardInfo>>,
}

impl ShardTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a ShardInfo. Returns false if one was already held for its index.
    pub fn insert(&self, info: ShardInfo) -> bool {
        match self.shards.entry(info.shard_index) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(info);
                true
            }
        }
    }

    /// Decode one broadcast message and insert it.
    pub fn ingest(&self, bytes: &[u8], sender: &PeerId) -> Result<bool, ShardError> {
        let info = ShardInfo::decode(bytes)?;
        let shard = info.shard_index;
        let inserted = self.insert(info);
        if inserted {
            tracing::info!(shard, %sender, "shard info received");
        } else {
            tracing::debug!(shard, %sender, "duplicate shard info ignored");
        }
        Ok(inserted)
    }

    /// Subscription callback feeding this table.
    pub fn handler(&self) -> MessageHandler {
        let table = self.clone();
        Arc::new(move |bytes: Bytes, sender: PeerId| {
            if let Err(e) = table.ingest(&bytes, &sender) {
                tracing::warn!(%sender, error = %e, "dropping undecodable shard info");
            }
        })
    }

    pub fn get(&self, shard_index: u32) -> Option<ShardInfo> {
        self.shards.get(&shard_index).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// All held ShardInfos, sorted by shard index.
    pub fn snapshot(&self) -> Vec<ShardInfo> {
        let mut infos: Vec<ShardInfo> = self.shards.iter().map(|e| e.value().clone()).collect();
        infos.sort_by_key(|info| info.shard_index);
        infos
    }
}
