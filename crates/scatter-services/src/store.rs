//! Content store seam and the peer pool.
//!
//! A peer is reached only through [`ContentStore`]: put bytes, get a content
//! id back; get by content id. Everything else about the peer (process
//! lifecycle, transport, retries) lives behind the trait.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use scatter_core::{ContentId, PeerId, ShardError, StoreError};

/// A peer's content-addressed storage.
///
/// All implementations must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store bytes, returning the id they can be fetched under.
    async fn put(&self, data: Bytes) -> Result<ContentId, StoreError>;

    /// Fetch the bytes stored under `id`.
    async fn get(&self, id: &ContentId) -> Result<Bytes, StoreError>;
}

/// The ordered peer pool for one plan/publish/reassemble cycle.
///
/// Order matters: the planner assigns peers by ordinal, so the same ids in
/// the same order must be supplied to every party that recomputes placement.
#[derive(Clone, Default)]
pub struct PeerPool {
    order: Vec<PeerId>,
    stores: HashMap<PeerId, Arc<dyn ContentStore>>,
}

impl PeerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from `(id, store)` pairs in pool order.
    pub fn from_peers<I>(peers: I) -> Result<Self, ShardError>
    where
        I: IntoIterator<Item = (PeerId, Arc<dyn ContentStore>)>,
    {
        let mut pool = Self::new();
        for (id, store) in peers {
            pool.add(id, store)?;
        }
        Ok(pool)
    }

    /// Append a peer. Ids must be unique within the pool.
    pub fn add(&mut self, id: PeerId, store: Arc<dyn ContentStore>) -> Result<(), ShardError> {
        if self.stores.contains_key(&id) {
            return Err(ShardError::InvalidConfiguration(format!(
                "duplicate peer id {id}"
            )));
        }
        self.order.push(id.clone());
        self.stores.insert(id, store);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Peer ids in pool order.
    pub fn ids(&self) -> &[PeerId] {
        &self.order
    }

    /// Peer id at a pool ordinal.
    pub fn peer_at(&self, ordinal: usize) -> Option<&PeerId> {
        self.order.get(ordinal)
    }

    /// Store client for a peer id.
    pub fn store(&self, id: &PeerId) -> Option<&Arc<dyn ContentStore>> {
        self.stores.get(id)
    }
}

impl std::fmt::Debug for PeerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerPool").field("peers", &self.order).finish()
    }
}

/// Bound a single peer call by `limit`.
pub(crate) async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}
