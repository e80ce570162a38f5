//! In-memory content store.
//!
//! Content ids are the hex BLAKE3 of the stored bytes. The store can be
//! taken offline, slowed down, or have an object corrupted in place, which
//! is how peer failures are simulated in tests and in the driver.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use scatter_core::crypto::hash;
use scatter_core::{ContentId, StoreError};

use crate::store::ContentStore;

/// Content-addressed store backed by a `DashMap`.
pub struct MemoryStore {
    objects: DashMap<ContentId, Bytes>,
    available: AtomicBool,
    latency_ms: AtomicU64,
    gets: AtomicU64,
    puts: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            available: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
            gets: AtomicU64::new(0),
            puts: AtomicU64::new(0),
        }
    }

    /// Take the store offline (`false`) or bring it back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Flip the first byte of a stored object. Returns false if absent or empty.
    pub fn corrupt(&self, id: &ContentId) -> bool {
        match self.objects.get_mut(id) {
            Some(mut entry) if !entry.is_empty() => {
                let mut bytes = entry.to_vec();
                bytes[0] ^= 0xFF;
                *entry = Bytes::from(bytes);
                true
            }
            _ => false,
        }
    }

    /// Drop a stored object.
    pub fn remove(&self, id: &ContentId) -> bool {
        self.objects.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of `get` calls received, including failed ones.
    pub fn get_count(&self) -> u64 {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `put` calls received, including failed ones.
    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<(), StoreError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("peer offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn put(&self, data: Bytes) -> Result<ContentId, StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        let id = ContentId::new(hex::encode(hash(&data)));
        tracing::trace!(content_id = %id, size = data.len(), "storing object in memory");
        self.objects.entry(id.clone()).or_insert(data);
        Ok(id)
    }

    async fn get(&self, id: &ContentId) -> Result<Bytes, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        self.objects
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}
