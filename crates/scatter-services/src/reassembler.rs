//! Reassembler: fetches fragments from their replicas, verifies each shard
//! against its published digest, and stitches shards into the payload.
//!
//! Per shard: `Pending → Fetching → Verified | Failed`.
//!
//! Replicas of one fragment are tried in their listed order and the first
//! successful get wins; later replicas are not contacted. Fragments and
//! shards are fetched concurrently. The output buffer is sized up front and
//! split into one disjoint slice per shard, so shards write without locking;
//! only the state table is shared.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use futures::future::{join_all, try_join_all};

use scatter_core::crypto::verify;
use scatter_core::{FragmentPlacement, ShardError, ShardInfo, ShardingConfig};

use crate::store::{bounded, PeerPool};

/// Reconstruction state of one shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardState {
    Pending,
    Fetching,
    Verified,
    Failed,
}

pub struct Reassembler {
    pool: PeerPool,
    timeout: Duration,
    states: Arc<DashMap<u32, ShardState>>,
}

impl Reassembler {
    pub fn new(pool: PeerPool, config: &ShardingConfig) -> Self {
        Self::with_timeout(pool, config.per_peer_timeout)
    }

    pub fn with_timeout(pool: PeerPool, timeout: Duration) -> Self {
        Self {
            pool,
            timeout,
            states: Arc::new(DashMap::new()),
        }
    }

    /// State of a shard in the most recent reassembly.
    ///
    /// A `Reassembler` tracks one payload reassembly at a time; each
    /// [`reassemble`](Self::reassemble) call starts from a cleared state
    /// table, so concurrent calls on one instance see each other's states.
    /// Use one instance per concurrent reassembly.
    pub fn shard_state(&self, shard: u32) -> Option<ShardState> {
        self.states.get(&shard).map(|s| *s)
    }

    fn set_state(&self, shard: u32, state: ShardState) {
        self.states.insert(shard, state);
    }

    /// Fetch one fragment, trying its replicas in listed order.
    ///
    /// Replica peers are looked up by id in the pool; a peer the pool does
    /// not know counts as unreachable. A replica returning the wrong number
    /// of bytes counts as failed.
    pub async fn fetch_fragment(
        &self,
        shard: u32,
        fragment: &FragmentPlacement,
    ) -> Result<Bytes, ShardError> {
        for replica in &fragment.replicas {
            let Some(store) = self.pool.store(&replica.peer) else {
                tracing::warn!(shard, fragment = fragment.index, peer = %replica.peer, "replica peer not in pool");
                continue;
            };

            match bounded(self.timeout, store.get(&replica.content_id)).await {
                Ok(bytes) if bytes.len() as u64 == fragment.length => {
                    tracing::trace!(shard, fragment = fragment.index, peer = %replica.peer, "fragment fetched");
                    return Ok(bytes);
                }
                Ok(bytes) => {
                    tracing::warn!(
                        shard,
                        fragment = fragment.index,
                        peer = %replica.peer,
                        expected = fragment.length,
                        got = bytes.len(),
                        "replica returned wrong length"
                    );
                }
                Err(e) => {
                    tracing::warn!(shard, fragment = fragment.index, peer = %replica.peer, error = %e, "replica fetch failed");
                }
            }
        }

        Err(ShardError::FragmentUnrecoverable {
            shard,
            fragment: fragment.index,
        })
    }

    /// Reconstruct and verify a single shard.
    pub async fn reassemble_shard(&self, info: &ShardInfo) -> Result<Bytes, ShardError> {
        info.validate()?;
        let mut buf = vec![0u8; info.length as usize];
        self.reassemble_into(info, &mut buf).await?;
        Ok(Bytes::from(buf))
    }

    async fn reassemble_into(&self, info: &ShardInfo, out: &mut [u8]) -> Result<(), ShardError> {
        let shard = info.shard_index;
        self.set_state(shard, ShardState::Fetching);

        let result = self.fill(info, out).await;
        match &result {
            Ok(()) => {
                self.set_state(shard, ShardState::Verified);
                tracing::info!(shard, bytes = info.length, "shard verified");
            }
            Err(e) => {
                self.set_state(shard, ShardState::Failed);
                tracing::warn!(shard, error = %e, "shard reassembly failed");
            }
        }
        result
    }

    async fn fill(&self, info: &ShardInfo, out: &mut [u8]) -> Result<(), ShardError> {
        info.validate()?;
        let shard = info.shard_index;

        // Halts on the first unrecoverable fragment.
        let fragments = try_join_all(
            info.fragments
                .iter()
                .map(|fragment| self.fetch_fragment(shard, fragment)),
        )
        .await?;

        let mut cursor = 0usize;
        for bytes in fragments {
            out[cursor..cursor + bytes.len()].copy_from_slice(&bytes);
            cursor += bytes.len();
        }

        if !verify(out, &info.digest) {
            return Err(ShardError::IntegrityMismatch { shard });
        }
        Ok(())
    }

    /// Reconstruct the full payload from its ShardInfos.
    ///
    /// ShardInfos may arrive in any order; for duplicate shard indices the
    /// first occurrence is used. Succeeds only if every shard verifies and
    /// together they cover exactly `expected_total_length` bytes. Otherwise
    /// fails with `PayloadIncomplete`, listing every failed or missing shard.
    pub async fn reassemble(
        &self,
        infos: &[ShardInfo],
        expected_total_length: u64,
    ) -> Result<Bytes, ShardError> {
        self.states.clear();

        // Stable sort keeps the first delivery ahead of later duplicates.
        let mut shards: Vec<&ShardInfo> = infos.iter().collect();
        shards.sort_by_key(|info| info.shard_index);
        shards.dedup_by_key(|info| info.shard_index);

        let mut missing_shards = Vec::new();
        let mut next_index = 0u32;
        for info in &shards {
            missing_shards.extend(next_index..info.shard_index);
            next_index = info.shard_index.saturating_add(1);
            self.set_state(info.shard_index, ShardState::Pending);
        }

        let mut buffer = vec![0u8; expected_total_length as usize];
        let mut failed_shards = Vec::new();
        let mut causes = Vec::new();
        let mut jobs = Vec::with_capacity(shards.len());
        let mut cursor = 0u64;
        let mut rest: &mut [u8] = &mut buffer;

        for info in shards {
            let fits = info
                .offset
                .checked_add(info.length)
                .is_some_and(|end| info.offset >= cursor && end <= expected_total_length);
            if !fits {
                self.set_state(info.shard_index, ShardState::Failed);
                failed_shards.push(info.shard_index);
                causes.push(ShardError::MalformedShardInfo(format!(
                    "shard {} (offset {}, length {}) does not fit payload of {expected_total_length} bytes after offset {cursor}",
                    info.shard_index, info.offset, info.length
                )));
                continue;
            }

            let skip = (info.offset - cursor) as usize;
            let (_, tail) = std::mem::take(&mut rest).split_at_mut(skip);
            let (slot, tail) = tail.split_at_mut(info.length as usize);
            rest = tail;
            cursor = info.offset + info.length;
            jobs.push((info, slot));
        }

        let results = join_all(jobs.into_iter().map(|(info, slot)| async move {
            (info, self.reassemble_into(info, slot).await)
        }))
        .await;

        let mut covered_len = 0u64;
        for (info, result) in results {
            match result {
                Ok(()) => covered_len += info.length,
                Err(e) => {
                    failed_shards.push(info.shard_index);
                    causes.push(e);
                }
            }
        }
        failed_shards.sort_unstable();

        // No known shard reaches the end of the payload: the shard after the last is absent.
        if cursor < expected_total_length {
            missing_shards.push(next_index);
        }

        if failed_shards.is_empty() && missing_shards.is_empty() && covered_len == expected_total_length {
            tracing::info!(bytes = covered_len, shards = next_index, "payload reassembled");
            return Ok(Bytes::from(buffer));
        }

        tracing::warn!(
            ?failed_shards,
            ?missing_shards,
            expected = expected_total_length,
            covered = covered_len,
            "payload incomplete"
        );
        Err(ShardError::PayloadIncomplete {
            failed_shards,
            missing_shards,
            expected_len: expected_total_length,
            covered_len,
            causes,
        })
    }
}
