//! Shard planner: partitions a payload into shards and fragments and
//! assigns each fragment to its replica peers.
//!
//! Placement is round-robin over the peer pool by global fragment ordinal:
//! fragment number `g` (counted across all shards in (shard, fragment)
//! order) lands on peers `(g * R + k) mod N` for `k in 0..R`. Anyone holding
//! the same parameters computes the same assignment. The planner does no I/O.

use bytes::Bytes;

use scatter_core::crypto::Digest;
use scatter_core::{ShardError, ShardingConfig};

/// One fragment of a shard and the pool ordinals it is assigned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentPlan {
    /// Index within the shard.
    pub index: u32,
    /// Byte offset within the shard.
    pub offset: usize,
    pub data: Bytes,
    /// Pool ordinals of the R target peers, pairwise distinct.
    pub peers: Vec<usize>,
}

/// One shard of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPlan {
    pub index: u32,
    /// Byte offset within the payload.
    pub offset: u64,
    pub data: Bytes,
    /// Integrity reference for the shard bytes.
    pub digest: Digest,
    pub fragments: Vec<FragmentPlan>,
}

/// Target peer ordinals for the fragment with global ordinal `ordinal`.
pub fn assign_peers(ordinal: u64, replication_factor: usize, peer_count: usize) -> Vec<usize> {
    let r = replication_factor as u64;
    let n = peer_count as u64;
    (0..r)
        .map(|k| (ordinal.wrapping_mul(r).wrapping_add(k) % n) as usize)
        .collect()
}

/// Partition `payload` per `config`.
///
/// Shards and fragments are zero-copy slices of `payload`. An empty payload
/// yields no shards.
pub fn plan(payload: &Bytes, config: &ShardingConfig) -> Result<Vec<ShardPlan>, ShardError> {
    config.validate()?;

    let shard_count = payload.len().div_ceil(config.shard_size);
    let mut shards = Vec::with_capacity(shard_count);
    let mut ordinal: u64 = 0;

    for (shard_index, shard_offset) in (0..payload.len()).step_by(config.shard_size).enumerate() {
        let shard_end = (shard_offset + config.shard_size).min(payload.len());
        let data = payload.slice(shard_offset..shard_end);

        let mut fragments = Vec::with_capacity(data.len().div_ceil(config.max_fragment_size));
        for (fragment_index, offset) in (0..data.len())
            .step_by(config.max_fragment_size)
            .enumerate()
        {
            let end = (offset + config.max_fragment_size).min(data.len());
            fragments.push(FragmentPlan {
                index: fragment_index as u32,
                offset,
                data: data.slice(offset..end),
                peers: assign_peers(ordinal, config.replication_factor, config.peer_count),
            });
            ordinal += 1;
        }

        shards.push(ShardPlan {
            index: shard_index as u32,
            offset: shard_offset as u64,
            digest: Digest::of(&data),
            data,
            fragments,
        });
    }

    tracing::debug!(
        payload_len = payload.len(),
        shards = shards.len(),
        fragments = ordinal,
        replication = config.replication_factor,
        peers = config.peer_count,
        "payload planned"
    );
    Ok(shards)
}
