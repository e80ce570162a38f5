//! Error taxonomy for sharding, publishing, and reassembly.
//!
//! Per-peer failures are `StoreError` / `ChannelError`. They are absorbed
//! up to the replication bound; anything past it becomes a shard-level
//! `ShardError`, and shard-level failures roll up into `PayloadIncomplete`.

use std::time::Duration;

use crate::wire::ContentId;

/// Errors from a peer's content store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The peer could not be reached or refused the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The peer has no object under this content id.
    #[error("content not found: {0}")]
    NotFound(ContentId),

    /// The peer did not answer within the per-peer timeout.
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the broadcast transport.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ShardError {
    /// Bad parameters. Raised before any I/O happens.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// No assigned peer accepted a fragment at publish time.
    #[error("shard {shard} fragment {fragment}: no assigned peer stored the fragment")]
    FragmentUnstorable { shard: u32, fragment: u32 },

    /// No listed replica returned a fragment at reassembly time.
    #[error("shard {shard} fragment {fragment}: no replica could be fetched")]
    FragmentUnrecoverable { shard: u32, fragment: u32 },

    /// Reassembled shard bytes do not match the published digest.
    #[error("shard {shard}: integrity check failed")]
    IntegrityMismatch { shard: u32 },

    /// The payload could not be fully reconstructed.
    ///
    /// `failed_shards` lists shards that reached `Failed`; `missing_shards`
    /// lists indices for which no ShardInfo was available at all.
    #[error(
        "payload incomplete: failed shards {failed_shards:?}, missing shards {missing_shards:?} \
         (expected {expected_len} bytes, covered {covered_len})"
    )]
    PayloadIncomplete {
        failed_shards: Vec<u32>,
        missing_shards: Vec<u32>,
        expected_len: u64,
        covered_len: u64,
        causes: Vec<ShardError>,
    },

    /// A ShardInfo message could not be decoded or is structurally invalid.
    #[error("malformed shard info: {0}")]
    MalformedShardInfo(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("shard info codec: {0}")]
    Codec(#[from] serde_json::Error),
}

impl ShardError {
    /// Shard index this error is attributed to, if any.
    pub fn shard(&self) -> Option<u32> {
        match self {
            Self::FragmentUnstorable { shard, .. }
            | Self::FragmentUnrecoverable { shard, .. }
            | Self::IntegrityMismatch { shard } => Some(*shard),
            _ => None,
        }
    }
}
