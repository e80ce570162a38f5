//! Placement metadata: the ShardInfo message and its encoding.
//!
//! A ShardInfo is the only thing a reassembling party needs to locate and
//! verify one shard: where each fragment's copies live and the digest of the
//! original shard bytes. It is JSON on the wire and carries a version field,
//! so a receiver can decode it without any out-of-band schema.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::Digest;
use crate::error::ShardError;

/// Current ShardInfo encoding version.
pub const SHARD_INFO_VERSION: u8 = 1;

/// Stable identifier of a storage peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque id returned by a peer's store for a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One stored copy of a fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replica {
    pub peer: PeerId,
    pub content_id: ContentId,
}

/// Where the copies of one fragment live, in fetch order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentPlacement {
    /// Fragment index within its shard.
    pub index: u32,
    /// Fragment length in bytes.
    pub length: u64,
    pub replicas: Vec<Replica>,
}

/// Placement map for one shard. Immutable once published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardInfo {
    pub version: u8,
    pub shard_index: u32,
    /// Byte offset of this shard within the payload.
    pub offset: u64,
    /// Shard length in bytes.
    pub length: u64,
    /// BLAKE3 of the original shard bytes.
    pub digest: Digest,
    /// Ordered by fragment index.
    pub fragments: Vec<FragmentPlacement>,
}

impl ShardInfo {
    pub fn encode(&self) -> Result<Vec<u8>, ShardError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode and structurally validate a ShardInfo message.
    pub fn decode(bytes: &[u8]) -> Result<Self, ShardError> {
        let info: ShardInfo = serde_json::from_slice(bytes)?;
        info.validate()?;
        Ok(info)
    }

    /// Check the structural invariants a reassembler relies on.
    pub fn validate(&self) -> Result<(), ShardError> {
        if self.version != SHARD_INFO_VERSION {
            return Err(ShardError::MalformedShardInfo(format!(
                "unsupported version {}",
                self.version
            )));
        }

        let mut total = 0u64;
        for (position, fragment) in self.fragments.iter().enumerate() {
            if fragment.index as usize != position {
                return Err(ShardError::MalformedShardInfo(format!(
                    "shard {}: fragment at position {position} has index {}",
                    self.shard_index, fragment.index
                )));
            }
            if fragment.replicas.is_empty() {
                return Err(ShardError::MalformedShardInfo(format!(
                    "shard {} fragment {}: no replicas",
                    self.shard_index, fragment.index
                )));
            }
            let mut seen = HashSet::new();
            if !fragment.replicas.iter().all(|r| seen.insert(&r.peer)) {
                return Err(ShardError::MalformedShardInfo(format!(
                    "shard {} fragment {}: duplicate peer in replica list",
                    self.shard_index, fragment.index
                )));
            }
            total = total.checked_add(fragment.length).ok_or_else(|| {
                ShardError::MalformedShardInfo(format!(
                    "shard {}: fragment lengths overflow",
                    self.shard_index
                ))
            })?;
        }

        if total != self.length {
            return Err(ShardError::MalformedShardInfo(format!(
                "shard {}: fragment lengths sum to {total}, shard length is {}",
                self.shard_index, self.length
            )));
        }
        if self.offset.checked_add(self.length).is_none() {
            return Err(ShardError::MalformedShardInfo(format!(
                "shard {}: offset {} plus length {} overflows",
                self.shard_index, self.offset, self.length
            )));
        }
        Ok(())
    }
}
