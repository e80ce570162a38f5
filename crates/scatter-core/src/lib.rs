//! scatter-core: shared types, placement wire format, configuration, and digests.
//! All other Scatter crates depend on this one.

pub mod config;
pub mod crypto;
pub mod error;
pub mod wire;

pub use config::{ScatterConfig, ShardingConfig};
pub use crypto::Digest;
pub use error::{ChannelError, ShardError, StoreError};
pub use wire::{ContentId, FragmentPlacement, PeerId, Replica, ShardInfo, SHARD_INFO_VERSION};
