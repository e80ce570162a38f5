//! scatter-services: sharding, placement publishing, and reassembly on top
//! of the content store and broadcast seams.

pub mod broadcast;
pub mod dir_store;
pub mod memory_store;
pub mod planner;
pub mod publisher;
pub mod reassembler;
pub mod shard_table;
pub mod store;

pub use broadcast::{BroadcastChannel, BroadcastHub, LocalBroadcast, MessageHandler};
pub use dir_store::DirStore;
pub use memory_store::MemoryStore;
pub use planner::{assign_peers, plan, FragmentPlan, ShardPlan};
pub use publisher::Publisher;
pub use reassembler::{Reassembler, ShardState};
pub use shard_table::ShardTable;
pub use store::{ContentStore, PeerPool};
