//! Placement publisher: stores fragment copies on their assigned peers and
//! announces the resulting ShardInfo.
//!
//! A fragment counts as stored once any one assigned peer accepts it; the
//! ShardInfo records only the peers that did. If some fragment is accepted
//! by no peer, the shard is not announced at all.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;

use scatter_core::{
    FragmentPlacement, Replica, ShardError, ShardInfo, ShardingConfig, SHARD_INFO_VERSION,
};

use crate::broadcast::BroadcastChannel;
use crate::planner::{FragmentPlan, ShardPlan};
use crate::store::{bounded, PeerPool};

pub struct Publisher {
    pool: PeerPool,
    channel: Arc<dyn BroadcastChannel>,
    topic: String,
    timeout: Duration,
}

impl Publisher {
    /// The pool must hold exactly `config.peer_count` peers, in planning order.
    pub fn new(
        pool: PeerPool,
        channel: Arc<dyn BroadcastChannel>,
        topic: impl Into<String>,
        config: &ShardingConfig,
    ) -> Result<Self, ShardError> {
        config.validate()?;
        if pool.len() != config.peer_count {
            return Err(ShardError::InvalidConfiguration(format!(
                "peer pool has {} peers, config expects {}",
                pool.len(),
                config.peer_count
            )));
        }
        Ok(Self {
            pool,
            channel,
            topic: topic.into(),
            timeout: config.per_peer_timeout,
        })
    }

    /// Store every fragment and announce the shard's placement.
    ///
    /// An announce failure is returned as `ShardError::Channel`; stored
    /// copies are left in place. Use [`store_shard`](Self::store_shard) and
    /// [`announce`](Self::announce) separately to retry the announcement.
    pub async fn publish(&self, plan: &ShardPlan) -> Result<ShardInfo, ShardError> {
        let info = self.store_shard(plan).await?;
        self.announce(&info).await?;
        Ok(info)
    }

    /// Publish shards in index order, stopping at the first failure.
    pub async fn publish_all(&self, plans: &[ShardPlan]) -> Result<Vec<ShardInfo>, ShardError> {
        let mut infos = Vec::with_capacity(plans.len());
        for plan in plans {
            infos.push(self.publish(plan).await?);
        }
        Ok(infos)
    }

    /// Store all fragment copies for a shard and build its ShardInfo.
    pub async fn store_shard(&self, plan: &ShardPlan) -> Result<ShardInfo, ShardError> {
        // Every assigned ordinal must exist before any put is attempted.
        if let Some(ordinal) = plan
            .fragments
            .iter()
            .flat_map(|f| f.peers.iter())
            .find(|&&ordinal| ordinal >= self.pool.len())
        {
            return Err(ShardError::InvalidConfiguration(format!(
                "shard {} assigns peer ordinal {ordinal} outside a pool of {}",
                plan.index,
                self.pool.len()
            )));
        }

        let placements = join_all(
            plan.fragments
                .iter()
                .map(|fragment| self.store_fragment(plan.index, fragment)),
        )
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            shard = plan.index,
            fragments = placements.len(),
            bytes = plan.data.len(),
            digest = %plan.digest.short(),
            "shard stored"
        );

        Ok(ShardInfo {
            version: SHARD_INFO_VERSION,
            shard_index: plan.index,
            offset: plan.offset,
            length: plan.data.len() as u64,
            digest: plan.digest,
            fragments: placements,
        })
    }

    /// Broadcast a ShardInfo on the publisher's topic.
    pub async fn announce(&self, info: &ShardInfo) -> Result<(), ShardError> {
        let payload = Bytes::from(info.encode()?);
        if let Err(e) = self.channel.publish(&self.topic, payload).await {
            tracing::warn!(shard = info.shard_index, error = %e, "shard announcement failed");
            return Err(e.into());
        }
        tracing::info!(shard = info.shard_index, topic = %self.topic, "shard announced");
        Ok(())
    }

    async fn store_fragment(
        &self,
        shard: u32,
        fragment: &FragmentPlan,
    ) -> Result<FragmentPlacement, ShardError> {
        let attempts = fragment.peers.iter().map(|&ordinal| async move {
            // Ordinals were range-checked in store_shard.
            let peer = self.pool.peer_at(ordinal)?.clone();
            let store = self.pool.store(&peer)?;
            match bounded(self.timeout, store.put(fragment.data.clone())).await {
                Ok(content_id) => {
                    tracing::trace!(shard, fragment = fragment.index, %peer, %content_id, "fragment copy stored");
                    Some(Replica { peer, content_id })
                }
                Err(e) => {
                    tracing::warn!(shard, fragment = fragment.index, %peer, error = %e, "fragment put failed");
                    None
                }
            }
        });

        // join_all keeps assignment order, so replicas stay in placement order.
        let replicas: Vec<Replica> = join_all(attempts).await.into_iter().flatten().collect();

        if replicas.is_empty() {
            tracing::warn!(shard, fragment = fragment.index, "no assigned peer accepted fragment");
            return Err(ShardError::FragmentUnstorable {
                shard,
                fragment: fragment.index,
            });
        }

        Ok(FragmentPlacement {
            index: fragment.index,
            length: fragment.data.len() as u64,
            replicas,
        })
    }
}
