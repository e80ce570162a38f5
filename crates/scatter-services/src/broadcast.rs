//! Broadcast channel seam and an in-process pub/sub hub.
//!
//! Messages are opaque bytes on a named topic. A subscriber's handler is
//! invoked once per delivered message with the payload and the sender's
//! peer id.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use scatter_core::{ChannelError, PeerId};

/// Callback invoked for every message delivered on a subscribed topic.
pub type MessageHandler = Arc<dyn Fn(Bytes, PeerId) + Send + Sync>;

/// Publish/subscribe transport for opaque messages.
#[async_trait]
pub trait BroadcastChannel: Send + Sync {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), ChannelError>;

    fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), ChannelError>;
}

/// Shared topic table for in-process peers.
///
/// Delivery is synchronous: `publish` returns after every subscriber's
/// handler has run.
#[derive(Clone, Default)]
pub struct BroadcastHub {
    topics: Arc<DashMap<String, Vec<MessageHandler>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoint for one peer. Messages it publishes carry `peer` as sender.
    pub fn join(&self, peer: PeerId) -> LocalBroadcast {
        LocalBroadcast {
            hub: self.clone(),
            local: peer,
            online: AtomicBool::new(true),
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |subs| subs.len())
    }
}

/// One peer's endpoint on a [`BroadcastHub`].
pub struct LocalBroadcast {
    hub: BroadcastHub,
    local: PeerId,
    online: AtomicBool,
}

impl LocalBroadcast {
    /// Take the endpoint offline (`false`) or bring it back.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), ChannelError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ChannelError::Unavailable(format!(
                "endpoint {} is offline",
                self.local
            )))
        }
    }
}

#[async_trait]
impl BroadcastChannel for LocalBroadcast {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), ChannelError> {
        self.ensure_online()?;

        // Clone the handler list so no map guard is held while handlers run.
        let handlers: Vec<MessageHandler> = self
            .hub
            .topics
            .get(topic)
            .map(|subs| subs.clone())
            .unwrap_or_default();

        tracing::debug!(
            topic,
            sender = %self.local,
            bytes = payload.len(),
            subscribers = handlers.len(),
            "broadcast published"
        );

        for handler in handlers {
            handler(payload.clone(), self.local.clone());
        }
        Ok(())
    }

    fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), ChannelError> {
        self.ensure_online()?;
        self.hub
            .topics
            .entry(topic.to_string())
            .or_default()
            .push(handler);
        tracing::debug!(topic, peer = %self.local, "subscribed");
        Ok(())
    }
}
