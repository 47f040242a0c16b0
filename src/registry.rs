//! The set of attached observers and message fan-out to them.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::mapping::MappingStore;
use crate::protocol::{ObserverId, OutboundMessage};

/// Transport used to reach observers. Implemented by the WebSocket hub; the
/// tests swap in a recording fake.
#[async_trait]
pub trait ObserverMessenger: Send + Sync {
    /// Deliver one message to one observer.
    async fn send(&self, to: ObserverId, message: &OutboundMessage) -> Result<()>;

    /// Ids of observers the transport already knows about, used to seed the
    /// registry at startup.
    async fn enumerate(&self) -> Vec<ObserverId>;
}

/// Tracks who is attached and pushes session updates out to them.
///
/// Attachment is driven by handshakes, not by transport connects: a
/// connection only becomes an observer once its `hello` arrives (or when it
/// existed before the dispatcher started and got seeded).
pub struct SubscriberRegistry {
    observers: BTreeSet<ObserverId>,
    messenger: Arc<dyn ObserverMessenger>,
    mapping: Arc<MappingStore>,
}

impl SubscriberRegistry {
    pub fn new(messenger: Arc<dyn ObserverMessenger>, mapping: Arc<MappingStore>) -> Self {
        Self {
            observers: BTreeSet::new(),
            messenger,
            mapping,
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn contains(&self, id: ObserverId) -> bool {
        self.observers.contains(&id)
    }

    /// Adopt observers the transport already has, without any handshake
    /// traffic. They hear from us on the next broadcast.
    pub async fn seed_from_host(&mut self) {
        let ids = self.messenger.enumerate().await;
        if ids.is_empty() {
            return;
        }
        info!("Seeding {} pre-existing observer(s)", ids.len());
        self.observers.extend(ids);
    }

    /// Attach an observer and bring it up to date: the current mute state
    /// right away, the mapping as soon as it is loaded. A repeated handshake
    /// re-sends both.
    pub async fn attach(&mut self, id: ObserverId, muted: bool) {
        if self.observers.insert(id) {
            info!("Observer {id} attached ({} total)", self.observers.len());
        } else {
            debug!("Observer {id} re-attached");
        }

        if let Err(err) = self
            .messenger
            .send(id, &OutboundMessage::MuteStatus { is_muted: muted })
            .await
        {
            warn!("Failed to send mute state to observer {id}: {err:#}");
        }

        // The first handshake usually lands before the mapping finished
        // loading; deliver it from a task instead of stalling the dispatcher.
        let mapping = self.mapping.clone();
        let messenger = self.messenger.clone();
        tokio::spawn(async move {
            let snapshot = mapping.load().await.clone();
            debug!("Sending mapping to observer {id}");
            let message = OutboundMessage::SetMapping { mapping: snapshot };
            if let Err(err) = messenger.send(id, &message).await {
                warn!("Failed to deliver mapping to observer {id}: {err:#}");
            }
        });
    }

    /// Drop an observer. Returns true when this removed the last one, which
    /// is the moment the session auto-mutes.
    pub fn detach(&mut self, id: ObserverId) -> bool {
        if !self.observers.remove(&id) {
            return false;
        }
        debug!("Observer {id} detached ({} remaining)", self.observers.len());
        self.observers.is_empty()
    }

    /// Send a message to every attached observer. Delivery failures are
    /// logged and skipped; the remaining observers still get theirs.
    pub async fn broadcast(&self, message: &OutboundMessage) {
        for id in &self.observers {
            if let Err(err) = self.messenger.send(*id, message).await {
                warn!("Broadcast to observer {id} failed: {err:#}");
            }
        }
    }
}
