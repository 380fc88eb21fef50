use crate::relay::RelayHandle;
use beacon_core::PeerId;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// client → relay map. At most one relay exists per client.
pub struct RelayStore {
    relays: DashMap<PeerId, Arc<RelayHandle>>,
}

impl RelayStore {
    pub fn new() -> Self {
        Self {
            relays: DashMap::new(),
        }
    }

    pub fn set(&self, owner: PeerId, relay: Arc<RelayHandle>) {
        self.relays.insert(owner, relay);
    }

    pub fn get(&self, owner: PeerId) -> Option<Arc<RelayHandle>> {
        self.relays.get(&owner).map(|entry| entry.clone())
    }

    pub fn contains(&self, owner: PeerId) -> bool {
        self.relays.contains_key(&owner)
    }

    /// Removes and gracefully shuts down a client's relay, waiting for the
    /// relay task to acknowledge before returning. No-op when the client
    /// has no relay. The map entry is detached before the await so no map
    /// shard lock is held while shutting down.
    pub async fn delete(&self, owner: PeerId) {
        let Some((_, relay)) = self.relays.remove(&owner) else {
            return;
        };
        relay.shutdown().await;
        debug!(%owner, "relay deleted");
    }
}

impl Default for RelayStore {
    fn default() -> Self {
        Self::new()
    }
}
