use crate::client::Client;
use crate::error::RegistryError;
use beacon_core::PeerId;
use dashmap::DashMap;
use std::sync::Arc;

/// Authoritative id → client map. A client is a live participant exactly
/// as long as it has an entry here.
pub struct SessionStore {
    sessions: DashMap<PeerId, Arc<Client>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn create(&self, client: Arc<Client>) -> Result<(), RegistryError> {
        let id = client.id();
        if self.sessions.contains_key(&id) {
            return Err(RegistryError::SessionExists(id));
        }
        self.sessions.insert(id, client);
        Ok(())
    }

    pub fn get(&self, id: PeerId) -> Option<Arc<Client>> {
        self.sessions.get(&id).map(|entry| entry.clone())
    }

    /// Looks up a client by its wire-format id string.
    pub fn lookup(&self, id: &str) -> Option<Arc<Client>> {
        id.parse::<PeerId>().ok().and_then(|id| self.get(id))
    }

    pub fn exists(&self, id: PeerId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn remove(&self, id: PeerId) {
        self.sessions.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
