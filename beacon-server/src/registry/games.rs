//! The games → lobbies → members topology.
//!
//! Locking is two-level: the games map has a read-write lock, and every
//! game and lobby carries its own. Acquisition order is always games →
//! game → lobby; inner `Arc` handles are cloned out so no guard is ever
//! held across an await point. Lookups never materialize missing entries;
//! membership mutations lazily create the game and lobby they target.

use crate::client::Client;
use crate::error::RegistryError;
use beacon_core::{LobbySettings, PeerId, DEFAULT_LOBBY};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub struct GameStore {
    games: RwLock<HashMap<String, Arc<Game>>>,
}

struct Game {
    lobbies: RwLock<HashMap<String, Arc<Lobby>>>,
    clients: RwLock<Vec<Arc<Client>>>,
}

struct Lobby {
    state: RwLock<LobbyState>,
}

#[derive(Default)]
struct LobbyState {
    host: Option<Arc<Client>>,
    settings: LobbySettings,
    members: Vec<Arc<Client>>,
}

impl Game {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            lobbies: RwLock::new(HashMap::new()),
            clients: RwLock::new(Vec::new()),
        })
    }
}

impl GameStore {
    pub fn new() -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
        }
    }

    fn game(&self, game_id: &str) -> Option<Arc<Game>> {
        self.games
            .read()
            .expect("games lock poisoned")
            .get(game_id)
            .cloned()
    }

    fn game_or_create(&self, game_id: &str) -> Arc<Game> {
        let mut games = self.games.write().expect("games lock poisoned");
        games
            .entry(game_id.to_owned())
            .or_insert_with(Game::new)
            .clone()
    }

    fn lobby(&self, lobby_id: &str, game_id: &str) -> Option<Arc<Lobby>> {
        let game = self.game(game_id)?;
        let lobbies = game.lobbies.read().expect("lobbies lock poisoned");
        lobbies.get(lobby_id).cloned()
    }

    fn lobby_or_create(&self, lobby_id: &str, game_id: &str) -> Arc<Lobby> {
        let game = self.game_or_create(game_id);
        let mut lobbies = game.lobbies.write().expect("lobbies lock poisoned");
        lobbies
            .entry(lobby_id.to_owned())
            .or_insert_with(|| {
                Arc::new(Lobby {
                    state: RwLock::new(LobbyState::default()),
                })
            })
            .clone()
    }

    pub fn game_exists(&self, game_id: &str) -> bool {
        self.game(game_id).is_some()
    }

    pub fn lobby_exists(&self, lobby_id: &str, game_id: &str) -> bool {
        self.lobby(lobby_id, game_id).is_some()
    }

    /// All lobby ids in a game, excluding the staging lobby.
    pub fn list_lobbies(&self, game_id: &str) -> Vec<String> {
        let Some(game) = self.game(game_id) else {
            return Vec::new();
        };
        let lobbies = game.lobbies.read().expect("lobbies lock poisoned");
        lobbies
            .keys()
            .filter(|id| id.as_str() != DEFAULT_LOBBY)
            .cloned()
            .collect()
    }

    pub fn is_client_in_lobby(&self, lobby_id: &str, game_id: &str, client: &Client) -> bool {
        let Some(lobby) = self.lobby(lobby_id, game_id) else {
            return false;
        };
        let state = lobby.state.read().expect("lobby lock poisoned");
        state.members.iter().any(|m| m.id() == client.id())
    }

    /// The member list of a lobby, empty when the lobby does not exist.
    pub fn lobby_members(&self, lobby_id: &str, game_id: &str) -> Vec<Arc<Client>> {
        let Some(lobby) = self.lobby(lobby_id, game_id) else {
            return Vec::new();
        };
        let state = lobby.state.read().expect("lobby lock poisoned");
        state.members.clone()
    }

    /// Adds a client to a lobby, materializing the game and lobby on first
    /// use. Adding an existing member is a no-op.
    pub fn add_to_lobby(&self, lobby_id: &str, game_id: &str, client: &Arc<Client>) {
        let lobby = self.lobby_or_create(lobby_id, game_id);
        let mut state = lobby.state.write().expect("lobby lock poisoned");
        if state.members.iter().any(|m| m.id() == client.id()) {
            return;
        }
        state.members.push(client.clone());
    }

    /// Removes a client from a lobby. Silently does nothing when the
    /// lobby or the membership is absent; teardown paths depend on that.
    pub fn remove_from_lobby(&self, lobby_id: &str, game_id: &str, client: &Client) {
        let Some(lobby) = self.lobby(lobby_id, game_id) else {
            return;
        };
        let mut state = lobby.state.write().expect("lobby lock poisoned");
        state.members.retain(|m| m.id() != client.id());
    }

    /// Drops a lobby. Removing the last non-staging lobby of a game drops
    /// the game as well.
    pub fn destroy_lobby(&self, game_id: &str, lobby_id: &str) {
        let mut games = self.games.write().expect("games lock poisoned");
        let Some(game) = games.get(game_id) else {
            return;
        };
        let remaining = {
            let mut lobbies = game.lobbies.write().expect("lobbies lock poisoned");
            lobbies.remove(lobby_id);
            lobbies.keys().filter(|id| id.as_str() != DEFAULT_LOBBY).count()
        };
        if remaining == 0 {
            games.remove(game_id);
        }
    }

    pub fn set_host(&self, lobby_id: &str, game_id: &str, client: &Arc<Client>) {
        let Some(lobby) = self.lobby(lobby_id, game_id) else {
            return;
        };
        let mut state = lobby.state.write().expect("lobby lock poisoned");
        state.host = Some(client.clone());
    }

    pub fn clear_host(&self, lobby_id: &str, game_id: &str) {
        let Some(lobby) = self.lobby(lobby_id, game_id) else {
            return;
        };
        let mut state = lobby.state.write().expect("lobby lock poisoned");
        state.host = None;
    }

    pub fn host(&self, lobby_id: &str, game_id: &str) -> Result<Arc<Client>, RegistryError> {
        let lobby = self
            .lobby(lobby_id, game_id)
            .ok_or_else(|| RegistryError::LobbyNotFound {
                lobby_id: lobby_id.to_owned(),
                game_id: game_id.to_owned(),
            })?;
        let state = lobby.state.read().expect("lobby lock poisoned");
        state
            .host
            .clone()
            .ok_or_else(|| RegistryError::NoHost(lobby_id.to_owned()))
    }

    pub fn set_settings(
        &self,
        lobby_id: &str,
        game_id: &str,
        settings: LobbySettings,
    ) -> Result<(), RegistryError> {
        let lobby = self
            .lobby(lobby_id, game_id)
            .ok_or_else(|| RegistryError::LobbyNotFound {
                lobby_id: lobby_id.to_owned(),
                game_id: game_id.to_owned(),
            })?;
        let mut state = lobby.state.write().expect("lobby lock poisoned");
        state.settings = settings;
        Ok(())
    }

    pub fn settings(&self, lobby_id: &str, game_id: &str) -> Option<LobbySettings> {
        let lobby = self.lobby(lobby_id, game_id)?;
        let state = lobby.state.read().expect("lobby lock poisoned");
        Some(state.settings.clone())
    }

    pub fn add_client_to_game(&self, game_id: &str, client: &Arc<Client>) {
        let game = self.game_or_create(game_id);
        let mut clients = game.clients.write().expect("game clients lock poisoned");
        clients.push(client.clone());
    }

    pub fn remove_client_from_game(&self, game_id: &str, client: &Client) {
        let Some(game) = self.game(game_id) else {
            return;
        };
        let mut clients = game.clients.write().expect("game clients lock poisoned");
        clients.retain(|c| c.id() != client.id());
    }

    pub fn game_members(&self, game_id: &str) -> Vec<Arc<Client>> {
        let Some(game) = self.game(game_id) else {
            return Vec::new();
        };
        let clients = game.clients.read().expect("game clients lock poisoned");
        clients.clone()
    }

    /// True when the client is a member of any lobby in the game other
    /// than the named one.
    pub fn in_another_lobby(&self, game_id: &str, except: &str, id: PeerId) -> bool {
        let Some(game) = self.game(game_id) else {
            return false;
        };
        let lobbies: Vec<Arc<Lobby>> = {
            let map = game.lobbies.read().expect("lobbies lock poisoned");
            map.iter()
                .filter(|(lobby_id, _)| lobby_id.as_str() != except)
                .map(|(_, lobby)| lobby.clone())
                .collect()
        };
        lobbies.iter().any(|lobby| {
            let state = lobby.state.read().expect("lobby lock poisoned");
            state.members.iter().any(|m| m.id() == id)
        })
    }
}

impl Default for GameStore {
    fn default() -> Self {
        Self::new()
    }
}
