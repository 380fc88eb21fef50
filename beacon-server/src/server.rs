use crate::origin;
use crate::registry::{GameStore, RelayStore, SessionStore};
use crate::relay::RelayHandle;
use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// ICE servers handed to every relay peer connection.
#[derive(Debug, Clone)]
pub struct IceConfig {
    pub turn_urls: Vec<String>,
    pub stun_urls: Vec<String>,
    pub username: String,
    pub credential: String,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            turn_urls: vec![
                "turn:freeturn.net:5349".to_owned(),
                "turn:freeturn.net:3478".to_owned(),
            ],
            stun_urls: vec![
                "stun:stun.l.google.com:19302".to_owned(),
                "stun:freeturn.net:3478".to_owned(),
            ],
            username: "free".to_owned(),
            credential: "free".to_owned(),
        }
    }
}

/// Process-wide registry root: games, sessions, relays, the origin
/// allow-list and the connection counter. One per server process.
pub struct Server {
    pub games: GameStore,
    pub sessions: SessionStore,
    pub relays: RelayStore,
    pub ice: IceConfig,
    pub turn_only: bool,
    allowed_origins: Vec<Regex>,
    conn_counter: AtomicU64,
}

impl Server {
    pub fn new(allowed_origins: &[String], turn_only: bool) -> Arc<Self> {
        Self::with_ice(allowed_origins, turn_only, IceConfig::default())
    }

    pub fn with_ice(allowed_origins: &[String], turn_only: bool, ice: IceConfig) -> Arc<Self> {
        if turn_only {
            tracing::info!(
                "TURN only mode enabled; STUN servers are omitted and only relay candidates are used"
            );
        }
        Arc::new(Self {
            games: GameStore::new(),
            sessions: SessionStore::new(),
            relays: RelayStore::new(),
            ice,
            turn_only,
            allowed_origins: origin::compile_patterns(allowed_origins),
            conn_counter: AtomicU64::new(0),
        })
    }

    pub fn origin_allowed(&self, origin: &str) -> bool {
        origin::is_allowed(origin, &self.allowed_origins)
    }

    /// Hands out the per-process sequence number for a new connection.
    pub fn next_session_number(&self) -> u64 {
        self.conn_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Relays owned by the members of a lobby.
    pub fn relays_in_lobby(&self, lobby_id: &str, game_id: &str) -> Vec<Arc<RelayHandle>> {
        self.games
            .lobby_members(lobby_id, game_id)
            .iter()
            .filter_map(|member| self.relays.get(member.id()))
            .collect()
    }
}
