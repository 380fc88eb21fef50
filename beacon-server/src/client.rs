use axum::extract::ws::Message;
use beacon_core::PeerId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// What a connection is currently doing with respect to lobbies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientMode {
    #[default]
    New,
    Host,
    Peer,
}

#[derive(Debug, Default)]
struct ClientState {
    username: String,
    mode: ClientMode,
    lobby: String,
    in_lobby: bool,
    authorized: bool,
    public_key: Option<String>,
    initial_transition_override: bool,
}

/// A connected WebSocket participant.
///
/// Owned by the sessions registry; the connection task drives its read
/// loop while any number of handler tasks write through [`Client::enqueue`].
/// All outbound frames funnel through one unbounded channel drained by a
/// single writer task, which is what serializes writes per connection.
/// The transport itself is only ever closed via the cancellation token.
pub struct Client {
    id: PeerId,
    session: u64,
    game_id: String,
    outbound: mpsc::UnboundedSender<Message>,
    state: RwLock<ClientState>,
    transition: Notify,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

impl Client {
    pub fn new(
        id: PeerId,
        session: u64,
        game_id: String,
        outbound: mpsc::UnboundedSender<Message>,
    ) -> Self {
        Self {
            id,
            session,
            game_id,
            outbound,
            state: RwLock::new(ClientState::default()),
            transition: Notify::new(),
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn username(&self) -> String {
        self.read_state().username.clone()
    }

    pub fn set_username(&self, username: &str) {
        self.write_state().username = username.to_owned();
    }

    pub fn authorized(&self) -> bool {
        self.read_state().authorized
    }

    pub fn authorize(&self) {
        self.write_state().authorized = true;
    }

    pub fn mode(&self) -> ClientMode {
        self.read_state().mode
    }

    pub fn am_i_host(&self) -> bool {
        self.mode() == ClientMode::Host
    }

    pub fn am_i_peer(&self) -> bool {
        self.mode() == ClientMode::Peer
    }

    pub fn am_i_new(&self) -> bool {
        self.mode() == ClientMode::New
    }

    pub fn set_host_mode(&self) {
        self.write_state().mode = ClientMode::Host;
    }

    pub fn set_peer_mode(&self) {
        self.write_state().mode = ClientMode::Peer;
    }

    pub fn clear_mode(&self) {
        self.write_state().mode = ClientMode::New;
    }

    pub fn lobby(&self) -> String {
        self.read_state().lobby.clone()
    }

    pub fn in_lobby(&self) -> bool {
        self.read_state().in_lobby
    }

    pub fn set_lobby(&self, lobby_id: &str) {
        let mut state = self.write_state();
        state.lobby = lobby_id.to_owned();
        state.in_lobby = true;
    }

    pub fn clear_lobby(&self) {
        let mut state = self.write_state();
        state.lobby.clear();
        state.in_lobby = false;
    }

    pub fn public_key(&self) -> Option<String> {
        self.read_state().public_key.clone()
    }

    pub fn set_public_key(&self, key: Option<String>) {
        self.write_state().public_key = key;
    }

    /// Armed once at the end of `INIT` so the client's first `CONFIG_*`
    /// can pass the in-session guards despite the staging-lobby placement.
    pub fn arm_initial_override(&self) {
        self.write_state().initial_transition_override = true;
    }

    pub fn initial_override_armed(&self) -> bool {
        self.read_state().initial_transition_override
    }

    pub fn consume_initial_override(&self) {
        self.write_state().initial_transition_override = false;
    }

    /// Queue a frame for the writer task. Fails once the transport is gone.
    pub fn enqueue(&self, message: Message) -> anyhow::Result<()> {
        self.outbound
            .send(message)
            .map_err(|_| anyhow::anyhow!("connection writer for {} is gone", self.id))
    }

    /// Releases the pending mode-transition rendezvous. First ack wins;
    /// duplicates park a permit that the next rendezvous consumes.
    pub fn transition_ack(&self) {
        self.transition.notify_one();
    }

    pub async fn await_transition(&self) {
        self.transition.notified().await;
    }

    /// Flips the closed flag; returns whether this caller won the race and
    /// should run teardown.
    pub fn begin_close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Ends the connection: the read loop breaks and the writer flushes
    /// the queue, then closes the socket.
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, ClientState> {
        self.state.read().expect("client state poisoned")
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, ClientState> {
        self.state.write().expect("client state poisoned")
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("session", &self.session)
            .field("game_id", &self.game_id)
            .finish_non_exhaustive()
    }
}
