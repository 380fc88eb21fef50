#![allow(dead_code)]

pub mod relay_client;

use axum::extract::ws::Message;
use beacon_core::SignalPacket;
use beacon_server::signaling::{dispatch, session};
use beacon_server::{Client, IceConfig, Server};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Level;

/// Timeout for a single expected envelope (ms).
pub const RECV_TIMEOUT_MS: u64 = 2000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// A server with wildcard origins and no ICE servers, so relay peer
/// connections stay loopback-only.
pub fn test_server() -> Arc<Server> {
    Server::with_ice(
        &["*".to_owned()],
        false,
        IceConfig {
            turn_urls: vec![],
            stun_urls: vec![],
            username: String::new(),
            credential: String::new(),
        },
    )
}

pub fn packet(opcode: &str, payload: Option<Value>) -> SignalPacket {
    SignalPacket {
        opcode: opcode.to_owned(),
        payload,
        ..Default::default()
    }
}

pub fn packet_to(opcode: &str, payload: Option<Value>, recipient: &str) -> SignalPacket {
    SignalPacket {
        opcode: opcode.to_owned(),
        payload,
        recipient: Some(recipient.to_owned()),
        ..Default::default()
    }
}

/// A fake connection: a registered client whose outbound frames land in a
/// channel the test reads, standing in for the WebSocket writer task.
pub struct TestPeer {
    pub client: Arc<Client>,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl TestPeer {
    pub fn connect(server: &Arc<Server>) -> Self {
        Self::connect_to_game(server, "")
    }

    pub fn connect_to_game(server: &Arc<Server>, game_id: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = session::open(server, game_id.to_owned(), tx);
        Self { client, rx }
    }

    pub fn id(&self) -> String {
        self.client.id().to_string()
    }

    /// Dispatches an envelope and waits for the handler to finish, the
    /// way sequentially arriving frames behave.
    pub async fn send(&self, server: &Arc<Server>, packet: SignalPacket) {
        dispatch(server.clone(), self.client.clone(), packet).await;
    }

    /// Dispatches an envelope on its own task, for handlers that park on
    /// the transition rendezvous.
    pub fn send_concurrent(&self, server: &Arc<Server>, packet: SignalPacket) -> JoinHandle<()> {
        tokio::spawn(dispatch(server.clone(), self.client.clone(), packet))
    }

    /// Receives the next envelope if one arrives within the window.
    pub async fn recv_within(&mut self, timeout_ms: u64) -> Option<SignalPacket> {
        tokio::time::timeout(Duration::from_millis(timeout_ms), self.rx.recv())
            .await
            .ok()
            .flatten()
            .map(|message| decode(&message))
    }

    pub async fn recv(&mut self) -> SignalPacket {
        let message = tokio::time::timeout(
            Duration::from_millis(RECV_TIMEOUT_MS),
            self.rx.recv(),
        )
        .await
        .expect("timed out waiting for an envelope")
        .expect("connection writer closed");
        decode(&message)
    }

    /// Receives the next envelope and asserts its opcode.
    pub async fn expect(&mut self, opcode: &str) -> SignalPacket {
        let packet = self.recv().await;
        assert_eq!(packet.opcode, opcode, "unexpected envelope: {packet:?}");
        packet
    }

    /// Receives until an envelope with the opcode arrives, discarding
    /// everything before it.
    pub async fn expect_eventually(&mut self, opcode: &str) -> SignalPacket {
        loop {
            let packet = self.recv().await;
            if packet.opcode == opcode {
                return packet;
            }
        }
    }

    /// Asserts nothing is queued for this peer.
    pub fn assert_no_pending(&mut self) {
        if let Ok(message) = self.rx.try_recv() {
            panic!("unexpected pending envelope: {:?}", decode(&message));
        }
    }

    pub fn drain(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }

    /// Runs the INIT exchange, asserting `INIT_OK` and discarding the
    /// staging-lobby placement traffic.
    pub async fn init(&mut self, server: &Arc<Server>, username: &str) {
        self.send(server, packet("INIT", Some(json!(username)))).await;
        let greeting = self.expect("INIT_OK").await;
        let payload = greeting.payload.expect("INIT_OK payload");
        assert_eq!(payload["user"], json!(username));
        assert_eq!(payload["id"], json!(self.id()));
        self.drain();
    }

    /// Opens a lobby through the full transition choreography and asserts
    /// `ACK_HOST`.
    pub async fn open_lobby(&mut self, server: &Arc<Server>, settings: Value) {
        let handle = self.send_concurrent(server, packet("CONFIG_HOST", Some(settings)));
        let transition = self.expect_eventually("TRANSITION").await;
        assert_eq!(transition.payload, Some(json!("host")));
        self.send(server, packet("TRANSITION_ACK", None)).await;
        handle.await.expect("CONFIG_HOST task panicked");
        self.expect("ACK_HOST").await;
    }

    /// Joins a lobby and asserts `ACK_PEER`.
    pub async fn join_lobby(&mut self, server: &Arc<Server>, lobby_id: &str) {
        self.send(
            server,
            packet("CONFIG_PEER", Some(json!({ "lobby_id": lobby_id }))),
        )
        .await;
        self.expect("ACK_PEER").await;
    }
}

pub fn decode(message: &Message) -> SignalPacket {
    match message {
        Message::Text(text) => {
            serde_json::from_str(text.as_str()).expect("outbound frame is not a SignalPacket")
        }
        other => panic!("unexpected frame type: {other:?}"),
    }
}

/// Settings payload for a plain lobby without the server relay.
pub fn plain_lobby(lobby_id: &str) -> Value {
    json!({
        "lobby_id": lobby_id,
        "use_server_relay": false,
        "allow_host_reclaim": false,
        "allow_peers_to_claim_host": false,
        "max_peers": 0,
        "password": "",
        "locked": false,
    })
}
