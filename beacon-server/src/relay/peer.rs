//! The server-side relay peer: one full WebRTC peer connection per
//! participating client, with a pre-negotiated "default" data channel the
//! forwarding protocol runs over.

use crate::client::Client;
use crate::message;
use crate::relay::{protocol, DEFAULT_CHANNEL, RELAY_PROTOCOL};
use crate::server::Server;
use anyhow::{Context, Result};
use beacon_core::{IceContents, PeerId, PeerInfo};
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::ice_transport_policy::RTCIceTransportPolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

pub struct RelayHandle {
    owner: PeerId,
    lobby_id: String,
    game_id: String,
    conn: Arc<RTCPeerConnection>,
    channels: Arc<DashMap<String, Arc<RTCDataChannel>>>,
    running: Arc<AtomicBool>,
    shutdown_tx: mpsc::Sender<()>,
    shutdown_done: Mutex<Option<oneshot::Receiver<()>>>,
}

impl RelayHandle {
    pub fn owner(&self) -> PeerId {
        self.owner
    }

    pub fn lobby_id(&self) -> &str {
        &self.lobby_id
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn channel(&self, label: &str) -> Option<Arc<RTCDataChannel>> {
        self.channels.get(label).map(|entry| entry.clone())
    }

    /// Applies a client's offer and produces the relay's answer.
    pub async fn answer_offer(&self, offer: RTCSessionDescription) -> Result<RTCSessionDescription> {
        self.conn.set_remote_description(offer).await?;
        let answer = self.conn.create_answer(None).await?;
        self.conn.set_local_description(answer).await?;
        self.conn
            .local_description()
            .await
            .context("no local description after answer")
    }

    pub async fn apply_answer(&self, answer: RTCSessionDescription) -> Result<()> {
        self.conn.set_remote_description(answer).await?;
        Ok(())
    }

    pub async fn add_remote_candidate(&self, candidate: RTCIceCandidateInit) -> Result<()> {
        self.conn.add_ice_candidate(candidate).await?;
        Ok(())
    }

    /// Asks the relay task to close the peer connection and waits for the
    /// acknowledgement.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Some(done) = self.shutdown_done.lock().await.take() {
            let _ = done.await;
        }
    }
}

/// Brings up a relay peer for `owner` inside the given lobby: peer
/// connection, the negotiated "default" channel, all callbacks, and the
/// background task that services cooperative shutdown.
pub async fn spawn(
    server: &Arc<Server>,
    game_id: &str,
    lobby_id: &str,
    owner: &Arc<Client>,
) -> Result<Arc<RelayHandle>> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;
    let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;
    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();

    let mut ice_servers = Vec::new();
    if !server.ice.turn_urls.is_empty() {
        ice_servers.push(RTCIceServer {
            urls: server.ice.turn_urls.clone(),
            username: server.ice.username.clone(),
            credential: server.ice.credential.clone(),
            ..Default::default()
        });
    }
    let ice_transport_policy = if server.turn_only {
        RTCIceTransportPolicy::Relay
    } else {
        if !server.ice.stun_urls.is_empty() {
            ice_servers.push(RTCIceServer {
                urls: server.ice.stun_urls.clone(),
                ..Default::default()
            });
        }
        RTCIceTransportPolicy::All
    };

    let conn = Arc::new(
        api.new_peer_connection(RTCConfiguration {
            ice_servers,
            ice_transport_policy,
            ..Default::default()
        })
        .await?,
    );

    let running = Arc::new(AtomicBool::new(true));
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    let (done_tx, done_rx) = oneshot::channel::<()>();

    let relay = Arc::new(RelayHandle {
        owner: owner.id(),
        lobby_id: lobby_id.to_owned(),
        game_id: game_id.to_owned(),
        conn: conn.clone(),
        channels: Arc::new(DashMap::new()),
        running: running.clone(),
        shutdown_tx,
        shutdown_done: Mutex::new(Some(done_rx)),
    });

    info!(owner = %owner.id(), game = game_id, lobby = lobby_id, "relay starting up");

    // Both sides declare the default channel, so it never arrives through
    // on_data_channel and must be wired up here.
    let default_channel = conn
        .create_data_channel(
            DEFAULT_CHANNEL,
            Some(RTCDataChannelInit {
                ordered: Some(true),
                protocol: Some(RELAY_PROTOCOL.to_owned()),
                negotiated: Some(0),
                ..Default::default()
            }),
        )
        .await?;
    relay
        .channels
        .insert(DEFAULT_CHANNEL.to_owned(), default_channel.clone());
    install_channel_callbacks(server, &relay, &default_channel);

    install_connection_callbacks(server, &relay, owner);

    let task_conn = conn.clone();
    let task_running = running.clone();
    let task_owner = owner.id();
    tokio::spawn(async move {
        let _ = shutdown_rx.recv().await;
        if task_running.swap(false, Ordering::SeqCst) {
            if let Err(e) = task_conn.close().await {
                warn!(owner = %task_owner, error = %e, "relay close error");
            }
        }
        debug!(owner = %task_owner, "relay shutting down");
        let _ = done_tx.send(());
    });

    Ok(relay)
}

fn install_connection_callbacks(server: &Arc<Server>, relay: &Arc<RelayHandle>, owner: &Arc<Client>) {
    let state_running = relay.running.clone();
    let state_owner = owner.id();
    relay
        .conn
        .on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            debug!(owner = %state_owner, ?state, "relay connection state changed");
            if matches!(
                state,
                RTCPeerConnectionState::Failed | RTCPeerConnectionState::Closed
            ) {
                state_running.store(false, Ordering::SeqCst);
            }
            Box::pin(async {})
        }));

    // Locally gathered candidates travel back over the owner's WebSocket.
    let ice_owner = owner.clone();
    relay
        .conn
        .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let owner = ice_owner.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else { return };
                let init = match candidate.to_json() {
                    Ok(init) => init,
                    Err(e) => {
                        warn!(owner = %owner.id(), error = %e, "failed to serialize relay candidate");
                        return;
                    }
                };
                if let Err(e) = message::code(
                    &owner,
                    "ICE",
                    message::payload(&IceContents::data(init)),
                    None,
                    Some(PeerInfo::relay()),
                ) {
                    warn!(owner = %owner.id(), error = %e, "failed to send relay candidate");
                }
            })
        }));

    let dc_server = Arc::downgrade(server);
    let dc_relay = Arc::downgrade(relay);
    relay
        .conn
        .on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
            let (Some(server), Some(relay)) = (dc_server.upgrade(), dc_relay.upgrade()) else {
                return Box::pin(async {});
            };
            relay
                .channels
                .insert(channel.label().to_owned(), channel.clone());
            install_channel_callbacks(&server, &relay, &channel);
            Box::pin(async {})
        }));
}

fn install_channel_callbacks(
    server: &Arc<Server>,
    relay: &Arc<RelayHandle>,
    channel: &Arc<RTCDataChannel>,
) {
    let owner = relay.owner;
    let label = channel.label().to_owned();

    let open_label = label.clone();
    channel.on_open(Box::new(move || {
        debug!(%owner, channel = %open_label, "relay data channel open");
        Box::pin(async {})
    }));

    let close_label = label.clone();
    channel.on_close(Box::new(move || {
        debug!(%owner, channel = %close_label, "relay data channel closed");
        Box::pin(async {})
    }));

    let error_label = label.clone();
    channel.on_error(Box::new(move |e| {
        warn!(%owner, channel = %error_label, error = %e, "relay data channel error");
        Box::pin(async {})
    }));

    let msg_server = Arc::downgrade(server);
    let msg_relay = Arc::downgrade(relay);
    channel.on_message(Box::new(move |msg: DataChannelMessage| {
        let server = msg_server.clone();
        let relay = msg_relay.clone();
        let label = label.clone();
        Box::pin(async move {
            let (Some(server), Some(relay)) = (server.upgrade(), relay.upgrade()) else {
                return;
            };
            let data = Bytes::from(msg.data.to_vec());
            protocol::handle_frame(&server, &relay, &label, &data).await;
        })
    }));
}
