//! A client-side WebRTC peer for exercising the server relay: no ICE
//! servers, loopback host candidates only, and the same pre-negotiated
//! "default" channel the relay declares.

use super::TestPeer;
use anyhow::{Context, Result};
use beacon_server::Server;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

pub struct RelayTestClient {
    peer_connection: Arc<RTCPeerConnection>,
    channel: Arc<RTCDataChannel>,
    open: Arc<AtomicBool>,
    messages: Mutex<mpsc::UnboundedReceiver<String>>,
    candidates: Mutex<mpsc::UnboundedReceiver<Value>>,
}

impl RelayTestClient {
    pub async fn new() -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let peer_connection = Arc::new(
            api.new_peer_connection(RTCConfiguration::default())
                .await?,
        );

        let (candidate_tx, candidate_rx) = mpsc::unbounded_channel();
        peer_connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let candidate_tx = candidate_tx.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else { return };
                if let Ok(init) = candidate.to_json() {
                    if let Ok(value) = serde_json::to_value(&init) {
                        let _ = candidate_tx.send(value);
                    }
                }
            })
        }));

        // Mirror of the relay's channel declaration; negotiated channels
        // never arrive through on_data_channel.
        let channel = peer_connection
            .create_data_channel(
                "default",
                Some(RTCDataChannelInit {
                    ordered: Some(true),
                    protocol: Some("clomega".to_owned()),
                    negotiated: Some(0),
                    ..Default::default()
                }),
            )
            .await?;

        let open = Arc::new(AtomicBool::new(false));
        let open_flag = open.clone();
        channel.on_open(Box::new(move || {
            open_flag.store(true, Ordering::SeqCst);
            Box::pin(async {})
        }));

        let (message_tx, message_rx) = mpsc::unbounded_channel();
        channel.on_message(Box::new(move |msg: DataChannelMessage| {
            let message_tx = message_tx.clone();
            Box::pin(async move {
                let _ = message_tx.send(String::from_utf8_lossy(&msg.data).into_owned());
            })
        }));

        Ok(Self {
            peer_connection,
            channel,
            open,
            messages: Mutex::new(message_rx),
            candidates: Mutex::new(candidate_rx),
        })
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub async fn create_offer(&self) -> Result<RTCSessionDescription> {
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection.set_local_description(offer).await?;
        self.peer_connection
            .local_description()
            .await
            .context("no local description after offer")
    }

    pub async fn apply_answer(&self, answer: Value) -> Result<()> {
        let answer: RTCSessionDescription = serde_json::from_value(answer)?;
        self.peer_connection.set_remote_description(answer).await?;
        Ok(())
    }

    pub async fn add_candidate(&self, candidate: Value) -> Result<()> {
        self.peer_connection
            .add_ice_candidate(serde_json::from_value(candidate)?)
            .await?;
        Ok(())
    }

    pub async fn next_candidate(&self, timeout_ms: u64) -> Option<Value> {
        let mut candidates = self.candidates.lock().await;
        tokio::time::timeout(Duration::from_millis(timeout_ms), candidates.recv())
            .await
            .ok()
            .flatten()
    }

    pub async fn send_packet(&self, packet: Value) -> Result<()> {
        self.channel.send_text(packet.to_string()).await?;
        Ok(())
    }

    pub async fn next_message(&self, timeout_ms: u64) -> Option<Value> {
        let mut messages = self.messages.lock().await;
        let text = tokio::time::timeout(Duration::from_millis(timeout_ms), messages.recv())
            .await
            .ok()
            .flatten()?;
        serde_json::from_str(&text).ok()
    }

    pub async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

/// Runs the full offer/answer/ICE exchange between a signaling peer and
/// its server-side relay until the data channel opens.
pub async fn establish(
    server: &Arc<Server>,
    peer: &mut TestPeer,
    client: &RelayTestClient,
) -> Result<()> {
    let offer = client.create_offer().await?;
    peer.send(
        server,
        super::packet_to(
            "MAKE_OFFER",
            Some(json!({ "type": 0, "contents": serde_json::to_value(&offer)? })),
            "relay",
        ),
    )
    .await;

    // The relay may start trickling candidates before its answer lands;
    // hold them until the remote description is in place.
    let mut early_candidates = Vec::new();
    loop {
        let envelope = peer.recv().await;
        match envelope.opcode.as_str() {
            "ICE" => {
                if let Some(contents) = envelope
                    .payload
                    .as_ref()
                    .and_then(|payload| payload.get("contents"))
                {
                    early_candidates.push(contents.clone());
                }
            }
            "MAKE_ANSWER" => {
                let origin = envelope.origin.clone().context("relay answer without origin")?;
                assert_eq!(origin.id, "relay");
                let contents = envelope
                    .payload
                    .context("relay answer without payload")?
                    .get("contents")
                    .cloned()
                    .context("relay answer without contents")?;
                client.apply_answer(contents).await?;
                break;
            }
            other => panic!("unexpected envelope during relay setup: {other}"),
        }
    }
    for candidate in early_candidates {
        client.add_candidate(candidate).await?;
    }

    let deadline = Instant::now() + Duration::from_secs(15);
    while !client.is_open() {
        if Instant::now() > deadline {
            anyhow::bail!("data channel did not open in time");
        }

        // Trickle our candidates up to the relay.
        while let Some(candidate) = client.next_candidate(50).await {
            peer.send(
                server,
                super::packet_to(
                    "ICE",
                    Some(json!({ "type": 0, "contents": candidate })),
                    "relay",
                ),
            )
            .await;
        }

        // And the relay's candidates down to us.
        while let Some(envelope) = peer.recv_within(50).await {
            if envelope.opcode != "ICE" {
                continue;
            }
            if let Some(contents) = envelope
                .payload
                .as_ref()
                .and_then(|payload| payload.get("contents"))
            {
                client.add_candidate(contents.clone()).await?;
            }
        }
    }

    Ok(())
}
