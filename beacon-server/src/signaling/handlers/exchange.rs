//! SDP/ICE exchange: `MAKE_OFFER`, `MAKE_ANSWER` and `ICE` share one
//! forwarding shape. A recipient id names another lobby member; the
//! literal `"relay"` routes the payload into the server-side relay peer.

use crate::client::Client;
use crate::message;
use crate::server::Server;
use crate::signaling::handlers::{self, advise};
use beacon_core::{
    CandidateContents, IceContents, PeerInfo, SignalPacket, DATA_CANDIDATE, RELAY_ID,
    VOICE_CANDIDATE,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone, Copy)]
enum Exchange {
    Offer,
    Answer,
    Ice,
}

impl Exchange {
    fn opcode(self) -> &'static str {
        match self {
            Exchange::Offer => "MAKE_OFFER",
            Exchange::Answer => "MAKE_ANSWER",
            Exchange::Ice => "ICE",
        }
    }
}

pub async fn make_offer(server: &Arc<Server>, client: &Arc<Client>, packet: &SignalPacket) {
    exchange(server, client, packet, Exchange::Offer).await;
}

pub async fn make_answer(server: &Arc<Server>, client: &Arc<Client>, packet: &SignalPacket) {
    exchange(server, client, packet, Exchange::Answer).await;
}

pub async fn ice(server: &Arc<Server>, client: &Arc<Client>, packet: &SignalPacket) {
    exchange(server, client, packet, Exchange::Ice).await;
}

async fn exchange(
    server: &Arc<Server>,
    client: &Arc<Client>,
    packet: &SignalPacket,
    kind: Exchange,
) {
    let listener = packet.listener.as_deref();

    if !client.in_lobby() {
        advise(client, "CONFIG_REQUIRED", listener);
        return;
    }

    let recipient = packet.recipient.as_deref().unwrap_or_default();
    if recipient == RELAY_ID {
        exchange_with_relay(server, client, packet, kind).await;
        return;
    }

    // Nonexistent recipients are dropped silently; only a recipient
    // outside the lobby earns a reply.
    let Some(peer) = server.sessions.lookup(recipient) else {
        debug!(id = %client.id(), recipient, opcode = kind.opcode(), "recipient doesn't exist");
        return;
    };
    if !server
        .games
        .is_client_in_lobby(&client.lobby(), client.game_id(), &peer)
    {
        advise(client, "PEER_INVALID", listener);
        return;
    }

    if let Err(e) = message::code(
        &peer,
        kind.opcode(),
        packet.payload.clone(),
        None,
        Some(PeerInfo::new(client.id().to_string(), client.username())),
    ) {
        warn!(id = %peer.id(), opcode = kind.opcode(), error = %e, "forward failed");
    }
    advise(client, "RELAY_OK", listener);
}

async fn exchange_with_relay(
    server: &Arc<Server>,
    client: &Arc<Client>,
    packet: &SignalPacket,
    kind: Exchange,
) {
    let listener = packet.listener.as_deref();

    let Some(settings) = server.games.settings(&client.lobby(), client.game_id()) else {
        return;
    };
    if !settings.use_server_relay {
        return;
    }
    let Some(relay) = server.relays.get(client.id()) else {
        debug!(id = %client.id(), "no relay for this client");
        return;
    };

    match kind {
        Exchange::Offer => {
            let Some(candidate) =
                relay_payload::<CandidateContents>(server, client, packet).await
            else {
                return;
            };
            if refuse_voice(client, candidate.kind, listener) {
                return;
            }
            match relay.answer_offer(candidate.contents).await {
                Ok(answer) => {
                    if let Err(e) = message::code(
                        client,
                        "MAKE_ANSWER",
                        message::payload(&CandidateContents {
                            kind: DATA_CANDIDATE,
                            contents: answer,
                        }),
                        None,
                        Some(PeerInfo::relay()),
                    ) {
                        warn!(id = %client.id(), error = %e, "relay answer delivery failed");
                    }
                }
                Err(e) => warn!(id = %client.id(), error = %e, "relay answer failed"),
            }
        }
        Exchange::Answer => {
            let Some(candidate) =
                relay_payload::<CandidateContents>(server, client, packet).await
            else {
                return;
            };
            if refuse_voice(client, candidate.kind, listener) {
                return;
            }
            if let Err(e) = relay.apply_answer(candidate.contents).await {
                warn!(id = %client.id(), error = %e, "relay apply answer failed");
            }
        }
        Exchange::Ice => {
            let Some(candidate) = relay_payload::<IceContents>(server, client, packet).await
            else {
                return;
            };
            if refuse_voice(client, candidate.kind, listener) {
                return;
            }
            if let Err(e) = relay.add_remote_candidate(candidate.contents).await {
                warn!(id = %client.id(), error = %e, "relay add candidate failed");
            }
        }
    }
}

/// Decodes the typed relay payload; a malformed one is a protocol
/// violation and costs the connection.
async fn relay_payload<T: DeserializeOwned>(
    server: &Arc<Server>,
    client: &Arc<Client>,
    packet: &SignalPacket,
) -> Option<T> {
    let listener = packet.listener.as_deref();
    match packet.payload.clone().map(serde_json::from_value::<T>) {
        Some(Ok(payload)) => Some(payload),
        Some(Err(e)) => {
            handlers::violation(server, client, e.to_string(), listener).await;
            None
        }
        None => {
            handlers::violation(server, client, "Missing required field: payload", listener).await;
            None
        }
    }
}

/// The relay terminates data channels only; voice candidates are refused.
fn refuse_voice(client: &Client, kind: u8, listener: Option<&str>) -> bool {
    if kind == VOICE_CANDIDATE {
        if let Err(e) = message::code(
            client,
            "WARNING",
            Some(Value::String(
                "voice connections are not supported by the server relay".to_owned(),
            )),
            listener,
            None,
        ) {
            warn!(id = %client.id(), error = %e, "WARNING reply failed");
        }
        return true;
    }
    false
}
