//! The forwarding protocol spoken over relay data channels. `G_*` opcodes
//! broadcast to every other relay in the lobby, `P_*` opcodes deliver to a
//! single validated recipient.

use crate::error::RelayDeliveryError;
use crate::relay::{message, RelayHandle};
use crate::server::Server;
use beacon_core::{PeerInfo, RelayPacket};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) async fn handle_frame(
    server: &Arc<Server>,
    relay: &Arc<RelayHandle>,
    label: &str,
    raw: &[u8],
) {
    let packet = match serde_json::from_slice::<RelayPacket>(raw) {
        Ok(packet) => packet,
        Err(e) => {
            warn!(owner = %relay.owner(), error = %e, "failed to parse relay message");
            return;
        }
    };

    // The relay speaks for its owner; origins are always rewritten.
    let Some(owner) = server.sessions.get(relay.owner()) else {
        debug!(owner = %relay.owner(), "relay owner session is gone, dropping packet");
        return;
    };
    let origin = PeerInfo::new(owner.id().to_string(), owner.username());

    match packet.opcode.as_str() {
        "G_MSG" | "G_VAR" | "G_LIST" => {
            let audience: Vec<Arc<RelayHandle>> = server
                .relays_in_lobby(relay.lobby_id(), relay.game_id())
                .into_iter()
                .filter(|other| other.owner() != relay.owner())
                .collect();
            let outbound = RelayPacket {
                opcode: packet.opcode.clone(),
                payload: packet.payload.clone(),
                origin: Some(origin),
                recipient: None,
                channel: packet.channel.clone(),
            };
            message::broadcast(&audience, label, &outbound).await;
        }

        "P_MSG" | "P_VAR" | "P_LIST" => {
            let target = match verify_recipient(server, relay, &packet) {
                Ok(target) => target,
                Err(e) => {
                    debug!(owner = %relay.owner(), error = %e, "dropping directed relay packet");
                    return;
                }
            };
            let outbound = RelayPacket {
                opcode: packet.opcode.clone(),
                payload: packet.payload.clone(),
                origin: Some(origin),
                recipient: None,
                channel: packet.channel.clone(),
            };
            message::send(&target, label, &outbound).await;
        }

        other => {
            debug!(owner = %relay.owner(), opcode = other, "unknown relay opcode");
            let reply = RelayPacket {
                opcode: "WARN".to_owned(),
                payload: Some(Value::String(format!("Unknown opcode: {other}"))),
                ..Default::default()
            };
            message::send(relay, label, &reply).await;
        }
    }
}

/// A directed packet needs a recipient that exists, lives in the same
/// lobby as the sender's relay, and has a relay of its own.
fn verify_recipient(
    server: &Arc<Server>,
    relay: &RelayHandle,
    packet: &RelayPacket,
) -> Result<Arc<RelayHandle>, RelayDeliveryError> {
    let recipient = packet.recipient.as_deref().unwrap_or_default();
    if recipient.is_empty() {
        return Err(RelayDeliveryError::RecipientMissing);
    }
    let Some(peer) = server.sessions.lookup(recipient) else {
        return Err(RelayDeliveryError::RecipientUnknown(recipient.to_owned()));
    };
    if !server
        .games
        .is_client_in_lobby(relay.lobby_id(), relay.game_id(), &peer)
    {
        return Err(RelayDeliveryError::RecipientOutsideLobby(
            recipient.to_owned(),
        ));
    }
    server
        .relays
        .get(peer.id())
        .ok_or_else(|| RelayDeliveryError::RecipientWithoutRelay(recipient.to_owned()))
}
