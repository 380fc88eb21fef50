//! Outbound WebSocket fan-out. Every frame is serialized once per
//! recipient and queued on that client's writer channel, so delivery to a
//! single client is FIFO regardless of which handler task sent it.

use crate::client::Client;
use axum::extract::ws::Message;
use beacon_core::{PeerInfo, SignalPacket};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

pub fn send(client: &Client, packet: &SignalPacket) -> anyhow::Result<()> {
    let text = serde_json::to_string(packet)?;
    client.enqueue(Message::Text(text.into()))
}

/// Builds and sends a one-off envelope. The workhorse of every handler.
pub fn code(
    client: &Client,
    opcode: &str,
    payload: Option<Value>,
    listener: Option<&str>,
    origin: Option<PeerInfo>,
) -> anyhow::Result<()> {
    send(
        client,
        &SignalPacket {
            opcode: opcode.to_owned(),
            payload,
            origin,
            recipient: None,
            listener: listener.map(str::to_owned),
        },
    )
}

pub fn broadcast(clients: &[Arc<Client>], packet: &SignalPacket) {
    for client in clients {
        if let Err(e) = send(client, packet) {
            warn!(id = %client.id(), error = %e, "broadcast delivery failed");
        }
    }
}

/// Marshals a reply payload, logging instead of propagating: a payload we
/// built ourselves failing to serialize is a server defect, not a client
/// protocol violation.
pub fn payload<T: Serialize>(value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "failed to serialize outbound payload");
            None
        }
    }
}
