//! Delivery over relay data channels, addressed by channel label.

use crate::relay::RelayHandle;
use beacon_core::RelayPacket;
use std::sync::Arc;
use tracing::warn;

pub(crate) async fn send(relay: &RelayHandle, label: &str, packet: &RelayPacket) {
    let Some(channel) = relay.channel(label) else {
        warn!(owner = %relay.owner(), label, "relay has no channel with that label");
        return;
    };
    let text = match serde_json::to_string(packet) {
        Ok(text) => text,
        Err(e) => {
            warn!(owner = %relay.owner(), error = %e, "failed to serialize relay packet");
            return;
        }
    };
    if let Err(e) = channel.send_text(text).await {
        warn!(owner = %relay.owner(), label, error = %e, "relay delivery failed");
    }
}

pub(crate) async fn broadcast(relays: &[Arc<RelayHandle>], label: &str, packet: &RelayPacket) {
    for relay in relays {
        send(relay, label, packet).await;
    }
}
