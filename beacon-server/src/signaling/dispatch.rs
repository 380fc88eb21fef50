use crate::client::Client;
use crate::message;
use crate::server::Server;
use crate::signaling::handlers;
use beacon_core::SignalPacket;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Routes one decoded envelope to its opcode handler. Runs on its own
/// task, so handlers for the same connection execute concurrently.
pub async fn dispatch(server: Arc<Server>, client: Arc<Client>, packet: SignalPacket) {
    match packet.opcode.as_str() {
        "KEEPALIVE" => {
            if let Err(e) = message::code(
                &client,
                "KEEPALIVE",
                packet.payload.clone(),
                packet.listener.as_deref(),
                None,
            ) {
                warn!(id = %client.id(), error = %e, "KEEPALIVE reply failed");
            }
        }
        "INIT" => handlers::init(&server, &client, &packet).await,
        "META" => handlers::meta(&client, &packet),
        "CONFIG_HOST" => handlers::config_host(&server, &client, &packet).await,
        "CONFIG_PEER" => handlers::config_peer(&server, &client, &packet).await,
        "MAKE_OFFER" => handlers::make_offer(&server, &client, &packet).await,
        "MAKE_ANSWER" => handlers::make_answer(&server, &client, &packet).await,
        "ICE" => handlers::ice(&server, &client, &packet).await,
        "LOBBY_LIST" => handlers::lobby_list(&server, &client, &packet),
        "LOBBY_INFO" => handlers::lobby_info(&server, &client, &packet).await,
        "LOCK" => handlers::lock(&server, &client, &packet).await,
        "UNLOCK" => handlers::unlock(&server, &client, &packet).await,
        "SIZE" => handlers::size(&server, &client, &packet).await,
        "TRANSITION_ACK" => {
            debug!(id = %client.id(), "transition ack received");
            client.transition_ack();
        }
        other => {
            debug!(id = %client.id(), opcode = other, "unknown opcode");
            if let Err(e) = message::code(
                &client,
                "VIOLATION",
                Some(Value::String("Unknown opcode".to_owned())),
                packet.listener.as_deref(),
                None,
            ) {
                warn!(id = %client.id(), error = %e, "VIOLATION reply failed");
            }
        }
    }
}
