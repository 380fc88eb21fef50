use crate::client::Client;
use crate::message;
use crate::server::Server;
use crate::signaling::handlers::{self, advise, not_the_host};
use beacon_core::SignalPacket;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// `SIZE`: host-only; adjusts the peer limit. Zero lifts the limit; a
/// limit below the current member count is refused.
pub async fn size(server: &Arc<Server>, client: &Arc<Client>, packet: &SignalPacket) {
    let listener = packet.listener.as_deref();

    if !client.in_lobby() {
        advise(client, "CONFIG_REQUIRED", listener);
        return;
    }
    if !client.am_i_host() {
        not_the_host(client, listener);
        return;
    }

    let size = match packet
        .payload
        .as_ref()
        .and_then(Value::as_u64)
        .and_then(|size| u32::try_from(size).ok())
    {
        Some(size) => size,
        None => {
            handlers::violation(
                server,
                client,
                "Payload (lobby size) must be an integer",
                listener,
            )
            .await;
            return;
        }
    };

    let members = server
        .games
        .lobby_members(&client.lobby(), client.game_id())
        .len()
        .saturating_sub(1);
    if size != 0 && (size as usize) < members {
        if let Err(e) = message::code(
            client,
            "WARNING",
            Some(Value::String(
                "Lobby size cannot be reduced to less than the current number of members"
                    .to_owned(),
            )),
            listener,
            None,
        ) {
            warn!(id = %client.id(), error = %e, "WARNING reply failed");
        }
        return;
    }

    let Some(mut settings) = server.games.settings(&client.lobby(), client.game_id()) else {
        warn!(lobby = %client.lobby(), "lobby settings missing");
        return;
    };
    settings.max_peers = size;
    if let Err(e) = server
        .games
        .set_settings(&client.lobby(), client.game_id(), settings)
    {
        warn!(error = %e, "failed to store lobby settings");
        return;
    }

    advise(client, "ACK_SIZE", listener);
}
