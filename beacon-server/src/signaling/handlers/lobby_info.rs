use crate::client::Client;
use crate::message;
use crate::server::Server;
use crate::signaling::handlers::{self, advise};
use beacon_core::{LobbyInfo, SignalPacket, DEFAULT_LOBBY};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// `LOBBY_INFO`: a public snapshot of one lobby: host identity, capacity
/// and the password/reclaim flags. The staging lobby is unqueryable.
pub async fn lobby_info(server: &Arc<Server>, client: &Arc<Client>, packet: &SignalPacket) {
    let listener = packet.listener.as_deref();

    if !client.authorized() {
        advise(client, "CONFIG_REQUIRED", listener);
        return;
    }

    let Some(lobby_id) = packet.payload.as_ref().and_then(Value::as_str) else {
        handlers::violation(
            server,
            client,
            "Payload (lobby name) must be a string",
            listener,
        )
        .await;
        return;
    };

    if lobby_id == DEFAULT_LOBBY {
        advise(client, "LOBBY_NOTFOUND", listener);
        return;
    }
    let Some(settings) = server.games.settings(lobby_id, client.game_id()) else {
        advise(client, "LOBBY_NOTFOUND", listener);
        return;
    };

    if settings.reclaim_in_progress {
        debug!(lobby = lobby_id, "lobby is hostless and awaiting peer-based reclaim");
        advise(client, "LOBBY_RECLAIM", listener);
        return;
    }

    let host = match server.games.host(lobby_id, client.game_id()) {
        Ok(host) => host,
        Err(e) => {
            warn!(lobby = lobby_id, error = %e, "get lobby host failed");
            return;
        }
    };
    let current_peers = server
        .games
        .lobby_members(lobby_id, client.game_id())
        .len()
        .saturating_sub(1);

    if let Err(e) = message::code(
        client,
        "LOBBY_INFO",
        message::payload(&LobbyInfo {
            host_id: host.id().to_string(),
            host_username: host.username(),
            max_peers: settings.max_peers,
            current_peers,
            password_required: !settings.password.is_empty(),
            reclaimable: settings.allow_host_reclaim,
        }),
        listener,
        None,
    ) {
        warn!(id = %client.id(), error = %e, "LOBBY_INFO reply failed");
    }
}
