use crate::client::Client;
use crate::message;
use crate::server::Server;
use crate::signaling::handlers::{self, advise};
use beacon_core::{
    LobbySettings, PeerConfigParams, SessionGreeting, SignalPacket, DEFAULT_LOBBY,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// `INIT`: identifies the connection. Replies `INIT_OK`, then places the
/// client in the game's staging lobby: joining it as a peer when it
/// already exists, otherwise materializing it with this client as host.
/// Finally arms the one-shot transition override so the client's first
/// `CONFIG_*` can change modes.
pub async fn init(server: &Arc<Server>, client: &Arc<Client>, packet: &SignalPacket) {
    let listener = packet.listener.as_deref();

    if client.authorized() {
        advise(client, "SESSION_EXISTS", listener);
        return;
    }

    let Some(username) = packet.payload.as_ref().and_then(Value::as_str) else {
        handlers::violation(
            server,
            client,
            "Payload (username) must be a string",
            listener,
        )
        .await;
        return;
    };

    client.set_username(username);
    client.authorize();

    if let Err(e) = message::code(
        client,
        "INIT_OK",
        message::payload(&SessionGreeting {
            user: username.to_owned(),
            id: client.id().to_string(),
            session_id: client.session(),
        }),
        listener,
        None,
    ) {
        warn!(id = %client.id(), error = %e, "INIT_OK reply failed");
    }

    if server.games.lobby_exists(DEFAULT_LOBBY, client.game_id()) {
        handlers::join_lobby(
            server,
            client,
            &PeerConfigParams {
                lobby_id: DEFAULT_LOBBY.to_owned(),
                ..Default::default()
            },
            None,
        )
        .await;
    } else {
        handlers::open_lobby(server, client, LobbySettings::staging(), None).await;
    }

    client.arm_initial_override();
}
