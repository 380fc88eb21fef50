use crate::client::Client;
use crate::message;
use crate::registry::excluding;
use crate::relay;
use crate::server::Server;
use crate::signaling::handlers::{self, advise};
use crate::signaling::session;
use beacon_core::{LobbySettings, NewHostParams, SignalPacket, DEFAULT_LOBBY};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// `CONFIG_HOST`: opens a new lobby with the sender as host.
///
/// A client that is currently a peer (or has the initial override armed)
/// first runs the mode-transition choreography: its old lobby is left with
/// the usual departure broadcasts, then `TRANSITION "host"` is sent and
/// the handler parks until the client acknowledges with `TRANSITION_ACK`.
pub async fn config_host(server: &Arc<Server>, client: &Arc<Client>, packet: &SignalPacket) {
    let listener = packet.listener.as_deref();

    if !client.authorized() {
        advise(client, "CONFIG_REQUIRED", listener);
        return;
    }

    let settings = match packet
        .payload
        .clone()
        .map(serde_json::from_value::<LobbySettings>)
    {
        Some(Ok(settings)) => settings.sanitize(),
        Some(Err(e)) => {
            handlers::violation(server, client, e.to_string(), listener).await;
            return;
        }
        None => {
            handlers::violation(server, client, "Missing required field: payload", listener).await;
            return;
        }
    };
    if let Err(reason) = settings.validate() {
        handlers::violation(server, client, reason, listener).await;
        return;
    }

    if client.initial_override_armed() || client.am_i_peer() {
        session::prepare_to_change_modes_or_disconnect(server, client).await;
        if let Err(e) = message::code(
            client,
            "TRANSITION",
            Some(Value::String("host".to_owned())),
            None,
            None,
        ) {
            warn!(id = %client.id(), error = %e, "TRANSITION send failed");
        }

        debug!(id = %client.id(), "waiting for transition ack");
        client.await_transition().await;

        client.consume_initial_override();
        client.clear_mode();
    }

    if client.am_i_host() {
        advise(client, "ALREADY_HOST", listener);
        return;
    }

    open_lobby(server, client, settings, listener).await;
}

/// Creates the lobby, installs the client as host, announces the new host
/// to the staging lobby and spawns the relay when requested. Shared with
/// `INIT`'s staging-lobby materialization.
pub(crate) async fn open_lobby(
    server: &Arc<Server>,
    client: &Arc<Client>,
    settings: LobbySettings,
    listener: Option<&str>,
) {
    let game_id = client.game_id().to_owned();
    let lobby_id = settings.lobby_id.clone();

    if server.games.lobby_exists(&lobby_id, &game_id) {
        debug!(lobby = %lobby_id, game = %game_id, "lobby already exists");
        advise(client, "LOBBY_EXISTS", listener);
        return;
    }

    server
        .games
        .remove_from_lobby(DEFAULT_LOBBY, &game_id, client);

    let use_server_relay = settings.use_server_relay;
    let public_key = settings.public_key.clone();

    server.games.add_to_lobby(&lobby_id, &game_id, client);
    if let Err(e) = server.games.set_settings(&lobby_id, &game_id, settings) {
        warn!(error = %e, "failed to store lobby settings");
    }
    server.games.set_host(&lobby_id, &game_id, client);

    client.set_host_mode();
    client.set_lobby(&lobby_id);
    client.set_public_key(public_key.clone());

    // Clients still idling in the staging lobby learn about the new room.
    let staging = excluding(
        server.games.lobby_members(DEFAULT_LOBBY, &game_id),
        client.id(),
    );
    message::broadcast(
        &staging,
        &SignalPacket {
            opcode: "NEW_HOST".to_owned(),
            payload: message::payload(&NewHostParams {
                id: client.id().to_string(),
                user: client.username(),
                lobby_id: lobby_id.clone(),
                public_key,
            }),
            ..Default::default()
        },
    );

    advise(client, "ACK_HOST", listener);

    if use_server_relay {
        relay::attach(server, client, &game_id, &lobby_id).await;
    }
}
