use crate::client::Client;
use crate::message;
use crate::registry::excluding;
use crate::relay;
use crate::server::Server;
use crate::signaling::handlers::{self, advise};
use crate::signaling::session;
use beacon_core::{NewPeerParams, PeerConfigParams, SignalPacket, DEFAULT_LOBBY};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// `CONFIG_PEER`: joins an existing lobby as a peer.
///
/// The join path has no `TRANSITION` rendezvous: a client leaving its
/// staging placement (override armed) departs with the normal broadcasts
/// and immediately proceeds into the target lobby.
pub async fn config_peer(server: &Arc<Server>, client: &Arc<Client>, packet: &SignalPacket) {
    let listener = packet.listener.as_deref();

    if !client.authorized() {
        advise(client, "CONFIG_REQUIRED", listener);
        return;
    }
    if client.am_i_host() && !client.initial_override_armed() {
        if let Err(e) = message::code(
            client,
            "WARNING",
            Some(Value::String(
                "Cannot change modes while in session. Please disconnect and reconnect."
                    .to_owned(),
            )),
            listener,
            None,
        ) {
            warn!(id = %client.id(), error = %e, "WARNING reply failed");
        }
        return;
    }
    if client.am_i_peer() && !client.initial_override_armed() {
        advise(client, "ALREADY_PEER", listener);
        return;
    }

    let params = match packet
        .payload
        .clone()
        .map(serde_json::from_value::<PeerConfigParams>)
    {
        Some(Ok(params)) => params,
        Some(Err(e)) => {
            handlers::violation(server, client, e.to_string(), listener).await;
            return;
        }
        None => {
            handlers::violation(server, client, "Missing required field: payload", listener).await;
            return;
        }
    };
    if let Err(reason) = params.validate() {
        handlers::violation(server, client, reason, listener).await;
        return;
    }

    join_lobby(server, client, &params, listener).await;
}

/// Validates the target lobby, moves the client into it and performs the
/// mesh introductions. Shared with `INIT`'s staging-lobby join.
pub(crate) async fn join_lobby(
    server: &Arc<Server>,
    client: &Arc<Client>,
    params: &PeerConfigParams,
    listener: Option<&str>,
) {
    let game_id = client.game_id().to_owned();
    let lobby_id = params.lobby_id.clone();

    let Some(settings) = server.games.settings(&lobby_id, &game_id) else {
        debug!(lobby = %lobby_id, game = %game_id, "lobby doesn't exist");
        advise(client, "LOBBY_NOTFOUND", listener);
        return;
    };

    if settings.reclaim_in_progress {
        debug!(lobby = %lobby_id, "lobby is hostless and awaiting peer-based reclaim");
        advise(client, "LOBBY_RECLAIM", listener);
        return;
    }
    if settings.locked {
        advise(client, "LOBBY_LOCKED", listener);
        return;
    }
    if !settings.password.is_empty() {
        if params.password.is_empty() {
            advise(client, "PASSWORD_REQUIRED", listener);
            return;
        }
        if params.password != settings.password {
            advise(client, "PASSWORD_FAIL", listener);
            return;
        }
        advise(client, "PASSWORD_ACK", listener);
    }

    // Member count excluding the host.
    let members = server
        .games
        .lobby_members(&lobby_id, &game_id)
        .len()
        .saturating_sub(1);
    if settings.max_peers > 0 && members as u32 == settings.max_peers {
        advise(client, "LOBBY_FULL", listener);
        return;
    }

    // Leave the current placement (normally the staging lobby) with the
    // regular departure choreography, then consume the one-shot override.
    if client.in_lobby() {
        session::prepare_to_change_modes_or_disconnect(server, client).await;
    }
    client.consume_initial_override();

    server
        .games
        .remove_from_lobby(DEFAULT_LOBBY, &game_id, client);
    server.games.add_to_lobby(&lobby_id, &game_id, client);

    client.set_peer_mode();
    client.set_lobby(&lobby_id);
    client.set_public_key(params.public_key.clone());

    let host = match server.games.host(&lobby_id, &game_id) {
        Ok(host) => host,
        Err(e) => {
            warn!(lobby = %lobby_id, error = %e, "get lobby host failed");
            return;
        }
    };

    let joiner = NewPeerParams {
        id: client.id().to_string(),
        user: client.username(),
        public_key: params.public_key.clone(),
    };

    if let Err(e) = message::code(&host, "NEW_PEER", message::payload(&joiner), None, None) {
        warn!(id = %host.id(), error = %e, "NEW_PEER delivery failed");
    }

    // Existing non-host members prepare for a connection from the joiner.
    let others = excluding(
        excluding(
            server.games.lobby_members(&lobby_id, &game_id),
            client.id(),
        ),
        host.id(),
    );
    message::broadcast(
        &others,
        &SignalPacket {
            opcode: "ANTICIPATE".to_owned(),
            payload: message::payload(&joiner),
            ..Default::default()
        },
    );

    advise(client, "ACK_PEER", listener);

    // The joiner waits for the host's offer and initiates toward everyone
    // else.
    if let Err(e) = message::code(
        client,
        "ANTICIPATE",
        message::payload(&NewPeerParams {
            id: host.id().to_string(),
            user: host.username(),
            public_key: host.public_key(),
        }),
        None,
        None,
    ) {
        warn!(id = %client.id(), error = %e, "ANTICIPATE delivery failed");
    }
    for peer in &others {
        if let Err(e) = message::code(
            client,
            "DISCOVER",
            message::payload(&NewPeerParams {
                id: peer.id().to_string(),
                user: peer.username(),
                public_key: peer.public_key(),
            }),
            None,
            None,
        ) {
            warn!(id = %client.id(), error = %e, "DISCOVER delivery failed");
        }
    }

    if settings.use_server_relay {
        relay::attach(server, client, &game_id, &lobby_id).await;
    }
}
