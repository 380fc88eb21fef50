//! Session lifecycle: opening a connection, the teardown choreography
//! shared by disconnects and voluntary mode changes, and the three
//! host-departure policies (destroy, automated reclaim, peer-based
//! reclaim).

use crate::client::Client;
use crate::message;
use crate::registry::excluding;
use crate::server::Server;
use axum::extract::ws::Message;
use beacon_core::{LobbySettings, PeerId, PeerInfo, SignalPacket};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Registers a fresh connection: assigns a ULID and session number,
/// creates the session entry and adds the client to its game.
pub fn open(
    server: &Arc<Server>,
    game_id: String,
    outbound: mpsc::UnboundedSender<Message>,
) -> Arc<Client> {
    let client = Arc::new(Client::new(
        PeerId::generate(),
        server.next_session_number(),
        game_id,
        outbound,
    ));
    if let Err(e) = server.sessions.create(client.clone()) {
        // ULIDs do not collide in practice; log and carry on with the
        // fresh entry shadowed.
        warn!(error = %e, "session registration failed");
    }
    server.games.add_client_to_game(client.game_id(), &client);
    info!(id = %client.id(), session = client.session(), "created new session");
    client
}

/// Terminates a client's session: runs the leave-lobby choreography,
/// removes the client from its game and the session registry, and closes
/// the transport. Idempotent; the destroy path re-enters it for every
/// remaining peer.
pub async fn close(server: &Arc<Server>, client: &Arc<Client>) {
    if !client.begin_close() {
        return;
    }
    prepare_to_change_modes_or_disconnect(server, client).await;
    server.games.remove_client_from_game(client.game_id(), client);
    server.sessions.remove(client.id());
    client.cancel();
    info!(id = %client.id(), session = client.session(), "closed session");
}

/// The teardown choreography shared by disconnects and voluntary mode
/// changes; only the caller decides whether the transport goes down
/// afterwards. Peers announce their departure; hosts trigger whichever
/// reclaim policy the lobby settings select. Afterwards the client is
/// modeless and lobby-less.
pub async fn prepare_to_change_modes_or_disconnect(server: &Arc<Server>, client: &Arc<Client>) {
    if client.am_i_peer() {
        let lobby_id = client.lobby();
        let game_id = client.game_id().to_owned();
        let audience = excluding(
            server.games.lobby_members(&lobby_id, &game_id),
            client.id(),
        );
        message::broadcast(
            &audience,
            &SignalPacket {
                opcode: "PEER_GONE".to_owned(),
                payload: message::payload(&PeerInfo::new(
                    client.id().to_string(),
                    client.username(),
                )),
                ..Default::default()
            },
        );
        server.relays.delete(client.id()).await;
        leave_current_lobby(server, client);

        // A hostless lobby (mid peer-based reclaim) that just lost its
        // last member can never be revived; drop it.
        if server.games.lobby_members(&lobby_id, &game_id).is_empty()
            && matches!(
                server.games.host(&lobby_id, &game_id),
                Err(crate::error::RegistryError::NoHost(_))
            )
        {
            server.games.destroy_lobby(&game_id, &lobby_id);
        }
    }

    if client.am_i_host() {
        if let Some(settings) = server.games.settings(&client.lobby(), client.game_id()) {
            if settings.allow_host_reclaim {
                if settings.allow_peers_to_claim_host {
                    depart_with_peer_reclaim(server, client, settings).await;
                } else {
                    depart_with_automated_reclaim(server, client).await;
                }
            } else {
                depart_and_destroy_lobby(server, client).await;
            }
        }
    }

    client.clear_mode();
    client.clear_lobby();
}

fn leave_current_lobby(server: &Arc<Server>, client: &Arc<Client>) {
    if client.in_lobby() {
        server
            .games
            .remove_from_lobby(&client.lobby(), client.game_id(), client);
    }
}

/// Host left and reclaim is disabled: the lobby dies with its host, and
/// every remaining peer is disconnected through the same teardown.
async fn depart_and_destroy_lobby(server: &Arc<Server>, client: &Arc<Client>) {
    let lobby_id = client.lobby();
    let game_id = client.game_id().to_owned();

    server.relays.delete(client.id()).await;

    let peers = excluding(
        server.games.lobby_members(&lobby_id, &game_id),
        client.id(),
    );
    message::broadcast(&peers, &SignalPacket::new("HOST_GONE"));

    server.games.remove_from_lobby(&lobby_id, &game_id, client);
    server.games.clear_host(&lobby_id, &game_id);
    server.games.destroy_lobby(&game_id, &lobby_id);

    message::broadcast(&peers, &SignalPacket::new("LOBBY_CLOSE"));

    for peer in &peers {
        Box::pin(close(server, peer)).await;
    }

    leave_current_lobby(server, client);
}

/// Host left with automated reclaim: the first remaining member becomes
/// the new host, or the lobby is destroyed when nobody is left.
async fn depart_with_automated_reclaim(server: &Arc<Server>, client: &Arc<Client>) {
    let lobby_id = client.lobby();
    let game_id = client.game_id().to_owned();

    server.games.clear_host(&lobby_id, &game_id);
    server.relays.delete(client.id()).await;

    let peers = excluding(
        server.games.lobby_members(&lobby_id, &game_id),
        client.id(),
    );
    if peers.is_empty() {
        server.games.destroy_lobby(&game_id, &lobby_id);
    } else {
        let new_host = peers[0].clone();
        server.games.set_host(&lobby_id, &game_id, &new_host);
        new_host.set_host_mode();
        message::broadcast(
            &peers,
            &SignalPacket {
                opcode: "HOST_RECLAIM".to_owned(),
                payload: message::payload(&PeerInfo::new(
                    new_host.id().to_string(),
                    new_host.username(),
                )),
                ..Default::default()
            },
        );
    }

    leave_current_lobby(server, client);
}

/// Host left with peer-based reclaim: a single remaining peer is promoted
/// unilaterally; two or more are asked to elect among themselves, with the
/// lobby flagged so nobody can join mid-election.
async fn depart_with_peer_reclaim(
    server: &Arc<Server>,
    client: &Arc<Client>,
    mut settings: LobbySettings,
) {
    let lobby_id = client.lobby();
    let game_id = client.game_id().to_owned();

    server.games.clear_host(&lobby_id, &game_id);
    server.relays.delete(client.id()).await;

    let peers = excluding(
        server.games.lobby_members(&lobby_id, &game_id),
        client.id(),
    );
    match peers.len() {
        0 => server.games.destroy_lobby(&game_id, &lobby_id),
        1 => {
            let new_host = peers[0].clone();
            server.games.set_host(&lobby_id, &game_id, &new_host);
            new_host.set_host_mode();
            if let Err(e) = message::code(
                &new_host,
                "HOST_RECLAIM",
                message::payload(&PeerInfo::new(
                    new_host.id().to_string(),
                    new_host.username(),
                )),
                None,
                None,
            ) {
                warn!(id = %new_host.id(), error = %e, "failed to promote sole remaining peer");
            }
        }
        _ => {
            settings.reclaim_in_progress = true;
            if let Err(e) = server.games.set_settings(&lobby_id, &game_id, settings) {
                warn!(error = %e, "failed to flag reclaim in progress");
            }
            message::broadcast(&peers, &SignalPacket::new("RECLAIM_HOST"));
        }
    }

    leave_current_lobby(server, client);
}
