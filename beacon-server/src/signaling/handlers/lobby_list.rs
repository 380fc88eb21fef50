use crate::client::Client;
use crate::message;
use crate::server::Server;
use crate::signaling::handlers::advise;
use beacon_core::SignalPacket;
use std::sync::Arc;
use tracing::warn;

/// `LOBBY_LIST`: the joinable lobby ids in the client's game. The
/// staging lobby never appears.
pub fn lobby_list(server: &Arc<Server>, client: &Arc<Client>, packet: &SignalPacket) {
    let listener = packet.listener.as_deref();

    if !client.authorized() {
        advise(client, "CONFIG_REQUIRED", listener);
        return;
    }

    let lobbies = server.games.list_lobbies(client.game_id());
    if let Err(e) = message::code(
        client,
        "LOBBY_LIST",
        message::payload(&lobbies),
        listener,
        None,
    ) {
        warn!(id = %client.id(), error = %e, "LOBBY_LIST reply failed");
    }
}
