use crate::client::Client;
use crate::server::Server;
use crate::signaling::handlers::{advise, not_the_host};
use beacon_core::SignalPacket;
use std::sync::Arc;
use tracing::warn;

/// `LOCK`: host-only; stops new peers from joining the lobby.
pub async fn lock(server: &Arc<Server>, client: &Arc<Client>, packet: &SignalPacket) {
    set_locked(server, client, packet, true).await;
}

/// `UNLOCK`: host-only; lets peers join again.
pub async fn unlock(server: &Arc<Server>, client: &Arc<Client>, packet: &SignalPacket) {
    set_locked(server, client, packet, false).await;
}

async fn set_locked(
    server: &Arc<Server>,
    client: &Arc<Client>,
    packet: &SignalPacket,
    locked: bool,
) {
    let listener = packet.listener.as_deref();

    if !client.in_lobby() {
        advise(client, "CONFIG_REQUIRED", listener);
        return;
    }
    if !client.am_i_host() {
        not_the_host(client, listener);
        return;
    }

    let Some(mut settings) = server.games.settings(&client.lobby(), client.game_id()) else {
        warn!(lobby = %client.lobby(), "lobby settings missing");
        return;
    };

    if settings.locked == locked {
        advise(
            client,
            if locked { "ALREADY_LOCKED" } else { "ALREADY_UNLOCKED" },
            listener,
        );
        return;
    }

    settings.locked = locked;
    if let Err(e) = server
        .games
        .set_settings(&client.lobby(), client.game_id(), settings)
    {
        warn!(error = %e, "failed to store lobby settings");
        return;
    }

    advise(
        client,
        if locked { "ACK_LOCK" } else { "ACK_UNLOCK" },
        listener,
    );
}
