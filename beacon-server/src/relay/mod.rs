mod message;
mod peer;
mod protocol;

pub use peer::RelayHandle;

use crate::client::Client;
use crate::server::Server;
use beacon_core::NewPeerParams;
use std::sync::Arc;
use tracing::error;

/// Label of the pre-negotiated channel every relay opens.
pub const DEFAULT_CHANNEL: &str = "default";

/// Sub-protocol announced on relay data channels.
pub const RELAY_PROTOCOL: &str = "clomega";

/// Spawns a relay for a client that just entered a relay-enabled lobby,
/// records it, and tells the client to start discovering it.
pub(crate) async fn attach(
    server: &Arc<Server>,
    client: &Arc<Client>,
    game_id: &str,
    lobby_id: &str,
) {
    match peer::spawn(server, game_id, lobby_id, client).await {
        Ok(relay) => {
            server.relays.set(client.id(), relay);
            let discover = NewPeerParams {
                id: beacon_core::RELAY_ID.to_owned(),
                user: beacon_core::RELAY_ID.to_owned(),
                public_key: None,
            };
            if let Err(e) = crate::message::code(
                client,
                "DISCOVER",
                crate::message::payload(&discover),
                None,
                None,
            ) {
                error!(id = %client.id(), error = %e, "failed to announce relay");
            }
        }
        Err(e) => error!(id = %client.id(), error = %e, "failed to spawn relay"),
    }
}
