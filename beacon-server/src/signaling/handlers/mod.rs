//! One handler per signaling opcode. Preconditions are checked in a fixed
//! order (authorized → in-a-lobby → is-host) and every rejection maps to a
//! specific advisory opcode; only protocol violations terminate the
//! connection.

mod config_host;
mod config_peer;
mod exchange;
mod init;
mod lobby_info;
mod lobby_list;
mod lock;
mod meta;
mod size;

pub use config_host::config_host;
pub use config_peer::config_peer;
pub use exchange::{ice, make_answer, make_offer};
pub use init::init;
pub use lobby_info::lobby_info;
pub use lobby_list::lobby_list;
pub use lock::{lock, unlock};
pub use meta::meta;
pub use size::size;

pub(crate) use config_host::open_lobby;
pub(crate) use config_peer::join_lobby;

use crate::client::Client;
use crate::message;
use crate::server::Server;
use crate::signaling::session;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Reports a protocol violation and terminates the connection.
pub(crate) async fn violation(
    server: &Arc<Server>,
    client: &Arc<Client>,
    reason: impl Into<String>,
    listener: Option<&str>,
) {
    let reason = reason.into();
    warn!(id = %client.id(), reason, "protocol violation");
    let _ = message::code(
        client,
        "VIOLATION",
        Some(Value::String(reason)),
        listener,
        None,
    );
    session::close(server, client).await;
}

/// Sends a payload-less advisory reply, logging delivery failures.
pub(crate) fn advise(client: &Client, opcode: &str, listener: Option<&str>) {
    if let Err(e) = message::code(client, opcode, None, listener, None) {
        warn!(id = %client.id(), opcode, error = %e, "advisory reply failed");
    }
}

/// The rejection for host-only operations attempted by a non-host.
pub(crate) fn not_the_host(client: &Client, listener: Option<&str>) {
    if let Err(e) = message::code(
        client,
        "WARNING",
        Some(Value::String("Not the lobby host".to_owned())),
        listener,
        None,
    ) {
        warn!(id = %client.id(), error = %e, "WARNING reply failed");
    }
}
