use crate::client::Client;
use crate::message;
use beacon_core::{MetaInfo, SignalPacket};
use std::sync::Arc;
use tracing::warn;

/// `META`: reports what this server is running on.
pub fn meta(client: &Arc<Client>, packet: &SignalPacket) {
    if let Err(e) = message::code(
        client,
        "ACK_META",
        message::payload(&MetaInfo {
            os: std::env::consts::OS.to_owned(),
            architecture: std::env::consts::ARCH.to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            rust_version: env!("CARGO_PKG_RUST_VERSION").to_owned(),
        }),
        packet.listener.as_deref(),
        None,
    ) {
        warn!(id = %client.id(), error = %e, "ACK_META reply failed");
    }
}
