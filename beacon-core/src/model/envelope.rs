use crate::model::peer::PeerInfo;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The signaling wire envelope. Everything exchanged over the WebSocket is
/// one of these, multiplexed by `opcode`.
///
/// `origin` is filled in server-to-client to identify the peer a relayed
/// envelope came from. `recipient` is filled in client-to-server to name
/// the destination peer (or the literal `"relay"`). `listener` is an
/// opaque correlation token echoed on the direct response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalPacket {
    pub opcode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<PeerInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listener: Option<String>,
}

impl SignalPacket {
    pub fn new(opcode: impl Into<String>) -> Self {
        Self {
            opcode: opcode.into(),
            ..Default::default()
        }
    }

    /// An explicit `"payload": null` means the same as an absent payload.
    pub fn normalize(mut self) -> Self {
        if matches!(self.payload, Some(Value::Null)) {
            self.payload = None;
        }
        self
    }
}

/// `INIT_OK` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionGreeting {
    pub user: String,
    pub id: String,
    pub session_id: u64,
}

/// `NEW_HOST` payload, broadcast to the staging lobby when a new lobby
/// opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHostParams {
    pub id: String,
    pub user: String,
    pub lobby_id: String,
    #[serde(rename = "pubkey", skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// Payload for peer introductions: `NEW_PEER`, `ANTICIPATE`, `DISCOVER`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPeerParams {
    pub id: String,
    pub user: String,
    #[serde(rename = "pubkey", skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// `ACK_META` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaInfo {
    pub os: String,
    pub architecture: String,
    pub version: String,
    pub rust_version: String,
}
