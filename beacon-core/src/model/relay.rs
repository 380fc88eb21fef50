use crate::model::peer::PeerInfo;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Candidate kind for SDP/ICE payloads directed at the relay. The relay
/// only terminates data channels, so voice candidates are refused.
pub const DATA_CANDIDATE: u8 = 0;
pub const VOICE_CANDIDATE: u8 = 1;

/// Envelope spoken over relay data channels. Mirrors [`super::SignalPacket`]
/// but adds the `channel` label so multiplexed channels forward on the
/// label the packet arrived on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayPacket {
    pub opcode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<PeerInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

/// `MAKE_OFFER`/`MAKE_ANSWER` payload when the recipient is the relay:
/// a typed session description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateContents {
    #[serde(rename = "type")]
    pub kind: u8,
    pub contents: RTCSessionDescription,
}

/// `ICE` payload when the recipient is the relay, and the shape the relay
/// uses for candidates it gathers itself (via `RTCIceCandidate::to_json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceContents {
    #[serde(rename = "type")]
    pub kind: u8,
    pub contents: RTCIceCandidateInit,
}

impl IceContents {
    pub fn data(contents: RTCIceCandidateInit) -> Self {
        Self {
            kind: DATA_CANDIDATE,
            contents,
        }
    }
}
