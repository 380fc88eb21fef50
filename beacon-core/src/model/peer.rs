use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Reserved recipient id addressing the server-side relay peer instead of
/// another client.
pub const RELAY_ID: &str = "relay";

/// Stable identifier assigned to a connection for its whole lifetime.
///
/// Rendered on the wire as a 26-character ULID, so ids sort by creation
/// time.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct PeerId(pub Ulid);

impl PeerId {
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PeerId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

/// Identifies the peer a server-to-client envelope originated from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: String,
    pub user: String,
}

impl PeerInfo {
    pub fn new(id: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user: user.into(),
        }
    }

    /// The origin stamped on envelopes emitted by the server-side relay.
    pub fn relay() -> Self {
        Self::new(RELAY_ID, RELAY_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_id_round_trips_as_26_char_token() {
        let id = PeerId::generate();
        let encoded = id.to_string();
        assert_eq!(encoded.len(), 26);
        assert_eq!(encoded.parse::<PeerId>().unwrap(), id);
    }

    #[test]
    fn peer_ids_sort_by_creation() {
        let a = PeerId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = PeerId::generate();
        assert!(a.to_string() < b.to_string());
    }
}
