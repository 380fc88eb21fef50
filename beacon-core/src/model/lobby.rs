use serde::{Deserialize, Serialize};

/// Implicit staging lobby every freshly initialized client is placed in.
/// Excluded from lobby listings and lobby-info queries.
pub const DEFAULT_LOBBY: &str = "default";

const MAX_PASSWORD_LEN: usize = 128;

/// Host-supplied configuration of a lobby, also the `CONFIG_HOST` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LobbySettings {
    pub lobby_id: String,
    #[serde(default)]
    pub use_server_relay: bool,
    #[serde(default)]
    pub allow_host_reclaim: bool,
    #[serde(default)]
    pub allow_peers_to_claim_host: bool,
    #[serde(default)]
    pub max_peers: u32,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub locked: bool,
    #[serde(rename = "pubkey", default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// Set while a peer-based host reclaim is pending. Internal: client
    /// input is discarded by [`LobbySettings::sanitize`].
    #[serde(default, skip_serializing)]
    pub reclaim_in_progress: bool,
}

impl LobbySettings {
    /// Settings applied to the staging lobby when the first client
    /// materializes it.
    pub fn staging() -> Self {
        Self {
            lobby_id: DEFAULT_LOBBY.to_owned(),
            use_server_relay: true,
            allow_host_reclaim: true,
            allow_peers_to_claim_host: false,
            ..Default::default()
        }
    }

    /// Strips fields a client has no business setting.
    pub fn sanitize(mut self) -> Self {
        self.reclaim_in_progress = false;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.lobby_id.is_empty() {
            return Err("lobby_id must not be empty".to_owned());
        }
        if self.password.len() > MAX_PASSWORD_LEN {
            return Err(format!("password exceeds {MAX_PASSWORD_LEN} characters"));
        }
        Ok(())
    }
}

/// `CONFIG_PEER` payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeerConfigParams {
    pub lobby_id: String,
    #[serde(default)]
    pub password: String,
    #[serde(rename = "pubkey", default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

impl PeerConfigParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.lobby_id.is_empty() {
            return Err("lobby_id must not be empty".to_owned());
        }
        if self.password.len() > MAX_PASSWORD_LEN {
            return Err(format!("password exceeds {MAX_PASSWORD_LEN} characters"));
        }
        Ok(())
    }
}

/// `LOBBY_INFO` reply payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyInfo {
    pub host_id: String,
    pub host_username: String,
    pub max_peers: u32,
    pub current_peers: usize,
    pub password_required: bool,
    pub reclaimable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_discards_client_set_reclaim_flag() {
        let settings: LobbySettings =
            serde_json::from_str(r#"{"lobby_id":"a","reclaim_in_progress":true}"#).unwrap();
        assert!(settings.reclaim_in_progress);
        assert!(!settings.sanitize().reclaim_in_progress);
    }

    #[test]
    fn validate_rejects_oversized_password() {
        let settings = LobbySettings {
            lobby_id: "a".to_owned(),
            password: "x".repeat(129),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn staging_settings_enable_relay_and_automated_reclaim() {
        let settings = LobbySettings::staging();
        assert!(settings.use_server_relay);
        assert!(settings.allow_host_reclaim);
        assert!(!settings.allow_peers_to_claim_host);
    }
}
