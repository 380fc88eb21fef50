use beacon_core::PeerId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("lobby {lobby_id} in game {game_id:?} does not exist")]
    LobbyNotFound { lobby_id: String, game_id: String },
    #[error("lobby {0} has no host")]
    NoHost(String),
    #[error("session already exists for {0}")]
    SessionExists(PeerId),
}

/// Why a directed relay packet could not be delivered. These never reach
/// the wire; the relay drops the packet and logs.
#[derive(Debug, Error)]
pub enum RelayDeliveryError {
    #[error("recipient is not set")]
    RecipientMissing,
    #[error("recipient {0} not found")]
    RecipientUnknown(String),
    #[error("recipient {0} is not in the same lobby")]
    RecipientOutsideLobby(String),
    #[error("recipient {0} has no relay")]
    RecipientWithoutRelay(String),
}
