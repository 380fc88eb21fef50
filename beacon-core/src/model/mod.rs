mod envelope;
mod lobby;
mod peer;
mod relay;

pub use envelope::{MetaInfo, NewHostParams, NewPeerParams, SessionGreeting, SignalPacket};
pub use lobby::{LobbyInfo, LobbySettings, PeerConfigParams, DEFAULT_LOBBY};
pub use peer::{PeerId, PeerInfo, RELAY_ID};
pub use relay::{CandidateContents, IceContents, RelayPacket, DATA_CANDIDATE, VOICE_CANDIDATE};
