pub mod model;

pub use model::{
    CandidateContents, IceContents, LobbyInfo, LobbySettings, MetaInfo, NewHostParams,
    NewPeerParams, PeerConfigParams, PeerId, PeerInfo, RelayPacket, SessionGreeting, SignalPacket,
    DATA_CANDIDATE, DEFAULT_LOBBY, RELAY_ID, VOICE_CANDIDATE,
};
