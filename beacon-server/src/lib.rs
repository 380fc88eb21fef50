pub mod client;
pub mod error;
pub mod message;
pub mod origin;
pub mod registry;
pub mod relay;
pub mod server;
pub mod signaling;

pub use client::{Client, ClientMode};
pub use error::{RegistryError, RelayDeliveryError};
pub use server::{IceConfig, Server};
pub use signaling::ws::ws_handler;
