mod games;
mod relays;
mod sessions;

pub use games::GameStore;
pub use relays::RelayStore;
pub use sessions::SessionStore;

use crate::client::Client;
use beacon_core::PeerId;
use std::sync::Arc;

/// A copy of `members` without the named client. Broadcast audiences are
/// built with this so the acting client never hears its own event.
pub fn excluding(members: Vec<Arc<Client>>, id: PeerId) -> Vec<Arc<Client>> {
    members
        .into_iter()
        .filter(|member| member.id() != id)
        .collect()
}
