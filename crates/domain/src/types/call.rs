//! Call-level state observed from the room collaborator

use serde::{Deserialize, Serialize};

/// Connection state reported by the room.
///
/// Only `Connected` rooms are swept; every other state skips the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}
