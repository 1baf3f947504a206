//! Identifikationstypen fuer VoxRelay
//!
//! Verbindungen werden ueber ein Newtype adressiert, damit eine
//! Verbindungs-ID nie mit einem Benutzernamen verwechselt werden kann.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Verbindungs-ID
///
/// Wird vom Transport beim Verbindungsaufbau vergeben und bleibt fuer die
/// gesamte Lebensdauer der Verbindung stabil. UUID v4, daher keine
/// Wiederverwendung innerhalb eines Prozesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}
