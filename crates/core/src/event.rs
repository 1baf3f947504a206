//! Hub-Ereignisse
//!
//! Der SessionHub veroeffentlicht Lebenszyklus- und Relay-Ereignisse ueber
//! einen tokio-Broadcast-Kanal. Abonnenten (z.B. die Metriken im
//! Server-Crate) duerfen den Relay-Pfad nie blockieren.

use crate::types::ConnectionId;
use serde::{Deserialize, Serialize};

/// Art der Zustellung einer weitergeleiteten Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zustellmodus {
    /// An alle verbundenen Clients
    Broadcast,
    /// Nur an die aktuelle Verbindung des Absenders
    Gezielt,
}

impl Zustellmodus {
    /// Label fuer Logs und Metriken
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Broadcast => "broadcast",
            Self::Gezielt => "gezielt",
        }
    }
}

/// Alle Ereignisse die der Hub veroeffentlicht
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HubEreignis {
    /// Transport hat eine Verbindung aufgebaut
    Verbunden { verbindung: ConnectionId },
    /// Transport hat eine Verbindung getrennt
    Getrennt {
        verbindung: ConnectionId,
        grund: String,
    },
    /// Eine Nachricht wurde umgewandelt und weitergeleitet
    Weitergeleitet {
        absender: String,
        modus: Zustellmodus,
        empfaenger: usize,
        /// "text_zu_audio" oder "audio_zu_text"
        richtung: String,
        codec_dauer_ms: u64,
    },
    /// Sprachumwandlung fehlgeschlagen (nur dem Ausloeser gemeldet)
    CodecFehler {
        verbindung: ConnectionId,
        richtung: String,
        code: String,
    },
}
