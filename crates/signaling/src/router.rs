//! Message-Router – Entscheidet pro Nachricht: gezielt oder an alle
//!
//! Ablauf von `relay` (Reihenfolge ist beobachtbares Verhalten):
//! 1. Registry-Upsert `absender -> verbindung`
//! 2. Aktuelle Verbindung des Absenders aus der Registry lesen
//! 3. `Gezielt`: nur zustellen wenn die Registry dieselbe Verbindung sieht
//! 4. `Broadcast`: an alle verbundenen Clients, unabhaengig vom Lookup
//!
//! Der Lookup laeuft auch beim Broadcast und haelt damit die Zuordnung
//! "letzte Verbindung pro Benutzer" ohne eigenen Heartbeat aktuell.

use std::sync::Arc;
use voxrelay_core::{ConnectionId, Zustellmodus};
use voxrelay_protocol::HubNachricht;

use crate::broadcast::Transport;
use crate::registry::ConnectionRegistry;

/// Eine umgewandelte Nachricht auf dem Weg zu den Empfaengern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayNachricht {
    pub absender: String,
    /// Umgewandelte Nutzlast (base64-Audio oder erkannter Text)
    pub nutzlast: String,
    /// Kanonischer Text, wird immer mitgeschickt
    pub original: String,
}

impl RelayNachricht {
    pub(crate) fn als_ereignis(&self) -> HubNachricht {
        HubNachricht::broadcast(&self.absender, &self.nutzlast, &self.original)
    }
}

/// Routing zwischen Registry und Transport
#[derive(Clone)]
pub struct MessageRouter {
    registry: ConnectionRegistry,
    transport: Arc<dyn Transport>,
}

impl MessageRouter {
    pub fn neu(registry: ConnectionRegistry, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Leitet eine umgewandelte Nachricht weiter
    ///
    /// Gibt die Anzahl der Empfaenger zurueck. Die oeffentlichen Hub-Aufrufe
    /// nutzen ausschliesslich `Zustellmodus::Broadcast`; der gezielte Zweig
    /// ist derzeit von aussen nicht erreichbar.
    pub fn relay(
        &self,
        verbindung: ConnectionId,
        modus: Zustellmodus,
        nachricht: &RelayNachricht,
    ) -> usize {
        if let Some(alt) = self.registry.aktualisieren(verbindung, &nachricht.absender) {
            tracing::debug!(
                benutzer = %nachricht.absender,
                alt = %alt,
                neu = %verbindung,
                "Benutzer auf neue Verbindung umgezogen"
            );
        }

        let ziel = self.registry.verbindung_suchen(&nachricht.absender);

        let empfaenger = match modus {
            Zustellmodus::Gezielt => match ziel {
                Some(ziel) if ziel == verbindung => {
                    usize::from(self.transport.an_verbindung_senden(&ziel, nachricht.als_ereignis()))
                }
                _ => {
                    tracing::debug!(
                        benutzer = %nachricht.absender,
                        verbindung = %verbindung,
                        ziel = ?ziel,
                        "Registry sieht andere Verbindung – gezielte Zustellung entfaellt"
                    );
                    0
                }
            },
            Zustellmodus::Broadcast => self.transport.an_alle_senden(nachricht.als_ereignis()),
        };

        tracing::debug!(
            benutzer = %nachricht.absender,
            verbindung = %verbindung,
            ziel = ?ziel,
            modus = modus.als_str(),
            empfaenger,
            "Nachricht weitergeleitet"
        );
        empfaenger
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
