//! Event-Broadcaster – Ausgehende Zustellung an verbundene Clients
//!
//! Der EventBroadcaster verwaltet die Send-Queues aller verbundenen Clients
//! und implementiert damit das `Transport`-Gateway des Routers:
//! - An eine Verbindung: `an_verbindung_senden`
//! - An alle Verbindungen: `an_alle_senden`
//!
//! Zustellung an eine geschlossene oder unbekannte Verbindung ist kein
//! Fehler, sondern wird verworfen.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use voxrelay_core::ConnectionId;
use voxrelay_protocol::HubNachricht;

/// Ausgehende Zustell-Primitive des Transports
pub trait Transport: Send + Sync {
    /// Stellt eine Nachricht an genau eine Verbindung zu
    ///
    /// Gibt `true` zurueck wenn die Nachricht eingereiht wurde.
    fn an_verbindung_senden(&self, verbindung: &ConnectionId, nachricht: HubNachricht) -> bool;

    /// Stellt eine Nachricht an alle verbundenen Clients zu
    ///
    /// Gibt die Anzahl der erfolgreichen Zustellungen zurueck.
    fn an_alle_senden(&self, nachricht: HubNachricht) -> usize;
}

/// Groesse der Send-Queue pro Client
const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue eines verbundenen Clients
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub verbindung: ConnectionId,
    pub tx: mpsc::Sender<HubNachricht>,
}

impl ClientSender {
    /// Sendet eine Nachricht nicht-blockierend an den Client
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, nachricht: HubNachricht) -> bool {
        match self.tx.try_send(nachricht) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(verbindung = %self.verbindung, "Send-Queue voll – Nachricht verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(verbindung = %self.verbindung, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Zentraler Broadcaster fuer alle verbundenen Clients
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct EventBroadcaster {
    clients: Arc<DashMap<ConnectionId, ClientSender>>,
}

impl EventBroadcaster {
    /// Erstellt einen neuen EventBroadcaster
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert eine Verbindung und gibt ihre Empfangs-Queue zurueck
    ///
    /// Die `ClientConnection` liest aus dieser Queue und schreibt auf TCP.
    pub fn client_registrieren(&self, verbindung: ConnectionId) -> mpsc::Receiver<HubNachricht> {
        self.client_registrieren_mit_groesse(verbindung, SEND_QUEUE_GROESSE)
    }

    /// Wie `client_registrieren`, mit eigener Queue-Groesse
    pub fn client_registrieren_mit_groesse(
        &self,
        verbindung: ConnectionId,
        groesse: usize,
    ) -> mpsc::Receiver<HubNachricht> {
        let (tx, rx) = mpsc::channel(groesse.max(1));
        self.clients
            .insert(verbindung, ClientSender { verbindung, tx });
        tracing::debug!(verbindung = %verbindung, "Client im Broadcaster registriert");
        rx
    }

    /// Entfernt eine Verbindung aus dem Broadcaster
    pub fn client_entfernen(&self, verbindung: &ConnectionId) {
        if self.clients.remove(verbindung).is_some() {
            tracing::debug!(verbindung = %verbindung, "Client aus Broadcaster entfernt");
        }
    }

    /// Gibt die Anzahl der registrierten Clients zurueck
    pub fn client_anzahl(&self) -> usize {
        self.clients.len()
    }

    /// Prueft ob eine Verbindung registriert ist
    pub fn ist_registriert(&self, verbindung: &ConnectionId) -> bool {
        self.clients.contains_key(verbindung)
    }

    /// Stellt eine Antwort auf einen Aufruf zu
    ///
    /// Anders als Broadcasts wird eine Antwort bei voller Queue nicht
    /// verworfen, sondern wartet auf Platz. Gibt `false` zurueck wenn die
    /// Verbindung bereits geschlossen ist.
    pub async fn antwort_senden(&self, verbindung: &ConnectionId, nachricht: HubNachricht) -> bool {
        let Some(sender) = self.clients.get(verbindung).map(|s| s.value().clone()) else {
            return false;
        };
        sender.tx.send(nachricht).await.is_ok()
    }
}

impl Transport for EventBroadcaster {
    fn an_verbindung_senden(&self, verbindung: &ConnectionId, nachricht: HubNachricht) -> bool {
        // Sender klonen, damit kein DashMap-Shard waehrend des Sendens gesperrt bleibt
        let sender = self.clients.get(verbindung).map(|s| s.value().clone());
        match sender {
            Some(sender) => sender.senden(nachricht),
            None => {
                tracing::debug!(verbindung = %verbindung, "Senden an unbekannte Verbindung");
                false
            }
        }
    }

    fn an_alle_senden(&self, nachricht: HubNachricht) -> usize {
        let empfaenger: Vec<ClientSender> =
            self.clients.iter().map(|e| e.value().clone()).collect();

        empfaenger
            .iter()
            .filter(|sender| sender.senden(nachricht.clone()))
            .count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
