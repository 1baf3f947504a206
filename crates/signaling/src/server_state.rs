//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt Hub und Broadcaster als Arc-Referenzen, die sicher zwischen
//! tokio-Tasks geteilt werden koennen.

use std::sync::Arc;
use std::time::Instant;
use voxrelay_speech::SpeechCodec;

use crate::broadcast::EventBroadcaster;
use crate::hub::SessionHub;
use crate::registry::ConnectionRegistry;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Anzeigename des Servers
    pub server_name: String,
    /// Maximale gleichzeitige Verbindungen
    pub max_clients: u32,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_bytes: usize,
    /// Wartende Aufrufe pro Verbindung, darueber wird mit `BUSY` abgelehnt
    pub aufruf_queue: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            server_name: "VoxRelay Hub".to_string(),
            max_clients: 512,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
            max_frame_bytes: voxrelay_protocol::wire::DEFAULT_MAX_FRAME_SIZE,
            aufruf_queue: 16,
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    /// Server-Konfiguration
    pub config: Arc<SignalingConfig>,
    /// Session-Hub (Client-Aufrufe, Lebenszyklus)
    pub hub: Arc<SessionHub>,
    /// Event-Broadcaster (Send-Queues aller Verbindungen)
    pub broadcaster: EventBroadcaster,
    /// Startzeitpunkt des Servers (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl SignalingState {
    /// Erstellt den Zustand samt Registry, Broadcaster und Hub
    pub fn neu(config: SignalingConfig, codec: Arc<dyn SpeechCodec>) -> Arc<Self> {
        let broadcaster = EventBroadcaster::neu();
        let hub = SessionHub::neu(
            ConnectionRegistry::neu(),
            codec,
            Arc::new(broadcaster.clone()),
        )
        .mit_frame_limit(config.max_frame_bytes);
        Arc::new(Self {
            config: Arc::new(config),
            hub: Arc::new(hub),
            broadcaster,
            start_time: Instant::now(),
        })
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Anzahl offener Verbindungen
    pub fn verbindungen(&self) -> usize {
        self.broadcaster.client_anzahl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxrelay_core::ConnectionId;
    use voxrelay_speech::LoopbackCodec;

    #[test]
    fn hub_und_broadcaster_teilen_verbindungen() {
        let state = SignalingState::neu(SignalingConfig::default(), Arc::new(LoopbackCodec));
        let id = ConnectionId::new();

        let _rx = state.broadcaster.client_registrieren(id);
        state.hub.bei_verbindung(id);

        assert_eq!(state.verbindungen(), 1);
        assert_eq!(state.hub.online_anzahl(), 1);
    }

    #[test]
    fn standardwerte() {
        let config = SignalingConfig::default();
        assert_eq!(config.max_clients, 512);
        assert!(config.verbindungs_timeout_sek > config.keepalive_sek);
        assert_eq!(config.max_frame_bytes, 1024 * 1024);
    }
}
