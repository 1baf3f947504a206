//! Health-Check-Endpunkt fuer VoxRelay
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime, verbundenen Clients und
//! Erreichbarkeit des Sprachdienstes

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use voxrelay_core::HubEreignis;

/// Codes des Sprachdienstes, die auf einen nicht erreichbaren Dienst hinweisen
const NICHT_ERREICHBAR: &[&str] = &["NETWORK", "TIMEOUT"];

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Sprachdienst zuletzt nicht erreichbar; der Hub nimmt weiter Aufrufe an
    Degraded,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub connected_clients: usize,
    pub speech_reachable: bool,
}

/// Geteilter Zustand fuer den Health-Check-Handler
#[derive(Clone)]
pub struct HealthState {
    start_time: Arc<Instant>,
    connected_clients: Arc<AtomicUsize>,
    speech_reachable: Arc<AtomicBool>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::neu()
    }
}

impl HealthState {
    pub fn neu() -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            connected_clients: Arc::new(AtomicUsize::new(0)),
            speech_reachable: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn clients(&self) -> usize {
        self.connected_clients.load(Ordering::Relaxed)
    }

    pub fn clients_setzen(&self, anzahl: usize) {
        self.connected_clients.store(anzahl, Ordering::Relaxed);
    }

    pub fn sprachdienst_erreichbar(&self) -> bool {
        self.speech_reachable.load(Ordering::Relaxed)
    }

    /// Leitet die Erreichbarkeit des Sprachdienstes aus Hub-Ereignissen ab
    ///
    /// Netzwerk- und Zeitlimitfehler markieren den Dienst als nicht
    /// erreichbar, die naechste erfolgreiche Weiterleitung setzt zurueck.
    pub fn ereignis_verbuchen(&self, ereignis: &HubEreignis) {
        match ereignis {
            HubEreignis::Weitergeleitet { .. } => {
                self.speech_reachable.store(true, Ordering::Relaxed);
            }
            HubEreignis::CodecFehler { code, .. } if NICHT_ERREICHBAR.contains(&code.as_str()) => {
                self.speech_reachable.store(false, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    pub fn antwort(&self) -> HealthResponse {
        let speech_reachable = self.sprachdienst_erreichbar();
        HealthResponse {
            status: if speech_reachable {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            connected_clients: self.clients(),
            speech_reachable,
        }
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – gibt den Serverstatus zurueck
///
/// Auch `degraded` liefert 200, damit die Probe nicht fehlschlaegt.
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.antwort()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxrelay_core::ConnectionId;

    fn codec_fehler(code: &str) -> HubEreignis {
        HubEreignis::CodecFehler {
            verbindung: ConnectionId::new(),
            richtung: "text_zu_audio".into(),
            code: code.into(),
        }
    }

    #[test]
    fn frischer_zustand_ist_healthy() {
        let state = HealthState::neu();
        let antwort = state.antwort();
        assert_eq!(antwort.status, HealthStatus::Healthy);
        assert_eq!(antwort.connected_clients, 0);
        assert!(antwort.uptime_seconds < 5);
    }

    #[test]
    fn netzwerkfehler_degradiert() {
        let state = HealthState::neu();
        state.ereignis_verbuchen(&codec_fehler("NETWORK"));
        assert_eq!(state.antwort().status, HealthStatus::Degraded);

        state.ereignis_verbuchen(&HubEreignis::Weitergeleitet {
            absender: "alice".into(),
            modus: voxrelay_core::Zustellmodus::Broadcast,
            empfaenger: 1,
            richtung: "text_zu_audio".into(),
            codec_dauer_ms: 5,
        });
        assert_eq!(state.antwort().status, HealthStatus::Healthy);
    }

    #[test]
    fn erkennungsfehler_degradiert_nicht() {
        let state = HealthState::neu();
        state.ereignis_verbuchen(&codec_fehler("NO_MATCH"));
        assert!(state.sprachdienst_erreichbar());
    }

    #[test]
    fn clients_setzen() {
        let state = HealthState::neu();
        let klon = state.clone();
        state.clients_setzen(4);
        assert_eq!(klon.clients(), 4);
    }

    #[test]
    fn health_response_serialisierung() {
        let response = HealthResponse {
            status: HealthStatus::Healthy,
            version: "0.1.0".to_string(),
            uptime_seconds: 3600,
            connected_clients: 2,
            speech_reachable: true,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"uptime_seconds\":3600"));
        assert!(json.contains("\"connected_clients\":2"));
    }
}
