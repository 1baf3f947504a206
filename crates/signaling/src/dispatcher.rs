//! Message-Dispatcher – Routet Hub-Nachrichten an die Hub-Aufrufe
//!
//! Der Dispatcher empfaengt Nachrichten einer ClientConnection, ruft die
//! passende Operation des `SessionHub` auf und gibt die Antwort zurueck.
//!
//! ## Antworten
//! - Client-Aufruf erfolgreich: `Ack` mit derselben `request_id`
//! - Ungueltige Eingabe: `Error(INVALID_REQUEST)`
//! - Sprachumwandlung fehlgeschlagen: `Error(CODEC_FAILED)` mit
//!   `details.codec_code`
//! - `Ping`: `Pong`, `Pong`: keine Antwort
//! - Server-seitige Nachrichtentypen vom Client: `Error(INVALID_REQUEST)`

use serde_json::json;
use std::sync::Arc;
use voxrelay_core::ConnectionId;
use voxrelay_protocol::{ErrorCode, HubNachricht, HubPayload};

use crate::error::RelayError;
use crate::hub::SessionHub;

/// Prueft ob eine Nachricht ein Client-Aufruf ist (Sprachdienst beteiligt)
///
/// Aufrufe laufen im Worker der Verbindung, alles andere beantwortet die
/// Verbindungsschleife sofort.
pub fn ist_aufruf(payload: &HubPayload) -> bool {
    matches!(
        payload,
        HubPayload::SpeechToRelay(_)
            | HubPayload::TextToRelay(_)
            | HubPayload::ConnectAnnounce(_)
            | HubPayload::SendMessage(_)
    )
}

/// Zentraler Message-Dispatcher
#[derive(Clone)]
pub struct MessageDispatcher {
    hub: Arc<SessionHub>,
}

impl MessageDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(hub: Arc<SessionHub>) -> Self {
        Self { hub }
    }

    /// Verarbeitet eine eingehende Nachricht und gibt die Antwort zurueck
    ///
    /// Gibt `None` zurueck wenn keine Antwort gesendet werden soll.
    pub async fn dispatch(
        &self,
        verbindung: ConnectionId,
        nachricht: HubNachricht,
    ) -> Option<HubNachricht> {
        let request_id = nachricht.request_id;
        let ereignis = nachricht.ereignis_name();

        let ergebnis = match nachricht.payload {
            HubPayload::SpeechToRelay(req) => {
                self.hub
                    .sprache_weiterleiten(
                        verbindung,
                        &req.user,
                        &req.audio_base64,
                        &req.original_message,
                    )
                    .await
            }
            HubPayload::TextToRelay(req) => {
                self.hub
                    .text_weiterleiten(verbindung, &req.user, &req.message)
                    .await
            }
            HubPayload::ConnectAnnounce(req) => {
                self.hub.verbindung_ankuendigen(verbindung, &req.user).await
            }
            HubPayload::SendMessage(req) => {
                self.hub
                    .nachricht_senden(verbindung, &req.user, &req.message)
                    .await
            }

            // -------------------------------------------------------------------
            // Keepalive
            // -------------------------------------------------------------------
            HubPayload::Ping(ping) => {
                return Some(HubNachricht::pong(
                    request_id,
                    ping.timestamp_ms,
                    jetzt_ms(),
                ));
            }
            HubPayload::Pong(_) => {
                tracing::trace!(verbindung = %verbindung, "Pong empfangen");
                return None;
            }

            // -------------------------------------------------------------------
            // Nur Server -> Client
            // -------------------------------------------------------------------
            HubPayload::ReceiveBroadcast(_) | HubPayload::Ack | HubPayload::Error(_) => {
                tracing::debug!(
                    verbindung = %verbindung,
                    ereignis,
                    "Server-Nachrichtentyp vom Client abgelehnt"
                );
                return Some(HubNachricht::error(
                    request_id,
                    ErrorCode::InvalidRequest,
                    format!("{ereignis} kann nicht vom Client gesendet werden"),
                ));
            }
        };

        Some(match ergebnis {
            Ok(empfaenger) => {
                tracing::trace!(verbindung = %verbindung, ereignis, empfaenger, "Aufruf bestaetigt");
                HubNachricht::ack(request_id)
            }
            Err(e) => fehler_antwort(request_id, &e),
        })
    }
}

/// Baut die Fehlerantwort fuer einen gescheiterten Aufruf
fn fehler_antwort(request_id: u32, fehler: &RelayError) -> HubNachricht {
    let antwort = HubNachricht::error(request_id, fehler.error_code(), fehler.to_string());
    match fehler {
        RelayError::Codec(e) => antwort.mit_details(json!({ "codec_code": e.code() })),
        RelayError::UngueltigeEingabe(_) | RelayError::ZuGross { .. } => antwort,
    }
}

fn jetzt_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
