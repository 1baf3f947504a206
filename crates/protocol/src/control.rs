//! Hub-Protokoll
//!
//! Definiert die Aufrufe die ein Client an den Hub richtet, die Ereignisse
//! die der Hub an Clients verteilt, und die Antworten auf Aufrufe.
//!
//! ## Design
//! - Request/Response Pattern: jede Nachricht hat eine `request_id: u32`
//! - JSON-Serialisierung via serde
//! - Tagged Enum fuer typsichere Nachrichtentypen
//! - Server-initiierte Ereignisse (`ReceiveBroadcast`, `Ping`) tragen `request_id = 0`

use serde::{Deserialize, Serialize};

/// Fester Ereignisname fuer verteilte Nachrichten
pub const RECEIVE_BROADCAST: &str = "ReceiveBroadcast";

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Codes fuer Error-Responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InternalError,
    /// Ungueltige Eingabe (leeres Feld, kaputtes base64, falscher Nachrichtentyp)
    InvalidRequest,
    /// Sprachumwandlung fehlgeschlagen
    CodecFailed,
    /// Umgewandelte Nachricht passt nicht in einen Frame
    PayloadTooLarge,
    /// Hub ist ueberlastet (Aufruf-Queue der Verbindung voll)
    Busy,
    ServerFull,
}

// ---------------------------------------------------------------------------
// Hub-Aufrufe (Client -> Server)
// ---------------------------------------------------------------------------

/// Sprachnachricht: Audio wird in Text umgewandelt und verteilt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechRelayRequest {
    pub user: String,
    /// Audio-Daten, base64 (Standard-Alphabet mit Padding)
    pub audio_base64: String,
    /// Vom Client mitgelieferter Originaltext
    pub original_message: String,
}

/// Textnachricht: Text wird in Audio umgewandelt und verteilt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRelayRequest {
    pub user: String,
    pub message: String,
}

/// Anmeldung am Hub ("Connected to Hub" an alle)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectAnnounceRequest {
    pub user: String,
}

// ---------------------------------------------------------------------------
// Ereignisse (Server -> Client)
// ---------------------------------------------------------------------------

/// Inhalt eines `ReceiveBroadcast`-Ereignisses
///
/// Empfaenger bekommen immer beide Formen: die umgewandelte Nutzlast und
/// den Originaltext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastEreignis {
    pub user: String,
    /// Umgewandelte Nutzlast (base64-Audio oder erkannter Text)
    pub message: String,
    pub original_message: String,
}

// ---------------------------------------------------------------------------
// Keepalive
// ---------------------------------------------------------------------------

/// Ping (Client -> Server oder Server -> Client)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingMessage {
    /// Unix-Timestamp in Millisekunden fuer RTT-Messung
    pub timestamp_ms: u64,
}

/// Pong-Antwort (spiegelt Timestamp zurueck)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PongMessage {
    /// Originaler Timestamp aus dem Ping
    pub echo_timestamp_ms: u64,
    /// Server-eigener Timestamp
    pub server_timestamp_ms: u64,
}

// ---------------------------------------------------------------------------
// Haupt-Enum: HubPayload
// ---------------------------------------------------------------------------

/// Alle moeglichen Hub-Nachrichten (typsicher via Tagged Enum)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubPayload {
    // Aufrufe
    SpeechToRelay(SpeechRelayRequest),
    TextToRelay(TextRelayRequest),
    ConnectAnnounce(ConnectAnnounceRequest),
    SendMessage(TextRelayRequest),

    // Ereignisse; der Tag ist fester Bestandteil des Protokolls
    #[serde(rename = "ReceiveBroadcast")]
    ReceiveBroadcast(BroadcastEreignis),

    /// Aufruf erfolgreich abgeschlossen
    Ack,

    // Keepalive
    Ping(PingMessage),
    Pong(PongMessage),

    // Error
    Error(ErrorResponse),
}

/// Standardisierte Fehler-Antwort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
    /// Optionale maschinenlesbare Details (z.B. Fehlercode des Sprachdienstes)
    pub details: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Hub-Frame (Umschlag fuer alle Nachrichten)
// ---------------------------------------------------------------------------

/// Hub-Protokoll-Nachricht mit Request/Response-Zuordnung
///
/// Jede Nachricht traegt eine `request_id` die der Client vergibt.
/// Der Server kopiert die ID in `Ack`/`Error` damit der Client
/// Aufruf und Ergebnis zuordnen kann.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubNachricht {
    /// Eindeutige Nachrichten-ID fuer Request/Response-Zuordnung
    pub request_id: u32,
    /// Inhalt der Nachricht
    pub payload: HubPayload,
}

impl HubNachricht {
    /// Erstellt eine neue Hub-Nachricht
    pub fn new(request_id: u32, payload: HubPayload) -> Self {
        Self {
            request_id,
            payload,
        }
    }

    /// Erstellt ein `ReceiveBroadcast`-Ereignis
    pub fn broadcast(
        user: impl Into<String>,
        message: impl Into<String>,
        original_message: impl Into<String>,
    ) -> Self {
        Self::new(
            0,
            HubPayload::ReceiveBroadcast(BroadcastEreignis {
                user: user.into(),
                message: message.into(),
                original_message: original_message.into(),
            }),
        )
    }

    /// Erstellt eine Erfolgs-Bestaetigung
    pub fn ack(request_id: u32) -> Self {
        Self::new(request_id, HubPayload::Ack)
    }

    /// Erstellt eine Ping-Nachricht
    pub fn ping(request_id: u32, timestamp_ms: u64) -> Self {
        Self::new(request_id, HubPayload::Ping(PingMessage { timestamp_ms }))
    }

    /// Erstellt eine Pong-Antwort
    pub fn pong(request_id: u32, echo_timestamp_ms: u64, server_timestamp_ms: u64) -> Self {
        Self::new(
            request_id,
            HubPayload::Pong(PongMessage {
                echo_timestamp_ms,
                server_timestamp_ms,
            }),
        )
    }

    /// Erstellt eine Fehler-Antwort
    pub fn error(request_id: u32, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(
            request_id,
            HubPayload::Error(ErrorResponse {
                code,
                message: message.into(),
                details: None,
            }),
        )
    }

    /// Haengt maschinenlesbare Details an eine Fehler-Antwort
    ///
    /// Ohne Wirkung fuer andere Nachrichtentypen.
    pub fn mit_details(mut self, details: serde_json::Value) -> Self {
        if let HubPayload::Error(ref mut e) = self.payload {
            e.details = Some(details);
        }
        self
    }

    /// Ereignisname fuer Logs (`ReceiveBroadcast` fuer verteilte Nachrichten)
    pub fn ereignis_name(&self) -> &'static str {
        match self.payload {
            HubPayload::SpeechToRelay(_) => "SpeechToRelay",
            HubPayload::TextToRelay(_) => "TextToRelay",
            HubPayload::ConnectAnnounce(_) => "ConnectAnnounce",
            HubPayload::SendMessage(_) => "SendMessage",
            HubPayload::ReceiveBroadcast(_) => RECEIVE_BROADCAST,
            HubPayload::Ack => "Ack",
            HubPayload::Ping(_) => "Ping",
            HubPayload::Pong(_) => "Pong",
            HubPayload::Error(_) => "Error",
        }
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert eine Nachricht aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_pong_serialisierung() {
        let ping = HubNachricht::ping(1, 1234567890);
        let json = ping.to_json().unwrap();
        let decoded = HubNachricht::from_json(&json).unwrap();
        assert_eq!(decoded.request_id, 1);
        if let HubPayload::Ping(p) = decoded.payload {
            assert_eq!(p.timestamp_ms, 1234567890);
        } else {
            panic!("Erwartet Ping-Payload");
        }
    }

    #[test]
    fn error_response_mit_details() {
        let msg = HubNachricht::error(42, ErrorCode::CodecFailed, "Synthese abgebrochen")
            .mit_details(serde_json::json!({ "codec_code": "UPSTREAM_STATUS" }));
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"code\":\"CODEC_FAILED\""));

        let decoded = HubNachricht::from_json(&json).unwrap();
        assert_eq!(decoded.request_id, 42);
        if let HubPayload::Error(e) = decoded.payload {
            assert_eq!(e.code, ErrorCode::CodecFailed);
            assert_eq!(e.message, "Synthese abgebrochen");
            assert_eq!(
                e.details.unwrap()["codec_code"],
                serde_json::json!("UPSTREAM_STATUS")
            );
        } else {
            panic!("Erwartet Error-Payload");
        }
    }

    #[test]
    fn send_message_aus_client_json() {
        let json = r#"{"request_id":7,"payload":{"type":"send_message","user":"alice","message":"hi"}}"#;
        let decoded = HubNachricht::from_json(json).unwrap();
        assert_eq!(decoded.request_id, 7);
        match decoded.payload {
            HubPayload::SendMessage(req) => {
                assert_eq!(req.user, "alice");
                assert_eq!(req.message, "hi");
            }
            _ => panic!("Erwartet SendMessage-Payload"),
        }
    }

    #[test]
    fn broadcast_traegt_drei_felder() {
        let msg = HubNachricht::broadcast("alice", "UklGRg==", "hi");
        assert_eq!(msg.request_id, 0);
        assert_eq!(msg.ereignis_name(), RECEIVE_BROADCAST);

        let wert: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        let payload = &wert["payload"];
        assert_eq!(payload["type"], RECEIVE_BROADCAST);
        assert_eq!(payload["user"], "alice");
        assert_eq!(payload["message"], "UklGRg==");
        assert_eq!(payload["original_message"], "hi");
    }

    #[test]
    fn broadcast_tag_aus_json() {
        let json = r#"{"request_id":0,"payload":{"type":"ReceiveBroadcast","user":"a","message":"b","original_message":"c"}}"#;
        let decoded = HubNachricht::from_json(json).unwrap();
        assert_eq!(decoded, HubNachricht::broadcast("a", "b", "c"));

        let alt = r#"{"request_id":0,"payload":{"type":"receive_broadcast","user":"a","message":"b","original_message":"c"}}"#;
        assert!(HubNachricht::from_json(alt).is_err());
    }

    #[test]
    fn ack_serialisierung() {
        let json = HubNachricht::ack(3).to_json().unwrap();
        assert_eq!(json, r#"{"request_id":3,"payload":{"type":"ack"}}"#);
    }

    #[test]
    fn unbekannter_typ_wird_abgelehnt() {
        let json = r#"{"request_id":1,"payload":{"type":"channel_join"}}"#;
        assert!(HubNachricht::from_json(json).is_err());
    }
}
