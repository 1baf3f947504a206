//! Fehlertypen fuer den Signaling-Service

use thiserror::Error;
use voxrelay_protocol::ErrorCode;
use voxrelay_speech::SpeechError;

/// Fehler eines einzelnen Relay-Aufrufs
///
/// Betrifft immer nur den ausloesenden Aufruf und wird nur an dessen
/// Verbindung gemeldet.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Leeres Pflichtfeld oder ungueltiges base64; abgelehnt bevor
    /// Registry oder Sprachdienst beruehrt werden
    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    /// Sprachumwandlung fehlgeschlagen; es wird nichts verteilt
    #[error("Sprachumwandlung fehlgeschlagen: {0}")]
    Codec(#[from] SpeechError),

    /// Umgewandelte Nachricht wuerde das Frame-Limit der Empfaenger sprengen
    #[error("Nachricht zu gross fuer einen Frame: {groesse} Bytes (Maximum: {max} Bytes)")]
    ZuGross { groesse: usize, max: usize },
}

impl RelayError {
    /// Erstellt einen Eingabefehler
    pub fn eingabe(msg: impl Into<String>) -> Self {
        Self::UngueltigeEingabe(msg.into())
    }

    /// Protokoll-Fehlercode fuer die Antwort an den Client
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::UngueltigeEingabe(_) => ErrorCode::InvalidRequest,
            Self::Codec(_) => ErrorCode::CodecFailed,
            Self::ZuGross { .. } => ErrorCode::PayloadTooLarge,
        }
    }
}

/// Result-Typ fuer Relay-Aufrufe
pub type RelayResult<T> = Result<T, RelayError>;

/// Fehlertyp fuer den TCP-Transport
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehlercodes_fuer_client() {
        assert_eq!(
            RelayError::eingabe("Benutzername fehlt").error_code(),
            ErrorCode::InvalidRequest
        );
        assert_eq!(
            RelayError::from(SpeechError::Zeitlimit).error_code(),
            ErrorCode::CodecFailed
        );
        assert_eq!(
            RelayError::ZuGross { groesse: 2, max: 1 }.error_code(),
            ErrorCode::PayloadTooLarge
        );
    }

    #[test]
    fn codec_fehler_anzeige() {
        let e = RelayError::from(SpeechError::LeeresAudio);
        assert_eq!(
            e.to_string(),
            "Sprachumwandlung fehlgeschlagen: Sprachsynthese lieferte keine Audiodaten"
        );
    }
}
