//! base64-Kodierung von Audio-Nutzlasten
//!
//! Clients senden Audio als base64 (Standard-Alphabet mit Padding), und
//! synthetisiertes Audio wird ebenso kodiert verteilt. Die Routing-Logik
//! sieht nur Strings.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Kodiert Audio-Bytes fuer den Versand an Clients
pub fn audio_kodieren(audio: &[u8]) -> String {
    STANDARD.encode(audio)
}

/// Dekodiert base64-Audio eines Clients
pub fn audio_dekodieren(audio_base64: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(audio_base64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn riff_header_kodieren() {
        assert_eq!(audio_kodieren(b"RIFF"), "UklGRg==");
        assert_eq!(audio_dekodieren("UklGRg==").unwrap(), b"RIFF");
    }

    #[test]
    fn ungueltiges_base64_wird_abgelehnt() {
        assert!(audio_dekodieren("kein base64!").is_err());
        assert!(audio_dekodieren("UklGRg=").is_err());
    }

    #[test]
    fn leerer_string_ergibt_leeres_audio() {
        assert!(audio_dekodieren("").unwrap().is_empty());
    }
}
