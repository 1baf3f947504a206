//! Loopback-Codec: Text wird als UTF-8 "Audio" durchgereicht
//!
//! Erlaubt den Hub-Betrieb und Tests ohne Zugang zum Sprachdienst.

use async_trait::async_trait;

use crate::codec::SpeechCodec;
use crate::error::{SpeechError, SpeechResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct LoopbackCodec;

#[async_trait]
impl SpeechCodec for LoopbackCodec {
    async fn audio_zu_text(&self, audio: &[u8]) -> SpeechResult<String> {
        String::from_utf8(audio.to_vec())
            .map_err(|_| SpeechError::UngueltigeEingabe("Audio ist kein UTF-8".into()))
    }

    async fn text_zu_audio(&self, text: &str) -> SpeechResult<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }

    fn name(&self) -> &'static str {
        "loopback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn text_hin_und_zurueck() {
        let codec = LoopbackCodec;
        let audio = codec.text_zu_audio("Connected to Hub").await.unwrap();
        assert_eq!(audio, b"Connected to Hub");
        assert_eq!(codec.audio_zu_text(&audio).await.unwrap(), "Connected to Hub");
    }

    #[tokio::test]
    async fn binaeres_audio_ist_ungueltig() {
        let err = LoopbackCodec
            .audio_zu_text(&[0xff, 0xfe, 0x00])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }
}
