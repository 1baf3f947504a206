//! SpeechCodec-Trait und Backend-Auswahl

use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::azure::AzureSpeechCodec;
use crate::error::{SpeechError, SpeechResult};
use crate::loopback::LoopbackCodec;

/// Externe Text <-> Audio Umwandlung
///
/// Implementierungen duerfen beliebig lange brauchen (Netzwerk); der Hub
/// haelt waehrend eines Aufrufs keine Sperre.
#[async_trait]
pub trait SpeechCodec: Send + Sync {
    /// Erkennt gesprochenen Text in Audio-Daten
    async fn audio_zu_text(&self, audio: &[u8]) -> SpeechResult<String>;

    /// Synthetisiert Audio-Daten aus Text
    async fn text_zu_audio(&self, text: &str) -> SpeechResult<Vec<u8>>;

    /// Name des Backends fuer Logs
    fn name(&self) -> &'static str;
}

/// Verfuegbare Backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeechBackend {
    #[default]
    Azure,
    Loopback,
}

impl FromStr for SpeechBackend {
    type Err = SpeechError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "azure" => Ok(Self::Azure),
            "loopback" => Ok(Self::Loopback),
            anders => Err(SpeechError::Konfiguration(format!(
                "Unbekanntes Sprach-Backend '{anders}' (erlaubt: azure, loopback)"
            ))),
        }
    }
}

/// Konfiguration fuer den Sprachdienst
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub backend: SpeechBackend,
    /// Azure Subscription-Key
    pub subscription_key: String,
    /// Azure-Region, z.B. "westeurope"
    pub region: String,
    /// Erkennungs- und Synthesesprache
    pub sprache: String,
    /// Stimme fuer die Synthese
    pub stimme: String,
    /// Wert fuer `X-Microsoft-OutputFormat`
    pub ausgabe_format: String,
    /// Zeitlimit pro Anfrage
    pub timeout: Duration,
    /// Ueberschreibt den TTS-Endpunkt (sonst aus der Region abgeleitet)
    pub tts_endpunkt: Option<String>,
    /// Ueberschreibt den STT-Endpunkt (sonst aus der Region abgeleitet)
    pub stt_endpunkt: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            backend: SpeechBackend::Azure,
            subscription_key: String::new(),
            region: "westeurope".to_string(),
            sprache: "en-US".to_string(),
            stimme: "en-US-JennyNeural".to_string(),
            ausgabe_format: "riff-16khz-16bit-mono-pcm".to_string(),
            timeout: Duration::from_secs(15),
            tts_endpunkt: None,
            stt_endpunkt: None,
        }
    }
}

/// Erstellt den konfigurierten Codec
pub fn codec_erstellen(config: SpeechConfig) -> SpeechResult<Arc<dyn SpeechCodec>> {
    let codec: Arc<dyn SpeechCodec> = match config.backend {
        SpeechBackend::Azure => Arc::new(AzureSpeechCodec::neu(&config)?),
        SpeechBackend::Loopback => Arc::new(LoopbackCodec),
    };
    tracing::info!(backend = codec.name(), "Sprach-Codec initialisiert");
    Ok(codec)
}
