//! Azure Cognitive Services – Sprachsynthese und Kurz-Audio-Erkennung (REST)
//!
//! - TTS: `POST https://{region}.tts.speech.microsoft.com/cognitiveservices/v1`
//!   mit SSML-Body, Antwort sind die rohen Audio-Bytes
//! - STT: `POST https://{region}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1`
//!   mit WAV/PCM-Body, Antwort ist JSON (`RecognitionStatus`, `DisplayText`)

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use std::time::Instant;

use crate::codec::{SpeechCodec, SpeechConfig};
use crate::error::{SpeechError, SpeechResult};

const SCHLUESSEL_HEADER: &str = "Ocp-Apim-Subscription-Key";
const AUSGABE_FORMAT_HEADER: &str = "X-Microsoft-OutputFormat";
const STT_CONTENT_TYPE: &str = "audio/wav; codecs=audio/pcm; samplerate=16000";
const AGENT: &str = concat!("voxrelay/", env!("CARGO_PKG_VERSION"));

/// Antwort der Kurz-Audio-Erkennung (`format=simple`)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErkennungsAntwort {
    recognition_status: String,
    #[serde(default)]
    display_text: String,
}

/// REST-Client fuer den Azure-Sprachdienst
pub struct AzureSpeechCodec {
    client: Client,
    schluessel: String,
    tts_url: String,
    stt_url: String,
    sprache: String,
    stimme: String,
    ausgabe_format: String,
}

impl AzureSpeechCodec {
    /// Erstellt den Codec aus der Konfiguration
    ///
    /// Schlaegt fehl wenn kein Subscription-Key oder keine Region gesetzt ist.
    pub fn neu(config: &SpeechConfig) -> SpeechResult<Self> {
        if config.subscription_key.trim().is_empty() {
            return Err(SpeechError::Konfiguration(
                "Azure Subscription-Key fehlt".into(),
            ));
        }
        let region = config.region.trim();
        if region.is_empty() && (config.tts_endpunkt.is_none() || config.stt_endpunkt.is_none())
        {
            return Err(SpeechError::Konfiguration("Azure-Region fehlt".into()));
        }

        let tts_url = config.tts_endpunkt.clone().unwrap_or_else(|| {
            format!("https://{region}.tts.speech.microsoft.com/cognitiveservices/v1")
        });
        let stt_url = config.stt_endpunkt.clone().unwrap_or_else(|| {
            format!(
                "https://{region}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1"
            )
        });

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(SpeechError::Netzwerk)?;

        Ok(Self {
            client,
            schluessel: config.subscription_key.clone(),
            tts_url,
            stt_url,
            sprache: config.sprache.clone(),
            stimme: config.stimme.clone(),
            ausgabe_format: config.ausgabe_format.clone(),
        })
    }
}

#[async_trait]
impl SpeechCodec for AzureSpeechCodec {
    async fn audio_zu_text(&self, audio: &[u8]) -> SpeechResult<String> {
        let start = Instant::now();
        let antwort = self
            .client
            .post(&self.stt_url)
            .query(&[("language", self.sprache.as_str()), ("format", "simple")])
            .header(SCHLUESSEL_HEADER, &self.schluessel)
            .header(CONTENT_TYPE, STT_CONTENT_TYPE)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, AGENT)
            .body(audio.to_vec())
            .send()
            .await?;

        let status = antwort.status();
        let body = antwort.text().await?;
        if !status.is_success() {
            return Err(SpeechError::Upstream {
                status: status.as_u16(),
                nachricht: body,
            });
        }

        let ergebnis: ErkennungsAntwort = serde_json::from_str(&body)
            .map_err(|e| SpeechError::UngueltigeAntwort(e.to_string()))?;

        if ergebnis.recognition_status != "Success" {
            tracing::debug!(
                status = %ergebnis.recognition_status,
                "Spracherkennung ohne Treffer"
            );
            return Err(SpeechError::Erkennung {
                status: ergebnis.recognition_status,
            });
        }

        tracing::debug!(
            bytes = audio.len(),
            dauer_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Sprache erkannt"
        );
        Ok(ergebnis.display_text)
    }

    async fn text_zu_audio(&self, text: &str) -> SpeechResult<Vec<u8>> {
        let start = Instant::now();
        let antwort = self
            .client
            .post(&self.tts_url)
            .header(SCHLUESSEL_HEADER, &self.schluessel)
            .header(CONTENT_TYPE, "application/ssml+xml")
            .header(AUSGABE_FORMAT_HEADER, &self.ausgabe_format)
            .header(USER_AGENT, AGENT)
            .body(ssml_erstellen(text, &self.sprache, &self.stimme))
            .send()
            .await?;

        let status = antwort.status();
        if !status.is_success() {
            let nachricht = antwort.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Sprachsynthese abgelehnt");
            return Err(SpeechError::Upstream {
                status: status.as_u16(),
                nachricht,
            });
        }

        let audio = antwort.bytes().await?;
        if audio.is_empty() {
            return Err(SpeechError::LeeresAudio);
        }

        tracing::debug!(
            zeichen = text.chars().count(),
            bytes = audio.len(),
            dauer_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Sprache synthetisiert"
        );
        Ok(audio.to_vec())
    }

    fn name(&self) -> &'static str {
        "azure"
    }
}

/// Baut den SSML-Body fuer die Synthese
fn ssml_erstellen(text: &str, sprache: &str, stimme: &str) -> String {
    format!(
        "<speak version='1.0' xml:lang='{}'><voice name='{}'>{}</voice></speak>",
        xml_escape(sprache),
        xml_escape(stimme),
        xml_escape(text)
    )
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> SpeechConfig {
        SpeechConfig {
            subscription_key: "test-key".into(),
            tts_endpunkt: Some(format!("{}/cognitiveservices/v1", server.uri())),
            stt_endpunkt: Some(format!("{}/speech/recognition", server.uri())),
            timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }

    #[test]
    fn ssml_wird_escaped() {
        let ssml = ssml_erstellen("Tom & <Jerry>", "en-US", "en-US-JennyNeural");
        assert_eq!(
            ssml,
            "<speak version='1.0' xml:lang='en-US'><voice name='en-US-JennyNeural'>Tom &amp; &lt;Jerry&gt;</voice></speak>"
        );
    }

    #[test]
    fn endpunkte_aus_region() {
        let codec = AzureSpeechCodec::neu(&SpeechConfig {
            subscription_key: "k".into(),
            region: "northeurope".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            codec.tts_url,
            "https://northeurope.tts.speech.microsoft.com/cognitiveservices/v1"
        );
        assert!(codec
            .stt_url
            .starts_with("https://northeurope.stt.speech.microsoft.com/"));
    }

    #[test]
    fn fehlende_region_wird_abgelehnt() {
        let err = AzureSpeechCodec::neu(&SpeechConfig {
            subscription_key: "k".into(),
            region: " ".into(),
            ..Default::default()
        })
        .err()
        .expect("Fehler erwartet");
        assert_eq!(err.code(), "CONFIGURATION");
    }

    #[tokio::test]
    async fn synthese_liefert_audio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cognitiveservices/v1"))
            .and(header(SCHLUESSEL_HEADER, "test-key"))
            .and(header(AUSGABE_FORMAT_HEADER, "riff-16khz-16bit-mono-pcm"))
            .and(body_string_contains("<voice name='en-US-JennyNeural'>hi</voice>"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"RIFF....WAVE".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let codec = AzureSpeechCodec::neu(&test_config(&server)).unwrap();
        let audio = codec.text_zu_audio("hi").await.unwrap();
        assert_eq!(audio, b"RIFF....WAVE");
    }

    #[tokio::test]
    async fn synthese_mit_ungueltigem_schluessel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let codec = AzureSpeechCodec::neu(&test_config(&server)).unwrap();
        match codec.text_zu_audio("hi").await {
            Err(SpeechError::Upstream { status, nachricht }) => {
                assert_eq!(status, 401);
                assert_eq!(nachricht, "Unauthorized");
            }
            anders => panic!("Upstream-Fehler erwartet, erhalten: {anders:?}"),
        }
    }

    #[tokio::test]
    async fn synthese_ohne_audio_ist_fehler() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let codec = AzureSpeechCodec::neu(&test_config(&server)).unwrap();
        let err = codec.text_zu_audio("hi").await.unwrap_err();
        assert_eq!(err.code(), "EMPTY_AUDIO");
    }

    #[tokio::test]
    async fn erkennung_liefert_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/speech/recognition"))
            .and(query_param("language", "en-US"))
            .and(query_param("format", "simple"))
            .and(header(SCHLUESSEL_HEADER, "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "RecognitionStatus": "Success",
                "DisplayText": "Hello there.",
                "Offset": 100000,
                "Duration": 9000000
            })))
            .mount(&server)
            .await;

        let codec = AzureSpeechCodec::neu(&test_config(&server)).unwrap();
        let text = codec.audio_zu_text(b"RIFF").await.unwrap();
        assert_eq!(text, "Hello there.");
    }

    #[tokio::test]
    async fn erkennung_ohne_treffer_ist_fehler() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "RecognitionStatus": "NoMatch"
            })))
            .mount(&server)
            .await;

        let codec = AzureSpeechCodec::neu(&test_config(&server)).unwrap();
        match codec.audio_zu_text(b"RIFF").await {
            Err(SpeechError::Erkennung { status }) => assert_eq!(status, "NoMatch"),
            anders => panic!("Erkennungsfehler erwartet, erhalten: {anders:?}"),
        }
    }

    #[tokio::test]
    async fn erkennung_mit_kaputtem_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let codec = AzureSpeechCodec::neu(&test_config(&server)).unwrap();
        let err = codec.audio_zu_text(b"RIFF").await.unwrap_err();
        assert_eq!(err.code(), "INVALID_RESPONSE");
    }

    #[tokio::test]
    async fn langsamer_dienst_laeuft_in_zeitlimit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"RIFF".to_vec())
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let mut config = test_config(&server);
        config.timeout = Duration::from_millis(50);
        let codec = AzureSpeechCodec::neu(&config).unwrap();
        let err = codec.text_zu_audio("hi").await.unwrap_err();
        assert_eq!(err.code(), "TIMEOUT");
    }
}
