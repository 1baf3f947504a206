//! Session-Hub – Einstiegspunkt fuer Client-Aufrufe und Lebenszyklus
//!
//! Der Hub ist eine einfache Struktur ohne Framework-Basisklasse. Der
//! Transport ruft `bei_verbindung` / `bei_trennung` explizit auf und leitet
//! die vier Client-Aufrufe weiter:
//!
//! | Aufruf                     | Umwandlung       | verteilt                           |
//! |----------------------------|------------------|------------------------------------|
//! | `sprache_weiterleiten`     | Audio -> Text    | erkannter Text + Originaltext      |
//! | `text_weiterleiten`        | Text -> Audio    | base64-Audio + Text                |
//! | `verbindung_ankuendigen`   | Text -> Audio    | "Connected to Hub"                 |
//! | `nachricht_senden`         | Text -> Audio    | wie `text_weiterleiten`            |
//!
//! Alle Aufrufe validieren zuerst ihre Eingaben, rufen dann den Sprachdienst
//! ohne gehaltene Sperre auf und uebergeben erst danach an den Router.
//! Schlaegt die Umwandlung fehl oder passt das Ergebnis nicht in einen
//! Frame, bleibt die Registry unveraendert und es wird nichts verteilt.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use voxrelay_core::{ConnectionId, HubEreignis, Zustellmodus};
use voxrelay_protocol::wire::{json_laenge, DEFAULT_MAX_FRAME_SIZE};
use voxrelay_speech::{audio_dekodieren, audio_kodieren, SpeechCodec};

use crate::broadcast::Transport;
use crate::error::{RelayError, RelayResult};
use crate::registry::ConnectionRegistry;
use crate::router::{MessageRouter, RelayNachricht};

/// Text der Anmelde-Ankuendigung
pub const ANKUENDIGUNG: &str = "Connected to Hub";

/// Groesse des Broadcast-Kanals fuer Hub-Ereignisse
const EREIGNIS_KANAL_GROESSE: usize = 256;

const RICHTUNG_AUDIO_ZU_TEXT: &str = "audio_zu_text";
const RICHTUNG_TEXT_ZU_AUDIO: &str = "text_zu_audio";

pub struct SessionHub {
    registry: ConnectionRegistry,
    router: MessageRouter,
    codec: Arc<dyn SpeechCodec>,
    ereignis_tx: broadcast::Sender<HubEreignis>,
    max_frame_bytes: usize,
}

impl SessionHub {
    /// Erstellt den Hub; Registry und Transport werden vom Host injiziert
    pub fn neu(
        registry: ConnectionRegistry,
        codec: Arc<dyn SpeechCodec>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (ereignis_tx, _) = broadcast::channel(EREIGNIS_KANAL_GROESSE);
        Self {
            router: MessageRouter::neu(registry.clone(), transport),
            registry,
            codec,
            ereignis_tx,
            max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Frame-Limit der Empfaenger; groessere Ereignisse werden nicht verteilt
    pub fn mit_frame_limit(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    // -----------------------------------------------------------------------
    // Lebenszyklus
    // -----------------------------------------------------------------------

    /// Transport hat eine Verbindung aufgebaut
    pub fn bei_verbindung(&self, verbindung: ConnectionId) {
        self.registry.speichern(verbindung, "");
        tracing::info!(verbindung = %verbindung, "Client verbunden");
        let _ = self.ereignis_tx.send(HubEreignis::Verbunden { verbindung });
    }

    /// Transport hat eine Verbindung getrennt
    ///
    /// Auch fuer nie vollstaendig registrierte oder bereits entfernte
    /// Verbindungen sicher; ein zweiter Aufruf aendert nichts.
    pub fn bei_trennung(&self, verbindung: ConnectionId, grund: &str) {
        match self.registry.entfernen(&verbindung) {
            Some(benutzer) => {
                tracing::info!(
                    verbindung = %verbindung,
                    benutzer = %benutzer,
                    grund = %grund,
                    "Client getrennt"
                );
                let _ = self.ereignis_tx.send(HubEreignis::Getrennt {
                    verbindung,
                    grund: grund.to_string(),
                });
            }
            None => {
                tracing::debug!(verbindung = %verbindung, "Trennung fuer unbekannte Verbindung ignoriert");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Client-Aufrufe
    // -----------------------------------------------------------------------

    /// Sprachnachricht: Audio wird erkannt und als Text verteilt
    pub async fn sprache_weiterleiten(
        &self,
        verbindung: ConnectionId,
        absender: &str,
        audio_base64: &str,
        original: &str,
    ) -> RelayResult<usize> {
        let absender = absender_pruefen(absender)?;
        if audio_base64.trim().is_empty() {
            return Err(RelayError::eingabe("Audio fehlt"));
        }
        let audio = audio_dekodieren(audio_base64.trim())
            .map_err(|e| RelayError::eingabe(format!("Audio ist kein gueltiges base64: {e}")))?;

        let start = Instant::now();
        let text = self
            .codec
            .audio_zu_text(&audio)
            .await
            .map_err(|e| self.codec_fehler(verbindung, RICHTUNG_AUDIO_ZU_TEXT, e))?;

        self.weiterleiten(
            verbindung,
            RelayNachricht {
                absender: absender.to_string(),
                nutzlast: text,
                original: original.to_string(),
            },
            RICHTUNG_AUDIO_ZU_TEXT,
            start,
        )
    }

    /// Textnachricht: Text wird synthetisiert und als base64-Audio verteilt
    pub async fn text_weiterleiten(
        &self,
        verbindung: ConnectionId,
        absender: &str,
        text: &str,
    ) -> RelayResult<usize> {
        let absender = absender_pruefen(absender)?;
        if text.trim().is_empty() {
            return Err(RelayError::eingabe("Nachricht fehlt"));
        }

        let start = Instant::now();
        let audio = self
            .codec
            .text_zu_audio(text)
            .await
            .map_err(|e| self.codec_fehler(verbindung, RICHTUNG_TEXT_ZU_AUDIO, e))?;

        self.weiterleiten(
            verbindung,
            RelayNachricht {
                absender: absender.to_string(),
                nutzlast: audio_kodieren(&audio),
                original: text.to_string(),
            },
            RICHTUNG_TEXT_ZU_AUDIO,
            start,
        )
    }

    /// Bestaetigt allen Teilnehmern die Anmeldung eines Benutzers
    pub async fn verbindung_ankuendigen(
        &self,
        verbindung: ConnectionId,
        absender: &str,
    ) -> RelayResult<usize> {
        self.text_weiterleiten(verbindung, absender, ANKUENDIGUNG).await
    }

    /// Textnachricht senden (gleichbedeutend mit `text_weiterleiten`)
    pub async fn nachricht_senden(
        &self,
        verbindung: ConnectionId,
        absender: &str,
        text: &str,
    ) -> RelayResult<usize> {
        self.text_weiterleiten(verbindung, absender, text).await
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    /// Abonniert Hub-Ereignisse
    pub fn ereignisse_abonnieren(&self) -> broadcast::Receiver<HubEreignis> {
        self.ereignis_tx.subscribe()
    }

    /// Anzahl registrierter Verbindungen
    pub fn online_anzahl(&self) -> usize {
        self.registry.anzahl()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsmethoden
    // -----------------------------------------------------------------------

    fn weiterleiten(
        &self,
        verbindung: ConnectionId,
        nachricht: RelayNachricht,
        richtung: &str,
        codec_start: Instant,
    ) -> RelayResult<usize> {
        let codec_dauer_ms = u64::try_from(codec_start.elapsed().as_millis()).unwrap_or(u64::MAX);

        // Vor dem Routing pruefen: ein zu grosses Ereignis wuerde bei jedem
        // Empfaenger am Kodieren scheitern
        let groesse = json_laenge(&nachricht.als_ereignis()).unwrap_or(usize::MAX);
        if groesse > self.max_frame_bytes {
            tracing::warn!(
                verbindung = %verbindung,
                richtung = %richtung,
                groesse,
                max = self.max_frame_bytes,
                "Umgewandelte Nachricht zu gross – wird nicht verteilt"
            );
            return Err(RelayError::ZuGross {
                groesse,
                max: self.max_frame_bytes,
            });
        }

        let modus = Zustellmodus::Broadcast;
        let empfaenger = self.router.relay(verbindung, modus, &nachricht);

        let _ = self.ereignis_tx.send(HubEreignis::Weitergeleitet {
            absender: nachricht.absender,
            modus,
            empfaenger,
            richtung: richtung.to_string(),
            codec_dauer_ms,
        });
        Ok(empfaenger)
    }

    fn codec_fehler(
        &self,
        verbindung: ConnectionId,
        richtung: &str,
        fehler: voxrelay_speech::SpeechError,
    ) -> RelayError {
        tracing::warn!(
            verbindung = %verbindung,
            richtung = %richtung,
            code = fehler.code(),
            fehler = %fehler,
            "Sprachumwandlung fehlgeschlagen – Nachricht wird nicht verteilt"
        );
        let _ = self.ereignis_tx.send(HubEreignis::CodecFehler {
            verbindung,
            richtung: richtung.to_string(),
            code: fehler.code().to_string(),
        });
        RelayError::Codec(fehler)
    }
}

fn absender_pruefen(absender: &str) -> RelayResult<&str> {
    let absender = absender.trim();
    if absender.is_empty() {
        return Err(RelayError::eingabe("Benutzername fehlt"));
    }
    Ok(absender)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
