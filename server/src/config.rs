//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist. Ohne Azure-Schluessel muss `sprache.backend = "loopback"`
//! gesetzt sein.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use voxrelay_signaling::SignalingConfig;
use voxrelay_speech::{SpeechBackend, SpeechConfig};

/// Umgebungsvariable fuer den Azure-Schluessel (hat Vorrang vor der Datei)
pub const ENV_SPEECH_KEY: &str = "VR_SPEECH_KEY";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Keepalive und Aufruf-Queue pro Verbindung
    pub verbindung: VerbindungsEinstellungen,
    /// Sprachdienst (Azure oder Loopback)
    pub sprache: SprachEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
    /// Maximale Anzahl gleichzeitiger Clients
    pub max_clients: u32,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "VoxRelay Hub".into(),
            max_clients: 512,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer TCP und Observability
    pub bind_adresse: String,
    /// Port fuer das Hub-Protokoll
    pub tcp_port: u16,
    /// Maximale Frame-Groesse in Bytes (base64-Audio braucht Platz)
    pub max_frame_bytes: usize,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            tcp_port: 7070,
            max_frame_bytes: 1024 * 1024,
        }
    }
}

/// Verbindungs-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerbindungsEinstellungen {
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Trennung nach so vielen Sekunden ohne eingehende Frames
    pub timeout_sek: u64,
    /// Wartende Aufrufe pro Verbindung
    pub aufruf_queue: usize,
}

impl Default for VerbindungsEinstellungen {
    fn default() -> Self {
        Self {
            keepalive_sek: 30,
            timeout_sek: 90,
            aufruf_queue: 16,
        }
    }
}

/// Sprachdienst-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SprachEinstellungen {
    /// "azure" oder "loopback"
    pub backend: String,
    /// Azure Subscription-Key (alternativ `VR_SPEECH_KEY`)
    pub subscription_key: String,
    pub region: String,
    /// Erkennungs- und Synthesesprache
    pub sprache: String,
    pub stimme: String,
    pub ausgabe_format: String,
    /// Zeitlimit pro Anfrage an den Sprachdienst
    pub timeout_sek: u64,
    pub tts_endpunkt: Option<String>,
    pub stt_endpunkt: Option<String>,
}

impl Default for SprachEinstellungen {
    fn default() -> Self {
        let standard = SpeechConfig::default();
        Self {
            backend: "azure".into(),
            subscription_key: String::new(),
            region: standard.region,
            sprache: standard.sprache,
            stimme: standard.stimme,
            ausgabe_format: standard.ausgabe_format,
            timeout_sek: standard.timeout.as_secs(),
            tts_endpunkt: None,
            stt_endpunkt: None,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// `/metrics` und `/health` bereitstellen
    pub aktiviert: bool,
    /// Port des Observability-Servers
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei
    ///
    /// Fehlt die Datei, werden Standardwerte verwendet. `VR_SPEECH_KEY`
    /// ueberschreibt den Schluessel aus der Datei.
    pub fn laden(pfad: &str) -> Result<Self> {
        let mut config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .with_context(|| format!("Konfigurationsfehler in '{pfad}'"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.schluessel_ueberschreiben(std::env::var(ENV_SPEECH_KEY).ok());
        Ok(config)
    }

    /// Parst eine Konfiguration aus einem TOML-String
    pub fn aus_toml(inhalt: &str) -> Result<Self> {
        Ok(toml::from_str(inhalt)?)
    }

    /// Setzt den Azure-Schluessel, leere Werte werden ignoriert
    pub fn schluessel_ueberschreiben(&mut self, schluessel: Option<String>) {
        if let Some(schluessel) = schluessel.filter(|s| !s.trim().is_empty()) {
            self.sprache.subscription_key = schluessel;
        }
    }

    /// Gibt die vollstaendige Bind-Adresse fuer TCP zurueck
    pub fn tcp_bind_adresse(&self) -> Result<SocketAddr> {
        adresse(&self.netzwerk.bind_adresse, self.netzwerk.tcp_port)
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> Result<SocketAddr> {
        adresse(&self.netzwerk.bind_adresse, self.observability.port)
    }

    /// Konfiguration fuer den Sprachdienst
    pub fn sprach_config(&self) -> Result<SpeechConfig> {
        let s = &self.sprache;
        Ok(SpeechConfig {
            backend: s.backend.parse::<SpeechBackend>()?,
            subscription_key: s.subscription_key.clone(),
            region: s.region.clone(),
            sprache: s.sprache.clone(),
            stimme: s.stimme.clone(),
            ausgabe_format: s.ausgabe_format.clone(),
            timeout: Duration::from_secs(s.timeout_sek),
            tts_endpunkt: s.tts_endpunkt.clone(),
            stt_endpunkt: s.stt_endpunkt.clone(),
        })
    }

    /// Konfiguration fuer Hub und TCP-Transport
    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            server_name: self.server.name.clone(),
            max_clients: self.server.max_clients,
            keepalive_sek: self.verbindung.keepalive_sek,
            verbindungs_timeout_sek: self.verbindung.timeout_sek,
            max_frame_bytes: self.netzwerk.max_frame_bytes,
            aufruf_queue: self.verbindung.aufruf_queue,
        }
    }
}

fn adresse(host: &str, port: u16) -> Result<SocketAddr> {
    format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Ungueltige Bind-Adresse '{host}:{port}'"))
}
