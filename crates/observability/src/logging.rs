//! Structured Logging via tracing-subscriber
//!
//! Level und Format kommen aus `[logging]` der Konfiguration. Die
//! Umgebungsvariablen haben Vorrang:
//! - `VR_LOG_LEVEL`: EnvFilter-Direktive (z.B. `debug` oder
//!   `voxrelay_signaling=trace,info`)
//! - `VR_LOG_FORMAT`: `text` oder `json`

use anyhow::{anyhow, Result};
use std::str::FromStr;
use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LEVEL: &str = "VR_LOG_LEVEL";
pub const ENV_FORMAT: &str = "VR_LOG_FORMAT";

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            anders => Err(anyhow!("Unbekanntes Log-Format '{anders}' (erlaubt: text, json)")),
        }
    }
}

/// Initialisiert das Logging-System
///
/// Ein ungueltiger Level faellt auf `info` zurueck, ein unbekanntes Format
/// ist ein Fehler. Schlaegt fehl wenn bereits ein Subscriber gesetzt ist.
pub fn logging_initialisieren(level: &str, format: &str) -> Result<()> {
    let filter = EnvFilter::try_from_env(ENV_LEVEL)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format: LogFormat = std::env::var(ENV_FORMAT)
        .unwrap_or_else(|_| format.to_string())
        .parse()?;

    let ergebnis = match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };
    ergebnis.map_err(|e| anyhow!("Logging bereits initialisiert: {e}"))
}

/// Validiert ob ein Log-Level-String gueltig ist
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}
