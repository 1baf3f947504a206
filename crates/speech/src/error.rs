//! Fehlertypen fuer den Sprachdienst

use thiserror::Error;

/// Fehler bei der Sprachumwandlung
///
/// Jeder Fehler traegt einen stabilen Code (`code()`), der unveraendert an
/// den ausloesenden Client gemeldet wird.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Netzwerkfehler beim Sprachdienst: {0}")]
    Netzwerk(#[source] reqwest::Error),

    #[error("Zeitlimit beim Sprachdienst ueberschritten")]
    Zeitlimit,

    /// Nicht-2xx-Antwort (Kontingent, Schluessel, Region, ...)
    #[error("Sprachdienst antwortete mit Status {status}: {nachricht}")]
    Upstream { status: u16, nachricht: String },

    #[error("Spracherkennung ohne Ergebnis: {status}")]
    Erkennung { status: String },

    #[error("Sprachsynthese lieferte keine Audiodaten")]
    LeeresAudio,

    #[error("Ungueltige Antwort vom Sprachdienst: {0}")]
    UngueltigeAntwort(String),

    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

impl SpeechError {
    /// Stabiler, maschinenlesbarer Fehlercode
    pub fn code(&self) -> &'static str {
        match self {
            Self::Netzwerk(_) => "NETWORK",
            Self::Zeitlimit => "TIMEOUT",
            Self::Upstream { .. } => "UPSTREAM_STATUS",
            Self::Erkennung { .. } => "NO_MATCH",
            Self::LeeresAudio => "EMPTY_AUDIO",
            Self::UngueltigeAntwort(_) => "INVALID_RESPONSE",
            Self::UngueltigeEingabe(_) => "INVALID_INPUT",
            Self::Konfiguration(_) => "CONFIGURATION",
        }
    }
}

impl From<reqwest::Error> for SpeechError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Zeitlimit
        } else {
            Self::Netzwerk(e)
        }
    }
}

/// Result-Typ fuer den Sprachdienst
pub type SpeechResult<T> = Result<T, SpeechError>;
