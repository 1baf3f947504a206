//! Wire-Format fuer TCP-Verbindungen zum Hub
//!
//! Jeder Frame besteht aus einem Laengen-Praefix (u32 big-endian) gefolgt
//! von genau einer JSON-kodierten `HubNachricht`.
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE)                   | JSON      |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! Sprachnachrichten tragen base64-Audio im JSON, daher liegt die
//! Standard-Obergrenze bei 1 MB pro Frame.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use crate::control::HubNachricht;

/// Standard-maximale Frame-Groesse (1 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Fehler beim Lesen oder Schreiben eines Frames
///
/// Nur `Io` und ein zu grosses eingehendes Laengenfeld beenden die
/// Verbindung. Eine zu grosse ausgehende Nachricht wird nicht geschrieben,
/// der Stream bleibt intakt.
#[derive(Debug, Error)]
pub enum FrameFehler {
    #[error("IO-Fehler: {0}")]
    Io(#[from] io::Error),

    #[error("Frame zu gross: {laenge} Bytes (Maximum: {max} Bytes)")]
    ZuGross { laenge: usize, max: usize },

    #[error("JSON-Serialisierung fehlgeschlagen: {0}")]
    Json(#[from] serde_json::Error),
}

impl FrameFehler {
    /// Socket-Fehler; die Verbindung ist nicht mehr benutzbar
    pub fn ist_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Vollstaendig gelesener Frame
///
/// Ein Frame mit korrektem Laengenfeld, dessen JSON nicht zum Schema passt,
/// ist kein Stream-Fehler: die Grenzen des naechsten Frames sind bekannt.
#[derive(Debug, Clone, PartialEq)]
pub enum Eingang {
    Nachricht(HubNachricht),
    Ungueltig(UngueltigerFrame),
}

impl Eingang {
    pub fn nachricht(self) -> Option<HubNachricht> {
        match self {
            Self::Nachricht(n) => Some(n),
            Self::Ungueltig(_) => None,
        }
    }
}

/// Frame mit gueltigem Framing aber unbrauchbarem Inhalt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UngueltigerFrame {
    /// `request_id` falls lesbar, sonst 0
    pub request_id: u32,
    pub grund: String,
}

/// Laenge des JSON-Teils, den `FrameCodec` fuer diese Nachricht schreiben wuerde
pub fn json_laenge(nachricht: &HubNachricht) -> Result<usize, FrameFehler> {
    Ok(serde_json::to_vec(nachricht)?.len())
}

/// tokio-util Codec fuer `Framed<TcpStream, FrameCodec>`
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limit
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Erstellt einen `FrameCodec` mit eigener maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    fn zu_gross(&self, laenge: usize) -> FrameFehler {
        FrameFehler::ZuGross {
            laenge,
            max: self.max_frame_size,
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Eingang;
    type Error = FrameFehler;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        // Laenge lesen ohne den Buffer zu veraendern
        let laenge = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if laenge > self.max_frame_size {
            return Err(self.zu_gross(laenge));
        }

        let gesamt = LENGTH_FIELD_SIZE + laenge;
        if src.len() < gesamt {
            src.reserve(gesamt - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_FIELD_SIZE);
        let payload = src.split_to(laenge);

        Ok(Some(match serde_json::from_slice(&payload) {
            Ok(nachricht) => Eingang::Nachricht(nachricht),
            Err(e) => Eingang::Ungueltig(UngueltigerFrame {
                request_id: request_id_lesen(&payload),
                grund: format!("JSON-Deserialisierung fehlgeschlagen: {e}"),
            }),
        }))
    }
}

impl Encoder<HubNachricht> for FrameCodec {
    type Error = FrameFehler;

    fn encode(&mut self, item: HubNachricht, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item)?;

        if json.len() > self.max_frame_size {
            return Err(self.zu_gross(json.len()));
        }

        dst.reserve(LENGTH_FIELD_SIZE + json.len());
        dst.put_u32(json.len() as u32);
        dst.put_slice(&json);
        Ok(())
    }
}

/// Liest `request_id` aus einem sonst ungueltigen Frame
fn request_id_lesen(payload: &[u8]) -> u32 {
    serde_json::from_slice::<serde_json::Value>(payload)
        .ok()
        .and_then(|wert| wert.get("request_id")?.as_u64())
        .and_then(|id| u32::try_from(id).ok())
        .unwrap_or(0)
}
