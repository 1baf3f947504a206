//! voxrelay-speech – Sprachumwandlung
//!
//! Dieses Crate kapselt den externen Sprachdienst hinter dem
//! `SpeechCodec`-Trait:
//! - `AzureSpeechCodec`: Azure Cognitive Services (REST, TTS + Kurz-Audio-STT)
//! - `LoopbackCodec`: UTF-8 <-> Bytes, fuer Entwicklung ohne Cloud-Zugang
//! - base64-Helfer fuer Audio-Nutzlasten an der Hub-Grenze
//!
//! # Beispiel
//!
//! ```no_run
//! use voxrelay_speech::{codec_erstellen, SpeechBackend, SpeechConfig};
//!
//! # async fn beispiel() -> Result<(), voxrelay_speech::SpeechError> {
//! let codec = codec_erstellen(SpeechConfig {
//!     backend: SpeechBackend::Loopback,
//!     ..Default::default()
//! })?;
//! let audio = codec.text_zu_audio("Connected to Hub").await?;
//! # Ok(())
//! # }
//! ```

pub mod azure;
pub mod codec;
pub mod error;
pub mod loopback;
pub mod payload;

// Bequeme Re-Exporte
pub use azure::AzureSpeechCodec;
pub use codec::{codec_erstellen, SpeechBackend, SpeechCodec, SpeechConfig};
pub use error::{SpeechError, SpeechResult};
pub use loopback::LoopbackCodec;
pub use payload::{audio_dekodieren, audio_kodieren};
