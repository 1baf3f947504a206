//! voxrelay-protocol – Hub-Protokoll-Definitionen
//!
//! Dieses Crate definiert alle Nachrichtentypen die zwischen Client und
//! Hub ausgetauscht werden, sowie das Frame-Format fuer TCP.

pub mod control;
pub mod wire;

pub use control::{BroadcastEreignis, ErrorCode, HubNachricht, HubPayload, RECEIVE_BROADCAST};
pub use wire::{Eingang, FrameCodec, FrameFehler, UngueltigerFrame};
