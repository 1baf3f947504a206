//! voxrelay-signaling – Hub, Registry und TCP-Transport
//!
//! Dieser Crate implementiert den Relay-Hub: Clients senden Sprache oder
//! Text, der Hub wandelt ueber den Sprachdienst um und verteilt das
//! Ergebnis an alle verbundenen Clients.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SignalingServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task + Aufruf-Worker)
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     v
//! SessionHub ----> SpeechCodec (Audio <-> Text)
//!     |
//!     v
//! MessageRouter --> ConnectionRegistry (Benutzer <-> Verbindung)
//!     |
//!     v
//! EventBroadcaster (Transport) – Send-Queues aller Verbindungen
//! ```

pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod hub;
pub mod registry;
pub mod router;
pub mod server_state;
pub mod tcp;

// Bequeme Re-Exporte
pub use broadcast::{EventBroadcaster, Transport};
pub use connection::ClientConnection;
pub use dispatcher::MessageDispatcher;
pub use error::{RelayError, RelayResult, SignalingError, SignalingResult};
pub use hub::SessionHub;
pub use registry::ConnectionRegistry;
pub use router::{MessageRouter, RelayNachricht};
pub use server_state::{SignalingConfig, SignalingState};
pub use tcp::SignalingServer;
