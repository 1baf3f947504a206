//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `SignalingServer` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task mit einer `ClientConnection`.
//! Hub, Registry und Sprachdienst sind `Send + Sync`, die Verbindungs-Tasks
//! laufen daher auf dem Multi-Thread-Runtime.

use futures_util::SinkExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::codec::Framed;
use voxrelay_protocol::{ErrorCode, FrameCodec, HubNachricht};

use crate::connection::ClientConnection;
use crate::error::SignalingResult;
use crate::server_state::SignalingState;

/// TCP-Signaling-Server
pub struct SignalingServer {
    state: Arc<SignalingState>,
    listener: TcpListener,
}

impl SignalingServer {
    /// Bindet den TCP-Socket
    ///
    /// Port 0 waehlt einen freien Port, siehe `lokale_adresse`.
    pub async fn binden(state: Arc<SignalingState>, bind_addr: SocketAddr) -> SignalingResult<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self { state, listener })
    }

    /// Tatsaechlich gebundene Adresse
    pub fn lokale_adresse(&self) -> SignalingResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Akzeptiert Verbindungen bis `shutdown_rx` ein `true`-Signal empfaengt
    pub async fn starten(self, mut shutdown_rx: watch::Receiver<bool>) -> SignalingResult<()> {
        tracing::info!(
            adresse = %self.lokale_adresse()?,
            server = %self.state.config.server_name,
            "TCP Signaling-Server gestartet"
        );

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => self.annehmen(stream, peer_addr, &shutdown_rx),
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Signaling-Server: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!("TCP Signaling-Server gestoppt");
        Ok(())
    }

    fn annehmen(&self, stream: TcpStream, peer_addr: SocketAddr, shutdown_rx: &watch::Receiver<bool>) {
        let max = self.state.config.max_clients as usize;
        if self.state.verbindungen() >= max {
            tracing::warn!(peer = %peer_addr, max, "Server voll – Verbindung abgelehnt");
            tokio::spawn(async move {
                let mut framed = Framed::new(stream, FrameCodec::new());
                let _ = framed
                    .send(HubNachricht::error(0, ErrorCode::ServerFull, "Server ist voll"))
                    .await;
            });
            return;
        }

        let verbindung = ClientConnection::neu(Arc::clone(&self.state), peer_addr);
        tracing::debug!(peer = %peer_addr, verbindung = %verbindung.verbindung(), "Verbindung akzeptiert");
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            verbindung.verarbeiten(stream, shutdown_rx).await;
        });
    }
}
