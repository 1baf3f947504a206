//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task. Client-Aufrufe laufen nicht in der Lese-Schleife, sondern in
//! einem Worker-Task pro Verbindung:
//!
//! ```text
//! TCP --> Lese-Schleife --(mpsc, begrenzt)--> Aufruf-Worker --> SessionHub
//!              ^                                   |
//!              |                                   v
//!              +------- Send-Queue (Broadcaster) <-+ Ack / Error / Broadcasts
//! ```
//!
//! Der Worker arbeitet die Aufrufe einer Verbindung strikt nacheinander ab,
//! verschiedene Verbindungen laufen parallel. Ist die Aufruf-Queue voll,
//! wird der Aufruf sofort mit `BUSY` abgelehnt. Antworten des Workers warten
//! bei voller Send-Queue auf Platz und gehen nicht verloren.
//!
//! ## Fehler
//! - Frame mit gueltigem Laengenfeld aber unpassendem JSON: `INVALID_REQUEST`
//!   an den Absender, die Verbindung bleibt offen
//! - Nachricht laesst sich nicht kodieren: nur diese Nachricht wird verworfen
//! - Nur Socket-Fehler und kaputtes Framing trennen die Verbindung
//!
//! ## Keepalive
//! - Server sendet alle `keepalive_sek` einen Ping
//! - Ohne eingehende Frames fuer `verbindungs_timeout_sek` wird getrennt
//!
//! ## Abbau
//! Der Worker wird abgebrochen und abgewartet bevor der Hub die Trennung
//! sieht. Ein laufender Aufruf kann die Verbindung danach nicht mehr in die
//! Registry zurueckschreiben.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use voxrelay_core::ConnectionId;
use voxrelay_protocol::{Eingang, ErrorCode, FrameCodec, FrameFehler, HubNachricht};

use crate::broadcast::{EventBroadcaster, Transport};
use crate::dispatcher::{ist_aufruf, MessageDispatcher};
use crate::server_state::SignalingState;

/// Verarbeitet eine einzelne TCP-Verbindung
pub struct ClientConnection {
    state: Arc<SignalingState>,
    peer_addr: SocketAddr,
    verbindung: ConnectionId,
    sende_rx: mpsc::Receiver<HubNachricht>,
}

impl ClientConnection {
    /// Registriert die Verbindung bei Broadcaster und Hub
    ///
    /// Die Registrierung passiert sofort, damit das Client-Limit im
    /// Accept-Loop die Verbindung bereits mitzaehlt.
    pub fn neu(state: Arc<SignalingState>, peer_addr: SocketAddr) -> Self {
        let verbindung = ConnectionId::new();
        let sende_rx = state.broadcaster.client_registrieren(verbindung);
        state.hub.bei_verbindung(verbindung);
        Self {
            state,
            peer_addr,
            verbindung,
            sende_rx,
        }
    }

    pub fn verbindung(&self) -> ConnectionId {
        self.verbindung
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis die Verbindung getrennt wird oder ein Shutdown-Signal
    /// eingeht.
    pub async fn verarbeiten(self, stream: TcpStream, mut shutdown_rx: watch::Receiver<bool>) {
        let ClientConnection {
            state,
            peer_addr,
            verbindung,
            mut sende_rx,
        } = self;

        let keepalive_intervall = Duration::from_secs(state.config.keepalive_sek.max(1));
        let timeout_dauer = Duration::from_secs(state.config.verbindungs_timeout_sek);

        tracing::info!(peer = %peer_addr, verbindung = %verbindung, "Neue Verbindung");

        let mut framed = Framed::new(
            stream,
            FrameCodec::with_max_size(state.config.max_frame_bytes),
        );

        let dispatcher = MessageDispatcher::neu(Arc::clone(&state.hub));
        let (aufruf_tx, aufruf_rx) = mpsc::channel(state.config.aufruf_queue.max(1));
        let worker = worker_starten(
            dispatcher.clone(),
            state.broadcaster.clone(),
            verbindung,
            aufruf_rx,
        );

        let mut letzter_empfang = Instant::now();
        let mut keepalive = tokio::time::interval_at(
            tokio::time::Instant::now() + keepalive_intervall,
            keepalive_intervall,
        );
        let mut ping_request_id: u32 = 0;

        let grund = loop {
            tokio::select! {
                // Eingehende Nachricht vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(Eingang::Nachricht(nachricht))) => {
                            letzter_empfang = Instant::now();
                            tracing::trace!(
                                peer = %peer_addr,
                                request_id = nachricht.request_id,
                                ereignis = nachricht.ereignis_name(),
                                "Nachricht empfangen"
                            );

                            if ist_aufruf(&nachricht.payload) {
                                let request_id = nachricht.request_id;
                                match aufruf_tx.try_send(nachricht) {
                                    Ok(()) => {}
                                    Err(mpsc::error::TrySendError::Full(_)) => {
                                        tracing::warn!(verbindung = %verbindung, "Aufruf-Queue voll");
                                        let busy = HubNachricht::error(
                                            request_id,
                                            ErrorCode::Busy,
                                            "Zu viele offene Aufrufe",
                                        );
                                        if let Err(e) = zustellen(&mut framed, busy, peer_addr).await {
                                            tracing::warn!(peer = %peer_addr, fehler = %e, "Senden fehlgeschlagen");
                                            break "sendefehler";
                                        }
                                    }
                                    Err(mpsc::error::TrySendError::Closed(_)) => {
                                        tracing::error!(verbindung = %verbindung, "Aufruf-Worker beendet");
                                        break "worker_beendet";
                                    }
                                }
                            } else if let Some(antwort) = dispatcher.dispatch(verbindung, nachricht).await {
                                if let Err(e) = zustellen(&mut framed, antwort, peer_addr).await {
                                    tracing::warn!(peer = %peer_addr, fehler = %e, "Senden fehlgeschlagen");
                                    break "sendefehler";
                                }
                            }
                        }
                        Some(Ok(Eingang::Ungueltig(frame))) => {
                            letzter_empfang = Instant::now();
                            tracing::debug!(
                                peer = %peer_addr,
                                request_id = frame.request_id,
                                grund = %frame.grund,
                                "Ungueltige Nachricht abgelehnt"
                            );
                            let antwort = HubNachricht::error(
                                frame.request_id,
                                ErrorCode::InvalidRequest,
                                frame.grund,
                            );
                            if let Err(e) = zustellen(&mut framed, antwort, peer_addr).await {
                                tracing::warn!(peer = %peer_addr, fehler = %e, "Senden fehlgeschlagen");
                                break "sendefehler";
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(peer = %peer_addr, fehler = %e, "Frame-Lesefehler");
                            break "lesefehler";
                        }
                        None => {
                            tracing::info!(peer = %peer_addr, "Verbindung vom Client getrennt");
                            break "client_getrennt";
                        }
                    }
                }

                // Ausgehende Nachricht (Broadcasts, Antworten des Workers)
                Some(ausgehend) = sende_rx.recv() => {
                    if let Err(e) = zustellen(&mut framed, ausgehend, peer_addr).await {
                        tracing::warn!(peer = %peer_addr, fehler = %e, "Zustellung fehlgeschlagen");
                        break "sendefehler";
                    }
                }

                // Keepalive-Ping und Timeout
                _ = keepalive.tick() => {
                    if letzter_empfang.elapsed() > timeout_dauer {
                        tracing::warn!(peer = %peer_addr, "Verbindungs-Timeout");
                        break "timeout";
                    }
                    ping_request_id = ping_request_id.wrapping_add(1);
                    let ts = std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_millis();
                    let ts = u64::try_from(ts).unwrap_or(u64::MAX);
                    if let Err(e) = zustellen(&mut framed, HubNachricht::ping(ping_request_id, ts), peer_addr).await {
                        tracing::warn!(peer = %peer_addr, fehler = %e, "Ping-Senden fehlgeschlagen");
                        break "sendefehler";
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(peer = %peer_addr, "Shutdown-Signal – Verbindung wird getrennt");
                        let abschied = HubNachricht::error(
                            0,
                            ErrorCode::InternalError,
                            "Server wird heruntergefahren",
                        );
                        let _ = framed.send(abschied).await;
                        break "shutdown";
                    }
                }
            }
        };

        // Reihenfolge: Worker stoppen, dann Registry, dann Send-Queue
        drop(aufruf_tx);
        worker.abort();
        let _ = worker.await;
        state.hub.bei_trennung(verbindung, grund);
        state.broadcaster.client_entfernen(&verbindung);

        tracing::info!(peer = %peer_addr, verbindung = %verbindung, grund, "Verbindungs-Task beendet");
    }
}

/// Schreibt eine Nachricht auf den Socket
///
/// Gibt nur Socket-Fehler zurueck. Eine Nachricht die sich nicht kodieren
/// laesst wird protokolliert und verworfen, der Stream bleibt benutzbar.
async fn zustellen(
    framed: &mut Framed<TcpStream, FrameCodec>,
    nachricht: HubNachricht,
    peer_addr: SocketAddr,
) -> Result<(), FrameFehler> {
    let ereignis = nachricht.ereignis_name();
    match framed.send(nachricht).await {
        Err(e) if !e.ist_io() => {
            tracing::warn!(peer = %peer_addr, ereignis, fehler = %e, "Nachricht nicht kodierbar – verworfen");
            Ok(())
        }
        ergebnis => ergebnis,
    }
}

/// Startet den Aufruf-Worker einer Verbindung
fn worker_starten(
    dispatcher: MessageDispatcher,
    transport: EventBroadcaster,
    verbindung: ConnectionId,
    mut aufrufe: mpsc::Receiver<HubNachricht>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(aufruf) = aufrufe.recv().await {
            let Some(antwort) = dispatcher.dispatch(verbindung, aufruf).await else {
                continue;
            };
            let request_id = antwort.request_id;
            if !transport.antwort_senden(&verbindung, antwort).await {
                tracing::warn!(
                    verbindung = %verbindung,
                    request_id,
                    "Antwort verworfen – Verbindung geschlossen"
                );
            }
        }
    })
}
