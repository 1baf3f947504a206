//! voxrelay-server – Bibliotheks-Root
//!
//! Verdrahtet Sprachdienst, Hub, TCP-Transport und Observability und stellt
//! den oeffentlichen Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use voxrelay_core::HubEreignis;
use voxrelay_observability::{observability_server_starten, HealthState, VoxRelayMetrics};
use voxrelay_signaling::{SessionHub, SignalingServer, SignalingState};
use voxrelay_speech::codec_erstellen;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Sprach-Codec erstellen (Konfigurationsfehler brechen hier ab)
    /// 2. Hub samt Registry und Broadcaster aufbauen
    /// 3. Observability-Server starten (falls aktiviert)
    /// 4. TCP-Listener starten
    /// 5. Auf Ctrl-C warten, dann alle Tasks per Watch-Kanal stoppen
    pub async fn starten(self) -> Result<()> {
        let codec = codec_erstellen(self.config.sprach_config()?)
            .context("Sprachdienst konnte nicht initialisiert werden")?;
        let state = SignalingState::neu(self.config.signaling_config(), codec);

        let tcp_adresse = self.config.tcp_bind_adresse()?;
        let signaling = SignalingServer::binden(Arc::clone(&state), tcp_adresse)
            .await
            .with_context(|| format!("TCP-Port {tcp_adresse} konnte nicht gebunden werden"))?;

        tracing::info!(
            server_name = %self.config.server.name,
            tcp = %signaling.lokale_adresse()?,
            sprache = %self.config.sprache.backend,
            "Server startet"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let metriken = VoxRelayMetrics::neu()?;
        let health = HealthState::neu();
        let ereignis_task = tokio::spawn(ereignisse_verbuchen(
            Arc::clone(&state.hub),
            state.hub.ereignisse_abonnieren(),
            metriken.clone(),
            health.clone(),
        ));

        let observability_task = if self.config.observability.aktiviert {
            let adresse = self.config.observability_bind_adresse()?;
            let shutdown_rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(e) =
                    observability_server_starten(adresse, metriken, health, shutdown_rx).await
                {
                    tracing::error!(fehler = %e, "Observability-Server fehlgeschlagen");
                }
            }))
        } else {
            None
        };

        let signaling_task = tokio::spawn(signaling.starten(shutdown_rx));

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

        let _ = shutdown_tx.send(true);
        match signaling_task.await {
            Ok(Err(e)) => tracing::error!(fehler = %e, "Signaling-Server mit Fehler beendet"),
            Err(e) => tracing::error!(fehler = %e, "Signaling-Task abgebrochen"),
            Ok(Ok(())) => {}
        }
        if let Some(task) = observability_task {
            let _ = task.await;
        }
        ereignis_task.abort();

        Ok(())
    }
}

/// Uebertraegt Hub-Ereignisse in Metriken und Health-Zustand
///
/// Laeuft getrennt vom Relay-Pfad; bei Rueckstau gehen nur Ereignisse
/// verloren, nie Nachrichten.
async fn ereignisse_verbuchen(
    hub: Arc<SessionHub>,
    mut ereignisse: broadcast::Receiver<HubEreignis>,
    metriken: VoxRelayMetrics,
    health: HealthState,
) {
    loop {
        match ereignisse.recv().await {
            Ok(ereignis) => {
                metriken.ereignis_verbuchen(&ereignis);
                health.ereignis_verbuchen(&ereignis);
                health.clients_setzen(hub.online_anzahl());
            }
            Err(broadcast::error::RecvError::Lagged(verpasst)) => {
                tracing::warn!(verpasst, "Metriken verpassen Hub-Ereignisse");
                metriken.connected_clients.set(hub.online_anzahl() as f64);
                health.clients_setzen(hub.online_anzahl());
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
