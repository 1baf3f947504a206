//! Prometheus-kompatible Metriken fuer VoxRelay
//!
//! Registrierte Metriken:
//! - `voxrelay_connected_clients` – Gauge: Aktuell verbundene Clients
//! - `voxrelay_relays_total` – Counter: Weitergeleitete Nachrichten (modus)
//! - `voxrelay_deliveries_total` – Counter: Zustellungen an Empfaenger
//! - `voxrelay_codec_errors_total` – Counter: Fehlgeschlagene Umwandlungen (richtung)
//! - `voxrelay_codec_duration_seconds` – Histogram: Dauer der Umwandlung (richtung)
//!
//! Die Werte werden aus `HubEreignis`-Ereignissen abgeleitet, der Hub selbst
//! kennt Prometheus nicht.

use anyhow::Result;
use axum::{response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use voxrelay_core::HubEreignis;

/// Alle VoxRelay-Prometheus-Metriken
#[derive(Clone)]
pub struct VoxRelayMetrics {
    pub registry: Arc<Registry>,

    pub connected_clients: Gauge,
    pub relays_total: IntCounterVec,
    pub deliveries_total: IntCounter,

    // Sprachdienst
    pub codec_errors_total: IntCounterVec,
    pub codec_duration_seconds: HistogramVec,
}

impl VoxRelayMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_clients = Gauge::with_opts(Opts::new(
            "voxrelay_connected_clients",
            "Anzahl aktuell verbundener Clients",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let relays_total = IntCounterVec::new(
            Opts::new(
                "voxrelay_relays_total",
                "Gesamtanzahl weitergeleiteter Nachrichten",
            ),
            &["modus"],
        )?;
        registry.register(Box::new(relays_total.clone()))?;

        let deliveries_total = IntCounter::with_opts(Opts::new(
            "voxrelay_deliveries_total",
            "Gesamtanzahl zugestellter ReceiveBroadcast-Ereignisse",
        ))?;
        registry.register(Box::new(deliveries_total.clone()))?;

        let codec_errors_total = IntCounterVec::new(
            Opts::new(
                "voxrelay_codec_errors_total",
                "Fehlgeschlagene Sprachumwandlungen",
            ),
            &["richtung"],
        )?;
        registry.register(Box::new(codec_errors_total.clone()))?;

        let codec_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "voxrelay_codec_duration_seconds",
                "Dauer einer Sprachumwandlung in Sekunden",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["richtung"],
        )?;
        registry.register(Box::new(codec_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            relays_total,
            deliveries_total,
            codec_errors_total,
            codec_duration_seconds,
        })
    }

    /// Verbucht ein Hub-Ereignis in den passenden Metriken
    pub fn ereignis_verbuchen(&self, ereignis: &HubEreignis) {
        match ereignis {
            HubEreignis::Verbunden { .. } => self.connected_clients.inc(),
            HubEreignis::Getrennt { .. } => self.connected_clients.dec(),
            HubEreignis::Weitergeleitet {
                modus,
                empfaenger,
                richtung,
                codec_dauer_ms,
                ..
            } => {
                self.relays_total
                    .with_label_values(&[modus.als_str()])
                    .inc();
                self.deliveries_total.inc_by(*empfaenger as u64);
                self.codec_duration_seconds
                    .with_label_values(&[richtung.as_str()])
                    .observe(*codec_dauer_ms as f64 / 1000.0);
            }
            HubEreignis::CodecFehler { richtung, .. } => {
                self.codec_errors_total
                    .with_label_values(&[richtung.as_str()])
                    .inc();
            }
        }
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: VoxRelayMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(
    axum::extract::State(metriken): axum::extract::State<VoxRelayMetrics>,
) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
