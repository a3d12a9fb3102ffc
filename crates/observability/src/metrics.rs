//! Prometheus-kompatible Metriken fuer Earshot
//!
//! Registrierte Metriken:
//! - `earshot_sessions_active` – Gauge: Aktive Call-Sitzungen
//! - `earshot_connections_active{rolle}` – Gauge: Offene Verbindungen je Rolle
//! - `earshot_frames_received_total` – Counter: Empfangene Produzenten-Frames
//! - `earshot_frames_delivered_total` – Counter: Zugestellte Hoerer-Frames
//! - `earshot_frames_dropped_total{grund}` – Counter: Verworfene Frames
//! - `earshot_listeners_evicted_total` – Counter: Wegen Sendefehler entfernte Hoerer

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Grund fuer einen verworfenen Frame (Label `grund`)
pub mod grund {
    /// Kein Hoerer fuer die Call-ID registriert
    pub const KEIN_HOERER: &str = "kein_hoerer";
    /// Umschlag nicht parsebar oder Nutzlast ungueltig
    pub const UNGUELTIG: &str = "ungueltig";
    /// Produzent noch an keine Call-ID gebunden
    pub const UNGEBUNDEN: &str = "ungebunden";
}

/// Alle Earshot-Prometheus-Metriken
///
/// Wird einmal pro Relay-Instanz erstellt und explizit weitergereicht.
#[derive(Clone)]
pub struct EarshotMetriken {
    pub registry: Arc<Registry>,

    pub sessions_active: IntGauge,
    pub connections_active: IntGaugeVec,
    pub frames_received_total: IntCounter,
    pub frames_delivered_total: IntCounter,
    pub frames_dropped_total: IntCounterVec,
    pub listeners_evicted_total: IntCounter,
}

impl EarshotMetriken {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let sessions_active = IntGauge::with_opts(Opts::new(
            "earshot_sessions_active",
            "Anzahl aktiver Call-Sitzungen",
        ))?;
        registry.register(Box::new(sessions_active.clone()))?;

        let connections_active = IntGaugeVec::new(
            Opts::new(
                "earshot_connections_active",
                "Anzahl offener Relay-Verbindungen je Rolle",
            ),
            &["rolle"],
        )?;
        registry.register(Box::new(connections_active.clone()))?;

        let frames_received_total = IntCounter::with_opts(Opts::new(
            "earshot_frames_received_total",
            "Gesamtanzahl empfangener Produzenten-Frames",
        ))?;
        registry.register(Box::new(frames_received_total.clone()))?;

        let frames_delivered_total = IntCounter::with_opts(Opts::new(
            "earshot_frames_delivered_total",
            "Gesamtanzahl an Hoerer zugestellter Frames",
        ))?;
        registry.register(Box::new(frames_delivered_total.clone()))?;

        let frames_dropped_total = IntCounterVec::new(
            Opts::new(
                "earshot_frames_dropped_total",
                "Gesamtanzahl verworfener Frames",
            ),
            &["grund"],
        )?;
        registry.register(Box::new(frames_dropped_total.clone()))?;

        let listeners_evicted_total = IntCounter::with_opts(Opts::new(
            "earshot_listeners_evicted_total",
            "Hoerer die wegen fehlgeschlagenem Senden entfernt wurden",
        ))?;
        registry.register(Box::new(listeners_evicted_total.clone()))?;

        // Label-Werte vorbelegen, damit sie ab Start im Export erscheinen
        for rolle in ["produzent", "hoerer"] {
            connections_active.with_label_values(&[rolle]).set(0);
        }
        for g in [grund::KEIN_HOERER, grund::UNGUELTIG, grund::UNGEBUNDEN] {
            frames_dropped_total.with_label_values(&[g]).inc_by(0);
        }

        Ok(Self {
            registry: Arc::new(registry),
            sessions_active,
            connections_active,
            frames_received_total,
            frames_delivered_total,
            frames_dropped_total,
            listeners_evicted_total,
        })
    }

    /// Zaehlt einen verworfenen Frame mit Grund
    pub fn frame_verworfen(&self, grund: &str) {
        self.frames_dropped_total.with_label_values(&[grund]).inc();
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
pub fn metrics_router(metriken: EarshotMetriken) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<EarshotMetriken>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = EarshotMetriken::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn verbindungen_je_rolle() {
        let metriken = EarshotMetriken::neu().unwrap();
        metriken.connections_active.with_label_values(&["hoerer"]).inc();
        metriken.connections_active.with_label_values(&["hoerer"]).inc();
        metriken.connections_active.with_label_values(&["produzent"]).inc();
        assert_eq!(metriken.connections_active.with_label_values(&["hoerer"]).get(), 2);
        assert_eq!(metriken.connections_active.with_label_values(&["produzent"]).get(), 1);
    }

    #[test]
    fn verworfene_frames_mit_grund() {
        let metriken = EarshotMetriken::neu().unwrap();
        metriken.frame_verworfen(grund::KEIN_HOERER);
        metriken.frame_verworfen(grund::KEIN_HOERER);
        metriken.frame_verworfen(grund::UNGUELTIG);
        let wert = |g: &str| metriken.frames_dropped_total.with_label_values(&[g]).get();
        assert_eq!(wert(grund::KEIN_HOERER), 2);
        assert_eq!(wert(grund::UNGUELTIG), 1);
        assert_eq!(wert(grund::UNGEBUNDEN), 0);
    }

    #[test]
    fn metriken_export_prometheus_format() {
        let metriken = EarshotMetriken::neu().unwrap();
        metriken.sessions_active.set(3);
        metriken.frames_received_total.inc();

        let output = metriken.exportieren().unwrap();
        assert!(output.contains("earshot_sessions_active 3"));
        assert!(output.contains("earshot_frames_received_total 1"));
        assert!(output.contains("earshot_frames_dropped_total{grund=\"ungebunden\"} 0"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn alle_metriken_in_registry_registriert() {
        let metriken = EarshotMetriken::neu().unwrap();
        let families = metriken.registry.gather();
        let namen: Vec<&str> = families.iter().map(|f| f.get_name()).collect();

        assert!(namen.contains(&"earshot_sessions_active"));
        assert!(namen.contains(&"earshot_connections_active"));
        assert!(namen.contains(&"earshot_frames_received_total"));
        assert!(namen.contains(&"earshot_frames_delivered_total"));
        assert!(namen.contains(&"earshot_frames_dropped_total"));
        assert!(namen.contains(&"earshot_listeners_evicted_total"));
    }

    #[tokio::test]
    async fn metrics_endpunkt_liefert_text() {
        let metriken = EarshotMetriken::neu().unwrap();
        metriken.frames_delivered_total.inc_by(7);

        let antwort = metrics_router(metriken)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(antwort.status(), StatusCode::OK);

        let body = axum::body::to_bytes(antwort.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("earshot_frames_delivered_total 7"));
    }
}
