//! Health-Check-Endpunkt fuer Earshot
//!
//! - `GET /health` antwortet immer mit `200` und festem Text (Liveness-Probe)
//! - [`StatusAntwort`] ist der JSON-Koerper fuer `GET /status`; die Zahlen
//!   liefert das Relay aus seiner Registry

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Fester Antworttext von `/health`
pub const HEALTH_TEXT: &str = "Earshot relay is running";

/// Gesamtstatus in [`StatusAntwort`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Dienst faehrt herunter, nimmt keine neuen Verbindungen mehr an
    Stopping,
}

/// Antwort des Status-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusAntwort {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub sitzungen: usize,
    pub produzenten: usize,
    pub hoerer: usize,
}

/// Startzeitpunkt des Dienstes, geteilt zwischen Handlern
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Arc<Instant>,
}

impl HealthState {
    pub fn neu() -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::neu()
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router() -> Router {
    Router::new().route("/health", get(health_handler))
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, HEALTH_TEXT)
}
