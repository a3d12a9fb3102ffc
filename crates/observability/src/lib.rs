//! # earshot-observability
//!
//! Observability-Crate fuer Earshot:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check und Status-Antwort (`/health`, `/status`)
//! - Structured Logging via tracing-subscriber
//! - Request-Tracing fuer den HTTP-Teil des Relays

pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;

pub use health::{health_router, HealthState, HealthStatus, StatusAntwort};
pub use logging::logging_initialisieren;
pub use metrics::{metrics_router, EarshotMetriken};
pub use middleware::request_timing_layer;
