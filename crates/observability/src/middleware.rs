//! Request-Tracing fuer den HTTP-Teil des Relays
//!
//! WebSocket-Upgrades laufen ebenfalls durch diesen Layer; protokolliert
//! wird dabei nur der Handshake, nicht die Lebensdauer der Verbindung.

use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Erstellt den Axum-Layer fuer Request-Tracing.
///
/// Jede Anfrage bekommt einen Span mit Methode und URI, die Antwort wird mit
/// Status und Dauer auf Level INFO geloggt.
pub fn request_timing_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO))
}
