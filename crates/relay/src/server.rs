//! Axum-Server des Relays
//!
//! Ein Listener-Socket fuer alles:
//! - `GET /` (WebSocket-Upgrade) – Relay-Endpunkt, Query `callSid`
//! - `GET /health` – Liveness
//! - `GET /status` – Registry-Uebersicht als JSON
//! - `GET /metrics` – Prometheus (abschaltbar)

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use earshot_core::types::{CallId, Rolle};
use earshot_observability::{
    health_router, metrics_router, request_timing_layer, HealthState, HealthStatus, StatusAntwort,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

use crate::connection::{hoerer_verbindung, produzent_verbindung};
use crate::dispatcher::{ProduzentKontext, RelayDispatcher, Zugang};
use crate::error::{RelayError, RelayResult};

/// Optionen fuer den HTTP-Teil des Relays
#[derive(Debug, Clone)]
pub struct RelayOptionen {
    /// Erlaubte CORS-Origins. Leer = alle Origins, ohne Credentials.
    pub cors_origins: Vec<String>,
    /// `/metrics` ausliefern
    pub metriken_aktiv: bool,
}

impl Default for RelayOptionen {
    fn default() -> Self {
        Self {
            cors_origins: vec![],
            metriken_aktiv: true,
        }
    }
}

#[derive(Clone)]
struct RelayZustand {
    dispatcher: RelayDispatcher,
    health: HealthState,
    shutdown: watch::Receiver<bool>,
}

#[derive(Debug, Deserialize)]
struct RelayQuery {
    #[serde(rename = "callSid")]
    call_sid: Option<String>,
}

/// HTTP/WebSocket-Server des Relays
pub struct RelayServer {
    dispatcher: RelayDispatcher,
    optionen: RelayOptionen,
    health: HealthState,
}

impl RelayServer {
    pub fn neu(dispatcher: RelayDispatcher, optionen: RelayOptionen) -> Self {
        Self {
            dispatcher,
            optionen,
            health: HealthState::neu(),
        }
    }

    pub fn dispatcher(&self) -> &RelayDispatcher {
        &self.dispatcher
    }

    /// Baut den vollstaendigen Router inklusive CORS und Request-Tracing
    pub fn router(&self, shutdown: watch::Receiver<bool>) -> Router {
        let zustand = RelayZustand {
            dispatcher: self.dispatcher.clone(),
            health: self.health.clone(),
            shutdown,
        };

        let mut app = Router::new()
            .route("/", get(ws_handler))
            .route("/status", get(status_handler))
            .with_state(zustand)
            .merge(health_router());

        if self.optionen.metriken_aktiv {
            app = app.merge(metrics_router(self.dispatcher.metriken().clone()));
        }

        app.layer(request_timing_layer())
            .layer(cors_layer(&self.optionen.cors_origins))
    }

    /// Bedient `listener` bis `shutdown` auf `true` wechselt
    pub async fn starten(
        self,
        listener: TcpListener,
        shutdown: watch::Receiver<bool>,
    ) -> RelayResult<()> {
        let app = self.router(shutdown.clone());
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Earshot-Relay gestartet");

        let mut signal = shutdown;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = signal.wait_for(|beenden| *beenden).await;
            })
            .await?;

        tracing::info!("Earshot-Relay beendet");
        Ok(())
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST]);
    }

    let erlaubt: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(wert) => Some(wert),
            Err(_) => {
                tracing::warn!(origin = %o, "Ungueltiger CORS-Origin ignoriert");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(erlaubt)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// `GET /` – Rolle bestimmen, registrieren, dann Upgrade
///
/// Die Registrierung passiert vor dem Upgrade, damit Ablehnungen noch als
/// HTTP-Status beim Client ankommen.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<RelayQuery>,
    headers: HeaderMap,
    State(zustand): State<RelayZustand>,
) -> Response {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok());
    let rolle = zustand.dispatcher.rolle_bestimmen(user_agent);
    let call_id = query.call_sid.and_then(|sid| CallId::neu(sid).ok());

    let dispatcher = zustand.dispatcher.clone();
    let shutdown = zustand.shutdown.clone();

    let Some(call_id) = call_id else {
        return match rolle {
            Rolle::Produzent => {
                tracing::info!("Produzent ohne callSid, Bindung ueber 'start'-Ereignis");
                ws.on_upgrade(move |socket| {
                    produzent_verbindung(socket, dispatcher, ProduzentKontext::ungebunden(), shutdown)
                })
            }
            Rolle::Hoerer => {
                tracing::debug!("Hoerer ohne callSid abgelehnt");
                (StatusCode::BAD_REQUEST, RelayError::FehlendeCallId.to_string()).into_response()
            }
        };
    };

    match zustand.dispatcher.annehmen(call_id, rolle) {
        Ok(Zugang::Hoerer {
            registrierung,
            empfaenger,
        }) => ws.on_upgrade(move |socket| {
            hoerer_verbindung(socket, registrierung, empfaenger, shutdown)
        }),
        Ok(Zugang::Produzent(registrierung)) => ws.on_upgrade(move |socket| {
            produzent_verbindung(
                socket,
                dispatcher,
                ProduzentKontext::gebunden(registrierung),
                shutdown,
            )
        }),
        Err(e @ RelayError::ProduzentBereitsVerbunden(_)) => {
            (StatusCode::CONFLICT, e.to_string()).into_response()
        }
        Err(e) => {
            tracing::error!(fehler = %e, "Verbindungsannahme fehlgeschlagen");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `GET /status` – Uebersicht ueber Sitzungen und Verbindungen
async fn status_handler(State(zustand): State<RelayZustand>) -> Json<StatusAntwort> {
    let statistik = zustand.dispatcher.registry().statistik();
    let status = if *zustand.shutdown.borrow() {
        HealthStatus::Stopping
    } else {
        HealthStatus::Healthy
    };

    Json(StatusAntwort {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: zustand.health.uptime_seconds(),
        sitzungen: statistik.sitzungen,
        produzenten: statistik.produzenten,
        hoerer: statistik.hoerer,
    })
}
