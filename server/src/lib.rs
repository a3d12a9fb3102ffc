//! earshot-server – Bibliotheks-Root
//!
//! Verdrahtet Konfiguration, Metriken, Registry und Relay und stellt den
//! Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use anyhow::Result;
use config::ServerConfig;
use earshot_observability::EarshotMetriken;
use earshot_relay::{RelayDispatcher, RelayServer, RollenKlassifizierer, SessionRegistry};
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Baut das Relay aus der Konfiguration, ohne einen Socket zu oeffnen
    pub fn relay_bauen(&self) -> Result<RelayServer> {
        let metriken = EarshotMetriken::neu()?;
        let registry = SessionRegistry::neu(self.config.relay.hoerer_queue);
        let klassifizierer = RollenKlassifizierer::neu(self.config.relay.produzent_signatur.clone());
        let dispatcher = RelayDispatcher::neu(registry, klassifizierer, metriken);
        Ok(RelayServer::neu(dispatcher, self.config.relay_optionen()))
    }

    /// Startet das Relay und laeuft bis zum Shutdown-Signal (Ctrl-C)
    pub async fn starten(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown-Signal empfangen, Server wird beendet"),
                Err(e) => tracing::error!(fehler = %e, "Ctrl-C-Handler fehlgeschlagen"),
            }
            let _ = shutdown_tx.send(true);
        });

        self.starten_mit_signal(shutdown_rx).await
    }

    /// Wie [`Server::starten`], aber mit einem externen Shutdown-Signal
    pub async fn starten_mit_signal(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let adresse = self.config.bind_adresse();
        let listener = TcpListener::bind(&adresse)
            .await
            .map_err(|e| anyhow::anyhow!("Bind auf '{adresse}' fehlgeschlagen: {e}"))?;
        self.auf_listener_starten(listener, shutdown).await
    }

    /// Bedient einen bereits gebundenen Listener
    pub async fn auf_listener_starten(
        self,
        listener: TcpListener,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        tracing::info!(
            adresse = %listener.local_addr()?,
            produzent_signatur = %self.config.relay.produzent_signatur,
            hoerer_queue = self.config.relay.hoerer_queue,
            oeffentliche_url = self.config.relay.oeffentliche_url.as_deref().unwrap_or("-"),
            metriken = self.config.observability.metriken,
            "Server startet"
        );

        let relay = self.relay_bauen()?;
        relay.starten(listener, shutdown).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn router(config: ServerConfig) -> axum::Router {
        let (_tx, rx) = watch::channel(false);
        Server::neu(config).relay_bauen().unwrap().router(rx)
    }

    #[tokio::test]
    async fn health_ist_erreichbar() {
        let antwort = router(ServerConfig::default())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(antwort.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metriken_abschaltbar() {
        let mut config = ServerConfig::default();
        config.observability.metriken = false;
        let antwort = router(config)
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(antwort.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn startet_und_beendet_sich_auf_signal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = watch::channel(false);
        let server = Server::neu(ServerConfig::default());
        let handle = tokio::spawn(server.auf_listener_starten(listener, rx));

        tx.send(true).unwrap();
        let ergebnis = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("Server sollte sich beenden")
            .unwrap();
        assert!(ergebnis.is_ok());
    }
}
