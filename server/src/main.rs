//! Earshot Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet das Relay.

use anyhow::Result;
use earshot_observability::logging_initialisieren;
use earshot_server::{config::ServerConfig, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("EARSHOT_CONFIG").unwrap_or_else(|_| "earshot.toml".into());

    let (config, quelle) = ServerConfig::laden(&config_pfad)?;

    // Logging zuerst, sonst gehen die Warnungen aus laden/pruefen verloren
    logging_initialisieren(&config.logging.level, &config.logging.format);
    quelle.protokollieren();
    config.pruefen()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Earshot Server wird initialisiert"
    );

    Server::neu(config).starten().await?;

    Ok(())
}
