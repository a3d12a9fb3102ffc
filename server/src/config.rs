//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! Standardwerte, der Server laeuft also auch ohne Konfigurationsdatei.

use earshot_relay::RelayOptionen;
use serde::{Deserialize, Serialize};

/// Umgebungsvariable die den Port ueberschreibt
pub const ENV_PORT: &str = "PORT";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub netzwerk: NetzwerkEinstellungen,
    pub relay: RelayEinstellungen,
    pub cors: CorsEinstellungen,
    pub logging: LoggingEinstellungen,
    pub observability: ObservabilityEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    pub bind_adresse: String,
    /// Port fuer HTTP und WebSocket
    pub port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 3001,
        }
    }
}

/// Relay-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayEinstellungen {
    /// Teilstring im User-Agent der eine Verbindung als Produzent markiert
    pub produzent_signatur: String,
    /// Frames die pro Hoerer gepuffert werden bevor er getrennt wird
    pub hoerer_queue: usize,
    /// Von aussen erreichbare Adresse des Relays (fuer Call-Steuerung)
    pub oeffentliche_url: Option<String>,
}

impl Default for RelayEinstellungen {
    fn default() -> Self {
        Self {
            produzent_signatur: "Twilio".into(),
            hoerer_queue: 256,
            oeffentliche_url: None,
        }
    }
}

/// CORS-Einstellungen
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsEinstellungen {
    /// Erlaubte Origins (leer = alle erlaubt)
    pub origins: Vec<String>,
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// `/metrics` ausliefern
    pub metriken: bool,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self { metriken: true }
    }
}

/// Woher die geladene Konfiguration stammt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KonfigQuelle {
    Datei(String),
    /// Datei fehlt, Standardwerte aktiv
    Standardwerte(String),
}

impl KonfigQuelle {
    /// Meldet die Quelle; erst nach der Logging-Initialisierung aufrufen
    pub fn protokollieren(&self) {
        match self {
            Self::Datei(pfad) => tracing::info!(pfad = %pfad, "Konfiguration geladen"),
            Self::Standardwerte(pfad) => tracing::warn!(
                pfad = %pfad,
                "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
            ),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Fehlt die Datei, gelten die Standardwerte. Danach wird `PORT` aus der
    /// Umgebung angewendet. Protokolliert nichts, da das Logging erst mit
    /// dieser Konfiguration initialisiert wird.
    pub fn laden(pfad: &str) -> anyhow::Result<(Self, KonfigQuelle)> {
        let (mut config, quelle) = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => (
                Self::aus_toml(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
                KonfigQuelle::Datei(pfad.to_string()),
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (Self::default(), KonfigQuelle::Standardwerte(pfad.to_string()))
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };

        if let Ok(port) = std::env::var(ENV_PORT) {
            config.port_ueberschreiben(&port)?;
        }
        Ok((config, quelle))
    }

    pub fn aus_toml(inhalt: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(inhalt)
    }

    /// Setzt den Port aus einem String (z.B. der `PORT`-Variable)
    pub fn port_ueberschreiben(&mut self, wert: &str) -> anyhow::Result<()> {
        let port: u16 = wert
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Ungueltiger Port '{wert}' in {ENV_PORT}: {e}"))?;
        self.netzwerk.port = port;
        Ok(())
    }

    /// Prueft Werte die serde allein nicht abfangen kann
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if self.relay.hoerer_queue == 0 {
            anyhow::bail!("relay.hoerer_queue muss groesser als 0 sein");
        }
        if self.relay.produzent_signatur.is_empty() {
            tracing::warn!("relay.produzent_signatur ist leer, jede Verbindung wird Hoerer");
        }
        if !earshot_observability::logging::log_format_gueltig(&self.logging.format) {
            tracing::warn!(
                format = %self.logging.format,
                "Unbekanntes Log-Format, verwende text"
            );
        }
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    /// Optionen fuer den HTTP-Teil des Relays
    pub fn relay_optionen(&self) -> RelayOptionen {
        RelayOptionen {
            cors_origins: self.cors.origins.clone(),
            metriken_aktiv: self.observability.metriken,
        }
    }
}
