//! Fehlertypen des Hoerer-Clients

use earshot_audio::AudioError;
use earshot_core::EarshotError;
use thiserror::Error;

pub type HoererResult<T> = std::result::Result<T, HoererFehler>;

#[derive(Debug, Error)]
pub enum HoererFehler {
    #[error("Ungueltige Relay-URL: {0}")]
    UngueltigeUrl(#[from] url::ParseError),

    #[error("Relay-URL muss ws:// oder wss:// verwenden, war '{0}'")]
    FalschesSchema(String),

    #[error(transparent)]
    Eingabe(#[from] EarshotError),

    #[error("Verbindung zum Relay fehlgeschlagen: {0}")]
    Verbindung(String),

    /// Relay hat den Upgrade mit diesem HTTP-Status abgelehnt
    #[error("Relay hat die Verbindung abgelehnt (HTTP {0})")]
    Abgelehnt(u16),

    #[error("Audio-Fehler: {0}")]
    Audio(#[from] AudioError),

    #[error("Client wurde bereits deaktiviert")]
    Deaktiviert,

    /// Blockierender Pipeline-Aufruf ist abgebrochen oder in Panik geraten
    #[error("Hintergrundaufgabe abgebrochen: {0}")]
    Aufgabe(#[from] tokio::task::JoinError),
}

impl From<tokio_tungstenite::tungstenite::Error> for HoererFehler {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error;
        match e {
            Error::Http(antwort) => Self::Abgelehnt(antwort.status().as_u16()),
            andere => Self::Verbindung(andere.to_string()),
        }
    }
}
