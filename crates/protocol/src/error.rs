//! Fehlertypen fuer das Parsen von Produzenten-Nachrichten

use thiserror::Error;

/// Fehler beim Parsen eines Produzenten-Umschlags
///
/// Jeder dieser Fehler betrifft genau einen Frame. Der Frame wird verworfen,
/// die Verbindung bleibt bestehen.
#[derive(Debug, Error)]
pub enum ProtokollFehler {
    /// Kein gueltiges JSON
    #[error("Ungueltiges JSON: {0}")]
    UngueltigesJson(#[from] serde_json::Error),

    /// JSON-Objekt ohne `event`-Feld
    #[error("Umschlag ohne 'event'-Feld")]
    FehlendesEreignis,

    /// `media`-Ereignis ohne `media.payload`
    #[error("Media-Ereignis ohne Nutzlast")]
    FehlendeNutzlast,

    /// Nutzlast ist kein gueltiges base64
    #[error("Ungueltiges base64 in der Nutzlast: {0}")]
    UngueltigesBase64(#[from] base64::DecodeError),

    /// Nutzlast dekodiert zu null Bytes
    #[error("Leere Nutzlast")]
    LeereNutzlast,
}

impl ProtokollFehler {
    /// Kurzname fuer Metrik-Labels
    pub fn art(&self) -> &'static str {
        match self {
            Self::UngueltigesJson(_) => "json",
            Self::FehlendesEreignis => "ereignis",
            Self::FehlendeNutzlast => "nutzlast",
            Self::UngueltigesBase64(_) => "base64",
            Self::LeereNutzlast => "leer",
        }
    }
}
