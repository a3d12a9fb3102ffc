//! Gemeinsame Identifikationstypen fuer Earshot
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EarshotError, Result};

/// Call-ID eines Telefonats (extern vergeben, z.B. `CA123...`)
///
/// Der Inhalt ist ein opaker Schluessel. Geprueft wird nur, dass er nicht
/// leer ist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CallId(String);

impl CallId {
    /// Erstellt eine CallId, leere Werte werden abgelehnt
    pub fn neu(wert: impl Into<String>) -> Result<Self> {
        let wert = wert.into();
        if wert.trim().is_empty() {
            return Err(EarshotError::UngueltigeCallId);
        }
        Ok(Self(wert))
    }

    /// Gibt den Schluessel als &str zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CallId {
    type Error = EarshotError;

    fn try_from(wert: String) -> std::result::Result<Self, Self::Error> {
        Self::neu(wert)
    }
}

impl From<CallId> for String {
    fn from(id: CallId) -> Self {
        id.0
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Eindeutige ID einer Relay-Verbindung (vom Relay vergeben)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerbindungsId(pub Uuid);

impl VerbindungsId {
    /// Erstellt eine neue zufaellige VerbindungsId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for VerbindungsId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VerbindungsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "verbindung:{}", self.0)
    }
}

/// Rolle einer Verbindung innerhalb einer Call-Sitzung
///
/// Wird einmalig beim Verbindungsaufbau bestimmt und aendert sich danach
/// nicht mehr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rolle {
    /// Liefert den Audio-Stream des Telefonats
    Produzent,
    /// Empfaengt den weitergeleiteten Audio-Stream
    Hoerer,
}

impl Rolle {
    /// Kurzname fuer Logs und Metrik-Labels
    pub fn als_str(&self) -> &'static str {
        match self {
            Rolle::Produzent => "produzent",
            Rolle::Hoerer => "hoerer",
        }
    }
}

impl std::fmt::Display for Rolle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}
