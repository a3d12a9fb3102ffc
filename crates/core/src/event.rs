//! Hoerer-Ereignisse und Fehler-Benachrichtigungen
//!
//! Ein Hoerer (Client mit Playback-Pipeline) meldet Zustandswechsel und
//! Fehler ueber einen Ereignis-Kanal. Das Relay selbst hat keine UI und
//! protokolliert nur.

use serde::{Deserialize, Serialize};

/// Fehlerklasse einer Benachrichtigung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FehlerKlasse {
    /// Verbindungsaufbau, Abbruch oder Senden an einen toten Peer
    Transport,
    /// Frame nicht dekodierbar (leer, ungueltig)
    Dekodierung,
    /// Audio-Ausgabe nicht verfuegbar
    Ressource,
}

/// Benachrichtigung ueber einen Fehler auf der Hoerer-Seite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Benachrichtigung {
    pub klasse: FehlerKlasse,
    pub nachricht: String,
}

impl Benachrichtigung {
    pub fn neu(klasse: FehlerKlasse, nachricht: impl Into<String>) -> Self {
        Self {
            klasse,
            nachricht: nachricht.into(),
        }
    }

    pub fn transport(nachricht: impl Into<String>) -> Self {
        Self::neu(FehlerKlasse::Transport, nachricht)
    }

    pub fn dekodierung(nachricht: impl Into<String>) -> Self {
        Self::neu(FehlerKlasse::Dekodierung, nachricht)
    }

    pub fn ressource(nachricht: impl Into<String>) -> Self {
        Self::neu(FehlerKlasse::Ressource, nachricht)
    }
}

impl std::fmt::Display for Benachrichtigung {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.klasse, self.nachricht)
    }
}

/// Alle Ereignisse die ein Hoerer nach aussen meldet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoererEreignis {
    /// Transport zum Relay steht
    Verbunden,
    /// Transport zum Relay wurde geschlossen
    Getrennt,
    /// Erster Puffer nach einer Pause wird abgespielt
    WiedergabeGestartet,
    /// Der zuletzt geplante Puffer ist zu Ende gespielt
    WiedergabeBeendet,
    /// Fehler mit Klasse und Nachricht
    Fehler(Benachrichtigung),
}
