//! earshot-core – Gemeinsame Typen, Ereignisse und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die Relay, Hoerer-Client und
//! Audio-Pipeline gemeinsam nutzen: Call- und Verbindungs-IDs, die
//! Verbindungsrolle sowie die Ereignisse und Benachrichtigungen, die ein
//! Hoerer nach aussen meldet.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{EarshotError, Result};
pub use event::{Benachrichtigung, FehlerKlasse, HoererEreignis};
pub use types::{CallId, Rolle, VerbindungsId};
