//! earshot-protocol – Wire-Formate des Relays
//!
//! ## Produzent -> Relay
//! Textnachrichten, je ein JSON-Objekt im Media-Stream-Format der
//! Telefonie-Strecke. Audio steckt base64-kodiert in `media.payload`
//! wenn `event == "media"`.
//!
//! ## Relay -> Hoerer
//! Rohe Binaernachrichten, eine pro Frame, byte-identisch mit der
//! dekodierten Produzenten-Nutzlast. Es gibt kein zusaetzliches Framing.

pub mod error;
pub mod media;

pub use error::ProtokollFehler;
pub use media::{nachricht_parsen, MedienFormat, ProduzentNachricht, StartInfo};
