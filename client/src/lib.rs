//! earshot-listener – Hoerer-Client fuer das Earshot-Relay
//!
//! Verbindet sich per WebSocket mit dem Relay (`?callSid=<id>`), reicht
//! jeden empfangenen Frame an die Playback-Pipeline weiter und bietet
//! Lautstaerke, Pause und einen Status-Schnappschuss.

pub mod config;
pub mod connection;
pub mod error;

pub use config::{HoererKonfig, STANDARD_RELAY_URL};
pub use connection::{HoererClient, HoererStatus};
pub use error::{HoererFehler, HoererResult};
