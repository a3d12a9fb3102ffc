//! earshot-relay – WebSocket-Relay fuer Telefonie-Audio
//!
//! Ein Produzent (die Telefonie-Strecke) sendet pro Call einen Strom von
//! JSON-Umschlaegen mit base64-kodiertem Audio. Das Relay extrahiert die
//! Nutzlast und verteilt sie als Binaernachricht an alle Hoerer desselben
//! Calls.
//!
//! ## Architektur
//! ```text
//! RelayServer (axum)
//!   +-- ws_handler         -> Rolle bestimmen, registrieren, Upgrade
//!   +-- RelayDispatcher    -> Umschlag parsen, Metriken, Logs
//!   |     +-- SessionRegistry (ein Mutex, CallId -> CallSitzung)
//!   +-- connection         -> ein Task pro WebSocket
//! ```

pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod klassifizierung;
pub mod registry;
pub mod server;

pub use dispatcher::{ProduzentKontext, Registrierung, RelayDispatcher, Zugang};
pub use error::{RelayError, RelayResult};
pub use klassifizierung::RollenKlassifizierer;
pub use registry::{
    Anmeldung, HoererAnmeldung, RegistryStatistik, SessionRegistry, Verbindung, VerteilErgebnis,
};
pub use server::{RelayOptionen, RelayServer};
