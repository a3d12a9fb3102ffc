//! Fehlertypen fuer das Relay

use earshot_core::types::CallId;
use thiserror::Error;

/// Result-Alias fuer Relay-Operationen
pub type RelayResult<T> = std::result::Result<T, RelayError>;

/// Fehler im Relay
#[derive(Debug, Error)]
pub enum RelayError {
    /// Fuer den Call ist bereits ein Produzent registriert
    #[error("Call {0} hat bereits einen Produzenten")]
    ProduzentBereitsVerbunden(CallId),

    /// Verbindungsparameter `callSid` fehlt oder ist leer
    #[error("Parameter 'callSid' fehlt")]
    FehlendeCallId,

    /// Bind oder Accept des Listener-Sockets fehlgeschlagen
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl RelayError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}
