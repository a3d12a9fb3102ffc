//! Fehlertypen fuer Earshot
//!
//! Fehler die mehrere Crates gemeinsam betreffen. Die Fach-Crates definieren
//! eigene Fehler und konvertieren via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer Earshot
pub type Result<T> = std::result::Result<T, EarshotError>;

/// Crate-uebergreifende Fehler im Earshot-System
#[derive(Debug, Error)]
pub enum EarshotError {
    #[error("Call-ID darf nicht leer sein")]
    UngueltigeCallId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CallId;

    #[test]
    fn leere_call_id_meldet_fehler() {
        let e = CallId::neu("   ").unwrap_err();
        assert!(matches!(e, EarshotError::UngueltigeCallId));
        assert_eq!(e.to_string(), "Call-ID darf nicht leer sein");
    }
}
