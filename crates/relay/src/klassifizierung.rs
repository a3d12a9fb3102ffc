//! Rollen-Klassifizierung anhand des User-Agent-Headers

use earshot_core::types::Rolle;

/// Standard-Signatur der Telefonie-Strecke im User-Agent
pub const STANDARD_SIGNATUR: &str = "Twilio";

/// Bestimmt beim Verbindungsaufbau ob eine Verbindung Produzent oder Hoerer ist
///
/// Alles was nicht eindeutig als Produzent erkannt wird, ist Hoerer. Eine
/// unbekannte Gegenstelle darf nie Audio einspeisen.
#[derive(Debug, Clone)]
pub struct RollenKlassifizierer {
    signatur: String,
}

impl RollenKlassifizierer {
    pub fn neu(signatur: impl Into<String>) -> Self {
        Self {
            signatur: signatur.into(),
        }
    }

    pub fn klassifizieren(&self, user_agent: Option<&str>) -> Rolle {
        match user_agent {
            Some(ua) if !self.signatur.is_empty() && ua.contains(&self.signatur) => {
                Rolle::Produzent
            }
            _ => Rolle::Hoerer,
        }
    }
}

impl Default for RollenKlassifizierer {
    fn default() -> Self {
        Self::neu(STANDARD_SIGNATUR)
    }
}
