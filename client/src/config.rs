//! Konfiguration eines Hoerers

use earshot_audio::ResampleMethode;
use earshot_core::CallId;
use url::Url;

use crate::error::{HoererFehler, HoererResult};

/// Standard-Adresse eines lokal laufenden Relays
pub const STANDARD_RELAY_URL: &str = "ws://127.0.0.1:3001";

#[derive(Debug, Clone)]
pub struct HoererKonfig {
    /// Basis-URL des Relays, z.B. `ws://127.0.0.1:3001`
    pub relay_url: String,
    pub call_id: CallId,
    pub resampling: ResampleMethode,
    /// Anfangs-Lautstaerke in [0.0, 1.0]
    pub lautstaerke: f32,
    /// Null-Senke statt Audio-Geraet
    pub ohne_geraet: bool,
    /// Teilstring des Geraetenamens; `None` = Standardgeraet
    pub geraet: Option<String>,
}

impl HoererKonfig {
    pub fn neu(relay_url: impl Into<String>, call_id: CallId) -> Self {
        Self {
            relay_url: relay_url.into(),
            call_id,
            resampling: ResampleMethode::default(),
            lautstaerke: 1.0,
            ohne_geraet: false,
            geraet: None,
        }
    }

    /// Baut `<relay_url>?callSid=<id>`; die Call-ID wird percent-kodiert
    pub fn verbindungs_url(&self) -> HoererResult<Url> {
        let mut url = Url::parse(&self.relay_url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(HoererFehler::FalschesSchema(url.scheme().to_string()));
        }
        url.query_pairs_mut()
            .clear()
            .append_pair("callSid", self.call_id.as_str());
        Ok(url)
    }
}
