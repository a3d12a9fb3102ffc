//! Produzenten-Umschlag (Media-Stream JSON)
//!
//! Die Telefonie-Strecke sendet eine Folge von Textnachrichten:
//!
//! ```text
//! {"event":"connected","protocol":"Call","version":"1.0.0"}
//! {"event":"start","streamSid":"MZ..","start":{"callSid":"CA..","mediaFormat":{..}}}
//! {"event":"media","streamSid":"MZ..","media":{"track":"inbound","payload":"<base64>"}}
//! {"event":"stop","streamSid":"MZ.."}
//! ```
//!
//! Nur `media` traegt Audio. Alle anderen Ereignisse werden geparst, damit
//! das Relay sie protokollieren oder eine Verbindung ueber `start.callSid`
//! binden kann.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ProtokollFehler;

/// Encoding-Bezeichnung der einzigen unterstuetzten Telefonie-Kodierung
pub const MULAW_ENCODING: &str = "audio/x-mulaw";

// ---------------------------------------------------------------------------
// Roh-Strukturen (Serde)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RohUmschlag {
    event: Option<String>,
    #[serde(rename = "streamSid")]
    stream_sid: Option<String>,
    media: Option<RohMedia>,
    start: Option<RohStart>,
}

#[derive(Debug, Deserialize)]
struct RohMedia {
    payload: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RohStart {
    #[serde(rename = "callSid")]
    call_sid: Option<String>,
    #[serde(rename = "streamSid")]
    stream_sid: Option<String>,
    #[serde(rename = "mediaFormat")]
    media_format: Option<MedienFormat>,
}

// ---------------------------------------------------------------------------
// Oeffentliche Typen
// ---------------------------------------------------------------------------

/// Vom Produzenten angekuendigtes Audio-Format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedienFormat {
    pub encoding: String,
    #[serde(rename = "sampleRate")]
    pub sample_rate: u32,
    pub channels: u16,
}

impl MedienFormat {
    /// Prueft ob das Format der festen Telefonie-Kodierung entspricht
    pub fn ist_mulaw_8k_mono(&self) -> bool {
        self.encoding == MULAW_ENCODING && self.sample_rate == 8000 && self.channels == 1
    }
}

/// Inhalt eines `start`-Ereignisses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartInfo {
    pub call_sid: Option<String>,
    pub stream_sid: Option<String>,
    pub format: Option<MedienFormat>,
}

/// Eine geparste Produzenten-Nachricht
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProduzentNachricht {
    /// `connected` – Stream geoeffnet, noch keine Metadaten
    Verbunden,
    /// `start` – Metadaten des Streams
    Start(StartInfo),
    /// `media` – ein Audio-Frame (bereits base64-dekodiert)
    Media(Bytes),
    /// `stop` – Produzent beendet den Stream
    Stop,
    /// Jedes andere Ereignis (`mark`, `dtmf`, ...)
    Sonstiges(String),
}

/// Parst eine Textnachricht des Produzenten
///
/// Fehler betreffen immer nur diese eine Nachricht.
pub fn nachricht_parsen(text: &str) -> Result<ProduzentNachricht, ProtokollFehler> {
    let umschlag: RohUmschlag = serde_json::from_str(text)?;
    let ereignis = umschlag.event.ok_or(ProtokollFehler::FehlendesEreignis)?;

    match ereignis.as_str() {
        "media" => {
            let payload = umschlag
                .media
                .and_then(|m| m.payload)
                .ok_or(ProtokollFehler::FehlendeNutzlast)?;
            let bytes = STANDARD.decode(payload.trim())?;
            if bytes.is_empty() {
                return Err(ProtokollFehler::LeereNutzlast);
            }
            Ok(ProduzentNachricht::Media(Bytes::from(bytes)))
        }
        "start" => {
            let start = umschlag.start;
            let stream_sid = start
                .as_ref()
                .and_then(|s| s.stream_sid.clone())
                .or(umschlag.stream_sid);
            Ok(ProduzentNachricht::Start(StartInfo {
                call_sid: start
                    .as_ref()
                    .and_then(|s| s.call_sid.clone())
                    .filter(|sid| !sid.trim().is_empty()),
                stream_sid,
                format: start.and_then(|s| s.media_format),
            }))
        }
        "connected" => Ok(ProduzentNachricht::Verbunden),
        "stop" => Ok(ProduzentNachricht::Stop),
        _ => Ok(ProduzentNachricht::Sonstiges(ereignis)),
    }
}

/// Baut eine `media`-Nachricht wie sie die Telefonie-Strecke sendet
///
/// Gegenstueck zu [`nachricht_parsen`], gedacht fuer Simulatoren und Tests.
pub fn medien_nachricht(stream_sid: &str, payload: &[u8]) -> String {
    serde_json::json!({
        "event": "media",
        "streamSid": stream_sid,
        "media": {
            "track": "inbound",
            "payload": STANDARD.encode(payload),
        },
    })
    .to_string()
}

/// Baut eine `start`-Nachricht mit Call-ID und mu-law-Format
pub fn start_nachricht(call_sid: &str, stream_sid: &str) -> String {
    serde_json::json!({
        "event": "start",
        "streamSid": stream_sid,
        "start": {
            "callSid": call_sid,
            "streamSid": stream_sid,
            "mediaFormat": {
                "encoding": MULAW_ENCODING,
                "sampleRate": 8000,
                "channels": 1,
            },
        },
    })
    .to_string()
}
