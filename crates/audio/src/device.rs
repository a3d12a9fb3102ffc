//! Ausgabegeraete auflisten und auswaehlen

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;
use tracing::{debug, warn};

use crate::error::{AudioError, AudioResult};

/// Gaengige Raten die beim Auflisten geprueft werden
const GEPRUEFTE_RATEN: [u32; 5] = [8000, 16000, 22050, 44100, 48000];

/// Ein Ausgabegeraet mit seinen Eigenschaften
#[derive(Debug, Clone)]
pub struct AudioGeraet {
    pub name: String,
    /// Unterstuetzte Abtastraten (aus [`GEPRUEFTE_RATEN`])
    pub abtastraten: Vec<u32>,
    /// Maximale Kanalanzahl
    pub kanaele: u16,
    /// Standard-Abtastrate des Geraets
    pub standard_rate: Option<u32>,
}

/// Listet alle Ausgabegeraete des Standard-Hosts auf
pub fn ausgabegeraete_auflisten() -> AudioResult<Vec<AudioGeraet>> {
    let host = cpal::default_host();
    let geraete = host
        .output_devices()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    let mut ergebnis = Vec::new();
    for geraet in geraete {
        match geraet_beschreiben(&geraet) {
            Ok(g) => ergebnis.push(g),
            Err(e) => warn!("Ausgabegeraet konnte nicht gelesen werden: {}", e),
        }
    }
    debug!("Gefundene Ausgabegeraete: {}", ergebnis.len());
    Ok(ergebnis)
}

/// Laedt ein Ausgabegeraet; `None` waehlt das Standardgeraet
///
/// Der Name wird als Teilstring verglichen.
pub fn ausgabegeraet_laden(name: Option<&str>) -> AudioResult<Device> {
    let host = cpal::default_host();
    let Some(gesucht) = name else {
        return host
            .default_output_device()
            .ok_or(AudioError::KeinStandardAusgabegeraet);
    };

    let geraete = host
        .output_devices()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;
    geraete
        .into_iter()
        .find(|g| g.name().is_ok_and(|n| n.contains(gesucht)))
        .ok_or_else(|| AudioError::GeraetNichtGefunden(gesucht.to_string()))
}

fn geraet_beschreiben(geraet: &Device) -> AudioResult<AudioGeraet> {
    let name = geraet
        .name()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    let mut abtastraten = Vec::new();
    let mut kanaele = 1u16;
    if let Ok(configs) = geraet.supported_output_configs() {
        for cfg in configs {
            let min = cfg.min_sample_rate().0;
            let max = cfg.max_sample_rate().0;
            for rate in GEPRUEFTE_RATEN {
                if rate >= min && rate <= max && !abtastraten.contains(&rate) {
                    abtastraten.push(rate);
                }
            }
            kanaele = kanaele.max(cfg.channels());
        }
    }
    abtastraten.sort_unstable();

    let standard_rate = geraet
        .default_output_config()
        .ok()
        .map(|c| c.sample_rate().0);

    Ok(AudioGeraet {
        name,
        abtastraten,
        kanaele,
        standard_rate,
    })
}
