//! Resampling von der Telefonie-Rate auf die Geraete-Rate
//!
//! Ausgabelaenge ist immer `floor(n * nach / von)`. Die Rechnung laeuft
//! ganzzahlig, damit keine Rundungsfehler die Laenge veraendern.

use serde::{Deserialize, Serialize};

/// Verfahren fuer das Resampling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResampleMethode {
    /// Sample `i` kopiert Eingang `floor(i / ratio)`
    #[default]
    NaechsterNachbar,
    /// Lineare Interpolation zwischen den Nachbarn
    Linear,
}

impl std::str::FromStr for ResampleMethode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "naechster-nachbar" | "nearest" => Ok(Self::NaechsterNachbar),
            "linear" => Ok(Self::Linear),
            andere => Err(format!("Unbekannte Resampling-Methode: {andere}")),
        }
    }
}

impl std::fmt::Display for ResampleMethode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NaechsterNachbar => "naechster-nachbar",
            Self::Linear => "linear",
        })
    }
}

/// Laenge des Ausgangs fuer `n` Eingangs-Samples
pub fn ziel_laenge(n: usize, von: u32, nach: u32) -> usize {
    if von == 0 {
        return 0;
    }
    ((n as u64 * nach as u64) / von as u64) as usize
}

/// Rechnet `eingang` von `von` Hz auf `nach` Hz um
pub fn resamplen(eingang: &[f32], von: u32, nach: u32, methode: ResampleMethode) -> Vec<f32> {
    let laenge = ziel_laenge(eingang.len(), von, nach);
    if laenge == 0 || eingang.is_empty() {
        return Vec::new();
    }
    let letzter = eingang.len() - 1;

    match methode {
        ResampleMethode::NaechsterNachbar => (0..laenge)
            .map(|i| {
                let idx = (i as u64 * von as u64 / nach as u64) as usize;
                eingang[idx.min(letzter)]
            })
            .collect(),
        ResampleMethode::Linear => {
            let schritt = von as f64 / nach as f64;
            (0..laenge)
                .map(|i| {
                    let pos = i as f64 * schritt;
                    let links = (pos.floor() as usize).min(letzter);
                    let rechts = (links + 1).min(letzter);
                    let anteil = (pos - links as f64).clamp(0.0, 1.0) as f32;
                    eingang[links] + (eingang[rechts] - eingang[links]) * anteil
                })
                .collect()
        }
    }
}
