//! Ausgabe-Planer
//!
//! Jeder neue Puffer ersetzt den laufenden sofort: ohne Start-Offset, ohne
//! Lueckenverwaltung. Kommen Frames schneller als sie abspielen, wird der
//! jeweils vorherige Puffer abgeschnitten.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::ausgabe::{AudioAusgabe, QuellId, Quelle};
use crate::error::AudioResult;
use crate::zustand::Zustandsautomat;

pub struct AusgabePlaner {
    naechste_id: AtomicU64,
    automat: Arc<Zustandsautomat>,
}

impl AusgabePlaner {
    pub fn neu(automat: Arc<Zustandsautomat>) -> Self {
        Self {
            // 0 steht fuer "keine Quelle"
            naechste_id: AtomicU64::new(1),
            automat,
        }
    }

    /// Stoppt den laufenden Puffer und startet `samples` sofort
    pub fn abspielen(&self, ausgabe: &dyn AudioAusgabe, samples: Vec<f32>) -> AudioResult<QuellId> {
        if let Err(e) = ausgabe.quelle_stoppen() {
            tracing::warn!(fehler = %e, "Vorherige Quelle konnte nicht gestoppt werden");
        }

        let id = QuellId(self.naechste_id.fetch_add(1, Ordering::Relaxed));
        self.automat.quelle_geplant(id);

        let automat = Arc::clone(&self.automat);
        let quelle = Quelle {
            id,
            samples,
            beendet: Box::new(move |id| automat.quelle_beendet(id)),
        };

        if let Err(e) = ausgabe.quelle_starten(quelle) {
            self.automat.quelle_beendet(id);
            return Err(e);
        }
        Ok(id)
    }

    /// Stoppt den laufenden Puffer ohne Abschluss-Meldung
    pub fn stoppen(&self, ausgabe: &dyn AudioAusgabe) -> AudioResult<()> {
        ausgabe.quelle_stoppen()
    }
}
