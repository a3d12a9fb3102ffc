//! Ausgabe-Abstraktion
//!
//! [`AudioAusgabe`] ist der Ausgabe-Graph eines Hoerers: ein Ziel mit fester
//! Abtastrate, auf dem hoechstens eine Quelle gleichzeitig spielt. Der
//! Gain-Knoten wird beim Erstellen ueber die [`AusgabeFabrik`] uebergeben.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{AudioError, AudioResult};
use crate::volume::GainKnoten;

/// Fortlaufende Id einer geplanten Quelle (0 ist reserviert fuer "keine")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuellId(pub u64);

/// Abschluss-Callback einer Quelle
pub type AbschlussCallback = Box<dyn FnOnce(QuellId) + Send>;

/// Ein abspielbarer Puffer (mono, in der Rate der Ausgabe)
pub struct Quelle {
    pub id: QuellId,
    pub samples: Vec<f32>,
    /// Wird genau einmal aufgerufen wenn der Puffer zu Ende gespielt ist.
    /// Ein gestoppter oder ersetzter Puffer ruft ihn nicht auf.
    pub beendet: AbschlussCallback,
}

impl std::fmt::Debug for Quelle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Quelle")
            .field("id", &self.id)
            .field("samples", &self.samples.len())
            .finish()
    }
}

/// Ausgabe-Graph eines Hoerers
pub trait AudioAusgabe: Send + Sync {
    /// Abtastrate des Ziels in Hz
    fn abtastrate(&self) -> u32;

    /// Startet `quelle` sofort; eine laufende Quelle wird ersetzt
    fn quelle_starten(&self, quelle: Quelle) -> AudioResult<()>;

    /// Stoppt die laufende Quelle ohne Abschluss-Callback
    fn quelle_stoppen(&self) -> AudioResult<()>;

    /// Haelt die Ausgabe an, die Quelle bleibt erhalten
    fn anhalten(&self) -> AudioResult<()>;

    fn fortsetzen(&self) -> AudioResult<()>;

    fn laeuft(&self) -> bool;

    /// Gibt das Geraet frei; danach schlagen alle Operationen fehl
    fn schliessen(&self) -> AudioResult<()>;
}

/// Erzeugt den Ausgabe-Graphen bei Bedarf
pub trait AusgabeFabrik: Send + Sync {
    fn erstellen(&self, gain: GainKnoten) -> AudioResult<Arc<dyn AudioAusgabe>>;
}

impl<F> AusgabeFabrik for F
where
    F: Fn(GainKnoten) -> AudioResult<Arc<dyn AudioAusgabe>> + Send + Sync,
{
    fn erstellen(&self, gain: GainKnoten) -> AudioResult<Arc<dyn AudioAusgabe>> {
        self(gain)
    }
}

// ---------------------------------------------------------------------------
// NullAusgabe
// ---------------------------------------------------------------------------

/// Statistik einer [`NullAusgabe`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NullStatistik {
    pub gestartet: u64,
    pub gestoppt: u64,
    pub abgeschlossen: u64,
    pub samples_gesamt: u64,
    /// Samples der zuletzt gestarteten Quelle, mit Gain
    pub letzte_samples: Vec<f32>,
}

/// Ausgabe ohne Geraet
///
/// Mit `sofort_beenden` gilt jede Quelle sofort als zu Ende gespielt,
/// sonst bleibt sie haengen bis [`NullAusgabe::quelle_abschliessen`]
/// aufgerufen wird.
pub struct NullAusgabe {
    abtastrate: u32,
    gain: GainKnoten,
    sofort_beenden: bool,
    laeuft: AtomicBool,
    geschlossen: AtomicBool,
    aktuell: Mutex<Option<Quelle>>,
    statistik: Mutex<NullStatistik>,
    abgeschlossen: AtomicU64,
}

impl NullAusgabe {
    pub fn neu(abtastrate: u32, gain: GainKnoten, sofort_beenden: bool) -> Self {
        Self {
            abtastrate,
            gain,
            sofort_beenden,
            laeuft: AtomicBool::new(true),
            geschlossen: AtomicBool::new(false),
            aktuell: Mutex::new(None),
            statistik: Mutex::new(NullStatistik::default()),
            abgeschlossen: AtomicU64::new(0),
        }
    }

    /// Fabrik fuer die Pipeline
    pub fn fabrik(abtastrate: u32, sofort_beenden: bool) -> impl AusgabeFabrik {
        move |gain: GainKnoten| -> AudioResult<Arc<dyn AudioAusgabe>> {
            Ok(Arc::new(NullAusgabe::neu(abtastrate, gain, sofort_beenden)))
        }
    }

    pub fn statistik(&self) -> NullStatistik {
        let mut statistik = self.statistik.lock().clone();
        statistik.abgeschlossen = self.abgeschlossen.load(Ordering::Relaxed);
        statistik
    }

    pub fn ist_geschlossen(&self) -> bool {
        self.geschlossen.load(Ordering::Acquire)
    }

    /// Simuliert das Ende der laufenden Quelle
    ///
    /// Gibt `false` zurueck wenn keine Quelle lief.
    pub fn quelle_abschliessen(&self) -> bool {
        let quelle = self.aktuell.lock().take();
        match quelle {
            Some(q) => {
                self.abgeschlossen.fetch_add(1, Ordering::Relaxed);
                (q.beendet)(q.id);
                true
            }
            None => false,
        }
    }

    fn offen(&self) -> AudioResult<()> {
        if self.ist_geschlossen() {
            return Err(AudioError::AusgabeGeschlossen);
        }
        Ok(())
    }
}

impl AudioAusgabe for NullAusgabe {
    fn abtastrate(&self) -> u32 {
        self.abtastrate
    }

    fn quelle_starten(&self, quelle: Quelle) -> AudioResult<()> {
        self.offen()?;
        {
            let mut statistik = self.statistik.lock();
            statistik.gestartet += 1;
            statistik.samples_gesamt += quelle.samples.len() as u64;
            statistik.letzte_samples = quelle.samples.iter().map(|&s| self.gain.anwenden(s)).collect();
        }

        *self.aktuell.lock() = Some(quelle);
        if self.sofort_beenden {
            self.quelle_abschliessen();
        }
        Ok(())
    }

    fn quelle_stoppen(&self) -> AudioResult<()> {
        self.offen()?;
        if self.aktuell.lock().take().is_some() {
            self.statistik.lock().gestoppt += 1;
        }
        Ok(())
    }

    fn anhalten(&self) -> AudioResult<()> {
        self.offen()?;
        self.laeuft.store(false, Ordering::Release);
        Ok(())
    }

    fn fortsetzen(&self) -> AudioResult<()> {
        self.offen()?;
        self.laeuft.store(true, Ordering::Release);
        Ok(())
    }

    fn laeuft(&self) -> bool {
        self.laeuft.load(Ordering::Acquire) && !self.ist_geschlossen()
    }

    fn schliessen(&self) -> AudioResult<()> {
        if self.geschlossen.swap(true, Ordering::AcqRel) {
            return Err(AudioError::AusgabeGeschlossen);
        }
        self.aktuell.lock().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn quelle(id: u64, zaehler: &Arc<AtomicUsize>) -> Quelle {
        let zaehler = zaehler.clone();
        Quelle {
            id: QuellId(id),
            samples: vec![0.5; 4],
            beendet: Box::new(move |_| {
                zaehler.fetch_add(1, Ordering::SeqCst);
            }),
        }
    }

    #[test]
    fn sofort_beenden_ruft_callback() {
        let ausgabe = NullAusgabe::neu(48000, GainKnoten::default(), true);
        let zaehler = Arc::new(AtomicUsize::new(0));
        ausgabe.quelle_starten(quelle(1, &zaehler)).unwrap();
        assert_eq!(zaehler.load(Ordering::SeqCst), 1);
        assert_eq!(ausgabe.statistik().abgeschlossen, 1);
    }

    #[test]
    fn stoppen_ruft_keinen_callback() {
        let ausgabe = NullAusgabe::neu(48000, GainKnoten::default(), false);
        let zaehler = Arc::new(AtomicUsize::new(0));
        ausgabe.quelle_starten(quelle(1, &zaehler)).unwrap();
        ausgabe.quelle_stoppen().unwrap();
        assert!(!ausgabe.quelle_abschliessen());
        assert_eq!(zaehler.load(Ordering::SeqCst), 0);
        assert_eq!(ausgabe.statistik().gestoppt, 1);
    }

    #[test]
    fn gain_wirkt_auf_samples() {
        let gain = GainKnoten::neu(0.5);
        let ausgabe = NullAusgabe::neu(8000, gain, true);
        let zaehler = Arc::new(AtomicUsize::new(0));
        ausgabe.quelle_starten(quelle(1, &zaehler)).unwrap();
        assert_eq!(ausgabe.statistik().letzte_samples, vec![0.25; 4]);
    }

    #[test]
    fn geschlossene_ausgabe_lehnt_ab() {
        let ausgabe = NullAusgabe::neu(48000, GainKnoten::default(), true);
        ausgabe.schliessen().unwrap();
        assert!(!ausgabe.laeuft());
        let zaehler = Arc::new(AtomicUsize::new(0));
        assert!(matches!(
            ausgabe.quelle_starten(quelle(1, &zaehler)),
            Err(AudioError::AusgabeGeschlossen)
        ));
        assert!(ausgabe.schliessen().is_err());
    }

    #[test]
    fn anhalten_und_fortsetzen() {
        let ausgabe = NullAusgabe::neu(48000, GainKnoten::default(), true);
        assert!(ausgabe.laeuft());
        ausgabe.anhalten().unwrap();
        assert!(!ausgabe.laeuft());
        ausgabe.fortsetzen().unwrap();
        assert!(ausgabe.laeuft());
    }

    #[test]
    fn fabrik_als_closure() {
        let fabrik = NullAusgabe::fabrik(44100, true);
        let ausgabe = fabrik.erstellen(GainKnoten::default()).unwrap();
        assert_eq!(ausgabe.abtastrate(), 44100);
    }
}
