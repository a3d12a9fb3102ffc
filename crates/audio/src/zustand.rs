//! Zustandsautomat der Playback-Pipeline
//!
//! Uebergaenge:
//! - `Leerlauf -> Verarbeitung`, `Wiedergabe -> Verarbeitung`: Zyklus beginnt
//! - `Verarbeitung -> Wiedergabe`: Puffer geplant
//! - `Verarbeitung -> Leerlauf`: Frame verworfen und keine Quelle aktiv
//! - `Wiedergabe -> Leerlauf`: aktuelle Quelle ist zu Ende
//!
//! Die aktuelle Quelle wird ueber ihre Id verfolgt. Eine Abschluss-Meldung
//! einer bereits ersetzten Quelle aendert nichts.

use earshot_core::event::HoererEreignis;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use tokio::sync::broadcast;

use crate::ausgabe::QuellId;

/// Zustand der Pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineZustand {
    /// Nichts in Arbeit, nichts spielt
    Leerlauf = 0,
    /// Ein Zyklus verarbeitet gerade einen Frame
    Verarbeitung = 1,
    /// Ein Puffer ist geplant und spielt
    Wiedergabe = 2,
}

impl PipelineZustand {
    fn aus_u8(wert: u8) -> Self {
        match wert {
            1 => Self::Verarbeitung,
            2 => Self::Wiedergabe,
            _ => Self::Leerlauf,
        }
    }
}

/// Keine Quelle aktiv
const KEINE_QUELLE: u64 = 0;

/// Zustand + aktuelle Quelle + Ereignis-Kanal
pub struct Zustandsautomat {
    zustand: AtomicU8,
    aktuelle_quelle: AtomicU64,
    ereignisse: broadcast::Sender<HoererEreignis>,
}

impl Zustandsautomat {
    pub fn neu(ereignisse: broadcast::Sender<HoererEreignis>) -> Self {
        Self {
            zustand: AtomicU8::new(PipelineZustand::Leerlauf as u8),
            aktuelle_quelle: AtomicU64::new(KEINE_QUELLE),
            ereignisse,
        }
    }

    pub fn zustand(&self) -> PipelineZustand {
        PipelineZustand::aus_u8(self.zustand.load(Ordering::Acquire))
    }

    pub fn quelle_aktiv(&self) -> bool {
        self.aktuelle_quelle.load(Ordering::Acquire) != KEINE_QUELLE
    }

    /// Sendet ein Ereignis; ohne Empfaenger geht es verloren
    pub fn melden(&self, ereignis: HoererEreignis) {
        let _ = self.ereignisse.send(ereignis);
    }

    /// Leerlauf/Wiedergabe -> Verarbeitung
    pub fn verarbeitung_beginnt(&self) {
        self.zustand
            .store(PipelineZustand::Verarbeitung as u8, Ordering::Release);
    }

    /// Verarbeitung endet ohne neue Quelle (Frame verworfen, Ausgabe fehlt)
    pub fn verarbeitung_ohne_quelle(&self) {
        let ziel = if self.quelle_aktiv() {
            PipelineZustand::Wiedergabe
        } else {
            PipelineZustand::Leerlauf
        };
        let _ = self.zustand.compare_exchange(
            PipelineZustand::Verarbeitung as u8,
            ziel as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Neue Quelle ist geplant: Verarbeitung -> Wiedergabe
    pub fn quelle_geplant(&self, id: QuellId) {
        let vorher = self.aktuelle_quelle.swap(id.0, Ordering::AcqRel);
        self.zustand
            .store(PipelineZustand::Wiedergabe as u8, Ordering::Release);
        if vorher == KEINE_QUELLE {
            self.melden(HoererEreignis::WiedergabeGestartet);
        }
    }

    /// Abschluss-Meldung einer Quelle
    ///
    /// Nur die aktuelle Quelle beendet die Wiedergabe.
    pub fn quelle_beendet(&self, id: QuellId) {
        if self
            .aktuelle_quelle
            .compare_exchange(id.0, KEINE_QUELLE, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::trace!(quelle = id.0, "Abschluss einer ersetzten Quelle ignoriert");
            return;
        }
        let _ = self.zustand.compare_exchange(
            PipelineZustand::Wiedergabe as u8,
            PipelineZustand::Leerlauf as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.melden(HoererEreignis::WiedergabeBeendet);
    }

    /// Abbau: alles zurueck auf Leerlauf, ohne Ereignis
    pub fn zuruecksetzen(&self) {
        self.aktuelle_quelle.store(KEINE_QUELLE, Ordering::Release);
        self.zustand
            .store(PipelineZustand::Leerlauf as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn automat() -> (Zustandsautomat, broadcast::Receiver<HoererEreignis>) {
        let (tx, rx) = broadcast::channel(16);
        (Zustandsautomat::neu(tx), rx)
    }

    #[test]
    fn normaler_ablauf() {
        let (a, mut rx) = automat();
        assert_eq!(a.zustand(), PipelineZustand::Leerlauf);

        a.verarbeitung_beginnt();
        assert_eq!(a.zustand(), PipelineZustand::Verarbeitung);
        a.quelle_geplant(QuellId(1));
        assert_eq!(a.zustand(), PipelineZustand::Wiedergabe);
        a.quelle_beendet(QuellId(1));
        assert_eq!(a.zustand(), PipelineZustand::Leerlauf);

        assert_eq!(rx.try_recv().unwrap(), HoererEreignis::WiedergabeGestartet);
        assert_eq!(rx.try_recv().unwrap(), HoererEreignis::WiedergabeBeendet);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn ersetzte_quelle_beendet_nichts() {
        let (a, mut rx) = automat();
        a.verarbeitung_beginnt();
        a.quelle_geplant(QuellId(1));
        a.verarbeitung_beginnt();
        a.quelle_geplant(QuellId(2));

        a.quelle_beendet(QuellId(1));
        assert_eq!(a.zustand(), PipelineZustand::Wiedergabe);
        assert!(a.quelle_aktiv());

        // Nur ein Start-Ereignis fuer die durchgehende Wiedergabe
        assert_eq!(rx.try_recv().unwrap(), HoererEreignis::WiedergabeGestartet);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn verworfener_frame_waehrend_wiedergabe() {
        let (a, _rx) = automat();
        a.verarbeitung_beginnt();
        a.quelle_geplant(QuellId(1));

        a.verarbeitung_beginnt();
        a.verarbeitung_ohne_quelle();
        assert_eq!(a.zustand(), PipelineZustand::Wiedergabe);
    }

    #[test]
    fn verworfener_frame_im_leerlauf() {
        let (a, _rx) = automat();
        a.verarbeitung_beginnt();
        a.verarbeitung_ohne_quelle();
        assert_eq!(a.zustand(), PipelineZustand::Leerlauf);
    }

    #[test]
    fn ende_waehrend_verarbeitung() {
        let (a, _rx) = automat();
        a.verarbeitung_beginnt();
        a.quelle_geplant(QuellId(1));
        a.verarbeitung_beginnt();
        a.quelle_beendet(QuellId(1));
        assert_eq!(a.zustand(), PipelineZustand::Verarbeitung);
        a.verarbeitung_ohne_quelle();
        assert_eq!(a.zustand(), PipelineZustand::Leerlauf);
    }

    #[test]
    fn zuruecksetzen_ohne_ereignis() {
        let (a, mut rx) = automat();
        a.quelle_geplant(QuellId(4));
        let _ = rx.try_recv();
        a.zuruecksetzen();
        assert_eq!(a.zustand(), PipelineZustand::Leerlauf);
        assert!(!a.quelle_aktiv());
        assert!(rx.try_recv().is_err());
    }
}
