//! Geteilter Gain-Knoten
//!
//! Ein Hoerer hat genau einen Gain-Knoten. Jede Quelle wird durch ihn
//! geleitet; Aenderungen wirken sofort, auch waehrend ein Puffer spielt.
//! Der Wert liegt als f32-Bitmuster in einem Atomic, damit der
//! Audio-Callback ohne Lock lesen kann.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Lautstaerke im Bereich [0.0, 1.0]
#[derive(Debug, Clone)]
pub struct GainKnoten {
    wert: Arc<AtomicU32>,
}

impl GainKnoten {
    pub fn neu(start: f32) -> Self {
        let knoten = Self {
            wert: Arc::new(AtomicU32::new(0)),
        };
        knoten.setzen(start);
        knoten
    }

    /// Setzt die Lautstaerke und gibt den tatsaechlich gesetzten Wert zurueck
    ///
    /// Werte ausserhalb von [0.0, 1.0] werden begrenzt, NaN wird zu 0.0.
    pub fn setzen(&self, pegel: f32) -> f32 {
        let begrenzt = if pegel.is_nan() {
            0.0
        } else {
            pegel.clamp(0.0, 1.0)
        };
        self.wert.store(begrenzt.to_bits(), Ordering::Relaxed);
        begrenzt
    }

    pub fn wert(&self) -> f32 {
        f32::from_bits(self.wert.load(Ordering::Relaxed))
    }

    /// Wendet den Gain auf ein Sample an
    #[inline]
    pub fn anwenden(&self, sample: f32) -> f32 {
        sample * self.wert()
    }
}

impl Default for GainKnoten {
    fn default() -> Self {
        Self::neu(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_ist_volle_lautstaerke() {
        assert_eq!(GainKnoten::default().wert(), 1.0);
    }

    #[test]
    fn werte_werden_begrenzt() {
        let gain = GainKnoten::default();
        assert_eq!(gain.setzen(-0.5), 0.0);
        assert_eq!(gain.wert(), 0.0);
        assert_eq!(gain.setzen(1.7), 1.0);
        assert_eq!(gain.wert(), 1.0);
        assert_eq!(gain.setzen(0.25), 0.25);
    }

    #[test]
    fn nan_wird_stille() {
        let gain = GainKnoten::default();
        assert_eq!(gain.setzen(f32::NAN), 0.0);
    }

    #[test]
    fn klone_teilen_den_wert() {
        let gain = GainKnoten::default();
        let im_callback = gain.clone();
        gain.setzen(0.5);
        assert_eq!(im_callback.anwenden(0.8), 0.4);
    }
}
