//! Session-Registry – CallId -> Produzent + Hoerer-Menge
//!
//! Alle Mutationen und jeder Fan-out laufen unter genau einem Mutex. Ein
//! Hoerer der waehrend eines Fan-outs entfernt wird, bekommt dadurch nie
//! einen halben Frame-Strom, und der Dispatcher sieht nie einen Eintrag
//! der gerade abgebaut wird.
//!
//! Jeder Hoerer besitzt eine begrenzte Egress-Queue. Gesendet wird mit
//! `try_send`; eine volle oder geschlossene Queue entfernt den Hoerer noch im
//! selben kritischen Abschnitt. Das Fallenlassen des Senders schliesst die
//! Queue, worauf der Verbindungs-Task des Hoerers den Socket schliesst.

use bytes::Bytes;
use earshot_core::types::{CallId, Rolle, VerbindungsId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{RelayError, RelayResult};

/// Standard-Groesse der Egress-Queue pro Hoerer (in Frames)
pub const STANDARD_HOERER_QUEUE: usize = 256;

// ---------------------------------------------------------------------------
// Oeffentliche Typen
// ---------------------------------------------------------------------------

/// Eine registrierte Verbindung
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verbindung {
    pub id: VerbindungsId,
    pub call_id: CallId,
    pub rolle: Rolle,
}

/// Registrierter Hoerer samt Empfangsseite seiner Egress-Queue
#[derive(Debug)]
pub struct HoererAnmeldung {
    pub verbindung: Verbindung,
    pub empfaenger: mpsc::Receiver<Bytes>,
}

/// Ergebnis von [`SessionRegistry::verbinden`]
#[derive(Debug)]
pub enum Anmeldung {
    Produzent(Verbindung),
    Hoerer(HoererAnmeldung),
}

impl Anmeldung {
    pub fn verbindung(&self) -> &Verbindung {
        match self {
            Anmeldung::Produzent(v) => v,
            Anmeldung::Hoerer(h) => &h.verbindung,
        }
    }
}

/// Ergebnis eines Fan-outs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerteilErgebnis {
    /// Hoerer deren Queue den Frame angenommen hat
    pub zugestellt: usize,
    /// Hoerer die wegen voller oder geschlossener Queue entfernt wurden
    pub entfernt: usize,
}

/// Momentaufnahme der Registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStatistik {
    pub sitzungen: usize,
    pub produzenten: usize,
    pub hoerer: usize,
}

// ---------------------------------------------------------------------------
// Interne Struktur
// ---------------------------------------------------------------------------

#[derive(Default)]
struct CallSitzung {
    produzent: Option<VerbindungsId>,
    hoerer: HashMap<VerbindungsId, mpsc::Sender<Bytes>>,
}

impl CallSitzung {
    fn ist_leer(&self) -> bool {
        self.produzent.is_none() && self.hoerer.is_empty()
    }
}

struct RegistryInner {
    sitzungen: Mutex<HashMap<CallId, CallSitzung>>,
    queue_groesse: usize,
}

// ---------------------------------------------------------------------------
// SessionRegistry
// ---------------------------------------------------------------------------

/// Verwaltet alle Call-Sitzungen einer Relay-Instanz
///
/// Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    /// Erstellt eine leere Registry; `queue_groesse` wird auf mindestens 1 angehoben
    pub fn neu(queue_groesse: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sitzungen: Mutex::new(HashMap::new()),
                queue_groesse: queue_groesse.max(1),
            }),
        }
    }

    /// Registriert eine Verbindung unter `call_id`
    ///
    /// Die Sitzung wird bei Bedarf angelegt. Ein zweiter Produzent fuer
    /// denselben Call wird abgelehnt, die Registry bleibt dann unveraendert.
    pub fn verbinden(&self, call_id: CallId, rolle: Rolle) -> RelayResult<Anmeldung> {
        let id = VerbindungsId::new();
        let mut sitzungen = self.inner.sitzungen.lock();

        match rolle {
            Rolle::Produzent => {
                if sitzungen
                    .get(&call_id)
                    .is_some_and(|s| s.produzent.is_some())
                {
                    return Err(RelayError::ProduzentBereitsVerbunden(call_id));
                }
                sitzungen.entry(call_id.clone()).or_default().produzent = Some(id);
                Ok(Anmeldung::Produzent(Verbindung { id, call_id, rolle }))
            }
            Rolle::Hoerer => {
                let (tx, rx) = mpsc::channel(self.inner.queue_groesse);
                sitzungen
                    .entry(call_id.clone())
                    .or_default()
                    .hoerer
                    .insert(id, tx);
                Ok(Anmeldung::Hoerer(HoererAnmeldung {
                    verbindung: Verbindung { id, call_id, rolle },
                    empfaenger: rx,
                }))
            }
        }
    }

    /// Verteilt einen Frame an alle Hoerer von `call_id`
    ///
    /// Ohne Hoerer wird der Frame verworfen; spaeter hinzukommende Hoerer
    /// sehen ihn nie.
    pub fn frame_verteilen(&self, call_id: &CallId, frame: &Bytes) -> VerteilErgebnis {
        let mut ergebnis = VerteilErgebnis::default();
        let mut sitzungen = self.inner.sitzungen.lock();

        let Some(sitzung) = sitzungen.get_mut(call_id) else {
            return ergebnis;
        };

        sitzung.hoerer.retain(|id, tx| match tx.try_send(frame.clone()) {
            Ok(()) => {
                ergebnis.zugestellt += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(call_id = %call_id, verbindung = %id, "Egress-Queue voll, Hoerer wird entfernt");
                ergebnis.entfernt += 1;
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(call_id = %call_id, verbindung = %id, "Egress-Queue geschlossen, Hoerer wird entfernt");
                ergebnis.entfernt += 1;
                false
            }
        });

        if sitzung.ist_leer() {
            sitzungen.remove(call_id);
        }
        ergebnis
    }

    /// Entfernt eine Verbindung; leere Sitzungen werden abgebaut
    ///
    /// Idempotent. Gibt `true` zurueck wenn die Verbindung noch registriert war.
    pub fn trennen(&self, verbindung: &Verbindung) -> bool {
        let mut sitzungen = self.inner.sitzungen.lock();
        let Some(sitzung) = sitzungen.get_mut(&verbindung.call_id) else {
            return false;
        };

        let entfernt = match verbindung.rolle {
            Rolle::Produzent if sitzung.produzent == Some(verbindung.id) => {
                sitzung.produzent = None;
                true
            }
            Rolle::Produzent => false,
            Rolle::Hoerer => sitzung.hoerer.remove(&verbindung.id).is_some(),
        };

        if sitzung.ist_leer() {
            sitzungen.remove(&verbindung.call_id);
            tracing::debug!(call_id = %verbindung.call_id, "Call-Sitzung abgebaut");
        }
        entfernt
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    pub fn sitzung_anzahl(&self) -> usize {
        self.inner.sitzungen.lock().len()
    }

    pub fn hoerer_anzahl(&self, call_id: &CallId) -> usize {
        self.inner
            .sitzungen
            .lock()
            .get(call_id)
            .map_or(0, |s| s.hoerer.len())
    }

    pub fn hat_produzent(&self, call_id: &CallId) -> bool {
        self.inner
            .sitzungen
            .lock()
            .get(call_id)
            .is_some_and(|s| s.produzent.is_some())
    }

    pub fn enthaelt(&self, call_id: &CallId) -> bool {
        self.inner.sitzungen.lock().contains_key(call_id)
    }

    pub fn statistik(&self) -> RegistryStatistik {
        let sitzungen = self.inner.sitzungen.lock();
        RegistryStatistik {
            sitzungen: sitzungen.len(),
            produzenten: sitzungen.values().filter(|s| s.produzent.is_some()).count(),
            hoerer: sitzungen.values().map(|s| s.hoerer.len()).sum(),
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::neu(STANDARD_HOERER_QUEUE)
    }
}
