//! Relay-Dispatcher – Verbindungsannahme und Produzenten-Nachrichten
//!
//! Der Dispatcher sitzt zwischen den Verbindungs-Tasks und der
//! [`SessionRegistry`]. Er bestimmt Rollen, parst Umschlaege, fuehrt die
//! Metriken nach und protokolliert. Eine angenommene Verbindung wird durch
//! eine [`Registrierung`] repraesentiert; deren Drop meldet die Verbindung
//! genau einmal ab, egal auf welchem Weg der Task endet.

use bytes::Bytes;
use earshot_core::types::{CallId, Rolle};
use earshot_observability::metrics::{grund, EarshotMetriken};
use earshot_protocol::{nachricht_parsen, ProduzentNachricht, StartInfo};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{RelayError, RelayResult};
use crate::klassifizierung::RollenKlassifizierer;
use crate::registry::{Anmeldung, SessionRegistry, Verbindung};

// ---------------------------------------------------------------------------
// Registrierung (Drop-Guard)
// ---------------------------------------------------------------------------

/// Angenommene Verbindung; meldet sich beim Drop ab
pub struct Registrierung {
    dispatcher: RelayDispatcher,
    verbindung: Verbindung,
}

impl Registrierung {
    pub fn verbindung(&self) -> &Verbindung {
        &self.verbindung
    }
}

impl Drop for Registrierung {
    fn drop(&mut self) {
        self.dispatcher.trennen(&self.verbindung);
    }
}

impl std::fmt::Debug for Registrierung {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registrierung")
            .field("verbindung", &self.verbindung)
            .finish()
    }
}

/// Ergebnis der Verbindungsannahme
#[derive(Debug)]
pub enum Zugang {
    Produzent(Registrierung),
    Hoerer {
        registrierung: Registrierung,
        empfaenger: mpsc::Receiver<Bytes>,
    },
}

// ---------------------------------------------------------------------------
// ProduzentKontext
// ---------------------------------------------------------------------------

/// Zustand einer Produzenten-Verbindung
///
/// Ohne `callSid` in der URL ist der Produzent zunaechst ungebunden und wird
/// beim ersten `start`-Ereignis unter dessen `callSid` registriert.
#[derive(Debug, Default)]
pub struct ProduzentKontext {
    registrierung: Option<Registrierung>,
    stream_sid: Option<String>,
}

impl ProduzentKontext {
    pub fn ungebunden() -> Self {
        Self::default()
    }

    pub fn gebunden(registrierung: Registrierung) -> Self {
        Self {
            registrierung: Some(registrierung),
            stream_sid: None,
        }
    }

    pub fn call_id(&self) -> Option<&CallId> {
        self.registrierung.as_ref().map(|r| &r.verbindung.call_id)
    }

    pub fn ist_gebunden(&self) -> bool {
        self.registrierung.is_some()
    }
}

// ---------------------------------------------------------------------------
// RelayDispatcher
// ---------------------------------------------------------------------------

/// Zentrale Relay-Logik einer Instanz
///
/// Clone teilt Registry und Metriken.
#[derive(Clone)]
pub struct RelayDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    registry: SessionRegistry,
    klassifizierer: RollenKlassifizierer,
    metriken: EarshotMetriken,
}

impl RelayDispatcher {
    pub fn neu(
        registry: SessionRegistry,
        klassifizierer: RollenKlassifizierer,
        metriken: EarshotMetriken,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                registry,
                klassifizierer,
                metriken,
            }),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }

    pub fn metriken(&self) -> &EarshotMetriken {
        &self.inner.metriken
    }

    /// Bestimmt die Rolle anhand des User-Agent
    pub fn rolle_bestimmen(&self, user_agent: Option<&str>) -> Rolle {
        self.inner.klassifizierer.klassifizieren(user_agent)
    }

    /// Registriert eine neue Verbindung
    pub fn annehmen(&self, call_id: CallId, rolle: Rolle) -> RelayResult<Zugang> {
        let anmeldung = match self.inner.registry.verbinden(call_id.clone(), rolle) {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(call_id = %call_id, rolle = %rolle, fehler = %e, "Verbindung abgelehnt");
                return Err(e);
            }
        };

        let verbindung = anmeldung.verbindung().clone();
        self.inner
            .metriken
            .connections_active
            .with_label_values(&[rolle.als_str()])
            .inc();
        self.sitzungen_aktualisieren();

        tracing::info!(
            call_id = %verbindung.call_id,
            verbindung = %verbindung.id,
            rolle = %rolle,
            hoerer = self.inner.registry.hoerer_anzahl(&verbindung.call_id),
            "Verbindung registriert"
        );

        Ok(match anmeldung {
            Anmeldung::Produzent(verbindung) => Zugang::Produzent(Registrierung {
                dispatcher: self.clone(),
                verbindung,
            }),
            Anmeldung::Hoerer(h) => Zugang::Hoerer {
                registrierung: Registrierung {
                    dispatcher: self.clone(),
                    verbindung: h.verbindung,
                },
                empfaenger: h.empfaenger,
            },
        })
    }

    /// Verarbeitet eine Textnachricht eines Produzenten
    ///
    /// Fehlerhafte Umschlaege werden protokolliert und verworfen. Ein Fehler
    /// wird nur zurueckgegeben wenn die Bindung an einen Call scheitert; die
    /// Verbindung ist dann zu schliessen.
    pub fn produzent_nachricht(&self, kontext: &mut ProduzentKontext, text: &str) -> RelayResult<()> {
        let nachricht = match nachricht_parsen(text) {
            Ok(n) => n,
            Err(e) => {
                self.inner.metriken.frame_verworfen(grund::UNGUELTIG);
                tracing::warn!(
                    call_id = ?kontext.call_id().map(CallId::as_str),
                    fehler = %e,
                    art = e.art(),
                    "Ungueltiger Produzenten-Umschlag verworfen"
                );
                return Ok(());
            }
        };

        match nachricht {
            ProduzentNachricht::Media(frame) => self.frame_weiterleiten(kontext, frame),
            ProduzentNachricht::Start(info) => return self.start_verarbeiten(kontext, info),
            ProduzentNachricht::Verbunden => {
                tracing::debug!(call_id = ?kontext.call_id().map(CallId::as_str), "Produzent meldet 'connected'");
            }
            ProduzentNachricht::Stop => {
                tracing::info!(
                    call_id = ?kontext.call_id().map(CallId::as_str),
                    stream_sid = ?kontext.stream_sid,
                    "Produzent meldet Stream-Ende"
                );
            }
            ProduzentNachricht::Sonstiges(ereignis) => {
                tracing::debug!(ereignis = %ereignis, "Produzenten-Ereignis ignoriert");
            }
        }
        Ok(())
    }

    fn frame_weiterleiten(&self, kontext: &ProduzentKontext, frame: Bytes) {
        let metriken = &self.inner.metriken;
        metriken.frames_received_total.inc();

        let Some(call_id) = kontext.call_id() else {
            metriken.frame_verworfen(grund::UNGEBUNDEN);
            tracing::debug!(bytes = frame.len(), "Media vor 'start' verworfen (Produzent ungebunden)");
            return;
        };

        let ergebnis = self.inner.registry.frame_verteilen(call_id, &frame);
        metriken.frames_delivered_total.inc_by(ergebnis.zugestellt as u64);
        if ergebnis.entfernt > 0 {
            metriken.listeners_evicted_total.inc_by(ergebnis.entfernt as u64);
            self.sitzungen_aktualisieren();
        }
        if ergebnis.zugestellt == 0 && ergebnis.entfernt == 0 {
            metriken.frame_verworfen(grund::KEIN_HOERER);
            tracing::trace!(call_id = %call_id, "Kein Hoerer, Frame verworfen");
        }
    }

    fn start_verarbeiten(&self, kontext: &mut ProduzentKontext, info: StartInfo) -> RelayResult<()> {
        if let Some(format) = &info.format {
            if !format.ist_mulaw_8k_mono() {
                tracing::warn!(
                    encoding = %format.encoding,
                    sample_rate = format.sample_rate,
                    channels = format.channels,
                    "Unerwartetes Medienformat angekuendigt, Frames werden unveraendert weitergeleitet"
                );
            }
        }
        if info.stream_sid.is_some() {
            kontext.stream_sid = info.stream_sid;
        }

        let gebunden = kontext.call_id().cloned();
        match (gebunden, info.call_sid) {
            (Some(gebunden), Some(angekuendigt)) if gebunden.as_str() != angekuendigt => {
                tracing::warn!(
                    call_id = %gebunden,
                    angekuendigt = %angekuendigt,
                    "'start' nennt andere callSid, Bindung bleibt bestehen"
                );
                Ok(())
            }
            (Some(_), _) => Ok(()),
            (None, Some(call_sid)) => {
                let call_id = CallId::neu(call_sid).map_err(|_| RelayError::FehlendeCallId)?;
                match self.annehmen(call_id, Rolle::Produzent)? {
                    Zugang::Produzent(registrierung) => {
                        kontext.registrierung = Some(registrierung);
                        Ok(())
                    }
                    Zugang::Hoerer { .. } => Err(RelayError::intern(
                        "Produzenten-Anmeldung lieferte Hoerer-Zugang",
                    )),
                }
            }
            (None, None) => {
                tracing::warn!("'start' ohne callSid, Produzent bleibt ungebunden");
                Ok(())
            }
        }
    }

    /// Meldet eine Verbindung ab
    ///
    /// Wird von [`Registrierung`] beim Drop aufgerufen, also genau einmal pro
    /// angenommener Verbindung.
    fn trennen(&self, verbindung: &Verbindung) {
        let war_registriert = self.inner.registry.trennen(verbindung);
        self.inner
            .metriken
            .connections_active
            .with_label_values(&[verbindung.rolle.als_str()])
            .dec();
        self.sitzungen_aktualisieren();

        tracing::info!(
            call_id = %verbindung.call_id,
            verbindung = %verbindung.id,
            rolle = %verbindung.rolle,
            war_registriert,
            "Verbindung getrennt"
        );
    }

    fn sitzungen_aktualisieren(&self) {
        self.inner
            .metriken
            .sessions_active
            .set(self.inner.registry.sitzung_anzahl() as i64);
    }
}
