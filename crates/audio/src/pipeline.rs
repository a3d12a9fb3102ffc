//! Playback-Pipeline eines Hoerers
//!
//! ```text
//! frame_empfangen() -> Warteschlange -> [Worker] -> dekodieren -> resamplen -> Planer -> Ausgabe
//! ```
//!
//! `frame_empfangen` blockiert nie: es haengt an die Warteschlange an und
//! stoesst den Worker-Thread an, falls kein Zyklus laeuft. Ein Zyklus
//! verarbeitet genau einen Frame. Das Flag `verarbeitung_aktiv` wird per
//! compare-and-swap gesetzt, damit nie zwei Zyklen gleichzeitig laufen.
//!
//! Der Ausgabe-Graph wird ueber die [`AusgabeFabrik`] erstellt, beim Start
//! und sonst zu Beginn jedes Zyklus bis es klappt. Bis dahin werden Frames
//! verworfen; pro Fehlerserie gibt es genau eine `Ressource`-Meldung.

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use earshot_core::event::{Benachrichtigung, HoererEreignis};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::ausgabe::{AudioAusgabe, AusgabeFabrik};
use crate::codec::{dekodieren, TELEFONIE_ABTASTRATE};
use crate::error::{AudioError, AudioResult};
use crate::resampler::{resamplen, ResampleMethode};
use crate::scheduler::AusgabePlaner;
use crate::volume::GainKnoten;
use crate::zustand::{PipelineZustand, Zustandsautomat};

/// Einstellungen der Pipeline
#[derive(Debug, Clone, Copy)]
pub struct PipelineKonfig {
    pub methode: ResampleMethode,
    /// Anfangs-Lautstaerke, wird auf [0.0, 1.0] begrenzt
    pub lautstaerke: f32,
}

impl Default for PipelineKonfig {
    fn default() -> Self {
        Self {
            methode: ResampleMethode::NaechsterNachbar,
            lautstaerke: 1.0,
        }
    }
}

struct AusgabeGraph {
    ausgabe: Arc<dyn AudioAusgabe>,
    planer: AusgabePlaner,
}

struct PipelineInner {
    warteschlange: Mutex<VecDeque<Bytes>>,
    verarbeitung_aktiv: AtomicBool,
    graph: Mutex<Option<AusgabeGraph>>,
    fabrik: Box<dyn AusgabeFabrik>,
    gain: GainKnoten,
    automat: Arc<Zustandsautomat>,
    methode: ResampleMethode,
    /// Gesetzt solange die Fabrik fehlschlaegt
    fehlerserie: AtomicBool,
    abgebaut: AtomicBool,
}

/// Playback-Pipeline (Warteschlange, Worker, Ausgabe-Graph)
pub struct PlaybackPipeline {
    inner: Arc<PipelineInner>,
    wecker: Mutex<Option<Sender<()>>>,
}

impl PlaybackPipeline {
    /// Erstellt die Pipeline und versucht sofort den Ausgabe-Graphen anzulegen
    ///
    /// Scheitert das, bleibt die Pipeline nutzbar; der naechste Zyklus
    /// versucht es erneut.
    pub fn neu(
        fabrik: Box<dyn AusgabeFabrik>,
        konfig: PipelineKonfig,
        ereignisse: broadcast::Sender<HoererEreignis>,
    ) -> AudioResult<Self> {
        let inner = Arc::new(PipelineInner {
            warteschlange: Mutex::new(VecDeque::new()),
            verarbeitung_aktiv: AtomicBool::new(false),
            graph: Mutex::new(None),
            fabrik,
            gain: GainKnoten::neu(konfig.lautstaerke),
            automat: Arc::new(Zustandsautomat::neu(ereignisse)),
            methode: konfig.methode,
            fehlerserie: AtomicBool::new(false),
            abgebaut: AtomicBool::new(false),
        });

        inner.graph_sicherstellen(&mut inner.graph.lock());

        let (wecker_tx, wecker_rx) = bounded::<()>(1);
        let worker_inner = Arc::clone(&inner);
        std::thread::Builder::new()
            .name("earshot-pipeline".to_string())
            .spawn(move || worker(worker_inner, wecker_rx))?;

        Ok(Self {
            inner,
            wecker: Mutex::new(Some(wecker_tx)),
        })
    }

    /// Nimmt einen Frame vom Transport an; blockiert nie
    pub fn frame_empfangen(&self, frame: Bytes) {
        if self.inner.abgebaut.load(Ordering::Acquire) {
            return;
        }
        self.inner.warteschlange.lock().push_back(frame);
        if self.inner.zyklus_beanspruchen() {
            self.anstossen();
        }
    }

    /// Setzt die Lautstaerke, wirkt sofort; gibt den begrenzten Wert zurueck
    pub fn lautstaerke_setzen(&self, pegel: f32) -> f32 {
        let gesetzt = self.inner.gain.setzen(pegel);
        debug!(lautstaerke = gesetzt, "Lautstaerke gesetzt");
        gesetzt
    }

    pub fn lautstaerke(&self) -> f32 {
        self.inner.gain.wert()
    }

    /// Haelt die Ausgabe an oder setzt sie fort
    ///
    /// Die Warteschlange bleibt erhalten. Gibt zurueck ob die Ausgabe danach
    /// laeuft.
    pub fn wiedergabe_umschalten(&self) -> AudioResult<bool> {
        let graph = self.inner.graph.lock();
        let graph = graph.as_ref().ok_or(AudioError::PipelineNichtInitialisiert)?;
        if graph.ausgabe.laeuft() {
            graph.ausgabe.anhalten()?;
            info!("Wiedergabe angehalten");
            Ok(false)
        } else {
            graph.ausgabe.fortsetzen()?;
            info!("Wiedergabe fortgesetzt");
            Ok(true)
        }
    }

    pub fn zustand(&self) -> PipelineZustand {
        self.inner.automat.zustand()
    }

    /// Spielt gerade ein Puffer auf einer laufenden Ausgabe?
    pub fn spielt(&self) -> bool {
        self.inner.automat.zustand() == PipelineZustand::Wiedergabe
            && self
                .inner
                .graph
                .lock()
                .as_ref()
                .is_some_and(|g| g.ausgabe.laeuft())
    }

    /// Ausgabe-Graph vorhanden?
    pub fn ausgabe_bereit(&self) -> bool {
        self.inner.graph.lock().is_some()
    }

    pub fn warteschlange_laenge(&self) -> usize {
        self.inner.warteschlange.lock().len()
    }

    /// Baut die Pipeline ab: Worker beenden, Quelle stoppen, Ausgabe schliessen
    ///
    /// Idempotent. Alle Schritte laufen auch wenn ein frueherer scheitert;
    /// zurueckgegeben wird der erste Fehler.
    pub fn abbauen(&self) -> AudioResult<()> {
        if self.inner.abgebaut.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        // Sender fallen lassen beendet den Worker
        self.wecker.lock().take();
        self.inner.warteschlange.lock().clear();

        let mut erster_fehler = None;
        if let Some(graph) = self.inner.graph.lock().take() {
            if let Err(e) = graph.planer.stoppen(graph.ausgabe.as_ref()) {
                warn!(fehler = %e, "Quelle konnte beim Abbau nicht gestoppt werden");
                erster_fehler.get_or_insert(e);
            }
            if let Err(e) = graph.ausgabe.schliessen() {
                warn!(fehler = %e, "Ausgabe konnte beim Abbau nicht geschlossen werden");
                erster_fehler.get_or_insert(e);
            }
        }
        self.inner.automat.zuruecksetzen();
        info!("Playback-Pipeline abgebaut");

        match erster_fehler {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn anstossen(&self) {
        let wecker = self.wecker.lock();
        if let Some(tx) = wecker.as_ref() {
            match tx.try_send(()) {
                Ok(()) | Err(TrySendError::Full(())) => {}
                Err(TrySendError::Disconnected(())) => {
                    warn!("Pipeline-Worker nicht erreichbar");
                    self.inner.verarbeitung_aktiv.store(false, Ordering::Release);
                }
            }
        }
    }
}

impl Drop for PlaybackPipeline {
    fn drop(&mut self) {
        if let Err(e) = self.abbauen() {
            debug!(fehler = %e, "Fehler beim Abbau der Pipeline im Drop");
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

fn worker(inner: Arc<PipelineInner>, wecker: Receiver<()>) {
    while wecker.recv().is_ok() {
        inner.zyklen_abarbeiten();
    }
    debug!("Pipeline-Worker beendet");
}

impl PipelineInner {
    /// Setzt `verarbeitung_aktiv` von false auf true
    fn zyklus_beanspruchen(&self) -> bool {
        self.verarbeitung_aktiv
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Ein Zyklus pro Frame, solange die Warteschlange etwas hergibt
    ///
    /// Wird nur aufgerufen wenn der Aufrufer `verarbeitung_aktiv` haelt.
    fn zyklen_abarbeiten(&self) {
        loop {
            let frame = self.warteschlange.lock().pop_front();
            if let Some(frame) = frame {
                self.zyklus(frame);
            }
            self.verarbeitung_aktiv.store(false, Ordering::Release);

            // Frames die waehrend des Zyklus ankamen, haben kein neues
            // Anstossen ausgeloest
            if self.abgebaut.load(Ordering::Acquire) || self.warteschlange.lock().is_empty() {
                return;
            }
            if !self.zyklus_beanspruchen() {
                return;
            }
        }
    }

    fn zyklus(&self, frame: Bytes) {
        if self.abgebaut.load(Ordering::Acquire) {
            return;
        }
        self.automat.verarbeitung_beginnt();

        let mut graph = self.graph.lock();
        // abbauen() setzt das Flag bevor es den Graphen nimmt
        if self.abgebaut.load(Ordering::Acquire) {
            return;
        }
        if !self.graph_sicherstellen(&mut graph) {
            self.automat.verarbeitung_ohne_quelle();
            return;
        }
        let Some(graph) = graph.as_ref() else {
            self.automat.verarbeitung_ohne_quelle();
            return;
        };

        if frame.is_empty() {
            self.automat.melden(HoererEreignis::Fehler(Benachrichtigung::dekodierung(
                "Leerer Frame verworfen",
            )));
            self.automat.verarbeitung_ohne_quelle();
            return;
        }

        let samples = dekodieren(&frame);
        let puffer = resamplen(
            &samples,
            TELEFONIE_ABTASTRATE,
            graph.ausgabe.abtastrate(),
            self.methode,
        );
        if puffer.is_empty() {
            debug!(bytes = frame.len(), "Resampling ergab leeren Puffer, uebersprungen");
            self.automat.verarbeitung_ohne_quelle();
            return;
        }

        if let Err(e) = graph.planer.abspielen(graph.ausgabe.as_ref(), puffer) {
            warn!(fehler = %e, "Puffer konnte nicht geplant werden");
            self.automat.melden(HoererEreignis::Fehler(Benachrichtigung::ressource(format!(
                "Puffer konnte nicht geplant werden: {e}"
            ))));
            self.automat.verarbeitung_ohne_quelle();
        }
    }

    /// Legt den Ausgabe-Graphen an falls noch keiner existiert
    ///
    /// Gibt `true` zurueck wenn danach ein Graph vorhanden ist.
    fn graph_sicherstellen(&self, graph: &mut Option<AusgabeGraph>) -> bool {
        if graph.is_some() {
            return true;
        }
        match self.fabrik.erstellen(self.gain.clone()) {
            Ok(ausgabe) => {
                info!(abtastrate = ausgabe.abtastrate(), "Ausgabe-Graph erstellt");
                *graph = Some(AusgabeGraph {
                    ausgabe,
                    planer: AusgabePlaner::neu(Arc::clone(&self.automat)),
                });
                self.fehlerserie.store(false, Ordering::Release);
                true
            }
            Err(e) => {
                if !self.fehlerserie.swap(true, Ordering::AcqRel) {
                    warn!(fehler = %e, "Audio-Ausgabe nicht verfuegbar");
                    self.automat.melden(HoererEreignis::Fehler(Benachrichtigung::ressource(
                        format!("Audio-Ausgabe nicht verfuegbar: {e}"),
                    )));
                } else {
                    debug!(fehler = %e, "Audio-Ausgabe weiterhin nicht verfuegbar");
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ausgabe::{NullAusgabe, Quelle};
    use earshot_core::event::FehlerKlasse;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    /// Fabrik die die erzeugte NullAusgabe fuer den Test zugaenglich macht
    fn beobachtbare_fabrik(
        abtastrate: u32,
        sofort_beenden: bool,
    ) -> (Box<dyn AusgabeFabrik>, Arc<Mutex<Option<Arc<NullAusgabe>>>>) {
        let ablage: Arc<Mutex<Option<Arc<NullAusgabe>>>> = Arc::new(Mutex::new(None));
        let ablage_fabrik = Arc::clone(&ablage);
        let fabrik = move |gain: GainKnoten| -> AudioResult<Arc<dyn AudioAusgabe>> {
            let ausgabe = Arc::new(NullAusgabe::neu(abtastrate, gain, sofort_beenden));
            *ablage_fabrik.lock() = Some(Arc::clone(&ausgabe));
            Ok(ausgabe)
        };
        (Box::new(fabrik), ablage)
    }

    fn warte_bis(mut bedingung: impl FnMut() -> bool) {
        let start = Instant::now();
        while !bedingung() {
            assert!(start.elapsed() < Duration::from_secs(2), "Bedingung nicht erreicht");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn pipeline(
        fabrik: Box<dyn AusgabeFabrik>,
    ) -> (PlaybackPipeline, broadcast::Receiver<HoererEreignis>) {
        let (tx, rx) = broadcast::channel(64);
        (
            PlaybackPipeline::neu(fabrik, PipelineKonfig::default(), tx).unwrap(),
            rx,
        )
    }

    #[test]
    fn frame_wird_dekodiert_und_geplant() {
        let (fabrik, ablage) = beobachtbare_fabrik(48000, false);
        let (p, mut rx) = pipeline(fabrik);
        let ausgabe = ablage.lock().clone().unwrap();

        p.frame_empfangen(Bytes::from_static(&[128, 255, 0, 128]));
        warte_bis(|| ausgabe.statistik().gestartet == 1);

        let statistik = ausgabe.statistik();
        assert_eq!(statistik.samples_gesamt, 24);
        assert_eq!(statistik.letzte_samples[0], 0.0);
        assert_eq!(statistik.letzte_samples[6], 0.9921875);
        assert_eq!(statistik.letzte_samples[12], -1.0);
        assert_eq!(p.zustand(), PipelineZustand::Wiedergabe);
        assert!(p.spielt());
        assert_eq!(rx.try_recv().unwrap(), HoererEreignis::WiedergabeGestartet);

        warte_bis(|| ausgabe.quelle_abschliessen());
        assert_eq!(p.zustand(), PipelineZustand::Leerlauf);
        assert!(!p.spielt());
        assert_eq!(rx.try_recv().unwrap(), HoererEreignis::WiedergabeBeendet);
    }

    #[test]
    fn alle_frames_werden_in_reihenfolge_verarbeitet() {
        let (fabrik, ablage) = beobachtbare_fabrik(8000, true);
        let (p, _rx) = pipeline(fabrik);
        let ausgabe = ablage.lock().clone().unwrap();

        for i in 0..50u8 {
            p.frame_empfangen(Bytes::from(vec![i; 10]));
        }
        warte_bis(|| ausgabe.statistik().gestartet == 50);

        // Letzter Frame: Byte 49 -> (49 - 128) / 128
        let erwartet = (49.0 - 128.0) / 128.0;
        assert_eq!(ausgabe.statistik().letzte_samples, vec![erwartet; 10]);
        assert_eq!(p.warteschlange_laenge(), 0);
        warte_bis(|| p.zustand() == PipelineZustand::Leerlauf);
    }

    /// Langsame Ausgabe die gleichzeitige Starts zaehlt
    struct ZaehlendeAusgabe {
        innen: NullAusgabe,
        aktiv: AtomicUsize,
        hoechstens: AtomicUsize,
    }

    impl AudioAusgabe for ZaehlendeAusgabe {
        fn abtastrate(&self) -> u32 {
            self.innen.abtastrate()
        }
        fn quelle_starten(&self, quelle: Quelle) -> AudioResult<()> {
            let jetzt = self.aktiv.fetch_add(1, Ordering::SeqCst) + 1;
            self.hoechstens.fetch_max(jetzt, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(2));
            let ergebnis = self.innen.quelle_starten(quelle);
            self.aktiv.fetch_sub(1, Ordering::SeqCst);
            ergebnis
        }
        fn quelle_stoppen(&self) -> AudioResult<()> {
            self.innen.quelle_stoppen()
        }
        fn anhalten(&self) -> AudioResult<()> {
            self.innen.anhalten()
        }
        fn fortsetzen(&self) -> AudioResult<()> {
            self.innen.fortsetzen()
        }
        fn laeuft(&self) -> bool {
            self.innen.laeuft()
        }
        fn schliessen(&self) -> AudioResult<()> {
            self.innen.schliessen()
        }
    }

    #[test]
    fn zyklen_ueberlappen_nie() {
        let ablage: Arc<Mutex<Option<Arc<ZaehlendeAusgabe>>>> = Arc::new(Mutex::new(None));
        let ablage_fabrik = Arc::clone(&ablage);
        let fabrik = move |gain: GainKnoten| -> AudioResult<Arc<dyn AudioAusgabe>> {
            let ausgabe = Arc::new(ZaehlendeAusgabe {
                innen: NullAusgabe::neu(8000, gain, true),
                aktiv: AtomicUsize::new(0),
                hoechstens: AtomicUsize::new(0),
            });
            *ablage_fabrik.lock() = Some(Arc::clone(&ausgabe));
            Ok(ausgabe)
        };
        let (p, _rx) = pipeline(Box::new(fabrik));
        let p = Arc::new(p);
        let ausgabe = ablage.lock().clone().unwrap();

        let threads: Vec<_> = (0..4u8)
            .map(|t| {
                let p = Arc::clone(&p);
                std::thread::spawn(move || {
                    for i in 0..25u8 {
                        p.frame_empfangen(Bytes::from(vec![t * 25 + i; 4]));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        warte_bis(|| ausgabe.innen.statistik().gestartet == 100);
        assert_eq!(ausgabe.hoechstens.load(Ordering::SeqCst), 1);
        assert_eq!(p.warteschlange_laenge(), 0);
        warte_bis(|| p.zustand() == PipelineZustand::Leerlauf);
    }

    #[test]
    fn leerer_frame_meldet_dekodierfehler() {
        let (fabrik, ablage) = beobachtbare_fabrik(8000, true);
        let (p, mut rx) = pipeline(fabrik);

        p.frame_empfangen(Bytes::new());
        let ereignis = loop {
            match rx.try_recv() {
                Ok(e) => break e,
                Err(_) => std::thread::sleep(Duration::from_millis(5)),
            }
        };
        match ereignis {
            HoererEreignis::Fehler(b) => assert_eq!(b.klasse, FehlerKlasse::Dekodierung),
            andere => panic!("Fehler-Ereignis erwartet, war {andere:?}"),
        }
        assert_eq!(ablage.lock().as_ref().unwrap().statistik().gestartet, 0);
    }

    #[test]
    fn lautstaerke_wird_begrenzt_und_wirkt_sofort() {
        let (fabrik, ablage) = beobachtbare_fabrik(8000, false);
        let (p, _rx) = pipeline(fabrik);
        let ausgabe = ablage.lock().clone().unwrap();

        assert_eq!(p.lautstaerke_setzen(-0.5), 0.0);
        assert_eq!(p.lautstaerke_setzen(1.7), 1.0);
        assert_eq!(p.lautstaerke_setzen(0.5), 0.5);

        p.frame_empfangen(Bytes::from_static(&[0]));
        warte_bis(|| ausgabe.statistik().gestartet == 1);
        assert_eq!(ausgabe.statistik().letzte_samples, vec![-0.5]);
    }

    #[test]
    fn umschalten_haelt_an_und_setzt_fort() {
        let (fabrik, ablage) = beobachtbare_fabrik(8000, false);
        let (p, _rx) = pipeline(fabrik);
        let ausgabe = ablage.lock().clone().unwrap();

        p.frame_empfangen(Bytes::from_static(&[1, 2, 3]));
        warte_bis(|| ausgabe.statistik().gestartet == 1);
        assert!(p.spielt());

        assert!(!p.wiedergabe_umschalten().unwrap());
        assert!(!p.spielt());
        assert_eq!(p.zustand(), PipelineZustand::Wiedergabe);

        // Frames laufen waehrend der Pause weiter auf
        p.frame_empfangen(Bytes::from_static(&[4, 5, 6]));
        warte_bis(|| ausgabe.statistik().gestartet == 2);

        assert!(p.wiedergabe_umschalten().unwrap());
        assert!(p.spielt());
    }

    #[test]
    fn fehlende_ausgabe_meldet_einmal_und_erholt_sich() {
        let versuche = Arc::new(AtomicUsize::new(0));
        let versuche_fabrik = Arc::clone(&versuche);
        let fabrik = move |gain: GainKnoten| -> AudioResult<Arc<dyn AudioAusgabe>> {
            // Start + zwei Zyklen scheitern, danach klappt es
            if versuche_fabrik.fetch_add(1, Ordering::SeqCst) < 3 {
                return Err(AudioError::KeinStandardAusgabegeraet);
            }
            Ok(Arc::new(NullAusgabe::neu(8000, gain, true)))
        };
        let (p, mut rx) = pipeline(Box::new(fabrik));
        assert!(!p.ausgabe_bereit());
        assert!(matches!(
            p.wiedergabe_umschalten(),
            Err(AudioError::PipelineNichtInitialisiert)
        ));

        p.frame_empfangen(Bytes::from_static(&[1]));
        warte_bis(|| versuche.load(Ordering::SeqCst) == 2);
        p.frame_empfangen(Bytes::from_static(&[2]));
        warte_bis(|| versuche.load(Ordering::SeqCst) == 3);
        assert!(!p.spielt());

        p.frame_empfangen(Bytes::from_static(&[3]));
        warte_bis(|| p.ausgabe_bereit());

        let mut ressource_meldungen = 0;
        let mut gestartet = false;
        warte_bis(|| {
            while let Ok(e) = rx.try_recv() {
                match e {
                    HoererEreignis::Fehler(b) if b.klasse == FehlerKlasse::Ressource => {
                        ressource_meldungen += 1
                    }
                    HoererEreignis::WiedergabeGestartet => gestartet = true,
                    _ => {}
                }
            }
            gestartet
        });
        assert_eq!(ressource_meldungen, 1);
    }

    #[test]
    fn abbau_ist_idempotent() {
        let (fabrik, ablage) = beobachtbare_fabrik(8000, false);
        let (p, _rx) = pipeline(fabrik);
        let ausgabe = ablage.lock().clone().unwrap();

        p.frame_empfangen(Bytes::from_static(&[9, 9]));
        warte_bis(|| ausgabe.statistik().gestartet == 1);

        p.abbauen().unwrap();
        assert!(ausgabe.ist_geschlossen());
        assert_eq!(ausgabe.statistik().gestoppt, 1);
        assert_eq!(p.zustand(), PipelineZustand::Leerlauf);
        assert!(!p.ausgabe_bereit());

        p.abbauen().unwrap();
        // Nach dem Abbau werden Frames ignoriert
        p.frame_empfangen(Bytes::from_static(&[1]));
        assert_eq!(p.warteschlange_laenge(), 0);
    }

    #[test]
    fn abbau_laeuft_trotz_fehler_weiter() {
        let (fabrik, ablage) = beobachtbare_fabrik(8000, false);
        let (p, _rx) = pipeline(fabrik);
        let ausgabe = ablage.lock().clone().unwrap();

        // Bereits geschlossene Ausgabe: Stoppen und Schliessen scheitern
        ausgabe.schliessen().unwrap();
        assert!(matches!(p.abbauen(), Err(AudioError::AusgabeGeschlossen)));
        assert!(!p.ausgabe_bereit());
        assert!(p.abbauen().is_ok());
    }

    #[test]
    fn abbau_nach_gescheitertem_start() {
        let fabrik = |_: GainKnoten| -> AudioResult<Arc<dyn AudioAusgabe>> {
            Err(AudioError::KeinStandardAusgabegeraet)
        };
        let (p, _rx) = pipeline(Box::new(fabrik));
        assert!(p.abbauen().is_ok());
    }
}
