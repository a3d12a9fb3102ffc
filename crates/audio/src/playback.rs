//! Audio-Ausgabe via cpal
//!
//! Der cpal-Stream ist nicht auf allen Plattformen `Send`. Er lebt deshalb
//! auf einem eigenen Thread, der Steuerkommandos ueber crossbeam-channel
//! empfaengt. Der Geraete-Callback nimmt keine Locks: neue Quellen kommen
//! ueber einen lock-free Ring-Buffer herein, beendete und verworfene Puffer
//! gehen ueber einen zweiten Ring zurueck an den Audio-Thread. Dort wird der
//! Abschluss-Callback aufgerufen und der Speicher freigegeben.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace};

use crate::ausgabe::{AbschlussCallback, AudioAusgabe, AusgabeFabrik, QuellId, Quelle};
use crate::device::ausgabegeraet_laden;
use crate::error::{AudioError, AudioResult};
use crate::volume::GainKnoten;

/// Kapazitaet des Rings Steuerung -> Callback
const BEFEHL_KAPAZITAET: usize = 16;
/// Kapazitaet des Rings Callback -> Audio-Thread
///
/// Pro Befehl entsteht hoechstens eine Rueckmeldung, dazu eine pro Callback.
const RUECK_KAPAZITAET: usize = 64;
/// Wie oft der Audio-Thread Rueckmeldungen abholt
const RUECK_INTERVALL: Duration = Duration::from_millis(5);

// ---------------------------------------------------------------------------
// Ring-Nachrichten
// ---------------------------------------------------------------------------

struct AktiveQuelle {
    id: QuellId,
    samples: Vec<f32>,
    position: usize,
}

/// Steuerung -> Geraete-Callback
enum SlotBefehl {
    Starten(AktiveQuelle),
    Stoppen,
}

/// Geraete-Callback -> Audio-Thread
#[derive(Debug, PartialEq)]
enum Rueckmeldung {
    /// Quelle vollstaendig abgespielt
    Beendet { id: QuellId, samples: Vec<f32> },
    /// Ersetzt oder gestoppt, ohne Abschluss
    Verworfen(Vec<f32>),
}

/// Zustand des Geraete-Callbacks, gehoert exklusiv dem cpal-Thread
struct Abspieler {
    aktuell: Option<AktiveQuelle>,
    befehle: HeapCons<SlotBefehl>,
    rueck: HeapProd<Rueckmeldung>,
}

impl Abspieler {
    /// Fuellt einen Geraete-Puffer (interleaved)
    fn fuellen<T>(&mut self, daten: &mut [T], kanaele: usize, gain: &GainKnoten)
    where
        T: SizedSample + FromSample<f32>,
    {
        while let Some(befehl) = self.befehle.try_pop() {
            let alt = match befehl {
                SlotBefehl::Starten(neu) => self.aktuell.replace(neu),
                SlotBefehl::Stoppen => self.aktuell.take(),
            };
            if let Some(alt) = alt {
                self.zurueckgeben(Rueckmeldung::Verworfen(alt.samples));
            }
        }

        let pegel = gain.wert();
        for frame in daten.chunks_mut(kanaele) {
            let sample = match self.aktuell.as_mut() {
                Some(q) if q.position < q.samples.len() => {
                    let s = q.samples[q.position] * pegel;
                    q.position += 1;
                    s
                }
                _ => 0.0,
            };
            let wert = T::from_sample(sample);
            for ausgang in frame.iter_mut() {
                *ausgang = wert;
            }
        }

        let zu_ende = self
            .aktuell
            .as_ref()
            .is_some_and(|q| q.position >= q.samples.len());
        if zu_ende {
            if let Some(q) = self.aktuell.take() {
                self.zurueckgeben(Rueckmeldung::Beendet {
                    id: q.id,
                    samples: q.samples,
                });
            }
        }
    }

    fn zurueckgeben(&mut self, meldung: Rueckmeldung) {
        // Bei vollem Ring wird der Puffer hier freigegeben
        let _ = self.rueck.try_push(meldung);
    }
}

/// Abschluss-Callback der zuletzt gestarteten Quelle
type Ausstehend = Mutex<Option<(QuellId, AbschlussCallback)>>;

/// Holt Rueckmeldungen ab und ruft den passenden Abschluss-Callback auf
///
/// Gibt die Anzahl der aufgerufenen Callbacks zurueck.
fn rueckmeldungen_verarbeiten(rueck: &mut HeapCons<Rueckmeldung>, ausstehend: &Ausstehend) -> usize {
    let mut aufgerufen = 0;
    while let Some(meldung) = rueck.try_pop() {
        let Rueckmeldung::Beendet { id, .. } = meldung else {
            continue;
        };
        let beendet = {
            let mut ausstehend = ausstehend.lock();
            match ausstehend.take() {
                Some((aktiv, beendet)) if aktiv == id => Some(beendet),
                andere => {
                    // Quelle wurde inzwischen ersetzt
                    *ausstehend = andere;
                    None
                }
            }
        };
        match beendet {
            Some(beendet) => {
                beendet(id);
                aufgerufen += 1;
            }
            None => trace!(quelle = id.0, "Abschluss einer ersetzten Quelle ignoriert"),
        }
    }
    aufgerufen
}

// ---------------------------------------------------------------------------
// Kommandos an den Audio-Thread
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum BefehlArt {
    Anhalten,
    Fortsetzen,
    Beenden,
}

struct Befehl {
    art: BefehlArt,
    antwort: Sender<AudioResult<()>>,
}

// ---------------------------------------------------------------------------
// CpalAusgabe
// ---------------------------------------------------------------------------

/// Ausgabe auf einem cpal-Geraet
pub struct CpalAusgabe {
    befehle: Sender<Befehl>,
    slot: Mutex<HeapProd<SlotBefehl>>,
    ausstehend: Arc<Ausstehend>,
    abtastrate: u32,
    kanaele: u16,
    laeuft: AtomicBool,
    geschlossen: AtomicBool,
}

impl CpalAusgabe {
    /// Oeffnet das Geraet `geraet` (Teilstring) oder das Standardgeraet
    ///
    /// Blockiert bis der Stream laeuft oder das Oeffnen gescheitert ist.
    pub fn oeffnen(geraet: Option<&str>, gain: GainKnoten) -> AudioResult<Self> {
        let (befehl_tx, befehl_rx) = bounded::<Befehl>(16);
        let (init_tx, init_rx) = bounded::<AudioResult<(u32, u16)>>(1);

        let (slot_prod, slot_cons) = HeapRb::<SlotBefehl>::new(BEFEHL_KAPAZITAET).split();
        let (rueck_prod, rueck_cons) = HeapRb::<Rueckmeldung>::new(RUECK_KAPAZITAET).split();
        let abspieler = Abspieler {
            aktuell: None,
            befehle: slot_cons,
            rueck: rueck_prod,
        };
        let ausstehend: Arc<Ausstehend> = Arc::new(Mutex::new(None));

        let ausstehend_thread = Arc::clone(&ausstehend);
        let geraet = geraet.map(str::to_string);
        std::thread::Builder::new()
            .name("earshot-audio-ausgabe".to_string())
            .spawn(move || {
                ausgabe_thread(AudioThread {
                    geraet,
                    gain,
                    abspieler,
                    rueck: rueck_cons,
                    ausstehend: ausstehend_thread,
                    befehle: befehl_rx,
                    init: init_tx,
                });
            })?;

        let (abtastrate, kanaele) = init_rx
            .recv()
            .map_err(|_| AudioError::StreamFehler("Audio-Thread vorzeitig beendet".into()))??;

        info!(abtastrate, kanaele, "Audio-Ausgabe geoeffnet");

        Ok(Self {
            befehle: befehl_tx,
            slot: Mutex::new(slot_prod),
            ausstehend,
            abtastrate,
            kanaele,
            laeuft: AtomicBool::new(true),
            geschlossen: AtomicBool::new(false),
        })
    }

    /// Fabrik fuer die Pipeline
    pub fn fabrik(geraet: Option<String>) -> impl AusgabeFabrik {
        move |gain: GainKnoten| -> AudioResult<Arc<dyn AudioAusgabe>> {
            Ok(Arc::new(CpalAusgabe::oeffnen(geraet.as_deref(), gain)?))
        }
    }

    pub fn kanaele(&self) -> u16 {
        self.kanaele
    }

    fn offen(&self) -> AudioResult<()> {
        if self.geschlossen.load(Ordering::Acquire) {
            return Err(AudioError::AusgabeGeschlossen);
        }
        Ok(())
    }

    fn slot_befehl(&self, befehl: SlotBefehl) -> AudioResult<()> {
        self.slot
            .lock()
            .try_push(befehl)
            .map_err(|_| AudioError::StreamFehler("Befehlspuffer des Callbacks voll".into()))
    }

    fn befehl_senden(&self, art: BefehlArt) -> AudioResult<()> {
        self.offen()?;
        let (antwort_tx, antwort_rx) = bounded(1);
        self.befehle
            .send(Befehl {
                art,
                antwort: antwort_tx,
            })
            .map_err(|_| AudioError::StreamFehler("Audio-Thread nicht erreichbar".into()))?;
        antwort_rx
            .recv()
            .map_err(|_| AudioError::StreamFehler("Keine Antwort vom Audio-Thread".into()))?
    }
}

impl AudioAusgabe for CpalAusgabe {
    fn abtastrate(&self) -> u32 {
        self.abtastrate
    }

    fn quelle_starten(&self, quelle: Quelle) -> AudioResult<()> {
        self.offen()?;
        // Vor dem Push eintragen, sonst kann die Rueckmeldung den Callback verpassen.
        // Der Callback einer ersetzten Quelle faellt dabei weg.
        *self.ausstehend.lock() = Some((quelle.id, quelle.beendet));
        let ergebnis = self.slot_befehl(SlotBefehl::Starten(AktiveQuelle {
            id: quelle.id,
            samples: quelle.samples,
            position: 0,
        }));
        if ergebnis.is_err() {
            *self.ausstehend.lock() = None;
        }
        ergebnis
    }

    fn quelle_stoppen(&self) -> AudioResult<()> {
        self.offen()?;
        *self.ausstehend.lock() = None;
        self.slot_befehl(SlotBefehl::Stoppen)
    }

    fn anhalten(&self) -> AudioResult<()> {
        self.befehl_senden(BefehlArt::Anhalten)?;
        self.laeuft.store(false, Ordering::Release);
        Ok(())
    }

    fn fortsetzen(&self) -> AudioResult<()> {
        self.befehl_senden(BefehlArt::Fortsetzen)?;
        self.laeuft.store(true, Ordering::Release);
        Ok(())
    }

    fn laeuft(&self) -> bool {
        self.laeuft.load(Ordering::Acquire) && !self.geschlossen.load(Ordering::Acquire)
    }

    fn schliessen(&self) -> AudioResult<()> {
        let ergebnis = self.befehl_senden(BefehlArt::Beenden);
        self.geschlossen.store(true, Ordering::Release);
        *self.ausstehend.lock() = None;
        ergebnis
    }
}

impl Drop for CpalAusgabe {
    fn drop(&mut self) {
        if !self.geschlossen.swap(true, Ordering::AcqRel) {
            let (antwort, _) = bounded(1);
            let _ = self.befehle.send(Befehl {
                art: BefehlArt::Beenden,
                antwort,
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Audio-Thread
// ---------------------------------------------------------------------------

struct AudioThread {
    geraet: Option<String>,
    gain: GainKnoten,
    abspieler: Abspieler,
    rueck: HeapCons<Rueckmeldung>,
    ausstehend: Arc<Ausstehend>,
    befehle: Receiver<Befehl>,
    init: Sender<AudioResult<(u32, u16)>>,
}

fn ausgabe_thread(thread: AudioThread) {
    let AudioThread {
        geraet,
        gain,
        abspieler,
        mut rueck,
        ausstehend,
        befehle,
        init,
    } = thread;

    let stream = match stream_oeffnen(geraet.as_deref(), gain, abspieler) {
        Ok((stream, rate, kanaele)) => {
            let _ = init.send(Ok((rate, kanaele)));
            stream
        }
        Err(e) => {
            let _ = init.send(Err(e));
            return;
        }
    };

    loop {
        rueckmeldungen_verarbeiten(&mut rueck, &ausstehend);

        let befehl = match befehle.recv_timeout(RUECK_INTERVALL) {
            Ok(befehl) => befehl,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        let ergebnis = match befehl.art {
            BefehlArt::Anhalten => stream
                .pause()
                .map_err(|e| AudioError::StreamFehler(e.to_string())),
            BefehlArt::Fortsetzen => stream
                .play()
                .map_err(|e| AudioError::StreamFehler(e.to_string())),
            BefehlArt::Beenden => {
                let _ = befehl.antwort.send(Ok(()));
                break;
            }
        };
        let _ = befehl.antwort.send(ergebnis);
    }

    drop(stream);
    debug!("Audio-Thread beendet");
}

fn stream_oeffnen(
    geraet: Option<&str>,
    gain: GainKnoten,
    abspieler: Abspieler,
) -> AudioResult<(Stream, u32, u16)> {
    let device = ausgabegeraet_laden(geraet)?;
    let unterstuetzt = device
        .default_output_config()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    let rate = unterstuetzt.sample_rate().0;
    let kanaele = unterstuetzt.channels();
    let config: StreamConfig = unterstuetzt.config();

    let stream = match unterstuetzt.sample_format() {
        SampleFormat::F32 => stream_bauen::<f32>(&device, &config, gain, abspieler)?,
        SampleFormat::I16 => stream_bauen::<i16>(&device, &config, gain, abspieler)?,
        SampleFormat::U16 => stream_bauen::<u16>(&device, &config, gain, abspieler)?,
        format => {
            return Err(AudioError::StreamFehler(format!(
                "Nicht unterstuetztes Sample-Format: {format:?}"
            )))
        }
    };

    stream
        .play()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    debug!("Ausgabe-Stream geoeffnet: {}Hz {}ch", rate, kanaele);
    Ok((stream, rate, kanaele))
}

fn stream_bauen<T>(
    device: &Device,
    config: &StreamConfig,
    gain: GainKnoten,
    mut abspieler: Abspieler,
) -> AudioResult<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let kanaele = config.channels.max(1) as usize;

    device
        .build_output_stream(
            config,
            move |daten: &mut [T], _: &cpal::OutputCallbackInfo| {
                abspieler.fuellen(daten, kanaele, &gain);
            },
            |err| error!("Ausgabe-Stream-Fehler: {}", err),
            None,
        )
        .map_err(|e| AudioError::StreamFehler(e.to_string()))
}
