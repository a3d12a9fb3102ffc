//! WebSocket-Verbindung eines Hoerers zum Relay
//!
//! Der Empfangs-Task reicht jede Binaernachricht unveraendert an die
//! Playback-Pipeline weiter. Textnachrichten werden ignoriert. Ereignisse
//! (Verbindung, Wiedergabe, Fehler) laufen ueber einen broadcast-Kanal.
//!
//! Pipeline-Aufrufe die auf den Audio-Thread warten (Aufbau, Umschalten,
//! Abbau) laufen ueber `spawn_blocking`, damit sie keinen Runtime-Worker
//! belegen.

use bytes::Bytes;
use earshot_audio::{
    AusgabeFabrik, CpalAusgabe, NullAusgabe, PipelineKonfig, PlaybackPipeline,
    TELEFONIE_ABTASTRATE,
};
use earshot_core::event::{Benachrichtigung, HoererEreignis};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::config::HoererKonfig;
use crate::error::{HoererFehler, HoererResult};

/// Kapazitaet des Ereignis-Kanals
const EREIGNIS_KAPAZITAET: usize = 128;

/// Wie lange `deaktivieren` auf den Empfangs-Task wartet
const SCHLIESS_TIMEOUT: Duration = Duration::from_secs(2);

/// Momentaufnahme des Client-Zustands
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoererStatus {
    pub verbunden: bool,
    pub spielt: bool,
    pub letzter_fehler: Option<Benachrichtigung>,
}

struct ClientInner {
    pipeline: Arc<PlaybackPipeline>,
    ereignisse: broadcast::Sender<HoererEreignis>,
    verbunden: AtomicBool,
    letzter_fehler: Arc<Mutex<Option<Benachrichtigung>>>,
    deaktiviert: AtomicBool,
    schliessen: Mutex<Option<oneshot::Sender<()>>>,
    empfang: Mutex<Option<JoinHandle<()>>>,
}

/// Hoerer-Client: ein Transport, eine Pipeline
pub struct HoererClient {
    inner: Arc<ClientInner>,
}

impl HoererClient {
    /// Verbindet mit dem Relay und spielt auf dem konfigurierten Ausgang
    pub async fn verbinden(konfig: HoererKonfig) -> HoererResult<Self> {
        let fabrik: Box<dyn AusgabeFabrik> = if konfig.ohne_geraet {
            Box::new(NullAusgabe::fabrik(TELEFONIE_ABTASTRATE, true))
        } else {
            Box::new(CpalAusgabe::fabrik(konfig.geraet.clone()))
        };
        Self::verbinden_mit_fabrik(konfig, fabrik).await
    }

    /// Wie [`HoererClient::verbinden`], mit eigener Ausgabe-Fabrik
    pub async fn verbinden_mit_fabrik(
        konfig: HoererKonfig,
        fabrik: Box<dyn AusgabeFabrik>,
    ) -> HoererResult<Self> {
        let url = konfig.verbindungs_url()?;

        let (ereignisse, _) = broadcast::channel(EREIGNIS_KAPAZITAET);
        let letzter_fehler = Arc::new(Mutex::new(None));
        fehler_beobachten(ereignisse.subscribe(), Arc::clone(&letzter_fehler));

        let pipeline_konfig = PipelineKonfig {
            methode: konfig.resampling,
            lautstaerke: konfig.lautstaerke,
        };
        let pipeline_ereignisse = ereignisse.clone();
        let pipeline = Arc::new(
            blockierend(move || PlaybackPipeline::neu(fabrik, pipeline_konfig, pipeline_ereignisse))
                .await??,
        );

        tracing::info!(url = %url, call_id = %konfig.call_id, "Verbinde mit Relay");
        let ws = match connect_async(url.as_str()).await {
            Ok((ws, _)) => ws,
            Err(e) => {
                let fehler = HoererFehler::from(e);
                let _ = ereignisse.send(HoererEreignis::Fehler(Benachrichtigung::transport(
                    fehler.to_string(),
                )));
                match blockierend(move || pipeline.abbauen()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::debug!(fehler = %e, "Pipeline-Abbau nach Verbindungsfehler")
                    }
                    Err(e) => tracing::warn!(fehler = %e, "Pipeline-Abbau abgebrochen"),
                }
                return Err(fehler);
            }
        };

        let (schliessen_tx, schliessen_rx) = oneshot::channel();
        let inner = Arc::new(ClientInner {
            pipeline,
            ereignisse,
            verbunden: AtomicBool::new(true),
            letzter_fehler,
            deaktiviert: AtomicBool::new(false),
            schliessen: Mutex::new(Some(schliessen_tx)),
            empfang: Mutex::new(None),
        });

        tracing::info!(call_id = %konfig.call_id, "Mit Relay verbunden");
        let _ = inner.ereignisse.send(HoererEreignis::Verbunden);

        let handle = tokio::spawn(empfangen(Arc::clone(&inner), ws, schliessen_rx));
        *inner.empfang.lock() = Some(handle);

        Ok(Self { inner })
    }

    /// Empfaenger fuer alle Ereignisse ab jetzt
    pub fn ereignisse(&self) -> broadcast::Receiver<HoererEreignis> {
        self.inner.ereignisse.subscribe()
    }

    /// Setzt die Lautstaerke; gibt den begrenzten Wert zurueck
    pub fn lautstaerke_setzen(&self, pegel: f32) -> f32 {
        self.inner.pipeline.lautstaerke_setzen(pegel)
    }

    pub fn lautstaerke(&self) -> f32 {
        self.inner.pipeline.lautstaerke()
    }

    /// Haelt die Wiedergabe an oder setzt sie fort
    ///
    /// Gibt zurueck ob die Wiedergabe danach laeuft.
    pub async fn wiedergabe_umschalten(&self) -> HoererResult<bool> {
        if self.inner.deaktiviert.load(Ordering::Acquire) {
            return Err(HoererFehler::Deaktiviert);
        }
        let pipeline = Arc::clone(&self.inner.pipeline);
        Ok(blockierend(move || pipeline.wiedergabe_umschalten()).await??)
    }

    pub fn status(&self) -> HoererStatus {
        HoererStatus {
            verbunden: self.inner.verbunden.load(Ordering::Acquire),
            spielt: self.inner.pipeline.spielt(),
            letzter_fehler: self.inner.letzter_fehler.lock().clone(),
        }
    }

    /// Schliesst den Transport und baut die Pipeline ab
    ///
    /// Idempotent. Alle Schritte laufen auch wenn ein frueherer scheitert.
    pub async fn deaktivieren(&self) -> HoererResult<()> {
        if self.inner.deaktiviert.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if let Some(tx) = self.inner.schliessen.lock().take() {
            let _ = tx.send(());
        }
        let handle = self.inner.empfang.lock().take();
        if let Some(handle) = handle {
            match tokio::time::timeout(SCHLIESS_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(fehler = %e, "Empfangs-Task abgebrochen"),
                Err(_) => tracing::warn!("Empfangs-Task hat nicht rechtzeitig beendet"),
            }
        }

        let pipeline = Arc::clone(&self.inner.pipeline);
        let ergebnis = blockierend(move || pipeline.abbauen()).await?;
        tracing::info!("Hoerer deaktiviert");
        Ok(ergebnis?)
    }
}

impl Drop for HoererClient {
    fn drop(&mut self) {
        // Empfangs-Task beenden falls nicht deaktiviert wurde
        if let Some(tx) = self.inner.schliessen.lock().take() {
            let _ = tx.send(());
        }
    }
}

async fn empfangen<S>(
    inner: Arc<ClientInner>,
    ws: tokio_tungstenite::WebSocketStream<S>,
    mut schliessen: oneshot::Receiver<()>,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sender, mut empfaenger) = ws.split();

    loop {
        tokio::select! {
            nachricht = empfaenger.next() => match nachricht {
                Some(Ok(Message::Binary(daten))) => {
                    inner.pipeline.frame_empfangen(Bytes::from(daten));
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("Relay hat die Verbindung geschlossen");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(fehler = %e, "Transportfehler");
                    let _ = inner.ereignisse.send(HoererEreignis::Fehler(
                        Benachrichtigung::transport(e.to_string()),
                    ));
                    break;
                }
            },
            _ = &mut schliessen => {
                if let Err(e) = sender.send(Message::Close(None)).await {
                    tracing::debug!(fehler = %e, "Close-Frame konnte nicht gesendet werden");
                }
                break;
            }
        }
    }

    if inner.verbunden.swap(false, Ordering::AcqRel) {
        let _ = inner.ereignisse.send(HoererEreignis::Getrennt);
    }
}

/// Fuehrt einen blockierenden Pipeline-Aufruf auf dem Blocking-Pool aus
async fn blockierend<T, F>(f: F) -> HoererResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await?)
}

/// Merkt sich die letzte Fehler-Benachrichtigung fuer `status()`
fn fehler_beobachten(
    mut rx: broadcast::Receiver<HoererEreignis>,
    ablage: Arc<Mutex<Option<Benachrichtigung>>>,
) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(HoererEreignis::Fehler(b)) => *ablage.lock() = Some(b),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!(verpasst = n, "Fehler-Beobachter hinkt hinterher");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
