//! earshot-audio – Playback-Pipeline eines Hoerers
//!
//! Vom Relay empfangene Frames laufen durch:
//! - Warteschlange (unbegrenzt, FIFO)
//! - Dekodierung 8-Bit -> f32 (`codec`)
//! - Resampling 8 kHz -> Geraete-Rate (`resampler`)
//! - Ausgabe-Planer: ersetzt den laufenden Puffer sofort (`scheduler`)
//! - Ausgabe: cpal-Geraet oder Null-Senke (`ausgabe`, `playback`)
//!
//! Lautstaerke wirkt ueber einen geteilten Gain-Knoten auf jede Quelle.

pub mod ausgabe;
pub mod codec;
pub mod device;
pub mod error;
pub mod pipeline;
pub mod playback;
pub mod resampler;
pub mod scheduler;
pub mod volume;
pub mod zustand;

pub use ausgabe::{AudioAusgabe, AusgabeFabrik, NullAusgabe, NullStatistik, QuellId, Quelle};
pub use codec::{dekodieren, TELEFONIE_ABTASTRATE};
pub use device::{ausgabegeraet_laden, ausgabegeraete_auflisten, AudioGeraet};
pub use error::{AudioError, AudioResult};
pub use pipeline::{PipelineKonfig, PlaybackPipeline};
pub use playback::CpalAusgabe;
pub use resampler::{resamplen, ResampleMethode};
pub use scheduler::AusgabePlaner;
pub use volume::GainKnoten;
pub use zustand::{PipelineZustand, Zustandsautomat};
