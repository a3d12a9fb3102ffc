//! Fehlertypen fuer die Playback-Pipeline

use thiserror::Error;

/// Alle moeglichen Fehler der Playback-Pipeline
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio-Geraet nicht gefunden: {0}")]
    GeraetNichtGefunden(String),

    #[error("Kein Standard-Ausgabegeraet verfuegbar")]
    KeinStandardAusgabegeraet,

    #[error("Stream-Fehler: {0}")]
    StreamFehler(String),

    /// Ausgabe-Graph wurde noch nicht (erfolgreich) erstellt
    #[error("Pipeline nicht initialisiert")]
    PipelineNichtInitialisiert,

    #[error("Ausgabe bereits geschlossen")]
    AusgabeGeschlossen,

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

pub type AudioResult<T> = Result<T, AudioError>;
