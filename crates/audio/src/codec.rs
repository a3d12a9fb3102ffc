//! Dekodierung der Telefonie-Frames
//!
//! Jedes Byte wird um den Nullpunkt 128 zentriert und normalisiert:
//! `s = (b - 128) / 128`. Das ist eine lineare Naeherung, keine echte
//! G.711-Expansion; der Wertebereich ist [-1.0, 0.9921875].

/// Abtastrate der Telefonie-Strecke (schmalbandig, mono)
pub const TELEFONIE_ABTASTRATE: u32 = 8000;

const NULLPUNKT: f32 = 128.0;

/// Dekodiert einen Frame in f32-Samples
pub fn dekodieren(frame: &[u8]) -> Vec<f32> {
    frame.iter().map(|&b| byte_zu_sample(b)).collect()
}

#[inline]
fn byte_zu_sample(b: u8) -> f32 {
    (b as f32 - NULLPUNKT) / NULLPUNKT
}
