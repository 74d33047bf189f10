//! Perceptual scales used by the masking model.

use crate::config::{MIN_AMPLITUDE, MIN_DB};

/// Lowest value of the Bark scale.
pub const MIN_BARK: f64 = 0.2;

/// Highest value of the Bark scale (at the Nyquist frequency).
pub const MAX_BARK: f64 = 27.0;

/// Converts a frequency in Hz to Bark.
///
/// Linear up to 500 Hz, logarithmic above.
pub fn bark(frequency: f64) -> f64 {
    if frequency <= 0.0 {
        MIN_BARK
    } else if frequency <= 500.0 {
        frequency * 0.01
    } else {
        9.0 + 4.0 * (frequency * 0.001).log2()
    }
}

/// Converts a linear amplitude to dB, floored at [`MIN_DB`].
pub fn amplitude_to_db(amplitude: f64) -> f64 {
    if amplitude <= MIN_AMPLITUDE {
        MIN_DB
    } else {
        20.0 * amplitude.log10()
    }
}

/// A track's contribution to the mask.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MaskEntry {
    /// Frequency in Bark.
    pub bark: f64,
    /// Quieter of the two channel levels, in dB.
    pub min_db: f64,
    /// Louder of the two channel levels, in dB.
    pub max_db: f64,
}

impl MaskEntry {
    /// Builds the entry of a partial heard through the given channel gains.
    pub fn new(frequency: f64, amplitude: f64, left: f64, right: f64) -> Self {
        let l = amplitude_to_db(amplitude * left);
        let r = amplitude_to_db(amplitude * right);
        Self {
            bark: bark(frequency),
            min_db: l.min(r),
            max_db: l.max(r),
        }
    }
}
