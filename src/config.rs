//! Engine constants and construction-time configuration.
//!
//! The audio format (sampling rate, block length, interpolation steps) is fixed
//! for the whole crate. Capacities and spatialization parameters live in
//! [`SynthConfig`] and are frozen when a [`Synthesizer`](crate::Synthesizer) is
//! built; nothing grows afterwards.

use crate::error::{Result, SynthError};

/// Output sampling rate in Hz.
pub const SAMPLING_RATE: f64 = 44100.0;

/// Highest representable frequency (Nyquist).
pub const MAX_AUDIBLE_FREQUENCY: f64 = SAMPLING_RATE / 2.0;

/// Samples computed per channel by one call to `synthesize`.
pub const SAMPLES_PER_BLOCK: usize = 512;

/// Length of an interleaved stereo block.
pub const BLOCK_LEN: usize = 2 * SAMPLES_PER_BLOCK;

/// Interleaved stereo output buffer (`L, R, L, R, ...`).
pub type Block = [f64; BLOCK_LEN];

/// Number of amplitude/frequency interpolation points inside a block.
pub const INTERPOLATION_STEPS: usize = 8;

/// Samples rendered between two interpolation points.
pub const STEP_SAMPLES: usize = SAMPLES_PER_BLOCK / INTERPOLATION_STEPS;

/// Blocks per second.
pub const BLOCK_RATE: f64 = SAMPLING_RATE / SAMPLES_PER_BLOCK as f64;

/// Minimum audible amplitude (-100 dB).
pub const MIN_AMPLITUDE: f64 = 1e-5;

/// Level assigned to anything at or below [`MIN_AMPLITUDE`].
pub const MIN_DB: f64 = -100.0;

/// Number of points of the standard envelope grid used by morphing and filtering.
pub const STD_ENVELOPE_SIZE: usize = 512;

/// Frequency step of the standard envelope grid.
pub const STD_ENVELOPE_BASE: f64 = MAX_AUDIBLE_FREQUENCY / STD_ENVELOPE_SIZE as f64;

/// Frequency substituted for non-positive input frequencies.
pub const MIN_FREQUENCY: f64 = 1.0;

/// Construction-time parameters of a synthesizer.
///
/// # Examples
///
/// ```
/// use sas_synth::SynthConfig;
///
/// let config = SynthConfig::default()
///     .with_max_tracks(256)
///     .with_seed(7);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.max_propagated_frames(), 492);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SynthConfig {
    /// Harmonic slots per source.
    pub max_partials_per_source: usize,
    /// Capacity of the global active-track array (and of the mask pool).
    pub max_tracks: usize,
    /// Distance in meters beyond which a source is silent.
    pub max_propagation_distance: f64,
    /// Speed of sound in m/s.
    pub sound_speed: f64,
    /// First-order smoothing coefficient for pan and Doppler.
    pub smoothing: f64,
    /// Seed for oscillator phases and skip-list levels. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            max_partials_per_source: 1024,
            max_tracks: 1024 * 5,
            max_propagation_distance: 2000.0,
            sound_speed: 350.0,
            smoothing: 0.05,
            seed: None,
        }
    }
}

impl SynthConfig {
    /// Sets the number of harmonic slots per source.
    pub fn with_max_partials_per_source(mut self, partials: usize) -> Self {
        self.max_partials_per_source = partials;
        self
    }

    /// Sets the capacity of the active-track array.
    pub fn with_max_tracks(mut self, tracks: usize) -> Self {
        self.max_tracks = tracks;
        self
    }

    /// Sets the maximum propagation distance in meters.
    pub fn with_max_propagation_distance(mut self, meters: f64) -> Self {
        self.max_propagation_distance = meters;
        self
    }

    /// Sets the speed of sound in m/s.
    pub fn with_sound_speed(mut self, speed: f64) -> Self {
        self.sound_speed = speed;
        self
    }

    /// Sets the pan/Doppler smoothing coefficient.
    pub fn with_smoothing(mut self, alpha: f64) -> Self {
        self.smoothing = alpha;
        self
    }

    /// Makes random phases and skip-list levels reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Length of each source's propagated-frame history.
    ///
    /// This is the number of blocks sound needs to travel the maximum
    /// propagation distance, and at least 1.
    pub fn max_propagated_frames(&self) -> usize {
        let frames = (self.max_propagation_distance / self.sound_speed) * BLOCK_RATE;
        (frames as usize).max(1)
    }

    /// Checks that every parameter is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_partials_per_source == 0 {
            return Err(SynthError::invalid_config(
                "max_partials_per_source",
                "must be at least 1",
            ));
        }
        if self.max_tracks == 0 {
            return Err(SynthError::invalid_config("max_tracks", "must be at least 1"));
        }
        if !(self.max_propagation_distance.is_finite() && self.max_propagation_distance > 0.0) {
            return Err(SynthError::invalid_config(
                "max_propagation_distance",
                "must be positive and finite",
            ));
        }
        if !(self.sound_speed.is_finite() && self.sound_speed > 0.0) {
            return Err(SynthError::invalid_config(
                "sound_speed",
                "must be positive and finite",
            ));
        }
        if !(self.smoothing > 0.0 && self.smoothing <= 1.0) {
            return Err(SynthError::invalid_config("smoothing", "must be in (0, 1]"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SynthConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_history_length() {
        // 2000 m at 350 m/s is ~5.71 s, i.e. 492 blocks of 512 samples.
        assert_eq!(SynthConfig::default().max_propagated_frames(), 492);
    }

    #[test]
    fn test_history_never_empty() {
        let config = SynthConfig::default().with_max_propagation_distance(0.01);
        assert_eq!(config.max_propagated_frames(), 1);
    }

    #[test]
    fn test_builder() {
        let config = SynthConfig::default()
            .with_max_partials_per_source(16)
            .with_max_tracks(32)
            .with_sound_speed(340.0)
            .with_smoothing(0.5)
            .with_seed(3);
        assert_eq!(config.max_partials_per_source, 16);
        assert_eq!(config.max_tracks, 32);
        assert_eq!(config.sound_speed, 340.0);
        assert_eq!(config.smoothing, 0.5);
        assert_eq!(config.seed, Some(3));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(SynthConfig::default().with_max_tracks(0).validate().is_err());
        assert!(
            SynthConfig::default()
                .with_max_partials_per_source(0)
                .validate()
                .is_err()
        );
        assert!(SynthConfig::default().with_sound_speed(0.0).validate().is_err());
        assert!(SynthConfig::default().with_smoothing(0.0).validate().is_err());
        assert!(SynthConfig::default().with_smoothing(1.5).validate().is_err());
        assert!(
            SynthConfig::default()
                .with_max_propagation_distance(f64::NAN)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_block_layout() {
        assert_eq!(STEP_SAMPLES * INTERPOLATION_STEPS, SAMPLES_PER_BLOCK);
        assert_eq!(BLOCK_LEN, 1024);
    }
}
