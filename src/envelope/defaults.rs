use super::{EnvelopeRef, RawEnvelope};
use crate::config::{MAX_AUDIBLE_FREQUENCY, STD_ENVELOPE_BASE, STD_ENVELOPE_SIZE};

/// The three pinned envelopes every synthesizer relies on.
///
/// Created once per [`Synthesizer`](crate::Synthesizer) and owned by it. The
/// registry holds a handle to each default, so they are never reclaimed while
/// it exists.
#[derive(Debug, Clone)]
pub struct DefaultEnvelopes {
    flat_color: EnvelopeRef,
    identity_warp: EnvelopeRef,
    audibility_threshold: EnvelopeRef,
}

impl DefaultEnvelopes {
    pub fn new() -> Self {
        let flat_color = pinned(MAX_AUDIBLE_FREQUENCY, &[0.0]).for_color();
        let identity_warp = pinned(MAX_AUDIBLE_FREQUENCY, &[MAX_AUDIBLE_FREQUENCY]).for_warp();

        let threshold: Vec<f64> = (0..STD_ENVELOPE_SIZE)
            .map(|i| threshold_in_quiet(STD_ENVELOPE_BASE * (i + 1) as f64))
            .collect();
        // Extrapolated linearly on the right like a warp.
        let audibility_threshold = pinned(STD_ENVELOPE_BASE, &threshold).for_warp();

        Self {
            flat_color,
            identity_warp,
            audibility_threshold,
        }
    }

    /// Color that is zero everywhere.
    pub fn flat_color(&self) -> &EnvelopeRef {
        &self.flat_color
    }

    /// Warp mapping every frequency to itself.
    pub fn identity_warp(&self) -> &EnvelopeRef {
        &self.identity_warp
    }

    /// Minimum audible amplitude as a function of frequency.
    pub fn audibility_threshold(&self) -> &EnvelopeRef {
        &self.audibility_threshold
    }
}

impl Default for DefaultEnvelopes {
    fn default() -> Self {
        Self::new()
    }
}

fn pinned(base: f64, points: &[f64]) -> RawEnvelope {
    RawEnvelope::from_points(base, points).pinned()
}

/// Absolute threshold of hearing (Terhardt), as a linear amplitude relative to
/// full scale.
fn threshold_in_quiet(frequency: f64) -> f64 {
    let x = 0.001 * frequency;
    let db = 3.64 * x.powf(-0.8) - 6.5 * (-0.6 * (x - 3.3).powi(2)).exp() + 0.001 * x.powi(4)
        - 119.3;
    10f64.powf(db * 0.05)
}
