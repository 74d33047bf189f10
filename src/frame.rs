//! Spectral frames.
//!
//! A [`Frame`] is one block's worth of description of a harmonic sound: an
//! overall amplitude, a fundamental frequency, a color envelope giving the
//! relative amplitude of each harmonic, and a warp envelope moving each
//! harmonic away from its exact multiple of the fundamental.

use crate::config::{MIN_FREQUENCY, STD_ENVELOPE_BASE, STD_ENVELOPE_SIZE};
use crate::envelope::{BoundaryPolicy, DefaultEnvelopes, EnvelopeRef};

/// Geometric interpolation `a^(1-x) * b^x`.
#[inline]
fn morph_value(a: f64, b: f64, x: f64) -> f64 {
    a.powf(1.0 - x) * b.powf(x)
}

/// Amplitude, frequency, color and warp of a sound for one block.
///
/// # Examples
///
/// ```
/// use sas_synth::{DefaultEnvelopes, Envelope, Frame};
///
/// let defaults = DefaultEnvelopes::new();
/// let mut frame = Frame::new(&defaults);
/// frame.set_amplitude(0.5);
/// frame.set_frequency(220.0);
/// frame.set_color(Envelope::make(220.0, &[1.0, 0.5, 0.25]).unwrap().for_color());
///
/// assert_eq!(frame.frequency(), 220.0);
/// assert_eq!(frame.color().value_at(440.0), 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct Frame {
    amplitude: f64,
    frequency: f64,
    color: EnvelopeRef,
    warp: EnvelopeRef,
}

impl Frame {
    /// Creates a silent 440 Hz frame with a flat color and the identity warp.
    pub fn new(defaults: &DefaultEnvelopes) -> Self {
        Self {
            amplitude: 0.0,
            frequency: 440.0,
            color: defaults.flat_color().clone(),
            warp: defaults.identity_warp().clone(),
        }
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    /// Sets the amplitude. Negative values (and NaN) become 0.
    pub fn set_amplitude(&mut self, amplitude: f64) {
        self.amplitude = if amplitude > 0.0 { amplitude } else { 0.0 };
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Sets the fundamental frequency. Non-positive values (and NaN) become 1 Hz.
    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = if frequency > 0.0 {
            frequency
        } else {
            MIN_FREQUENCY
        };
    }

    pub fn color(&self) -> &EnvelopeRef {
        &self.color
    }

    /// Replaces the color, releasing the previous envelope.
    pub fn set_color(&mut self, color: EnvelopeRef) {
        self.color = color;
    }

    pub fn warp(&self) -> &EnvelopeRef {
        &self.warp
    }

    /// Replaces the warp, releasing the previous envelope.
    pub fn set_warp(&mut self, warp: EnvelopeRef) {
        self.warp = warp;
    }

    /// Copies `src` into this frame, sharing its envelopes.
    pub fn copy_from(&mut self, src: &Frame) {
        self.amplitude = src.amplitude;
        self.frequency = src.frequency;
        if !self.color.ptr_eq(&src.color) {
            self.color = src.color.clone();
        }
        if !self.warp.ptr_eq(&src.warp) {
            self.warp = src.warp.clone();
        }
    }

    /// Sets this frame to a geometric blend of `a` and `b`.
    ///
    /// `coeff` is clamped to `[0, 1]`; 0 reproduces `a` and 1 reproduces `b`.
    /// Amplitude and frequency follow `a^(1-c) * b^c`. Color and warp are
    /// blended the same way pointwise on the standard 512-point grid and
    /// rebuilt as new envelopes.
    pub fn morph(&mut self, a: &Frame, b: &Frame, coeff: f64) {
        let c = if coeff.is_nan() {
            0.0
        } else {
            coeff.clamp(0.0, 1.0)
        };

        self.amplitude = morph_value(a.amplitude, b.amplitude, c);
        self.frequency = morph_value(a.frequency, b.frequency, c);

        self.color = EnvelopeRef::resample(
            STD_ENVELOPE_BASE,
            STD_ENVELOPE_SIZE,
            BoundaryPolicy::Color,
            |f| morph_value(a.color.value_at(f), b.color.value_at(f), c),
        );
        self.warp = EnvelopeRef::resample(
            STD_ENVELOPE_BASE,
            STD_ENVELOPE_SIZE,
            BoundaryPolicy::Warp,
            |f| morph_value(a.warp.value_at(f), b.warp.value_at(f), c),
        );
    }

    /// Sets this frame to `src` with its color multiplied by `filter`'s color.
    ///
    /// Amplitude, frequency and warp come from `src` unchanged.
    pub fn filter(&mut self, src: &Frame, filter: &Frame) {
        self.amplitude = src.amplitude;
        self.frequency = src.frequency;
        self.color = EnvelopeRef::resample(
            STD_ENVELOPE_BASE,
            STD_ENVELOPE_SIZE,
            BoundaryPolicy::Color,
            |f| src.color.value_at(f) * filter.color.value_at(f),
        );
        self.warp = src.warp.clone();
    }
}
