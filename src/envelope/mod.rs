//! Shared, cubic-interpolated spectral curves.
//!
//! An [`Envelope`] maps a frequency to a value. It is used both as a color
//! (harmonic amplitude as a function of frequency) and as a warp (where each
//! harmonic frequency actually lands). Control point `k` sits at frequency
//! `base * (k + 1)`; values between points are Catmull-Rom interpolated and
//! anything below zero is clamped to zero.
//!
//! Construction is two-phase: [`Envelope::make`] copies the control points into
//! a [`RawEnvelope`], which must be finished with either
//! [`for_color`](RawEnvelope::for_color) or [`for_warp`](RawEnvelope::for_warp).
//! The boundary policy picks the padded values outside the control points, so
//! an envelope can only be evaluated once exactly one policy has been applied.
//!
//! Finished envelopes are immutable and handed out as [`EnvelopeRef`]s, cheap
//! reference-counted handles. Frames and source histories share envelopes; the
//! curve is reclaimed when its last handle is dropped.

mod defaults;

pub use defaults::DefaultEnvelopes;

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use tracing::trace;

use crate::error::{Result, SynthError};
use crate::interpolation::cubic;

/// Padding on each side of the control points.
const PAD: usize = 2;

/// Boundary policy applied to a freshly made envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryPolicy {
    /// Falls to zero at the origin and past the last control point.
    Color,
    /// Zero at the origin and linear extrapolation past the last control point.
    Warp,
}

/// An immutable interpolated curve over a linear frequency axis.
pub struct Envelope {
    base: f64,
    size: usize,
    /// `size` control points plus [`PAD`] boundary values on each side.
    data: Vec<f64>,
    policy: BoundaryPolicy,
    pinned: bool,
}

impl Envelope {
    /// Copies `points` into a new envelope with control-point spacing `base`.
    ///
    /// # Errors
    ///
    /// Fails when `base` is not a positive finite number or `points` is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use sas_synth::Envelope;
    ///
    /// let color = Envelope::make(100.0, &[1.0, 0.5, 0.25]).unwrap().for_color();
    /// assert_eq!(color.value_at(200.0), 0.5);
    /// ```
    pub fn make(base: f64, points: &[f64]) -> Result<RawEnvelope> {
        if !(base.is_finite() && base > 0.0) {
            return Err(SynthError::InvalidEnvelopeBase(base));
        }
        if points.is_empty() {
            return Err(SynthError::EmptyEnvelope);
        }

        Ok(RawEnvelope::from_points(base, points))
    }

    /// Evaluates the curve at `frequency`.
    ///
    /// Returns 0 for non-positive (or NaN) frequencies and for frequencies
    /// beyond one spacing past the last control point.
    pub fn value_at(&self, frequency: f64) -> f64 {
        if !(frequency > 0.0) {
            return 0.0;
        }

        let t = frequency / self.base;
        let i = t as usize;
        if i > self.size {
            return 0.0;
        }

        // data[i] is d[i - 2] once the padding offset is applied.
        let d = &self.data;
        cubic(&[d[i], d[i + 1], d[i + 2], d[i + 3]], t - i as f64).max(0.0)
    }

    /// Spacing between control points.
    pub fn base(&self) -> f64 {
        self.base
    }

    /// Number of control points.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The control points, without boundary padding.
    pub fn points(&self) -> &[f64] {
        &self.data[PAD..PAD + self.size]
    }

    pub fn policy(&self) -> BoundaryPolicy {
        self.policy
    }

    /// Whether this is one of the registry defaults.
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("base", &self.base)
            .field("size", &self.size)
            .field("policy", &self.policy)
            .field("pinned", &self.pinned)
            .finish()
    }
}

impl Drop for Envelope {
    fn drop(&mut self) {
        trace!(size = self.size, base = self.base, "envelope reclaimed");
    }
}

/// Envelope data waiting for its boundary policy.
#[derive(Debug, Clone)]
pub struct RawEnvelope {
    base: f64,
    size: usize,
    data: Vec<f64>,
    pinned: bool,
}

impl RawEnvelope {
    fn from_points(base: f64, points: &[f64]) -> Self {
        let size = points.len();
        let mut data = vec![0.0; size + 2 * PAD];
        data[PAD..PAD + size].copy_from_slice(points);
        Self {
            base,
            size,
            data,
            pinned: false,
        }
    }

    /// Finishes the envelope as a harmonic-amplitude curve.
    pub fn for_color(self) -> EnvelopeRef {
        self.finish(BoundaryPolicy::Color)
    }

    /// Finishes the envelope as a frequency-warping curve.
    pub fn for_warp(self) -> EnvelopeRef {
        self.finish(BoundaryPolicy::Warp)
    }

    /// Finishes the envelope with an explicit policy.
    pub fn finish(mut self, policy: BoundaryPolicy) -> EnvelopeRef {
        let n = self.size;
        // Index k of the padded buffer holds d[k - PAD].
        let d0 = self.data[PAD];
        self.data[0] = -d0;
        self.data[1] = 0.0;
        match policy {
            BoundaryPolicy::Color => {
                self.data[n + PAD] = 0.0;
                self.data[n + PAD + 1] = -self.data[n + PAD - 1];
            }
            BoundaryPolicy::Warp => {
                // Small envelopes read d[n - 2] and d[n - 3] from the left
                // padding, so it must already be set.
                let last = self.data[n + PAD - 1];
                self.data[n + PAD] = 2.0 * last - self.data[n + PAD - 2];
                self.data[n + PAD + 1] = 2.0 * last - self.data[n + PAD - 3];
            }
        }

        EnvelopeRef(Rc::new(Envelope {
            base: self.base,
            size: self.size,
            data: self.data,
            policy,
            pinned: self.pinned,
        }))
    }

    pub(crate) fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }
}

/// A shared handle to an immutable [`Envelope`].
///
/// Cloning keeps the envelope alive; dropping the last handle reclaims it.
#[derive(Clone)]
pub struct EnvelopeRef(Rc<Envelope>);

impl EnvelopeRef {
    /// Number of live handles to this envelope.
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Whether both handles refer to the same envelope.
    pub fn ptr_eq(&self, other: &EnvelopeRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Resamples `f` over the standard grid into a new envelope.
    pub(crate) fn resample<F>(base: f64, size: usize, policy: BoundaryPolicy, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        let points: Vec<f64> = (0..size).map(|i| f(base * (i + 1) as f64)).collect();
        RawEnvelope::from_points(base, &points).finish(policy)
    }
}

impl Deref for EnvelopeRef {
    type Target = Envelope;

    fn deref(&self) -> &Envelope {
        &self.0
    }
}

impl fmt::Debug for EnvelopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EnvelopeRef").field(&*self.0).finish()
    }
}
