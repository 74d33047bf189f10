//! Cubic (Catmull-Rom) interpolation kernel.
//!
//! The same kernel interpolates envelope control points along frequency and the
//! 4-point amplitude/frequency histories of a partial along time.

use crate::config::INTERPOLATION_STEPS;

/// Catmull-Rom weights for the four points `p[-1], p[0], p[1], p[2]` at
/// fractional position `t` between `p[0]` and `p[1]`.
///
/// # Examples
///
/// ```
/// use sas_synth::interpolation::cubic_weights;
///
/// assert_eq!(cubic_weights(0.0), [0.0, 1.0, 0.0, 0.0]);
/// assert_eq!(cubic_weights(1.0), [0.0, 0.0, 1.0, 0.0]);
/// ```
#[inline]
pub fn cubic_weights(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        0.5 * (-t + 2.0 * t2 - t3),
        0.5 * (2.0 - 5.0 * t2 + 3.0 * t3),
        0.5 * (t + 4.0 * t2 - 3.0 * t3),
        0.5 * (-t2 + t3),
    ]
}

/// Interpolates between `points[1]` and `points[2]`.
#[inline]
pub fn cubic(points: &[f64; 4], t: f64) -> f64 {
    let w = cubic_weights(t);
    w[0] * points[0] + w[1] * points[1] + w[2] * points[2] + w[3] * points[3]
}

/// Kernel weights precomputed for every interpolation step boundary of a block.
#[derive(Debug, Clone)]
pub struct StepKernel {
    weights: [[f64; 4]; INTERPOLATION_STEPS + 1],
}

impl StepKernel {
    pub fn new() -> Self {
        Self {
            weights: std::array::from_fn(|step| {
                cubic_weights(step as f64 / INTERPOLATION_STEPS as f64)
            }),
        }
    }

    /// Expands a 4-point history into the values at each step boundary.
    ///
    /// The first value equals `history[1]` and the last `history[2]`.
    pub fn expand(&self, history: &[f64; 4]) -> [f64; INTERPOLATION_STEPS + 1] {
        let mut out = [0.0; INTERPOLATION_STEPS + 1];
        out[0] = history[1];
        out[INTERPOLATION_STEPS] = history[2];
        for (step, value) in out
            .iter_mut()
            .enumerate()
            .take(INTERPOLATION_STEPS)
            .skip(1)
        {
            let w = &self.weights[step];
            *value = w[0] * history[0]
                + w[1] * history[1]
                + w[2] * history[2]
                + w[3] * history[3];
        }
        out
    }
}

impl Default for StepKernel {
    fn default() -> Self {
        Self::new()
    }
}
