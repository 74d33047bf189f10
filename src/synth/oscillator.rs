use std::f64::consts::TAU;

use crate::config::SAMPLING_RATE;

/// Sinusoidal oscillator state as a unit vector rotated once per sample.
///
/// The output is the imaginary part. Rotating by `e^{iω}` costs four
/// multiplications per sample and keeps the phase continuous when the
/// frequency changes between steps.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotor {
    re: f64,
    im: f64,
}

impl Rotor {
    /// Starts at `phase` radians.
    pub fn from_phase(phase: f64) -> Self {
        let (im, re) = phase.sin_cos();
        Self { re, im }
    }

    /// Current output sample.
    pub fn value(&self) -> f64 {
        self.im
    }

    /// Current phase in `(-π, π]`.
    #[cfg(test)]
    pub(crate) fn phase(&self) -> f64 {
        self.im.atan2(self.re)
    }

    /// Adds `out.len() / 2` stereo samples into the interleaved `out`.
    ///
    /// The amplitude ramps linearly from `from` towards `to` across the run,
    /// scaled by the channel gains `left` and `right`.
    pub fn render(
        &mut self,
        frequency: f64,
        from: f64,
        to: f64,
        left: f64,
        right: f64,
        out: &mut [f64],
    ) {
        let samples = out.len() / 2;
        let (sin_w, cos_w) = omega(frequency).sin_cos();

        let step = (to - from) / samples as f64;
        let mut l = left * from;
        let mut r = right * from;
        let l_step = left * step;
        let r_step = right * step;

        let (mut re, mut im) = (self.re, self.im);
        for frame in out.chunks_exact_mut(2) {
            frame[0] += l * im;
            frame[1] += r * im;
            l += l_step;
            r += r_step;

            let prev = re;
            re = prev * cos_w - im * sin_w;
            im = prev * sin_w + im * cos_w;
        }
        self.re = re;
        self.im = im;
    }

    /// Advances the phase by `samples` without producing output.
    pub fn skip(&mut self, frequency: f64, samples: usize) {
        let (sin_w, cos_w) = (omega(frequency) * samples as f64).sin_cos();
        let prev = self.re;
        self.re = prev * cos_w - self.im * sin_w;
        self.im = prev * sin_w + self.im * cos_w;
    }
}

#[inline]
fn omega(frequency: f64) -> f64 {
    TAU * frequency / SAMPLING_RATE
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_render_matches_sine() {
        let phase = 0.3;
        let frequency = 1000.0;
        let mut rotor = Rotor::from_phase(phase);
        let mut out = vec![0.0; 2 * 512];
        rotor.render(frequency, 1.0, 1.0, 0.25, 0.75, &mut out);

        for n in 0..512 {
            let expected = (phase + omega(frequency) * n as f64).sin();
            assert!((out[2 * n] - 0.25 * expected).abs() < EPSILON);
            assert!((out[2 * n + 1] - 0.75 * expected).abs() < EPSILON);
        }
    }

    #[test]
    fn test_render_accumulates() {
        let mut out = vec![1.0; 8];
        let mut rotor = Rotor::from_phase(std::f64::consts::FRAC_PI_2);
        rotor.render(0.0, 0.5, 0.5, 1.0, 1.0, &mut out);
        for v in out {
            assert!((v - 1.5).abs() < EPSILON);
        }
    }

    #[test]
    fn test_amplitude_ramp() {
        let mut out = vec![0.0; 2 * 4];
        let mut rotor = Rotor::from_phase(std::f64::consts::FRAC_PI_2);
        rotor.render(0.0, 0.0, 1.0, 1.0, 1.0, &mut out);
        let left: Vec<f64> = out.iter().step_by(2).copied().collect();
        assert!((left[0] - 0.0).abs() < EPSILON);
        assert!((left[1] - 0.25).abs() < EPSILON);
        assert!((left[3] - 0.75).abs() < EPSILON);
    }

    #[test]
    fn test_skip_matches_render_phase() {
        let mut rendered = Rotor::from_phase(1.0);
        let mut skipped = rendered;
        let mut scratch = vec![0.0; 2 * 64];
        rendered.render(440.0, 0.0, 0.0, 1.0, 1.0, &mut scratch);
        skipped.skip(440.0, 64);
        assert!((rendered.value() - skipped.value()).abs() < 1e-9);
        assert!((rendered.phase() - skipped.phase()).abs() < 1e-9);
    }
}
