//! Frame sources built from analysed partial tracks.
//!
//! Sinusoidal analysis yields partial tracks: a start frame and per-frame
//! frequency and amplitude arrays. [`SpectralFrames`] folds the tracks alive at
//! a given time into one harmonic [`Frame`], so analysed sounds can be played
//! through a [`FramePlayer`](crate::FramePlayer).

use tracing::warn;

use crate::config::MIN_FREQUENCY;
use crate::envelope::Envelope;
use crate::error::{Result, SynthError};
use crate::frame::Frame;

/// Random access to a sequence of frames.
///
/// Opening and closing the underlying data are construction and drop.
pub trait FrameSource {
    /// Number of frames available.
    fn frame_count(&self) -> usize;

    /// Writes frame `index` into `dest`.
    ///
    /// # Errors
    ///
    /// [`SynthError::FrameOutOfRange`] when `index >= frame_count()`, or any
    /// failure of the underlying data.
    fn frame_into(&self, index: usize, dest: &mut Frame) -> Result<()>;
}

/// Default cap on the number of harmonics of a spectral frame.
pub const MAX_HARMONICS: usize = 1024;

/// One analysed partial: frequency and amplitude per frame from `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialTrack {
    start: usize,
    frequencies: Vec<f64>,
    amplitudes: Vec<f64>,
}

impl PartialTrack {
    /// Builds a track, replacing non-positive frequencies with 1 Hz and
    /// negative amplitudes with 0.
    ///
    /// # Errors
    ///
    /// [`SynthError::MismatchedTrack`] if the arrays differ in length.
    pub fn new(start: usize, mut frequencies: Vec<f64>, mut amplitudes: Vec<f64>) -> Result<Self> {
        if frequencies.len() != amplitudes.len() {
            return Err(SynthError::MismatchedTrack {
                frequencies: frequencies.len(),
                amplitudes: amplitudes.len(),
            });
        }
        for f in &mut frequencies {
            if !(*f > 0.0) {
                *f = MIN_FREQUENCY;
            }
        }
        for a in &mut amplitudes {
            if !(*a >= 0.0) {
                *a = 0.0;
            }
        }
        Ok(Self {
            start,
            frequencies,
            amplitudes,
        })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last frame.
    pub fn end(&self) -> usize {
        self.start + self.frequencies.len()
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// `(frequency, amplitude)` at absolute frame `t`, if the track is alive.
    pub fn at(&self, t: usize) -> Option<(f64, f64)> {
        let i = t.checked_sub(self.start)?;
        Some((*self.frequencies.get(i)?, *self.amplitudes.get(i)?))
    }
}

/// Partial tracks rendered as harmonic frames.
///
/// Frame `n` describes absolute time `t_min + n`, where `t_min` is the
/// earliest track start.
///
/// # Examples
///
/// ```
/// use sas_synth::{DefaultEnvelopes, Frame, FrameSource, PartialTrack, SpectralFrames};
///
/// let tracks = vec![
///     PartialTrack::new(0, vec![200.0, 200.0], vec![0.4, 0.4]).unwrap(),
///     PartialTrack::new(0, vec![400.0, 400.0], vec![0.2, 0.2]).unwrap(),
/// ];
/// let spectrum = SpectralFrames::new(tracks).unwrap();
///
/// let mut frame = Frame::new(&DefaultEnvelopes::new());
/// spectrum.frame_into(0, &mut frame).unwrap();
/// assert_eq!(frame.frequency(), 200.0);
/// assert!((frame.amplitude() - 0.6).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct SpectralFrames {
    tracks: Vec<PartialTrack>,
    t_min: usize,
    t_max: usize,
    max_harmonics: usize,
}

impl SpectralFrames {
    /// # Errors
    ///
    /// [`SynthError::EmptySpectrum`] if `tracks` is empty.
    pub fn new(tracks: Vec<PartialTrack>) -> Result<Self> {
        let t_min = tracks
            .iter()
            .map(PartialTrack::start)
            .min()
            .ok_or(SynthError::EmptySpectrum)?;
        let t_max = tracks.iter().map(PartialTrack::end).max().unwrap_or(t_min);

        Ok(Self {
            tracks,
            t_min,
            t_max,
            max_harmonics: MAX_HARMONICS,
        })
    }

    /// Caps the number of harmonics per frame. Partials above the cap are
    /// ignored.
    pub fn with_max_harmonics(mut self, max_harmonics: usize) -> Self {
        self.max_harmonics = max_harmonics.max(1);
        self
    }

    pub fn tracks(&self) -> &[PartialTrack] {
        &self.tracks
    }

    /// First absolute frame covered.
    pub fn t_min(&self) -> usize {
        self.t_min
    }

    /// One past the last absolute frame covered.
    pub fn t_max(&self) -> usize {
        self.t_max
    }
}

impl FrameSource for SpectralFrames {
    fn frame_count(&self) -> usize {
        self.t_max - self.t_min
    }

    fn frame_into(&self, index: usize, dest: &mut Frame) -> Result<()> {
        let count = self.frame_count();
        if index >= count {
            return Err(SynthError::FrameOutOfRange { index, count });
        }
        let t = self.t_min + index;

        let mut f_min = f64::INFINITY;
        let mut f_max = 0.0f64;
        for (f, _) in self.tracks.iter().filter_map(|p| p.at(t)) {
            f_min = f_min.min(f);
            f_max = f_max.max(f);
        }
        if !f_min.is_finite() {
            // Nothing alive: a gap in the analysis plays as silence.
            dest.set_amplitude(0.0);
            return Ok(());
        }

        let mut harmonics = round_half_up(f_max / f_min).max(1);
        if harmonics > self.max_harmonics {
            warn!(
                frame = index,
                harmonics,
                max = self.max_harmonics,
                "too many harmonics in spectral frame, truncating"
            );
            harmonics = self.max_harmonics;
        }

        let mut amplitudes = vec![0.0; harmonics];
        let mut frequencies = vec![0.0; harmonics];
        let mut numbers = vec![0usize; harmonics];
        let mut frequency_sum = 0.0;
        let mut number_sum = 0usize;

        for (f, a) in self.tracks.iter().filter_map(|p| p.at(t)) {
            let number = round_half_up(f / f_min);
            let Some(h) = number.checked_sub(1).filter(|&h| h < harmonics) else {
                continue;
            };
            // On conflict the louder partial wins.
            if amplitudes[h] < a {
                frequency_sum += f - frequencies[h];
                number_sum = number_sum + number - numbers[h];
                amplitudes[h] = a;
                frequencies[h] = f;
                numbers[h] = number;
            }
        }

        let fundamental = if number_sum > 0 {
            frequency_sum / number_sum as f64
        } else {
            f_min
        };
        let amplitude: f64 = amplitudes.iter().sum();

        dest.set_amplitude(amplitude.min(1.0));
        dest.set_frequency(fundamental);
        dest.set_color(Envelope::make(fundamental, &amplitudes)?.for_color());
        Ok(())
    }
}

/// Rounds a positive ratio to the nearest integer, halves going up.
fn round_half_up(x: f64) -> usize {
    let whole = x.trunc();
    let n = if x - whole >= 0.5 { whole + 1.0 } else { whole };
    n as usize
}

/// Builds tracks from a dense amplitude matrix, one row per frame and one
/// column per harmonic of `fundamental`. Handy for synthetic spectra.
pub fn harmonic_tracks(fundamental: f64, rows: &[Vec<f64>]) -> Result<Vec<PartialTrack>> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    (0..columns)
        .map(|h| {
            let amplitudes: Vec<f64> = rows
                .iter()
                .map(|row| row.get(h).copied().unwrap_or(0.0))
                .collect();
            let frequencies = vec![fundamental * (h + 1) as f64; rows.len()];
            PartialTrack::new(0, frequencies, amplitudes)
        })
        .collect()
}
