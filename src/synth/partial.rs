use super::oscillator::Rotor;

/// One harmonic of a source.
///
/// `amplitude` and `frequency` are the targets computed by the latest scan.
/// The histories hold the last four targets pushed by the lifecycle; a block
/// is rendered between `history[1]` and `history[2]`, the outer points only
/// shape the interpolation.
///
/// `state` counts blocks since birth (positive) or since death (negative).
/// `link` is the partial's slot in the synthesizer's active-track table.
#[derive(Debug, Clone)]
pub struct Partial {
    pub amplitude: f64,
    pub frequency: f64,
    pub amplitudes: [f64; 4],
    pub frequencies: [f64; 4],
    pub rotor: Rotor,
    pub state: i32,
    pub link: Option<usize>,
}

impl Partial {
    pub fn new() -> Self {
        Self {
            amplitude: 0.0,
            frequency: 440.0,
            amplitudes: [0.0; 4],
            frequencies: [440.0; 4],
            rotor: Rotor::default(),
            state: 0,
            link: None,
        }
    }

    /// Pushes the current targets into both histories.
    pub fn push_targets(&mut self) {
        self.push(self.amplitude, self.frequency);
    }

    /// Pushes a point into both histories, dropping the oldest.
    pub fn push(&mut self, amplitude: f64, frequency: f64) {
        shift(&mut self.amplitudes, amplitude);
        shift(&mut self.frequencies, frequency);
    }

    /// Prepares a partial entering the active-track table.
    ///
    /// The amplitude before the fade-in is extrapolated, the frequency is held
    /// constant and the oscillator restarts at `phase`.
    pub fn seed(&mut self, phase: f64) {
        self.amplitudes[0] = 2.0 * self.amplitudes[1] - self.amplitudes[2];
        self.frequencies = [self.frequency; 4];
        self.rotor = Rotor::from_phase(phase);
    }

    /// Amplitude expected after a dying partial's last pushed point.
    pub fn extrapolated_amplitude(&self) -> f64 {
        2.0 * self.amplitudes[3] - self.amplitudes[2]
    }

    /// Forces the newest amplitude point to silence.
    pub fn mute_latest(&mut self) {
        self.amplitudes[3] = 0.0;
    }
}

impl Default for Partial {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn shift(history: &mut [f64; 4], value: f64) {
    history.copy_within(1.., 0);
    history[3] = value;
}
