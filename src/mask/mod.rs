//! Psychoacoustic masking.
//!
//! Tracks are offered to a [`Masker`] from loudest to quietest. Each one is
//! compared with the masking curve built by its louder neighbours on the Bark
//! axis: a lower-frequency masker spreads upwards with a -15 dB/Bark slope and
//! a higher-frequency one downwards with 27 dB/Bark, both kept 10 dB below
//! the masker's quieter channel. A track whose louder channel does not clear
//! that curve is inaudible.

mod index;
mod perceptual;

pub use index::{MAX_LEVEL, MaskIndex};
pub use perceptual::{MAX_BARK, MIN_BARK, MaskEntry, amplitude_to_db, bark};

use rand::rngs::StdRng;

use crate::config::MIN_DB;

/// Slope (dB/Bark) of the mask below a masker.
pub const LOWER_SLOPE: f64 = 27.0;

/// Slope (dB/Bark) of the mask above a masker.
pub const UPPER_SLOPE: f64 = -15.0;

/// Gap between a masker's level and its masking curve.
pub const GUARD_DB: f64 = 10.0;

/// Incremental masking model over one block's audible tracks.
#[derive(Debug)]
pub struct Masker {
    index: MaskIndex,
}

impl Masker {
    /// Creates a masker able to take `capacity` tracks per pass.
    pub fn new(capacity: usize, rng: StdRng) -> Self {
        Self {
            index: MaskIndex::new(capacity, rng),
        }
    }

    /// Starts a new pass.
    pub fn reset(&mut self) {
        self.index.reset();
    }

    /// Adds a track to the mask and reports whether it is masked.
    ///
    /// Tracks must be offered by decreasing amplitude. A track that would not
    /// raise the current curve is not kept in the index.
    pub fn is_masked(&mut self, entry: MaskEntry) -> bool {
        self.index.insert(entry);

        let below = self
            .index
            .predecessor()
            .map_or(MIN_DB, |low| {
                UPPER_SLOPE * (entry.bark - low.bark) + low.min_db - GUARD_DB
            });
        let above = self
            .index
            .successor()
            .map_or(MIN_DB, |high| {
                LOWER_SLOPE * (entry.bark - high.bark) + high.min_db - GUARD_DB
            });
        let threshold = below.max(above);

        if entry.min_db - GUARD_DB < threshold {
            self.index.remove_current();
        }

        entry.max_db <= threshold
    }

    /// Entries currently shaping the mask.
    pub fn index(&self) -> &MaskIndex {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn masker() -> Masker {
        Masker::new(64, StdRng::seed_from_u64(1))
    }

    fn centered(frequency: f64, amplitude: f64) -> MaskEntry {
        MaskEntry::new(frequency, amplitude, 0.5, 0.5)
    }

    #[test]
    fn test_first_track_is_audible() {
        let mut m = masker();
        assert!(!m.is_masked(centered(1000.0, 0.5)));
        assert_eq!(m.index().len(), 1);
    }

    #[test]
    fn test_quiet_neighbour_is_masked() {
        let mut m = masker();
        assert!(!m.is_masked(centered(1000.0, 0.5)));
        // 60 dB quieter, a few Hz away.
        assert!(m.is_masked(centered(1010.0, 0.0005)));
        // Masked entries do not contribute to the curve.
        assert_eq!(m.index().len(), 1);
    }

    #[test]
    fn test_distant_track_is_audible() {
        let mut m = masker();
        assert!(!m.is_masked(centered(100.0, 0.5)));
        assert!(!m.is_masked(centered(15000.0, 0.05)));
        assert_eq!(m.index().len(), 2);
    }

    #[test]
    fn test_lower_frequency_masked_by_steeper_slope() {
        let mut m = masker();
        m.is_masked(centered(2000.0, 0.5));
        // 1 Bark below: curve at -12 - 27 - 10 = -49 dB.
        assert!(m.is_masked(centered(bark_to_hz(12.0), 0.005)));
        assert!(!m.is_masked(centered(bark_to_hz(12.0), 0.05)));
    }

    #[test]
    fn test_same_frequency_quieter_is_masked() {
        let mut m = masker();
        assert!(!m.is_masked(centered(1000.0, 1.0)));
        // 40 dB down at the same frequency: curve at -6 - 10 dB.
        assert!(m.is_masked(centered(1000.0, 0.01)));
        assert_eq!(m.index().len(), 1);
    }

    #[test]
    fn test_same_frequency_tie_is_audible() {
        let mut m = masker();
        assert!(!m.is_masked(centered(1000.0, 0.5)));
        assert!(!m.is_masked(centered(1000.0, 0.5)));
        // Sitting exactly on the curve's guard gap, the second entry stays.
        assert_eq!(m.index().len(), 2);
        assert!(m.is_masked(centered(1000.0, 0.05)));
    }

    #[test]
    fn test_reset() {
        let mut m = masker();
        m.is_masked(centered(1000.0, 0.5));
        m.reset();
        assert!(m.index().is_empty());
        assert!(!m.is_masked(centered(1010.0, 0.0005)));
    }

    fn bark_to_hz(b: f64) -> f64 {
        1000.0 * 2f64.powf((b - 9.0) / 4.0)
    }
}
