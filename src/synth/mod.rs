//! The synthesis engine.
//!
//! A [`Synthesizer`] owns any number of sources. Each call to
//! [`Synthesizer::synthesize`] runs one block through the pipeline:
//!
//! 1. every source pulls a frame from its producer, updates its
//!    spatialization and scans the harmonics it can be heard with;
//! 2. the partial lifecycle fades harmonics in and out and links them into
//!    the active-track table;
//! 3. the table is compacted and its audible tracks sorted by amplitude;
//! 4. the masking pass silences tracks hidden by louder neighbours;
//! 5. every active track is rendered into the stereo block.

mod oscillator;
mod partial;
mod source;
mod stats;
mod synthesizer;
mod tracks;

pub use oscillator::Rotor;
pub use source::{Position, SourceState};
pub use stats::Statistics;
pub use synthesizer::{Removal, SourceId, Synthesizer};
pub use tracks::{TrackRef, TrackTable};
