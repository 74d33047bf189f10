//! sas-synth - Structured Additive Synthesis for Rust
//!
//! Sounds are described as a stream of frames, one per block of 512 samples.
//! A frame carries an overall amplitude, a fundamental frequency, a color
//! envelope (relative amplitude of each harmonic) and a warp envelope
//! (where each harmonic actually sounds). The [`Synthesizer`] places every
//! source in 3D space, drops the harmonics nobody can hear and renders the
//! rest as stereo sinusoids.
//!
//! # Examples
//!
//! ```
//! use sas_synth::{Block, Envelope, Position, StaticProducer, SynthConfig, Synthesizer};
//!
//! let mut synth = Synthesizer::new(SynthConfig::default().with_seed(1)).unwrap();
//!
//! let mut frame = synth.new_frame();
//! frame.set_amplitude(0.3);
//! frame.set_frequency(220.0);
//! frame.set_color(Envelope::make(220.0, &[1.0, 0.5, 0.25]).unwrap().for_color());
//!
//! synth.add_source(Position::new(1.0, 1.0, 0.0), StaticProducer::new(frame, Position::default()));
//!
//! let mut block: Block = [0.0; sas_synth::BLOCK_LEN];
//! for _ in 0..4 {
//!     synth.synthesize(&mut block);
//! }
//! assert_eq!(synth.statistics().active_tracks, 3);
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod interpolation;
pub mod mask;
pub mod producer;
pub mod spectral;
pub mod synth;

// Re-export commonly used types at the crate root
pub use config::{
    BLOCK_LEN, BLOCK_RATE, Block, MAX_AUDIBLE_FREQUENCY, SAMPLES_PER_BLOCK, SAMPLING_RATE,
    SynthConfig,
};
pub use envelope::{BoundaryPolicy, DefaultEnvelopes, Envelope, EnvelopeRef, RawEnvelope};
pub use error::{Result, SynthError};
pub use frame::Frame;
pub use producer::{FramePlayer, FrameProducer, StaticHandle, StaticProducer};
pub use spectral::{FrameSource, PartialTrack, SpectralFrames};
pub use synth::{Position, Removal, SourceId, SourceState, Statistics, Synthesizer};
