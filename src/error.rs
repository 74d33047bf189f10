//! Error types for the synthesis engine.
//!
//! Only recoverable conditions are errors. Broken internal invariants (an adult
//! partial without an active-track slot, an exhausted mask pool) abort with a
//! panic after being logged.

use thiserror::Error;

use crate::synth::SourceId;

/// Errors returned by envelope construction, configuration and the host API.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthError {
    #[error("envelope base frequency must be positive and finite, got {0}")]
    InvalidEnvelopeBase(f64),

    #[error("envelope needs at least one control point")]
    EmptyEnvelope,

    #[error("invalid configuration for `{field}`: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },

    #[error("frame {index} out of range (source has {count} frames)")]
    FrameOutOfRange { index: usize, count: usize },

    #[error("spectral data contains no partial tracks")]
    EmptySpectrum,

    #[error("partial track has {frequencies} frequencies but {amplitudes} amplitudes")]
    MismatchedTrack { frequencies: usize, amplitudes: usize },

    #[error("unknown source {0}")]
    UnknownSource(SourceId),

    #[error("source {0} is already waiting for its partials to fade out")]
    RemovalPending(SourceId),
}

impl SynthError {
    pub(crate) fn invalid_config(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidConfig { field, reason }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, SynthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = SynthError::invalid_config("max_tracks", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "invalid configuration for `max_tracks`: must be at least 1"
        );

        let err = SynthError::FrameOutOfRange { index: 4, count: 3 };
        assert_eq!(err.to_string(), "frame 4 out of range (source has 3 frames)");
    }
}
