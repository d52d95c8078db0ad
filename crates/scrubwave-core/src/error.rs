//! Error types for the waveform pipeline
//!
//! `OpenError` is fatal to loading a file, `DecodeError` fails a single
//! render, and `PipelineError` is what the coordinator reports. Errors are
//! `Clone` because one failure is delivered both to the reply channel and to
//! the failure callback.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised while opening an audio asset
#[derive(Error, Debug, Clone)]
pub enum OpenError {
    #[error("Failed to open audio file: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("Unsupported audio format: {0}")]
    Unsupported(String),

    #[error("No decodable audio track found")]
    NoAudioTrack,

    #[error("Audio stream does not report its length")]
    UnknownLength,

    #[error("Corrupt audio header: {0}")]
    Corrupt(String),
}

/// Errors raised while reading decoded samples
#[derive(Error, Debug, Clone)]
pub enum DecodeError {
    #[error("IO error during decode: {0}")]
    Io(#[source] Arc<std::io::Error>),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Stream ended early: expected {expected} samples, decoded {decoded}")]
    Truncated { expected: u64, decoded: u64 },

    #[error("Audio source is closed")]
    Closed,

    #[error("Decode cancelled")]
    Cancelled,
}

impl From<std::io::Error> for DecodeError {
    fn from(e: std::io::Error) -> Self {
        DecodeError::Io(Arc::new(e))
    }
}

/// Errors reported by the render pipeline
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Decode(DecodeError),

    /// The request was superseded. Expected, not a failure to show users.
    #[error("Render superseded by a newer request")]
    Cancelled,

    #[error("No audio loaded")]
    NotReady,

    #[error("Render worker disconnected")]
    Disconnected,
}

impl PipelineError {
    /// True for superseded work, which callers must not report as a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            PipelineError::Cancelled | PipelineError::Decode(DecodeError::Cancelled)
        )
    }
}

impl From<DecodeError> for PipelineError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::Cancelled => PipelineError::Cancelled,
            other => PipelineError::Decode(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_decode_maps_to_cancelled() {
        let err: PipelineError = DecodeError::Cancelled.into();
        assert!(matches!(err, PipelineError::Cancelled));
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_real_failures_are_not_cancellations() {
        let err: PipelineError = DecodeError::Truncated { expected: 10, decoded: 4 }.into();
        assert!(!err.is_cancelled());
        assert_eq!(
            err.to_string(),
            "Stream ended early: expected 10 samples, decoded 4"
        );
        assert!(!PipelineError::from(OpenError::NoAudioTrack).is_cancelled());
    }
}
