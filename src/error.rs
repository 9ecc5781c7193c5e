//! Error types for sphcorpus.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorpusError {
    // Audio file errors
    #[error("Invalid audio header in {path}: {message}")]
    InvalidHeader { path: String, message: String },

    #[error("Unsupported audio format in {path}: {message}")]
    UnsupportedFormat { path: String, message: String },

    #[error("Audio too short for requested window: need {required} samples, have {available}")]
    AudioTooShort { required: usize, available: usize },

    #[error("Audio reader closed: {path}")]
    ReaderClosed { path: String },

    #[error("Failed to read WAV file {path}: {message}")]
    Wav { path: String, message: String },

    // Transcript errors
    #[error("Transcript not found at {path}")]
    TranscriptNotFound { path: String },

    #[error(
        "Out-of-order segment on line {line} of {path}: start {start} precedes {previous}"
    )]
    OutOfOrderSegment {
        path: String,
        line: usize,
        start: f64,
        previous: f64,
    },

    // Corpus layout errors
    #[error("Corpus directory not found: {path}")]
    CorpusDirNotFound { path: String },

    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl CorpusError {
    /// True for errors that only invalidate the current segment, not its file.
    pub fn is_segment_local(&self) -> bool {
        matches!(
            self,
            CorpusError::AudioTooShort { .. } | CorpusError::OutOfOrderSegment { .. }
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, CorpusError>;
