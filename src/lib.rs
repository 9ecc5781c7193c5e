//! sphcorpus - NIST SPHERE speech corpus ingestion
//!
//! Reads SPHERE audio and STM transcripts, aligns each transcript segment
//! with its window-framed audio, and streams the aligned records of a
//! train/valid/test corpus.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod corpus;
pub mod defaults;
pub mod error;
pub mod speech;
pub mod transcript;

// Audio
pub use audio::{AudioReader, SphereFormat, WindowSpan, load_wav_frames};

// Transcripts and alignment
pub use speech::{AlignedSegment, SegmentRef, Speech, SpeechId, SpeechSegments};
pub use transcript::{TranscriptParser, TranscriptSegment};

// Corpus
pub use corpus::{
    Corpus, CorpusOptions, CorpusSplit, CorpusStream, FrameBatcher, FrameStream, SplitKind,
    StreamStats, TranscriptStream,
};

// Error handling
pub use error::{CorpusError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
