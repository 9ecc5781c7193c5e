//! Default constants for sphcorpus.
//!
//! Shared by the header parser, the transcript parser and the configuration
//! types so the documented defaults live in one place.

/// Size of the textual header that prefixes every SPHERE file, in bytes.
pub const HEADER_SIZE: usize = 1024;

/// Line that terminates the header fields.
pub const HEADER_END: &str = "end_head";

/// Sample rate assumed when a header omits `sample_rate`.
pub const HEADER_SAMPLE_RATE: u32 = 8000;

/// Channel count assumed when a header omits `channel_count`.
pub const HEADER_CHANNEL_COUNT: u16 = 1;

/// Byte format assumed when a header omits `sample_byte_format`.
///
/// `01` is little-endian; any other token is treated as big-endian.
pub const LITTLE_ENDIAN_BYTE_FORMAT: &str = "01";

/// Byte format token written for big-endian output.
pub const BIG_ENDIAN_BYTE_FORMAT: &str = "10";

/// Byte width of one sample when a header omits `sample_n_bytes`.
pub const HEADER_SAMPLE_BYTES: u16 = 2;

/// Significant bits per sample when a header omits `sample_sig_bits`.
pub const HEADER_SIGNIFICANT_BITS: u16 = 16;

/// Sample coding assumed when a header omits `sample_coding`.
pub const HEADER_CODING: &str = "pcm";

/// Sample rate of the TED-LIUM recordings, used to derive the window size.
pub const CORPUS_SAMPLE_RATE: u32 = 16000;

/// Default window duration in seconds.
///
/// 10ms at 16kHz is 160 samples, rounded up to a 256-sample window.
pub const WINDOW_DURATION: f64 = 0.01;

/// Default stride over the flattened corpus stream (keep every record).
pub const SKIP_COUNT: usize = 1;

/// Speaker id that marks a gap between scored segments.
pub const IGNORED_SPEAKER: &str = "inter_segment_gap";

/// Transcript text that marks a segment excluded from scoring.
pub const IGNORED_TRANSCRIPT: &str = "ignore_time_segment_in_scoring";

/// Name of the corpus directory under the platform data directory.
pub const CORPUS_DIR_NAME: &str = "TEDLIUM_release2";

/// Default number of workers for the parallel header probe.
pub const PROBE_WORKERS: usize = 4;
