//! Fixed-size windowing of sample ranges.
//!
//! Extracted audio is always a whole number of non-overlapping windows. A
//! requested time range is rounded up to the next window multiple and, if it
//! runs past the end of the file, shifted left so the shape is preserved.

use crate::error::{CorpusError, Result};
use ndarray::Array2;
use std::ops::Range;

/// Sample range selected for a time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpan {
    pub start: usize,
    pub len: usize,
    pub window_size: usize,
}

impl WindowSpan {
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    /// Number of windows (rows) covered by the span.
    pub fn frames(&self) -> usize {
        self.len / self.window_size
    }
}

/// Map `[start_sec, stop_sec)` onto a window-aligned sample range.
///
/// `start = floor(start_sec * rate)`, `len = ceil(duration * rate / window) * window`.
/// When `start + len` exceeds `total`, the span is moved to end at `total`.
///
/// # Errors
/// `AudioTooShort` when `len` exceeds `total`, `ConfigInvalidValue` for a
/// zero window size.
pub fn window_span(
    start_sec: f64,
    stop_sec: f64,
    sample_rate: u32,
    window_size: usize,
    total: usize,
) -> Result<WindowSpan> {
    if window_size == 0 {
        return Err(CorpusError::ConfigInvalidValue {
            key: "window_size".to_string(),
            message: "must be at least 1".to_string(),
        });
    }

    let rate = f64::from(sample_rate);
    let duration = (stop_sec - start_sec).max(0.0);
    // Stays in f64 until the window count is known to fit in the file.
    let windows = (duration * rate / window_size as f64).ceil();
    if windows > (total / window_size) as f64 {
        return Err(CorpusError::AudioTooShort {
            required: (windows * window_size as f64) as usize,
            available: total,
        });
    }
    let len = windows as usize * window_size;

    // Anything starting after `total - len` is moved to end at `total`.
    let start = ((start_sec.max(0.0) * rate).floor() as usize).min(total - len);

    Ok(WindowSpan {
        start,
        len,
        window_size,
    })
}

/// Smallest power of two holding `duration_secs` of audio at `sample_rate`.
///
/// 10ms at 16kHz (160 samples) gives 256.
pub fn window_size_for_duration(duration_secs: f64, sample_rate: u32) -> usize {
    let samples = (duration_secs * f64::from(sample_rate)) as usize;
    samples.max(1).next_power_of_two()
}

/// Drop trailing samples that do not fill a window and reshape to rows.
pub fn truncate_to_windows<T>(mut samples: Vec<T>, window_size: usize) -> Result<Array2<T>> {
    if window_size == 0 {
        return Err(CorpusError::ConfigInvalidValue {
            key: "window_size".to_string(),
            message: "must be at least 1".to_string(),
        });
    }
    let frames = samples.len() / window_size;
    samples.truncate(frames * window_size);
    into_frames(samples, window_size)
}

/// Reshape a sample vector whose length is a window multiple into `(n, window)`.
pub(crate) fn into_frames<T>(samples: Vec<T>, window_size: usize) -> Result<Array2<T>> {
    let frames = samples.len() / window_size;
    Array2::from_shape_vec((frames, window_size), samples)
        .map_err(|e| CorpusError::Other(format!("Failed to shape audio frames: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_second_at_16khz_rounds_up_to_63_windows() {
        let span = window_span(0.0, 1.0, 16000, 256, 32000).unwrap();
        assert_eq!(span.start, 0);
        assert_eq!(span.len, 16128);
        assert_eq!(span.frames(), 63);
    }

    #[test]
    fn start_is_floored() {
        let span = window_span(0.50001, 0.6, 16000, 256, 32000).unwrap();
        assert_eq!(span.start, 8000);
        assert_eq!(span.len % 256, 0);
    }

    #[test]
    fn span_past_end_is_shifted_left() {
        // 1.9s..2.0s asks for 1600 samples -> 7 windows (1792), ending past 32000
        let span = window_span(1.9, 2.0, 16000, 256, 32000).unwrap();
        assert_eq!(span.len, 1792);
        assert_eq!(span.end(), 32000);
        assert_eq!(span.start, 32000 - 1792);
    }

    #[test]
    fn start_past_end_is_shifted_left() {
        let span = window_span(5.0, 5.01, 16000, 256, 16000).unwrap();
        assert_eq!(span.len, 256);
        assert_eq!(span.range(), 15744..16000);
    }

    #[test]
    fn window_longer_than_audio_is_an_error() {
        let err = window_span(0.0, 1.0, 16000, 256, 1000).unwrap_err();
        match err {
            CorpusError::AudioTooShort {
                required,
                available,
            } => {
                assert_eq!(required, 16128);
                assert_eq!(available, 1000);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn huge_stop_time_is_too_short_not_overflow() {
        let err = window_span(0.0, 1e30, 16000, 256, 32000).unwrap_err();
        match err {
            CorpusError::AudioTooShort {
                required,
                available,
            } => {
                assert_eq!(required, usize::MAX);
                assert_eq!(available, 32000);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn huge_start_time_is_shifted_to_end() {
        // 0.25s -> 4000 samples -> 16 windows of 256
        let span = window_span(2e15, 2e15 + 0.25, 16000, 256, 16000).unwrap();
        assert_eq!(span.len, 4096);
        assert_eq!(span.range(), 11904..16000);
        assert_eq!(span.frames(), 16);
    }

    #[test]
    fn window_exactly_filling_audio_fits() {
        let span = window_span(0.0, 1.0, 16000, 256, 16128).unwrap();
        assert_eq!(span.range(), 0..16128);
    }

    #[test]
    fn empty_interval_gives_empty_span() {
        let span = window_span(1.0, 1.0, 16000, 256, 32000).unwrap();
        assert_eq!(span.len, 0);
        assert_eq!(span.frames(), 0);
    }

    #[test]
    fn zero_window_is_rejected() {
        assert!(window_span(0.0, 1.0, 16000, 0, 32000).is_err());
    }

    #[test]
    fn window_size_is_next_power_of_two() {
        assert_eq!(window_size_for_duration(0.01, 16000), 256);
        assert_eq!(window_size_for_duration(0.016, 16000), 256);
        assert_eq!(window_size_for_duration(0.02, 16000), 512);
        assert_eq!(window_size_for_duration(0.0, 16000), 1);
    }

    #[test]
    fn truncate_drops_partial_window() {
        let frames = truncate_to_windows((0u16..10).collect(), 4).unwrap();
        assert_eq!(frames.dim(), (2, 4));
        assert_eq!(frames[[1, 3]], 7);
    }

    #[test]
    fn truncate_keeps_exact_multiple_whole() {
        let frames = truncate_to_windows(vec![0u16; 8], 4).unwrap();
        assert_eq!(frames.dim(), (2, 4));
    }
}
