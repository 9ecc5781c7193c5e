//! Whole-utterance WAV clips.
//!
//! Small corpora ship each utterance as its own 16-bit mono WAV file. These
//! are cut into whole windows by dropping the trailing partial window.

use crate::audio::header::SphereFormat;
use crate::audio::window::truncate_to_windows;
use crate::error::{CorpusError, Result};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Decoded samples of one WAV file.
#[derive(Debug, Clone, PartialEq)]
pub struct WavClip {
    pub sample_rate: u32,
    /// Raw 16-bit sample words, reinterpreted as unsigned like SPHERE samples.
    pub samples: Vec<u16>,
}

impl WavClip {
    /// Read a 16-bit mono WAV stream. `name` labels errors.
    pub fn from_reader<R: Read>(reader: R, name: &str) -> Result<Self> {
        let wav_error = |message: String| CorpusError::Wav {
            path: name.to_string(),
            message,
        };

        let mut wav_reader = hound::WavReader::new(reader)
            .map_err(|e| wav_error(format!("Failed to parse WAV header: {}", e)))?;

        let spec = wav_reader.spec();
        if spec.channels != 1 {
            return Err(wav_error(format!(
                "{} channels, only mono is supported",
                spec.channels
            )));
        }
        if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
            return Err(wav_error(format!(
                "{}-bit {:?} samples, only 16-bit integer PCM is supported",
                spec.bits_per_sample, spec.sample_format
            )));
        }

        let samples = wav_reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as u16))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| wav_error(format!("Failed to read WAV samples: {}", e)))?;

        Ok(Self {
            sample_rate: spec.sample_rate,
            samples,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), &path.display().to_string())
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    /// Cut into `(n, window_size)` rows, dropping the trailing partial window.
    pub fn into_frames(self, window_size: usize) -> Result<Array2<u16>> {
        truncate_to_windows(self.samples, window_size)
    }

    /// SPHERE format describing this clip as little-endian PCM.
    pub fn sphere_format(&self) -> SphereFormat {
        SphereFormat {
            sample_rate: self.sample_rate,
            ..SphereFormat::default()
        }
    }
}

/// Load a WAV file as whole windows.
pub fn load_wav_frames(path: impl AsRef<Path>, window_size: usize) -> Result<Array2<u16>> {
    WavClip::open(path)?.into_frames(window_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_wav_data(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn mono_clip_decodes_exactly() {
        let wav = make_wav_data(16000, 1, &[100, -1, 300]);
        let clip = WavClip::from_reader(Cursor::new(wav), "clip.wav").unwrap();

        assert_eq!(clip.sample_rate, 16000);
        assert_eq!(clip.samples, vec![100, 0xffff, 300]);
    }

    #[test]
    fn stereo_clip_is_rejected() {
        let wav = make_wav_data(16000, 2, &[1, 2, 3, 4]);
        let err = WavClip::from_reader(Cursor::new(wav), "stereo.wav").unwrap_err();
        assert!(err.to_string().contains("stereo.wav"));
        assert!(err.to_string().contains("mono"));
    }

    #[test]
    fn garbage_is_rejected() {
        let err = WavClip::from_reader(Cursor::new(b"not a wav".to_vec()), "x.wav").unwrap_err();
        assert!(matches!(err, CorpusError::Wav { .. }));
    }

    #[test]
    fn frames_drop_partial_window() {
        let samples: Vec<i16> = (0..1000).collect();
        let wav = make_wav_data(16000, 1, &samples);
        let clip = WavClip::from_reader(Cursor::new(wav), "clip.wav").unwrap();

        assert!((clip.duration_secs() - 0.0625).abs() < 1e-9);
        let frames = clip.into_frames(256).unwrap();
        assert_eq!(frames.dim(), (3, 256));
        assert_eq!(frames[[2, 255]], 767);
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yes0.wav");
        std::fs::write(&path, make_wav_data(16000, 1, &[0; 512])).unwrap();

        let frames = load_wav_frames(&path, 256).unwrap();
        assert_eq!(frames.dim(), (2, 256));
    }

    #[test]
    fn sphere_format_keeps_rate() {
        let clip = WavClip {
            sample_rate: 22050,
            samples: vec![],
        };
        let format = clip.sphere_format();
        assert_eq!(format.sample_rate, 22050);
        assert!(!format.big_endian());
    }
}
