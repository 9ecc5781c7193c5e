//! Time-addressable sample access for one SPHERE file.
//!
//! The header is parsed when the reader is opened; the sample bytes are
//! memory-mapped on first access and released by [`AudioReader::close`] or
//! when the reader is dropped.

use crate::audio::header::{SphereFormat, read_header};
use crate::audio::window::{WindowSpan, into_frames, window_span};
use crate::defaults::HEADER_SIZE;
use crate::error::{CorpusError, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use memmap2::Mmap;
use ndarray::Array2;
use std::borrow::Cow;
use std::fs::File;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Backing storage for the samples of one file.
enum SampleBuffer {
    /// Header parsed, samples not mapped yet.
    Unmapped,
    Mapped(Mmap),
    /// Whole file held in memory (header included).
    Owned(Vec<u8>),
    Closed,
}

/// Reader over the samples of one SPHERE file.
pub struct AudioReader {
    path: PathBuf,
    format: SphereFormat,
    buffer: SampleBuffer,
}

impl AudioReader {
    /// Open `path`, parse its header and check the format is mono 16-bit PCM.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let format = read_header(&mut file, &path.display().to_string())?;
        Self::with_format(path, format)
    }

    /// Build a reader from an already parsed header.
    pub fn with_format(path: impl AsRef<Path>, format: SphereFormat) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        format.ensure_pcm16_mono(&path.display().to_string())?;
        Ok(Self {
            path,
            format,
            buffer: SampleBuffer::Unmapped,
        })
    }

    /// Build a reader over an in-memory file image (header included).
    pub fn from_bytes(name: impl AsRef<Path>, bytes: Vec<u8>) -> Result<Self> {
        let name = name.as_ref();
        let format = read_header(&mut bytes.as_slice(), &name.display().to_string())?;
        let mut reader = Self::with_format(name, format)?;
        reader.buffer = SampleBuffer::Owned(bytes);
        Ok(reader)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> &SphereFormat {
        &self.format
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.buffer, SampleBuffer::Closed)
    }

    /// Whether the sample bytes are mapped or held in memory right now.
    pub fn is_loaded(&self) -> bool {
        matches!(
            self.buffer,
            SampleBuffer::Mapped(_) | SampleBuffer::Owned(_)
        )
    }

    /// True when the file's byte order differs from the host's.
    ///
    /// Only matters to consumers of raw bytes; decoded samples are always
    /// host values.
    pub fn needs_byteswap(&self) -> bool {
        self.format.big_endian() != cfg!(target_endian = "big")
    }

    /// Zero-copy view of every sample after the header.
    pub fn audio_array(&mut self) -> Result<SampleView<'_>> {
        let big_endian = self.format.big_endian();
        let bytes = self.sample_bytes()?;
        Ok(SampleView { bytes, big_endian })
    }

    /// Total number of samples in the file.
    pub fn sample_count(&mut self) -> Result<usize> {
        Ok(self.audio_array()?.len())
    }

    /// Samples of `[start_sec, stop_sec)` shaped `(frames, window_size)`.
    ///
    /// See [`window_span`] for rounding and end-of-file shifting.
    pub fn audio_segment(
        &mut self,
        start_sec: f64,
        stop_sec: f64,
        window_size: usize,
    ) -> Result<Array2<u16>> {
        let sample_rate = self.format.sample_rate;
        let view = self.audio_array()?;
        let span = window_span(start_sec, stop_sec, sample_rate, window_size, view.len())?;
        into_frames(view.to_vec(span.range()), window_size)
    }

    /// Window span `audio_segment` would extract, without copying samples.
    pub fn segment_span(
        &mut self,
        start_sec: f64,
        stop_sec: f64,
        window_size: usize,
    ) -> Result<WindowSpan> {
        let sample_rate = self.format.sample_rate;
        let total = self.sample_count()?;
        window_span(start_sec, stop_sec, sample_rate, window_size, total)
    }

    /// Raw bytes of a sample range in host byte order.
    ///
    /// Borrowed straight from the buffer unless a byte swap is needed.
    pub fn native_bytes(&mut self, range: Range<usize>) -> Result<Cow<'_, [u8]>> {
        let swap = self.needs_byteswap();
        let view = self.audio_array()?;
        let bytes = view.byte_range(range)?;
        if !swap {
            return Ok(Cow::Borrowed(bytes));
        }
        let swapped = bytes
            .chunks_exact(2)
            .flat_map(|pair| [pair[1], pair[0]])
            .collect();
        Ok(Cow::Owned(swapped))
    }

    /// Release the sample buffer. Calling it again is a no-op.
    pub fn close(&mut self) {
        if !self.is_closed() {
            log::debug!("Closing audio reader for {}", self.path.display());
        }
        self.buffer = SampleBuffer::Closed;
    }

    fn sample_bytes(&mut self) -> Result<&[u8]> {
        if let SampleBuffer::Unmapped = self.buffer {
            log::debug!("Mapping samples of {}", self.path.display());
            let file = File::open(&self.path)?;
            // SAFETY: the mapping is read-only and corpus files are not
            // modified while a reader is open.
            let mmap = unsafe { Mmap::map(&file)? };
            if mmap.len() < HEADER_SIZE {
                return Err(CorpusError::InvalidHeader {
                    path: self.path.display().to_string(),
                    message: format!("file is shorter than the {}-byte header", HEADER_SIZE),
                });
            }
            self.buffer = SampleBuffer::Mapped(mmap);
        }

        match &self.buffer {
            SampleBuffer::Mapped(mmap) => Ok(&mmap[HEADER_SIZE..]),
            SampleBuffer::Owned(bytes) => Ok(&bytes[HEADER_SIZE..]),
            SampleBuffer::Closed | SampleBuffer::Unmapped => Err(CorpusError::ReaderClosed {
                path: self.path.display().to_string(),
            }),
        }
    }
}

impl Drop for AudioReader {
    fn drop(&mut self) {
        self.close();
    }
}

/// Borrowed view of 16-bit samples in a declared byte order.
#[derive(Debug, Clone, Copy)]
pub struct SampleView<'a> {
    bytes: &'a [u8],
    big_endian: bool,
}

impl<'a> SampleView<'a> {
    pub fn len(&self) -> usize {
        self.bytes.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<u16> {
        let offset = index.checked_mul(2)?;
        let pair = self.bytes.get(offset..offset.checked_add(2)?)?;
        Some(self.decode(pair))
    }

    /// Decode a range of samples into host values.
    pub fn to_vec(&self, range: Range<usize>) -> Vec<u16> {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        let mut out = vec![0u16; end - start];
        let bytes = &self.bytes[start * 2..end * 2];
        if self.big_endian {
            BigEndian::read_u16_into(bytes, &mut out);
        } else {
            LittleEndian::read_u16_into(bytes, &mut out);
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + 'a {
        let big_endian = self.big_endian;
        self.bytes.chunks_exact(2).map(move |pair| {
            if big_endian {
                BigEndian::read_u16(pair)
            } else {
                LittleEndian::read_u16(pair)
            }
        })
    }

    fn byte_range(&self, range: Range<usize>) -> Result<&'a [u8]> {
        if range.start > range.end || range.end > self.len() {
            return Err(CorpusError::AudioTooShort {
                required: range.end,
                available: self.len(),
            });
        }
        Ok(&self.bytes[range.start * 2..range.end * 2])
    }

    fn decode(&self, pair: &[u8]) -> u16 {
        if self.big_endian {
            BigEndian::read_u16(pair)
        } else {
            LittleEndian::read_u16(pair)
        }
    }
}

/// Whether `path` is currently memory-mapped by this process.
#[cfg(all(test, target_os = "linux"))]
pub(crate) fn is_mapped(path: &Path) -> bool {
    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let path = path.to_string_lossy();
    std::fs::read_to_string("/proc/self/maps")
        .unwrap_or_default()
        .lines()
        .any(|line| line.ends_with(path.as_ref()))
}
