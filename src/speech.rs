//! Alignment of one audio file with its transcript.
//!
//! A [`Speech`] names an audio file and its transcript. Iterating it with
//! [`Speech::segments`] opens the transcript, maps the audio on the first
//! accepted segment and closes it again once the transcript is exhausted or
//! the iterator is dropped.

use crate::audio::{AudioReader, SphereFormat, read_header};
use crate::error::{CorpusError, Result};
use crate::transcript::{TranscriptParser, TranscriptSegment};
use ndarray::Array2;
use std::cell::OnceCell;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

/// Index of a speech in its corpus registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpeechId(pub usize);

/// Back-reference from an aligned segment to where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentRef {
    pub speech: SpeechId,
    /// Position among the segments aligned from that speech.
    pub ordinal: usize,
}

/// A transcript segment joined with its audio frames.
#[derive(Debug, Clone)]
pub struct AlignedSegment {
    pub segment: TranscriptSegment,
    /// Samples shaped `(frames, window_size)`.
    pub frames: Array2<u16>,
    pub source: SegmentRef,
}

impl AlignedSegment {
    pub fn transcript(&self) -> &str {
        &self.segment.transcript
    }

    /// Frames converted to `f32` sample values.
    pub fn frames_f32(&self) -> Array2<f32> {
        self.frames.mapv(f32::from)
    }
}

/// One audio file and its transcript.
#[derive(Debug)]
pub struct Speech {
    id: SpeechId,
    audio_path: PathBuf,
    transcript_path: PathBuf,
    window_size: usize,
    reject_out_of_order: bool,
    format: OnceCell<SphereFormat>,
}

impl Speech {
    /// Bind `audio_path` to the transcript found by [`Speech::transcript_path_for`].
    pub fn new(id: SpeechId, audio_path: impl Into<PathBuf>, window_size: usize) -> Self {
        let audio_path = audio_path.into();
        let transcript_path = Self::transcript_path_for(&audio_path);
        Self::with_transcript(id, audio_path, transcript_path, window_size)
    }

    pub fn with_transcript(
        id: SpeechId,
        audio_path: impl Into<PathBuf>,
        transcript_path: impl Into<PathBuf>,
        window_size: usize,
    ) -> Self {
        Self {
            id,
            audio_path: audio_path.into(),
            transcript_path: transcript_path.into(),
            window_size,
            reject_out_of_order: false,
            format: OnceCell::new(),
        }
    }

    pub fn reject_out_of_order(mut self, reject: bool) -> Self {
        self.reject_out_of_order = reject;
        self
    }

    /// `<dir>/sph/<name>.sph` pairs with `<dir>/stm/<name>.stm`.
    pub fn transcript_path_for(audio_path: &Path) -> PathBuf {
        let stem = audio_path.file_stem().unwrap_or_default();
        let mut name = stem.to_os_string();
        name.push(".stm");

        let sph_dir = audio_path.parent().unwrap_or_else(|| Path::new(""));
        let stm_dir = match sph_dir.parent() {
            Some(base) => base.join("stm"),
            None => sph_dir.join("..").join("stm"),
        };
        stm_dir.join(name)
    }

    pub fn id(&self) -> SpeechId {
        self.id
    }

    pub fn audio_path(&self) -> &Path {
        &self.audio_path
    }

    pub fn transcript_path(&self) -> &Path {
        &self.transcript_path
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Parsed audio header, read from disk on first use.
    pub fn format(&self) -> Result<&SphereFormat> {
        if let Some(format) = self.format.get() {
            return Ok(format);
        }
        let mut file = File::open(&self.audio_path)?;
        let format = read_header(&mut file, &self.audio_path.display().to_string())?;
        Ok(self.format.get_or_init(|| format))
    }

    /// Whether the header has been parsed (or primed) already.
    pub fn has_cached_format(&self) -> bool {
        self.format.get().is_some()
    }

    /// Seed the header cache with a format parsed elsewhere.
    pub fn prime_format(&self, format: SphereFormat) {
        if self.format.set(format).is_err() {
            log::debug!("Header of {} already cached", self.audio_path.display());
        }
    }

    /// Open a reader over the audio, reusing the cached header.
    pub fn open_reader(&self) -> Result<AudioReader> {
        AudioReader::with_format(&self.audio_path, self.format()?.clone())
    }

    /// Fresh pass over the aligned segments of this speech.
    pub fn segments(&self) -> SpeechSegments<'_> {
        SpeechSegments {
            speech: self,
            session: Session::NotStarted,
            ordinal: 0,
        }
    }

    /// Write the audio of every transcript segment to `out` in host byte order.
    ///
    /// Each transcript is logged as its audio is written. Segments whose
    /// window does not fit the file are skipped. Returns the bytes written.
    pub fn write_native_pcm<W: Write>(&self, out: &mut W) -> Result<usize> {
        let mut reader = self.open_reader()?;
        log::info!(
            "Writing {} as {}",
            self.audio_path.display(),
            reader.format().native_pcm_tag()
        );

        let transcript = TranscriptParser::open(&self.transcript_path)?
            .reject_out_of_order(self.reject_out_of_order);
        let mut written = 0;
        for segment in transcript {
            let segment = match segment {
                Ok(segment) => segment,
                Err(e) if e.is_segment_local() => {
                    log::warn!("Skipping segment: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let span = match reader.segment_span(segment.start, segment.stop, self.window_size) {
                Ok(span) => span,
                Err(e) if e.is_segment_local() => {
                    log::warn!("Skipping line {}: {}", segment.line, e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            log::info!("Transcript: {}", segment.transcript);
            let bytes = reader.native_bytes(span.range())?;
            out.write_all(&bytes)?;
            written += bytes.len();
        }
        reader.close();
        Ok(written)
    }
}

/// Observable lifecycle of a [`SpeechSegments`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Open,
    Exhausted,
}

enum Session {
    NotStarted,
    Open {
        transcript: TranscriptParser<BufReader<File>>,
        audio: Option<AudioReader>,
    },
    Exhausted,
}

enum Step {
    Yield(Result<AlignedSegment>),
    Fatal(CorpusError),
    Done,
}

/// Iterator over the aligned segments of one speech.
///
/// Per-segment failures (a window longer than the file, a rejected
/// out-of-order line) are yielded as `Err` and iteration continues. A
/// missing transcript or unreadable audio file is yielded once and ends the
/// pass. The audio reader is closed on exhaustion and on drop.
pub struct SpeechSegments<'a> {
    speech: &'a Speech,
    session: Session,
    ordinal: usize,
}

impl<'a> SpeechSegments<'a> {
    pub fn speech(&self) -> &'a Speech {
        self.speech
    }

    pub fn state(&self) -> SessionState {
        match self.session {
            Session::NotStarted => SessionState::NotStarted,
            Session::Open { .. } => SessionState::Open,
            Session::Exhausted => SessionState::Exhausted,
        }
    }

    /// Whether this pass currently holds an open audio reader.
    pub fn is_audio_open(&self) -> bool {
        matches!(
            self.session,
            Session::Open {
                audio: Some(_),
                ..
            }
        )
    }

    fn start(&mut self) -> Result<()> {
        let transcript = TranscriptParser::open(&self.speech.transcript_path)?
            .reject_out_of_order(self.speech.reject_out_of_order);
        self.session = Session::Open {
            transcript,
            audio: None,
        };
        Ok(())
    }

    fn advance(&mut self) -> Step {
        let speech = self.speech;
        let Session::Open { transcript, audio } = &mut self.session else {
            return Step::Done;
        };

        let segment = match transcript.next() {
            None => return Step::Done,
            Some(Ok(segment)) => segment,
            Some(Err(e)) if e.is_segment_local() => return Step::Yield(Err(e)),
            Some(Err(e)) => return Step::Fatal(e),
        };

        if audio.is_none() {
            match speech.open_reader() {
                Ok(reader) => *audio = Some(reader),
                Err(e) => return Step::Fatal(e),
            }
        }
        let Some(reader) = audio.as_mut() else {
            return Step::Done;
        };

        match reader.audio_segment(segment.start, segment.stop, speech.window_size) {
            Ok(frames) => {
                let source = SegmentRef {
                    speech: speech.id,
                    ordinal: self.ordinal,
                };
                self.ordinal += 1;
                Step::Yield(Ok(AlignedSegment {
                    segment,
                    frames,
                    source,
                }))
            }
            Err(e) if e.is_segment_local() => {
                log::warn!(
                    "Line {} of {} ({}s-{}s): {}",
                    segment.line,
                    speech.transcript_path.display(),
                    segment.start,
                    segment.stop,
                    e
                );
                Step::Yield(Err(e))
            }
            Err(e) => Step::Fatal(e),
        }
    }

    fn finish(&mut self) {
        if let Session::Open {
            audio: Some(reader),
            ..
        } = &mut self.session
        {
            reader.close();
        }
        self.session = Session::Exhausted;
    }
}

impl Iterator for SpeechSegments<'_> {
    type Item = Result<AlignedSegment>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Session::NotStarted = self.session
            && let Err(e) = self.start()
        {
            self.finish();
            return Some(Err(e));
        }

        match self.advance() {
            Step::Yield(result) => Some(result),
            Step::Fatal(e) => {
                self.finish();
                Some(Err(e))
            }
            Step::Done => {
                if self.state() == SessionState::Open {
                    log::info!("Finished: {}", self.speech.transcript_path.display());
                }
                self.finish();
                None
            }
        }
    }
}

impl Drop for SpeechSegments<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}
