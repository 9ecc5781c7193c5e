//! Flattened, strided streams of aligned records.
//!
//! [`CorpusStream`] walks speeches in order, holding at most one speech's
//! audio open at a time. [`CorpusStream::projections`] splits it into a
//! frame stream and a transcript stream that pull from the same underlying
//! stream, so element `i` of one always pairs with element `i` of the other.

use crate::error::{CorpusError, Result};
use crate::speech::{AlignedSegment, Speech, SpeechSegments};
use ndarray::Array2;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Counters describing what a stream has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Records handed to the consumer after striding.
    pub yielded: usize,
    /// Records aligned successfully, before striding.
    pub aligned: usize,
    /// Segments dropped because their audio could not be extracted.
    pub skipped_segments: usize,
    /// Speeches abandoned because their files could not be read.
    pub skipped_speeches: usize,
    /// Speeches whose iteration has begun.
    pub speeches_started: usize,
}

/// Aligned records of a list of speeches, keeping every `skip_count`-th.
///
/// Ordinals count successfully aligned records; failed segments and
/// unreadable speeches are logged and skipped without consuming one.
pub struct CorpusStream<'a> {
    speeches: &'a [Speech],
    next_speech: usize,
    current: Option<SpeechSegments<'a>>,
    skip_count: usize,
    stats: StreamStats,
}

impl<'a> CorpusStream<'a> {
    /// # Errors
    /// `ConfigInvalidValue` when `skip_count` is zero.
    pub fn new(speeches: &'a [Speech], skip_count: usize) -> Result<Self> {
        if skip_count == 0 {
            return Err(CorpusError::ConfigInvalidValue {
                key: "skip_count".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if skip_count > 1 {
            log::info!(
                "Creating speech segments (utterance records using 1/{} of the utterances)",
                skip_count
            );
        }
        Ok(Self {
            speeches,
            next_speech: 0,
            current: None,
            skip_count,
            stats: StreamStats::default(),
        })
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    pub fn skip_count(&self) -> usize {
        self.skip_count
    }

    /// Audio readers currently held open (never more than one).
    pub fn open_readers(&self) -> usize {
        usize::from(self.current.as_ref().is_some_and(|s| s.is_audio_open()))
    }

    /// Split into frame and transcript streams driven by this one stream.
    pub fn projections(self) -> (FrameStream<'a>, TranscriptStream<'a>) {
        let shared = Rc::new(RefCell::new(Shared {
            stream: self,
            frames: VecDeque::new(),
            transcripts: VecDeque::new(),
        }));
        (
            FrameStream {
                shared: Rc::clone(&shared),
            },
            TranscriptStream { shared },
        )
    }
}

impl Iterator for CorpusStream<'_> {
    type Item = AlignedSegment;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                let speech = self.speeches.get(self.next_speech)?;
                self.next_speech += 1;
                self.stats.speeches_started += 1;
                self.current = Some(speech.segments());
            }
            let Some(segments) = self.current.as_mut() else {
                continue;
            };
            let speech = segments.speech();

            match segments.next() {
                None => {
                    // Dropping the pass releases its audio before the next one opens.
                    self.current = None;
                }
                Some(Ok(aligned)) => {
                    let ordinal = self.stats.aligned;
                    self.stats.aligned += 1;
                    if ordinal % self.skip_count == 0 {
                        self.stats.yielded += 1;
                        return Some(aligned);
                    }
                }
                Some(Err(e)) if e.is_segment_local() => {
                    self.stats.skipped_segments += 1;
                    log::debug!(
                        "Skipping segment of {}: {}",
                        speech.audio_path().display(),
                        e
                    );
                }
                Some(Err(e)) => {
                    self.stats.skipped_speeches += 1;
                    log::warn!("Skipping {}: {}", speech.audio_path().display(), e);
                    self.current = None;
                }
            }
        }
    }
}

struct Shared<'a> {
    stream: CorpusStream<'a>,
    frames: VecDeque<Array2<f32>>,
    transcripts: VecDeque<String>,
}

impl Shared<'_> {
    /// Advance the stream once, queueing both halves of the record.
    fn pull(&mut self) -> bool {
        match self.stream.next() {
            Some(record) => {
                self.frames.push_back(record.frames_f32());
                self.transcripts.push_back(record.segment.transcript);
                true
            }
            None => false,
        }
    }
}

/// Audio half of a projected stream: `(frames, window_size)` blocks as `f32`.
///
/// Records pulled ahead for the transcript side are buffered until read.
pub struct FrameStream<'a> {
    shared: Rc<RefCell<Shared<'a>>>,
}

impl FrameStream<'_> {
    pub fn stats(&self) -> StreamStats {
        self.shared.borrow().stream.stats()
    }

    /// Frame blocks already pulled but not yet read.
    pub fn buffered(&self) -> usize {
        self.shared.borrow().frames.len()
    }
}

impl Iterator for FrameStream<'_> {
    type Item = Array2<f32>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut shared = self.shared.borrow_mut();
        if shared.frames.is_empty() && !shared.pull() {
            return None;
        }
        shared.frames.pop_front()
    }
}

/// Transcript half of a projected stream.
pub struct TranscriptStream<'a> {
    shared: Rc<RefCell<Shared<'a>>>,
}

impl TranscriptStream<'_> {
    pub fn stats(&self) -> StreamStats {
        self.shared.borrow().stream.stats()
    }

    /// Transcripts already pulled but not yet read.
    pub fn buffered(&self) -> usize {
        self.shared.borrow().transcripts.len()
    }
}

impl Iterator for TranscriptStream<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let mut shared = self.shared.borrow_mut();
        if shared.transcripts.is_empty() && !shared.pull() {
            return None;
        }
        shared.transcripts.pop_front()
    }
}
