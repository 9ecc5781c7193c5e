//! STM transcript parsing.
//!
//! One utterance per line:
//!
//! ```text
//! <file-id> <channel> <speaker> <start> <stop> <speaker-meta> <transcript...>
//! ```
//!
//! The transcript is everything after the sixth field, inner whitespace
//! included. Malformed lines are logged and skipped; gap and unscored
//! segments are dropped.

use crate::defaults::{IGNORED_SPEAKER, IGNORED_TRANSCRIPT};
use crate::error::{CorpusError, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// One timed utterance from a transcript file.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub file_id: String,
    pub channel: String,
    pub speaker: String,
    /// Start time in seconds.
    pub start: f64,
    /// Stop time in seconds, never before `start`.
    pub stop: f64,
    pub speaker_meta: String,
    pub transcript: String,
    /// 1-based line number in the source file.
    pub line: usize,
}

impl TranscriptSegment {
    pub fn duration(&self) -> f64 {
        self.stop - self.start
    }

    /// Gap and unscored segments never reach consumers.
    pub fn is_ignored(&self) -> bool {
        self.speaker == IGNORED_SPEAKER || self.transcript == IGNORED_TRANSCRIPT
    }
}

/// Parse one non-empty STM line.
///
/// Returns the reason as text when the line cannot be used.
pub fn parse_line(line: &str, line_number: usize) -> std::result::Result<TranscriptSegment, String> {
    let mut fields = [""; 6];
    let mut rest = line;
    for (i, field) in fields.iter_mut().enumerate() {
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            return Err(format!("expected 7 fields, found {}", i));
        }
        let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        *field = &trimmed[..end];
        rest = &trimmed[end..];
    }
    let transcript = rest.trim();
    if transcript.is_empty() {
        return Err("expected 7 fields, found 6".to_string());
    }

    let [file_id, channel, speaker, start, stop, speaker_meta] = fields;
    let start = parse_time(start, "start")?;
    let stop = parse_time(stop, "stop")?;
    if stop < start {
        return Err(format!("stop time {} is before start time {}", stop, start));
    }

    Ok(TranscriptSegment {
        file_id: file_id.to_string(),
        channel: channel.to_string(),
        speaker: speaker.to_string(),
        start,
        stop,
        speaker_meta: speaker_meta.to_string(),
        transcript: transcript.to_string(),
        line: line_number,
    })
}

fn parse_time(value: &str, name: &str) -> std::result::Result<f64, String> {
    match value.parse::<f64>() {
        Ok(t) if t.is_finite() && t >= 0.0 => Ok(t),
        Ok(t) => Err(format!("{} time {} is out of range", name, t)),
        Err(e) => Err(format!("invalid {} time {:?}: {}", name, value, e)),
    }
}

/// Lazy sequence of accepted segments from one transcript source.
///
/// Yields `Err` for I/O failures (which end the sequence) and for
/// out-of-order segments when those are rejected.
pub struct TranscriptParser<R> {
    reader: R,
    source: String,
    buf: Vec<u8>,
    line_number: usize,
    malformed: usize,
    previous_start: Option<f64>,
    reject_out_of_order: bool,
    done: bool,
}

impl TranscriptParser<BufReader<File>> {
    /// Open a transcript file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CorpusError::TranscriptNotFound {
                path: path.display().to_string(),
            },
            _ => CorpusError::Io(e),
        })?;
        Ok(Self::new(BufReader::new(file), path.display().to_string()))
    }
}

impl<R: BufRead> TranscriptParser<R> {
    /// Parse from any buffered reader; `source` names it in log messages.
    pub fn new(reader: R, source: impl Into<String>) -> Self {
        Self {
            reader,
            source: source.into(),
            buf: Vec::new(),
            line_number: 0,
            malformed: 0,
            previous_start: None,
            reject_out_of_order: false,
            done: false,
        }
    }

    /// Report segments whose start precedes the previous one as errors.
    pub fn reject_out_of_order(mut self, reject: bool) -> Self {
        self.reject_out_of_order = reject;
        self
    }

    /// Lines skipped so far because they could not be parsed.
    pub fn malformed_lines(&self) -> usize {
        self.malformed
    }

    /// Lines read so far.
    pub fn lines_read(&self) -> usize {
        self.line_number
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn report(&mut self, line: &str, reason: &str) {
        self.malformed += 1;
        log::warn!(
            "Syntax error on line {} of {}: {}\n{}",
            self.line_number,
            self.source,
            reason,
            line
        );
    }

    fn check_order(&mut self, segment: &TranscriptSegment) -> Result<()> {
        if let Some(previous) = self.previous_start
            && segment.start < previous
        {
            log::warn!(
                "Segment on line {} of {} starts at {} before previous start {}",
                segment.line,
                self.source,
                segment.start,
                previous
            );
            if self.reject_out_of_order {
                return Err(CorpusError::OutOfOrderSegment {
                    path: self.source.clone(),
                    line: segment.line,
                    start: segment.start,
                    previous,
                });
            }
        }
        self.previous_start = Some(segment.start);
        Ok(())
    }
}

impl<R: BufRead> Iterator for TranscriptParser<R> {
    type Item = Result<TranscriptSegment>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => self.line_number += 1,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }

            let line = match std::str::from_utf8(&self.buf) {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    let raw = String::from_utf8_lossy(&self.buf).trim().to_string();
                    self.report(&raw, &format!("invalid UTF-8: {}", e));
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }

            let segment = match parse_line(&line, self.line_number) {
                Ok(segment) => segment,
                Err(reason) => {
                    self.report(&line, &reason);
                    continue;
                }
            };
            if segment.is_ignored() {
                continue;
            }

            return Some(self.check_order(&segment).map(|()| segment));
        }
    }
}
