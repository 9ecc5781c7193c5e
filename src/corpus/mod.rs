//! Corpus-level access: split discovery, the speech registry and streams.

pub mod batcher;
mod discovery;
pub mod probe;
pub mod stream;

pub use batcher::FrameBatcher;
pub use discovery::find_files;
pub use probe::{HeaderReport, probe_headers};
pub use stream::{CorpusStream, FrameStream, StreamStats, TranscriptStream};

use crate::config::Config;
use crate::error::{CorpusError, Result};
use crate::speech::{SegmentRef, Speech, SpeechId};
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Partition of the corpus, named after its directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SplitKind {
    Train,
    Valid,
    Test,
}

impl SplitKind {
    /// Flattening order across splits.
    pub const ALL: [SplitKind; 3] = [SplitKind::Train, SplitKind::Valid, SplitKind::Test];

    /// Directory holding this split's `sph` and `stm` folders.
    pub fn dir_name(&self) -> &'static str {
        match self {
            SplitKind::Train => "train",
            SplitKind::Valid => "dev",
            SplitKind::Test => "test",
        }
    }

    /// Parse a split name; `valid`, `validation` and `dev` all mean [`SplitKind::Valid`].
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "train" => Some(SplitKind::Train),
            "valid" | "validation" | "dev" => Some(SplitKind::Valid),
            "test" => Some(SplitKind::Test),
            _ => None,
        }
    }
}

impl fmt::Display for SplitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SplitKind::Train => "train",
            SplitKind::Valid => "valid",
            SplitKind::Test => "test",
        };
        f.write_str(name)
    }
}

/// Settings that shape how speeches are built from discovered files.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusOptions {
    pub window_size: usize,
    /// Keep at most this many speeches per split.
    pub max_speeches: Option<usize>,
    pub reject_out_of_order: bool,
}

impl CorpusOptions {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            max_speeches: None,
            reject_out_of_order: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            window_size: config.window_size(),
            max_speeches: config.corpus.max_speeches,
            reject_out_of_order: config.transcript.reject_out_of_order,
        }
    }
}

/// The speeches of one split, in discovery order.
#[derive(Debug, Clone, Copy)]
pub struct CorpusSplit<'a> {
    pub kind: SplitKind,
    speeches: &'a [Speech],
}

impl<'a> CorpusSplit<'a> {
    pub fn speeches(&self) -> &'a [Speech] {
        self.speeches
    }

    pub fn len(&self) -> usize {
        self.speeches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speeches.is_empty()
    }

    /// Aligned records of this split, keeping every `skip_count`-th.
    pub fn stream(&self, skip_count: usize) -> Result<CorpusStream<'a>> {
        CorpusStream::new(self.speeches, skip_count)
    }

    /// Frame and transcript projections over one shared stream.
    pub fn inputs_and_targets(
        &self,
        skip_count: usize,
    ) -> Result<(FrameStream<'a>, TranscriptStream<'a>)> {
        Ok(self.stream(skip_count)?.projections())
    }
}

/// Registry of every speech in a corpus, grouped by split.
///
/// Speeches are stored train, then valid, then test; a [`SpeechId`] is the
/// index into that list.
#[derive(Debug)]
pub struct Corpus {
    root: PathBuf,
    options: CorpusOptions,
    speeches: Vec<Speech>,
    train: Range<usize>,
    valid: Range<usize>,
    test: Range<usize>,
}

impl Corpus {
    /// Discover the splits under `root`.
    ///
    /// # Errors
    /// `CorpusDirNotFound` when `root` or one of the `<split>/sph`
    /// directories is missing.
    pub fn open(root: impl AsRef<Path>, options: CorpusOptions) -> Result<Self> {
        let root = root.as_ref();
        if options.window_size == 0 {
            return Err(CorpusError::ConfigInvalidValue {
                key: "window_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !root.is_dir() {
            return Err(CorpusError::CorpusDirNotFound {
                path: root.display().to_string(),
            });
        }
        let root = root.canonicalize()?;

        log::info!("Searching for speeches in {}", root.display());
        let mut discovered = discovery::discover(&root)?;

        let mut speeches = Vec::new();
        let mut ranges = Vec::with_capacity(SplitKind::ALL.len());
        for kind in SplitKind::ALL {
            let mut paths = discovered.take(kind);
            if let Some(max) = options.max_speeches {
                paths.truncate(max);
            }
            let start = speeches.len();
            for path in paths {
                let id = SpeechId(speeches.len());
                speeches.push(
                    Speech::new(id, path, options.window_size)
                        .reject_out_of_order(options.reject_out_of_order),
                );
            }
            log::info!("{} split: {} speeches", kind, speeches.len() - start);
            ranges.push(start..speeches.len());
        }

        let [train, valid, test]: [Range<usize>; 3] = ranges
            .try_into()
            .map_err(|_| CorpusError::Other("split ranges incomplete".to_string()))?;

        Ok(Self {
            root,
            options,
            speeches,
            train,
            valid,
            test,
        })
    }

    /// Open the corpus described by a configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Self::open(&config.corpus.root, CorpusOptions::from_config(config))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &CorpusOptions {
        &self.options
    }

    pub fn window_size(&self) -> usize {
        self.options.window_size
    }

    pub fn split(&self, kind: SplitKind) -> CorpusSplit<'_> {
        CorpusSplit {
            kind,
            speeches: &self.speeches[self.split_range(kind).clone()],
        }
    }

    /// Every speech, train then valid then test.
    pub fn speeches(&self) -> &[Speech] {
        &self.speeches
    }

    pub fn speech(&self, id: SpeechId) -> Option<&Speech> {
        self.speeches.get(id.0)
    }

    /// Look up the speech an aligned segment came from.
    pub fn resolve(&self, source: &SegmentRef) -> Option<&Speech> {
        self.speech(source.speech)
    }

    /// Split a speech belongs to.
    pub fn split_of(&self, id: SpeechId) -> Option<SplitKind> {
        SplitKind::ALL
            .into_iter()
            .find(|kind| self.split_range(*kind).contains(&id.0))
    }

    /// Aligned records across all splits, in split-then-file-then-segment order.
    pub fn stream_all(&self, skip_count: usize) -> Result<CorpusStream<'_>> {
        CorpusStream::new(&self.speeches, skip_count)
    }

    /// Parse every header on `workers` threads and cache the results.
    ///
    /// Returns the speeches whose header could not be read.
    pub fn prefetch_headers(&self, workers: usize) -> Vec<(SpeechId, CorpusError)> {
        let pending: Vec<&Speech> = self
            .speeches
            .iter()
            .filter(|s| !s.has_cached_format())
            .collect();
        let paths: Vec<PathBuf> = pending.iter().map(|s| s.audio_path().to_path_buf()).collect();

        let mut failures = Vec::new();
        for (speech, report) in pending.into_iter().zip(probe_headers(&paths, workers)) {
            match report.result {
                Ok(format) => speech.prime_format(format),
                Err(e) => failures.push((speech.id(), e)),
            }
        }
        failures
    }

    fn split_range(&self, kind: SplitKind) -> &Range<usize> {
        match kind {
            SplitKind::Train => &self.train,
            SplitKind::Valid => &self.valid,
            SplitKind::Test => &self.test,
        }
    }
}
