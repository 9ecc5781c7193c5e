//! SPHERE audio: header parsing, sample access and windowing.

pub mod header;
pub mod reader;
pub mod wav;
pub mod window;
pub mod writer;

pub use header::{HeaderValue, SphereFormat, parse_header, read_header};
pub use reader::{AudioReader, SampleView};
pub use wav::{WavClip, load_wav_frames};
pub use window::{WindowSpan, truncate_to_windows, window_size_for_duration, window_span};
pub use writer::write_sphere;
