//! NIST SPHERE header parsing.
//!
//! Every audio file starts with a 1024-byte, null-padded text block of
//! `key type-token value` lines closed by a line starting with `end_head`.
//! Missing fields fall back to documented defaults, so a partial header
//! still yields a usable format; only a file too short to hold the header
//! is rejected.

use crate::defaults::{
    HEADER_CHANNEL_COUNT, HEADER_CODING, HEADER_END, HEADER_SAMPLE_BYTES, HEADER_SAMPLE_RATE,
    HEADER_SIGNIFICANT_BITS, HEADER_SIZE, LITTLE_ENDIAN_BYTE_FORMAT,
};
use crate::error::{CorpusError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Read};

/// Value of a header field that has no dedicated slot in [`SphereFormat`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Int(i64),
    Text(String),
}

impl std::fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaderValue::Int(n) => write!(f, "{}", n),
            HeaderValue::Text(s) => f.write_str(s),
        }
    }
}

/// Sample format declared by a SPHERE header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SphereFormat {
    pub sample_rate: u32,
    pub channel_count: u16,
    /// `01` for little-endian, `10` for big-endian.
    pub byte_format: String,
    pub sample_n_bytes: u16,
    pub significant_bits: u16,
    pub coding: String,
    /// Fields the parser does not interpret (e.g. `sample_count`, `database_id`).
    pub extra: BTreeMap<String, HeaderValue>,
}

impl Default for SphereFormat {
    fn default() -> Self {
        Self {
            sample_rate: HEADER_SAMPLE_RATE,
            channel_count: HEADER_CHANNEL_COUNT,
            byte_format: LITTLE_ENDIAN_BYTE_FORMAT.to_string(),
            sample_n_bytes: HEADER_SAMPLE_BYTES,
            significant_bits: HEADER_SIGNIFICANT_BITS,
            coding: HEADER_CODING.to_string(),
            extra: BTreeMap::new(),
        }
    }
}

impl SphereFormat {
    /// Whether samples are stored most-significant byte first.
    pub fn big_endian(&self) -> bool {
        self.byte_format != LITTLE_ENDIAN_BYTE_FORMAT
    }

    /// PCM format tag for the declared byte order, e.g. `U16LE`.
    pub fn pcm_format_tag(&self) -> String {
        pcm_tag(self.sample_n_bytes, self.big_endian())
    }

    /// PCM format tag for samples converted to the host byte order.
    pub fn native_pcm_tag(&self) -> String {
        pcm_tag(self.sample_n_bytes, cfg!(target_endian = "big"))
    }

    /// Declared `sample_count`, when the header carries one.
    pub fn sample_count(&self) -> Option<usize> {
        match self.extra.get("sample_count") {
            Some(HeaderValue::Int(n)) => usize::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Reject formats the reader cannot slice: anything but mono 16-bit PCM.
    pub fn ensure_pcm16_mono(&self, path: &str) -> Result<()> {
        if self.channel_count != 1 {
            return Err(CorpusError::UnsupportedFormat {
                path: path.to_string(),
                message: format!("{} channels, only mono is supported", self.channel_count),
            });
        }
        if self.sample_n_bytes != 2 {
            return Err(CorpusError::UnsupportedFormat {
                path: path.to_string(),
                message: format!(
                    "{}-byte samples, only 16-bit samples are supported",
                    self.sample_n_bytes
                ),
            });
        }
        if !self.coding.eq_ignore_ascii_case(HEADER_CODING) {
            return Err(CorpusError::UnsupportedFormat {
                path: path.to_string(),
                message: format!("sample coding '{}' is not plain pcm", self.coding),
            });
        }
        Ok(())
    }

    /// Render this format as a complete 1024-byte header.
    ///
    /// `sample_count` always reflects the argument, overriding any value
    /// carried in `extra`. Fails if the fields do not fit in the header block.
    pub fn encode_header(&self, sample_count: usize) -> Result<Vec<u8>> {
        let mut text = String::from("NIST_1A\n   1024\n");
        text.push_str(&format!("sample_count -i {}\n", sample_count));
        text.push_str(&format!("sample_n_bytes -i {}\n", self.sample_n_bytes));
        text.push_str(&format!("channel_count -i {}\n", self.channel_count));
        text.push_str(&text_field("sample_byte_format", &self.byte_format));
        text.push_str(&format!("sample_rate -i {}\n", self.sample_rate));
        text.push_str(&text_field("sample_coding", &self.coding));
        text.push_str(&format!("sample_sig_bits -i {}\n", self.significant_bits));
        for (key, value) in self.extra.iter().filter(|(k, _)| *k != "sample_count") {
            match value {
                HeaderValue::Int(n) => text.push_str(&format!("{} -i {}\n", key, n)),
                HeaderValue::Text(s) => text.push_str(&text_field(key, s)),
            }
        }
        text.push_str(HEADER_END);
        text.push('\n');

        if text.len() > HEADER_SIZE {
            return Err(CorpusError::InvalidHeader {
                path: String::new(),
                message: format!(
                    "encoded header is {} bytes, limit is {}",
                    text.len(),
                    HEADER_SIZE
                ),
            });
        }

        let mut bytes = text.into_bytes();
        bytes.resize(HEADER_SIZE, 0);
        Ok(bytes)
    }

    fn apply_line(&mut self, line: &str) {
        let Some((key, type_token, value)) = split_field(line) else {
            log::debug!("Ignoring header line without key/type/value: {:?}", line);
            return;
        };
        let is_int = type_token.starts_with("-i");

        match key {
            "sample_rate" => assign_int(&mut self.sample_rate, key, value),
            "channel_count" => assign_int(&mut self.channel_count, key, value),
            "sample_n_bytes" => assign_int(&mut self.sample_n_bytes, key, value),
            "sample_sig_bits" => assign_int(&mut self.significant_bits, key, value),
            "sample_byte_format" => self.byte_format = value.to_string(),
            "sample_coding" => self.coding = value.to_string(),
            _ if is_int => match value.parse::<i64>() {
                Ok(n) => {
                    self.extra.insert(key.to_string(), HeaderValue::Int(n));
                }
                Err(_) => log::debug!("Ignoring non-integer value for {}: {:?}", key, value),
            },
            _ => {
                self.extra
                    .insert(key.to_string(), HeaderValue::Text(value.to_string()));
            }
        }
    }
}

/// Parse header text into a format, substituting defaults for missing fields.
///
/// Accepts the raw header block (trailing null padding included) or any
/// prefix of it. Never fails: malformed lines are skipped.
pub fn parse_header(bytes: &[u8]) -> SphereFormat {
    let text = String::from_utf8_lossy(bytes);
    let mut format = SphereFormat::default();

    for line in text.lines() {
        let line = line.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        if line.starts_with(HEADER_END) {
            break;
        }
        if line.is_empty() {
            continue;
        }
        format.apply_line(line);
    }

    format
}

/// Read and parse the fixed-size header from the start of `reader`.
///
/// `path` only labels the error when fewer than 1024 bytes are available.
pub fn read_header<R: Read>(reader: &mut R, path: &str) -> Result<SphereFormat> {
    let mut block = [0u8; HEADER_SIZE];
    match reader.read_exact(&mut block) {
        Ok(()) => Ok(parse_header(&block)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(CorpusError::InvalidHeader {
            path: path.to_string(),
            message: format!("file is shorter than the {}-byte header", HEADER_SIZE),
        }),
        Err(e) => Err(e.into()),
    }
}

fn pcm_tag(sample_n_bytes: u16, big_endian: bool) -> String {
    format!(
        "U{}{}",
        u32::from(sample_n_bytes) * 8,
        if big_endian { "BE" } else { "LE" }
    )
}

fn text_field(key: &str, value: &str) -> String {
    format!("{} -s{} {}\n", key, value.len(), value)
}

fn assign_int<T: TryFrom<i64>>(slot: &mut T, key: &str, value: &str) {
    match value.parse::<i64>().ok().and_then(|n| T::try_from(n).ok()) {
        Some(n) => *slot = n,
        None => log::debug!("Keeping default for {}: cannot use {:?}", key, value),
    }
}

/// Split `key type-token value...` where the value keeps inner whitespace.
fn split_field(line: &str) -> Option<(&str, &str, &str)> {
    let (key, rest) = next_token(line)?;
    let (type_token, rest) = next_token(rest)?;
    let value = rest.trim();
    if value.is_empty() {
        return None;
    }
    Some((key, type_token, value))
}

fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    Some((&s[..end], &s[end..]))
}
