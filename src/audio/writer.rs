//! SPHERE file writing.

use crate::audio::header::SphereFormat;
use crate::error::Result;
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::io::Write;

/// Write a header followed by `samples` in the format's declared byte order.
pub fn write_sphere<W: Write>(writer: &mut W, format: &SphereFormat, samples: &[u16]) -> Result<()> {
    format.ensure_pcm16_mono("<output>")?;
    writer.write_all(&format.encode_header(samples.len())?)?;
    for &sample in samples {
        if format.big_endian() {
            writer.write_u16::<BigEndian>(sample)?;
        } else {
            writer.write_u16::<LittleEndian>(sample)?;
        }
    }
    Ok(())
}
