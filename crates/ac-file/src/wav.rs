//! WAV header for streams of unknown length
//!
//! A live capture cannot seek back to patch the RIFF and data sizes, so the
//! header carries oversized placeholder lengths. Readers that stop at EOF
//! handle such files fine.

use std::io::Write;

use hound::{SampleFormat, WavSpec};

use crate::{FileError, FileResult};

/// Canonical PCM header length
pub const WAV_HEADER_LEN: usize = 44;

/// Placeholder RIFF chunk size written before the length is known
pub const PLACEHOLDER_RIFF_SIZE: u32 = 0x1000_0000;

/// Placeholder data chunk size, consistent with [`PLACEHOLDER_RIFF_SIZE`]
pub const PLACEHOLDER_DATA_SIZE: u32 = PLACEHOLDER_RIFF_SIZE - 36;

const FORMAT_TAG_PCM: u16 = 1;
const FORMAT_TAG_IEEE_FLOAT: u16 = 3;

/// Spec of the interleaved 16-bit integer stream
pub fn pcm16_spec(channels: u16, sample_rate: u32) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Build the 44-byte header for `spec`
pub fn stream_header(spec: &WavSpec) -> FileResult<[u8; WAV_HEADER_LEN]> {
    if spec.channels == 0 {
        return Err(FileError::UnsupportedSpec("zero channels".to_string()));
    }
    if spec.bits_per_sample == 0 || spec.bits_per_sample % 8 != 0 {
        return Err(FileError::UnsupportedSpec(format!(
            "{} bits per sample",
            spec.bits_per_sample
        )));
    }

    let format_tag = match spec.sample_format {
        SampleFormat::Int => FORMAT_TAG_PCM,
        SampleFormat::Float => FORMAT_TAG_IEEE_FLOAT,
    };
    let block_align = spec.channels as u32 * (spec.bits_per_sample / 8) as u32;
    let byte_rate = spec.sample_rate * block_align;

    let mut header = [0u8; WAV_HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&PLACEHOLDER_RIFF_SIZE.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&format_tag.to_le_bytes());
    header[22..24].copy_from_slice(&spec.channels.to_le_bytes());
    header[24..28].copy_from_slice(&spec.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&(block_align as u16).to_le_bytes());
    header[34..36].copy_from_slice(&spec.bits_per_sample.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&PLACEHOLDER_DATA_SIZE.to_le_bytes());

    Ok(header)
}

/// Write the streaming header once, before any sample data
pub fn write_stream_header<W: Write>(writer: &mut W, spec: &WavSpec) -> FileResult<()> {
    let header = stream_header(spec)?;
    writer.write_all(&header)?;

    log::debug!(
        "WAV header: {} ch, {} Hz, {} bit",
        spec.channels,
        spec.sample_rate,
        spec.bits_per_sample
    );
    Ok(())
}
