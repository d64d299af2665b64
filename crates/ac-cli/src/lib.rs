//! ac-cli: shared pieces of the `audiocapture` and `resample-pcm` binaries

use std::io::{self, Read, Write};

use anyhow::{Context, Result};

use ac_audio::{AudioBackend, CaptureConfig, CaptureSession, SessionStats, ShutdownToken};
use ac_core::{Sample, from_pcm16, to_pcm16};
use ac_dsp::resampler::Resampler;
use ac_file::{OutputSink, pcm16_spec};

/// Input read size of the file resampler
pub const READ_CHUNK_BYTES: usize = 2048;

/// Route `log` output to stderr; stdout may carry sample data.
///
/// `RUST_LOG` overrides the level chosen by `verbose`.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .format_timestamp_millis()
        .init();
}

/// Totals of one [`resample_stream`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResampleStats {
    pub samples_in: u64,
    pub samples_out: u64,
    /// A trailing odd byte at end of input is discarded
    pub trailing_byte: bool,
}

/// Resample mono little-endian i16 from `input` into `output` until EOF.
///
/// Output is flushed after every chunk so a downstream reader sees data
/// while the input is still being produced.
pub fn resample_stream<R: Read, W: Write>(
    mut input: R,
    output: &mut W,
    resampler: &mut Resampler,
) -> io::Result<ResampleStats> {
    let mut stats = ResampleStats::default();
    let mut buf = [0u8; READ_CHUNK_BYTES + 1];
    let mut carry: Option<u8> = None;
    let mut samples: Vec<Sample> = Vec::with_capacity(READ_CHUNK_BYTES);
    let mut bytes: Vec<u8> = Vec::with_capacity(READ_CHUNK_BYTES * 2);

    loop {
        let start = match carry.take() {
            Some(byte) => {
                buf[0] = byte;
                1
            }
            None => 0,
        };

        let n = match input.read(&mut buf[start..]) {
            Ok(0) => {
                stats.trailing_byte = start == 1;
                break;
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                if start == 1 {
                    carry = Some(buf[0]);
                }
                continue;
            }
            Err(e) => return Err(e),
        };

        let filled = start + n;
        let even = filled & !1;
        if even < filled {
            carry = Some(buf[even]);
        }

        samples.clear();
        for pair in buf[..even].chunks_exact(2) {
            let input = from_pcm16(i16::from_le_bytes([pair[0], pair[1]]));
            resampler.insert(input, &mut samples);
        }
        stats.samples_in += (even / 2) as u64;
        stats.samples_out += samples.len() as u64;

        bytes.clear();
        for &sample in &samples {
            bytes.extend_from_slice(&to_pcm16(sample).to_le_bytes());
        }
        output.write_all(&bytes)?;
        output.flush()?;
    }

    if stats.trailing_byte {
        log::warn!("Discarding trailing odd byte at end of input");
    }
    Ok(stats)
}

/// Capture from `backend` into `output` ("-" for stdout) until `shutdown` trips.
///
/// Every device is opened before the output is touched, so a bad device
/// name leaves an existing output file as it was.
pub fn run_capture<B: AudioBackend + ?Sized>(
    backend: &B,
    config: CaptureConfig,
    output: &str,
    write_header: bool,
    shutdown: &ShutdownToken,
) -> Result<SessionStats> {
    let channels = config.channel_count() as u16;
    let spec = pcm16_spec(channels, config.output_rate);
    let session = CaptureSession::new(backend, config)?;
    let capture = session.open(shutdown)?;

    let header = if write_header { Some(&spec) } else { None };
    let mut sink = OutputSink::open_with_header(output, header)
        .with_context(|| format!("opening output {}", output))?;
    log::info!("Writing {} channel(s) to {}", channels, sink.name());

    let report = capture.run(&mut sink, shutdown);
    if let Some(reason) = shutdown.reason() {
        log::info!("Stopped: {}", reason);
    }

    let written = sink.finish();
    let stats = report.into_result()?;
    let bytes = written.context("closing output")?;

    log::info!(
        "{} bytes written, {:.1}s of audio",
        bytes,
        stats.mux.frames_written as f64 / spec.sample_rate as f64
    );
    Ok(stats)
}
