//! Append-only output sink
//!
//! `-` selects standard output, anything else is a file path that gets
//! created (or truncated).

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Stdout, Write};
use std::path::Path;

use hound::WavSpec;

use crate::{FileError, FileResult, write_stream_header};

/// Path that selects standard output
pub const STDOUT_PATH: &str = "-";

const DISK_BUFFER_SIZE: usize = 64 * 1024;

enum SinkTarget {
    File(BufWriter<File>),
    Stdout(Stdout),
}

/// Byte sink for the interleaved output stream
pub struct OutputSink {
    target: SinkTarget,
    name: String,
    bytes_written: u64,
}

impl OutputSink {
    /// Open `path`, or standard output for `-`
    pub fn open(path: &str) -> FileResult<Self> {
        if path == STDOUT_PATH {
            return Ok(Self::stdout());
        }
        Self::create_file(Path::new(path))
    }

    pub fn stdout() -> Self {
        Self {
            target: SinkTarget::Stdout(io::stdout()),
            name: "<stdout>".to_string(),
            bytes_written: 0,
        }
    }

    pub fn create_file(path: &Path) -> FileResult<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| FileError::Open {
                path: path.display().to_string(),
                source,
            })?;

        log::info!("Writing to {}", path.display());

        Ok(Self {
            target: SinkTarget::File(BufWriter::with_capacity(DISK_BUFFER_SIZE, file)),
            name: path.display().to_string(),
            bytes_written: 0,
        })
    }

    /// Open the sink and write the streaming WAV header when `spec` is given
    pub fn open_with_header(path: &str, spec: Option<&WavSpec>) -> FileResult<Self> {
        let mut sink = Self::open(path)?;
        if let Some(spec) = spec {
            write_stream_header(&mut sink, spec)?;
        }
        Ok(sink)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_stdout(&self) -> bool {
        matches!(self.target, SinkTarget::Stdout(_))
    }

    /// Bytes accepted so far, header included
    #[inline]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush and close
    pub fn finish(mut self) -> FileResult<u64> {
        self.flush()?;
        log::debug!("Closed {} after {} bytes", self.name, self.bytes_written);
        Ok(self.bytes_written)
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = match &mut self.target {
            SinkTarget::File(writer) => writer.write(buf)?,
            SinkTarget::Stdout(stdout) => stdout.write(buf)?,
        };
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.target {
            SinkTarget::File(writer) => writer.flush(),
            SinkTarget::Stdout(stdout) => stdout.flush(),
        }
    }
}

impl std::fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSink")
            .field("name", &self.name)
            .field("bytes_written", &self.bytes_written)
            .finish()
    }
}
