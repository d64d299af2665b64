//! resample-pcm: convert a mono 16-bit PCM stream to another rate
//!
//! Reads raw little-endian i16 from a file or stdin and writes the
//! resampled stream, WAV-headed by default, to a file or stdout.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use ac_cli::resample_stream;
use ac_dsp::resampler::Resampler;
use ac_file::{OutputSink, pcm16_spec};

const STDIN_PATH: &str = "-";

#[derive(Parser)]
#[command(
    name = "resample-pcm",
    version,
    about = "Resample mono 16-bit little-endian PCM"
)]
struct Cli {
    /// Raw input file, or "-" for stdin
    #[arg(default_value = STDIN_PATH)]
    input: String,

    /// Output file, or "-" for stdout
    #[arg(default_value = "-")]
    output: String,

    #[arg(long, default_value_t = 44100)]
    input_rate: u32,

    #[arg(long, default_value_t = ac_core::OUTPUT_SAMPLE_RATE)]
    output_rate: u32,

    /// Anti-alias cutoff distance below the output Nyquist rate, in Hz
    #[arg(long, default_value_t = 1000.0)]
    padding: f64,

    /// Write raw PCM without a WAV header
    #[arg(long)]
    no_header: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    ac_cli::init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn open_input(path: &str) -> Result<Box<dyn Read>> {
    if path == STDIN_PATH {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("opening input {}", path))?;
    Ok(Box::new(BufReader::new(file)))
}

fn run(cli: &Cli) -> Result<()> {
    let mut resampler = Resampler::new(
        cli.input_rate as f64,
        cli.output_rate as f64,
        cli.padding,
    )
    .context("invalid resampler settings")?;

    let input = open_input(&cli.input)?;

    let spec = pcm16_spec(1, cli.output_rate);
    let header = if cli.no_header { None } else { Some(&spec) };
    let mut sink = OutputSink::open_with_header(&cli.output, header)
        .with_context(|| format!("opening output {}", cli.output))?;

    let stats = resample_stream(input, &mut sink, &mut resampler)
        .with_context(|| format!("resampling into {}", sink.name()))?;
    let bytes = sink.finish().context("closing output")?;

    log::info!(
        "{} samples at {}Hz -> {} samples at {}Hz ({} bytes)",
        stats.samples_in,
        cli.input_rate,
        stats.samples_out,
        cli.output_rate,
        bytes
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_defaults() {
        Cli::command().debug_assert();

        let cli = Cli::try_parse_from(["resample-pcm"]).unwrap();
        assert_eq!(cli.input, "-");
        assert_eq!(cli.output, "-");
        assert_eq!(cli.input_rate, 44100);
        assert_eq!(cli.output_rate, 8000);
        assert_eq!(cli.padding, 1000.0);
    }
}
