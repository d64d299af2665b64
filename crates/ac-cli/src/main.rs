//! audiocapture: record input devices into one interleaved 8 kHz stream
//!
//! Each `--device` becomes one output channel, in the order given. Output is
//! signed 16-bit little-endian PCM, preceded by a WAV header unless
//! `--no-header` is passed. Capture runs until Ctrl-C or a fault.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use ac_audio::{AudioBackend, CaptureConfig, CpalBackend, ShutdownToken, spawn_signal_handler};

#[derive(Parser)]
#[command(
    name = "audiocapture",
    version,
    about = "Capture audio devices into interleaved 8 kHz 16-bit PCM"
)]
struct Cli {
    /// Input device name; repeat for more channels (default: system input)
    #[arg(short, long = "device", value_name = "NAME")]
    devices: Vec<String>,

    /// Output file, or "-" for stdout
    #[arg(short, long, default_value = "-")]
    output: String,

    /// Print the available input devices and exit
    #[arg(long, conflicts_with_all = ["devices", "output", "no_header"])]
    list_devices: bool,

    /// JSON file with capture settings
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write raw PCM without a WAV header
    #[arg(long)]
    no_header: bool,

    /// Debug logging, including device probe details
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    ac_cli::init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let backend = CpalBackend::new();
    log::debug!("Audio host: {}", backend.name());

    if cli.list_devices {
        return list_devices(&backend, cli.verbose);
    }

    let mut config = match &cli.config {
        Some(path) => CaptureConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => CaptureConfig::default(),
    };
    if !cli.devices.is_empty() {
        config.devices = cli.devices.clone();
    }

    let shutdown = ShutdownToken::new();
    // Detached: the thread parks in the runtime until a signal arrives
    let _signal = spawn_signal_handler(shutdown.clone())?;

    ac_cli::run_capture(&backend, config, &cli.output, !cli.no_header, &shutdown)?;
    Ok(())
}

fn list_devices(backend: &CpalBackend, verbose: bool) -> Result<()> {
    let devices = backend
        .input_devices()
        .context("enumerating input devices")?;

    if devices.is_empty() {
        eprintln!("No input devices found");
        return Ok(());
    }

    let mut text = String::new();
    for device in &devices {
        device.describe(&mut text, verbose)?;
    }
    eprint!("{}", text);
    Ok(())
}
