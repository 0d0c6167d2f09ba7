//! SteadyCam - online video stabilizer
//!
//! Reads a video, stabilizes it frame by frame and writes the result.

use anyhow::{Context, Result};
use clap::*;
use std::path::PathBuf;
use steadycam_media::{transform_video, EncoderSettings};
use steadycam_tracking::{Stabilizer, StabilizerConfig};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    let matches = Command::new("steadycam")
        .version(crate_version!())
        .author(crate_authors!())
        .about("Stabilize shaky video with feature tracking and Kalman smoothing")
        .arg(Arg::new("input").takes_value(true).required(true))
        .arg(Arg::new("output").takes_value(true).required(true))
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .takes_value(true)
                .help("JSON file with stabilizer settings"),
        )
        .arg(
            Arg::new("process-noise")
                .long("process-noise")
                .takes_value(true)
                .help("Lower is smoother and less reactive"),
        )
        .arg(
            Arg::new("measurement-noise")
                .long("measurement-noise")
                .takes_value(true)
                .help("Lower follows the raw motion more closely"),
        )
        .arg(
            Arg::new("crop")
                .long("crop")
                .takes_value(true)
                .help("Horizontal border crop in pixels"),
        )
        .arg(
            Arg::new("fps")
                .long("fps")
                .takes_value(true)
                .help("Output frame rate (defaults to the input frame rate)"),
        )
        .arg(
            Arg::new("crf")
                .long("crf")
                .takes_value(true)
                .help("Encoder constant rate factor (0-51)"),
        )
        .arg(
            Arg::new("diagnostics")
                .long("diagnostics")
                .short('d')
                .takes_value(true)
                .help("Directory for per-frame trajectory logs"),
        )
        .arg(
            Arg::new("print-config")
                .long("print-config")
                .help("Print the effective configuration as JSON and exit"),
        )
        .arg(Arg::new("verbose").long("verbose").short('v'))
        .get_matches();

    init_logging(matches.is_present("verbose"))?;

    let mut config = match matches.value_of("config") {
        Some(path) => StabilizerConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {path}"))?,
        None => StabilizerConfig::default(),
    };
    if let Some(v) = matches.value_of("process-noise") {
        config.smoothing.process_noise = v.parse().context("--process-noise")?;
    }
    if let Some(v) = matches.value_of("measurement-noise") {
        config.smoothing.measurement_noise = v.parse().context("--measurement-noise")?;
    }
    if let Some(v) = matches.value_of("crop") {
        config.compositor.horizontal_border_crop = v.parse().context("--crop")?;
    }
    if let Some(dir) = matches.value_of("diagnostics") {
        config.diagnostics_dir = Some(PathBuf::from(dir));
    }

    if matches.is_present("print-config") {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    let mut settings = EncoderSettings::default();
    if let Some(v) = matches.value_of("fps") {
        settings.fps = Some(v.parse().context("--fps")?);
    }
    if let Some(v) = matches.value_of("crf") {
        settings.crf = Some(v.parse().context("--crf")?);
    }

    let input = matches.value_of("input").unwrap_or_default();
    let output = matches.value_of("output").unwrap_or_default();

    info!("SteadyCam starting: {} -> {}", input, output);

    let mut stabilizer = Stabilizer::new(config)?;
    let summary = {
        let mut stabilize = stabilizer.as_callback();
        transform_video(input, output, &settings, |_, frame| stabilize(frame))
            .with_context(|| format!("Failed to stabilize {input}"))?
    };
    stabilizer.finish()?;

    info!(
        frames = summary.frames,
        width = summary.width,
        height = summary.height,
        "Wrote {}",
        output
    );
    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
