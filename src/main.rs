//! Binary entrypoint for inkcrop.
//!
//! Delegates all logic to the library crate.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use inkcrop::config::{Configuration, ErrorPolicy};
use inkcrop::processing::dither::DitherAlgorithm;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "inkcrop",
    version,
    about = "Letterbox and dither photos for small e-ink frames"
)]
struct Args {
    /// Optional YAML config; flags below override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Glob pattern or directory of source images
    #[arg(short, long)]
    input: Option<String>,
    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Apply error-diffusion dithering
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    dither: Option<bool>,
    /// Dithering algorithm, e.g. FloydSteinberg, Atkinson, StevenPigeon
    #[arg(long, alias = "ditherAlg", value_name = "NAME")]
    dither_alg: Option<DitherAlgorithm>,
    /// Process the inputs once per known dithering algorithm
    #[arg(long, alias = "ditherAll", num_args = 0..=1, default_missing_value = "true")]
    dither_all: Option<bool>,
    /// Dithering strength between 0 and 1
    #[arg(long, alias = "ditherStrength")]
    dither_strength: Option<f32>,
    /// Alternate scan direction on every row
    #[arg(long, alias = "ditherSerpentine", num_args = 0..=1, default_missing_value = "true")]
    dither_serpentine: Option<bool>,
    /// Force a quarter turn before orientation correction
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    rotate: Option<bool>,
    /// Force a centered canvas-sized crop
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    crop: Option<bool>,
    /// JPEG quality (0-100)
    #[arg(short, long)]
    quality: Option<u8>,
    /// Honor the EXIF orientation tag
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    exif_orientation: Option<bool>,
    /// Watch the input directory and process new files as they appear
    #[arg(short, long, num_args = 0..=1, default_missing_value = "true")]
    daemon: Option<bool>,
    /// Cycle the matched files through output/linkedimage.jpg
    #[arg(short, long, num_args = 0..=1, default_missing_value = "true")]
    link: Option<bool>,
    /// Seconds each slideshow entry stays linked
    #[arg(long, value_name = "SECONDS")]
    link_timer: Option<u64>,
    /// What a batch does on a failing file: abort or continue
    #[arg(long, value_name = "POLICY")]
    on_error: Option<ErrorPolicy>,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn into_config(self) -> Result<Configuration> {
        let mut cfg = match &self.config {
            Some(path) => Configuration::from_yaml_file(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?,
            None => Configuration::default(),
        };

        if let Some(v) = self.input {
            cfg.input = v;
        }
        if let Some(v) = self.output {
            cfg.output = v;
        }
        if let Some(v) = self.dither {
            cfg.dither = v;
        }
        if let Some(v) = self.dither_alg {
            cfg.dither_alg = v;
        }
        if let Some(v) = self.dither_all {
            cfg.dither_all = v;
        }
        if let Some(v) = self.dither_strength {
            cfg.dither_strength = v;
        }
        if let Some(v) = self.dither_serpentine {
            cfg.dither_serpentine = v;
        }
        if let Some(v) = self.rotate {
            cfg.rotate = v;
        }
        if let Some(v) = self.crop {
            cfg.crop = v;
        }
        if let Some(v) = self.quality {
            cfg.quality = v;
        }
        if let Some(v) = self.exif_orientation {
            cfg.exif_orientation = v;
        }
        if let Some(v) = self.daemon {
            cfg.daemon = v;
        }
        if let Some(v) = self.link {
            cfg.link = v;
        }
        if let Some(secs) = self.link_timer {
            cfg.link_timer = Duration::from_secs(secs);
        }
        if let Some(v) = self.on_error {
            cfg.on_error = v;
        }

        cfg.validated().context("invalid configuration values")
    }
}

fn init_tracing(verbosity: u8) {
    // RUST_LOG wins; otherwise -v picks the level
    let default = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let cfg = args.into_config()?;
    tracing::debug!("effective configuration:\n{:#?}", cfg);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("failed to listen for ctrl-c: {err}");
                return;
            }
            tracing::info!("ctrl-c received; shutting down");
            cancel.cancel();
        });
    }

    inkcrop::run(cfg, cancel).await
}
