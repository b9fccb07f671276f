use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use tracing::warn;

use crate::processing::dither::{DitherAlgorithm, Disperser};

/// File name of the slideshow pointer inside the output directory.
pub const LINK_NAME: &str = "linkedimage.jpg";

/// What a batch does when a file fails to decode, encode or write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Stop the whole batch on the first failure.
    #[default]
    Abort,
    /// Log the failure and move on to the next file.
    Continue,
}

impl std::str::FromStr for ErrorPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "continue" => Ok(Self::Continue),
            other => anyhow::bail!("unknown error policy '{other}' (expected abort or continue)"),
        }
    }
}

/// The long-running or one-shot driver selected by the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Process the matches once with the configured options.
    Batch,
    /// Process the matches once per known dither algorithm.
    DitherAll,
    /// Watch the input directory and process files as they appear.
    Watch,
    /// Cycle already-processed files through the published pointer.
    Slideshow,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Glob pattern or directory naming the source images.
    pub input: String,
    /// Directory that receives the artifacts and the slideshow pointer.
    pub output: PathBuf,
    /// Quantize through error-diffusion dithering before resizing.
    pub dither: bool,
    pub dither_alg: DitherAlgorithm,
    /// Run the batch once per known dither algorithm.
    pub dither_all: bool,
    /// Kernel strength in `[0, 1]`.
    pub dither_strength: f32,
    pub dither_serpentine: bool,
    /// Force a quarter turn before orientation normalization.
    pub rotate: bool,
    /// Force a centered canvas-sized crop before orientation normalization.
    pub crop: bool,
    /// JPEG quality in `[0, 100]`.
    pub quality: u8,
    /// Honor the EXIF orientation tag right after decoding.
    pub exif_orientation: bool,
    /// Watch the input directory for new images.
    pub daemon: bool,
    /// Publish the matches one at a time through the slideshow pointer.
    pub link: bool,
    /// How long each slideshow entry stays published.
    #[serde(with = "humantime_serde")]
    pub link_timer: Duration,
    pub on_error: ErrorPolicy,
    /// Capacity of the queue between watch ingestion and processing.
    pub watch_queue_depth: usize,
    /// Grace period before a freshly created file is processed.
    #[serde(with = "humantime_serde")]
    pub watch_settle: Duration,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            input: "*.jp*g".to_string(),
            output: PathBuf::from("output"),
            dither: true,
            dither_alg: DitherAlgorithm::StevenPigeon,
            dither_all: false,
            dither_strength: 0.9,
            dither_serpentine: false,
            rotate: false,
            crop: false,
            quality: 80,
            exif_orientation: false,
            daemon: false,
            link: false,
            link_timer: Duration::from_secs(900),
            on_error: ErrorPolicy::Abort,
            watch_queue_depth: 16,
            watch_settle: Duration::from_millis(500),
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(!self.input.trim().is_empty(), "input must not be empty");
        ensure!(
            (0.0..=1.0).contains(&self.dither_strength),
            "dither-strength must be within 0..=1 (got {})",
            self.dither_strength
        );
        ensure!(
            self.quality <= 100,
            "quality must be within 0..=100 (got {})",
            self.quality
        );
        ensure!(
            self.link_timer > Duration::ZERO,
            "link-timer must be greater than zero"
        );
        ensure!(
            self.watch_queue_depth > 0,
            "watch-queue-depth must be greater than zero"
        );
        Ok(self)
    }

    /// Mode precedence: dither-all, then daemon, then link, else a single batch.
    pub fn run_mode(&self) -> RunMode {
        let requested = [self.dither_all, self.daemon, self.link]
            .iter()
            .filter(|on| **on)
            .count();
        if requested > 1 {
            warn!(
                dither_all = self.dither_all,
                daemon = self.daemon,
                link = self.link,
                "several run modes requested; using the first of dither-all, daemon, link"
            );
        }
        if self.dither_all {
            RunMode::DitherAll
        } else if self.daemon {
            RunMode::Watch
        } else if self.link {
            RunMode::Slideshow
        } else {
            RunMode::Batch
        }
    }

    /// Per-file options with the configured dither settings.
    pub fn processing_options(&self) -> ProcessingOptions {
        ProcessingOptions {
            disperser: self.dither.then(|| {
                Disperser::new(self.dither_alg, self.dither_strength, self.dither_serpentine)
            }),
            force_rotate: self.rotate,
            force_crop: self.crop,
            quality: self.quality,
            exif_orientation: self.exif_orientation,
        }
    }

    /// Per-file options that always dither with `algorithm`.
    pub fn processing_options_for(&self, algorithm: DitherAlgorithm) -> ProcessingOptions {
        ProcessingOptions {
            disperser: Some(Disperser::new(
                algorithm,
                self.dither_strength,
                self.dither_serpentine,
            )),
            ..self.processing_options()
        }
    }

    pub fn link_path(&self) -> PathBuf {
        self.output.join(LINK_NAME)
    }
}

/// Immutable per-run options consumed by the image pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessingOptions {
    /// `Some` when dithering is enabled.
    pub disperser: Option<Disperser>,
    pub force_rotate: bool,
    pub force_crop: bool,
    pub quality: u8,
    pub exif_orientation: bool,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Configuration::default().processing_options()
    }
}
