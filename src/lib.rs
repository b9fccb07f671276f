//! Normalize photographs onto a fixed letterboxed canvas for small e-ink and
//! slideshow frames, with optional error-diffusion dithering.

pub mod buffer;
pub mod config;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod processing;
pub mod scan;
pub mod tasks {
    pub mod slideshow;
    pub mod watch;
}

pub use error::Error;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::buffer::PhotoBuffer;
use crate::config::{Configuration, RunMode};
use crate::pipeline::{BatchReport, ImagePipeline};
use crate::processing::dither::DitherAlgorithm;

/// Run whichever mode `cfg` selects until it finishes or `cancel` fires.
pub async fn run(cfg: Configuration, cancel: CancellationToken) -> Result<()> {
    pipeline::prepare_output_dir(&cfg.output)?;

    match cfg.run_mode() {
        RunMode::Batch => {
            let pipeline = ImagePipeline::new(cfg.processing_options(), cfg.output.clone());
            run_once(pipeline, &cfg).await?;
        }
        RunMode::DitherAll => {
            for &algorithm in DitherAlgorithm::ALL {
                if cancel.is_cancelled() {
                    break;
                }
                info!(%algorithm, "dithering all inputs");
                let pipeline =
                    ImagePipeline::new(cfg.processing_options_for(algorithm), cfg.output.clone());
                run_once(pipeline, &cfg)
                    .await
                    .with_context(|| format!("dither-all pass for {algorithm}"))?;
            }
        }
        RunMode::Watch => {
            let pipeline = Arc::new(ImagePipeline::new(
                cfg.processing_options(),
                cfg.output.clone(),
            ));
            let settings = tasks::watch::WatchSettings::from_config(&cfg);
            tasks::watch::run(pipeline, settings, cancel).await?;
        }
        RunMode::Slideshow => {
            let matches = scan::resolve_input(&cfg.input)?;
            let playlist = PhotoBuffer::from_vec(matches, &cfg.input)?;
            tasks::slideshow::run(playlist, cfg.link_path(), cfg.link_timer, cancel).await?;
        }
    }
    Ok(())
}

async fn run_once(pipeline: ImagePipeline, cfg: &Configuration) -> Result<BatchReport> {
    let input = cfg.input.clone();
    let policy = cfg.on_error;
    tokio::task::spawn_blocking(move || -> Result<BatchReport> {
        let paths = scan::resolve_input(&input)?;
        info!(input = %input, matches = paths.len(), "resolved input");
        Ok(pipeline.run_batch(&paths, policy)?)
    })
    .await
    .context("pipeline task panicked")?
}
