//! Per-file normalization: decode, transform, plan, name and encode.
//!
//! The artifact name is a pure function of the source dimensions and the
//! processing options, so it is planned from the image header first. An
//! artifact that already exists is skipped without decoding the source; the
//! final write uses `create_new` so a concurrent writer is never clobbered.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{ImageError, ImageReader, Rgb, RgbImage, RgbaImage};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ErrorPolicy, ProcessingOptions};
use crate::error::{Error, Result};
use crate::processing::dither::DitherAlgorithm;
use crate::processing::layout::{
    CANVAS_HEIGHT, CANVAS_WIDTH, CenterOffset, TargetDimensions, center_offset, plan_for_canvas,
};
use crate::processing::orientation::{
    apply_exif_orientation, crop_center, cropped_size, force_rotate, is_portrait,
    normalize_orientation, orientation_swaps_axes, read_orientation,
};
use crate::processing::resize::resize_lanczos;
use crate::scan::supported_extension;

/// A decoded source, owned by a single pipeline invocation.
#[derive(Debug)]
pub struct SourceImage {
    pub pixels: RgbaImage,
}

impl SourceImage {
    pub fn open(path: &Path) -> Result<Self> {
        let reader = open_reader(path)?;
        let format = reader.format();
        let decoded = reader.decode().map_err(|source| Error::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(
            path = %path.display(),
            ?format,
            width = decoded.width(),
            height = decoded.height(),
            "decoded"
        );
        Ok(Self {
            pixels: decoded.into_rgba8(),
        })
    }
}

fn open_reader(path: &Path) -> Result<ImageReader<std::io::BufReader<fs::File>>> {
    ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|err| Error::io(path, err))
}

fn read_dimensions(path: &Path) -> Result<(u32, u32)> {
    open_reader(path)?
        .into_dimensions()
        .map_err(|source| Error::Decode {
            path: path.to_path_buf(),
            source,
        })
}

/// Geometry of one artifact: the oriented source size, the planned output
/// size, and the letterbox offsets on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub oriented: (u32, u32),
    pub target: TargetDimensions,
    pub offset: CenterOffset,
}

impl Plan {
    /// Plan for an image that has already been through every orientation step.
    pub fn for_oriented(width: u32, height: u32) -> Option<Self> {
        let target = plan_for_canvas(width, height)?;
        Some(Self {
            oriented: (width, height),
            target,
            offset: center_offset(target, CANVAS_WIDTH, CANVAS_HEIGHT),
        })
    }
}

/// Predict the geometry the transform steps will produce for a
/// `width x height` source, without touching any pixels.
pub fn plan_geometry(
    width: u32,
    height: u32,
    options: &ProcessingOptions,
    exif_orientation: Option<u16>,
) -> Option<Plan> {
    let (mut w, mut h) = (width, height);
    if exif_orientation.is_some_and(orientation_swaps_axes) {
        (w, h) = (h, w);
    }
    if options.force_rotate {
        (w, h) = (h, w);
    }
    if options.force_crop {
        (w, h) = cropped_size(w, h, CANVAS_WIDTH, CANVAS_HEIGHT);
    }
    if is_portrait(w, h) {
        (w, h) = (h, w);
    }
    Plan::for_oriented(w, h)
}

/// Source file stem with underscores turned into hyphens, so the `_` separators
/// in the artifact name stay unambiguous.
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().replace('_', "-"))
        .unwrap_or_default()
}

/// `<base>[-<algorithm>]_<w>x<h>_<ox>x<oy>_resized.jpg`
pub fn artifact_name(base: &str, algorithm: Option<DitherAlgorithm>, plan: &Plan) -> String {
    let stem = match algorithm {
        Some(alg) => format!("{base}-{alg}"),
        None => base.to_string(),
    };
    format!(
        "{stem}_{}x{}_{}x{}_resized.jpg",
        plan.target.width, plan.target.height, plan.offset.x, plan.offset.y
    )
}

/// What happened to one input path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Written(PathBuf),
    SkippedExisting(PathBuf),
    SkippedUnsupported,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub written: usize,
    pub skipped_existing: usize,
    pub skipped_unsupported: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct ImagePipeline {
    options: ProcessingOptions,
    output_dir: PathBuf,
}

impl ImagePipeline {
    pub fn new(options: ProcessingOptions, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            options,
            output_dir: output_dir.into(),
        }
    }

    fn artifact_path(&self, source: &Path, plan: &Plan) -> PathBuf {
        let algorithm = self.options.disperser.map(|d| d.algorithm());
        self.output_dir
            .join(artifact_name(&base_name(source), algorithm, plan))
    }

    /// Run one input through the pipeline. Skips are `Ok`; anything that went
    /// wrong while reading, transforming or writing is an `Err`.
    pub fn process(&self, path: &Path) -> Result<Outcome> {
        if supported_extension(path).is_none() {
            info!(path = %path.display(), "not a supported image format; skipping");
            return Ok(Outcome::SkippedUnsupported);
        }
        info!(
            input = %path.display(),
            output = %self.output_dir.display(),
            "Processing"
        );

        let orientation = if self.options.exif_orientation {
            read_orientation(path)
        } else {
            None
        };

        let (width, height) = read_dimensions(path)?;
        let planned = plan_geometry(width, height, &self.options, orientation).ok_or_else(|| {
            Error::EmptyImage {
                path: path.to_path_buf(),
                width,
                height,
            }
        })?;
        let planned_path = self.artifact_path(path, &planned);
        if planned_path.exists() {
            info!(path = %planned_path.display(), "artifact already exists; skipping");
            return Ok(Outcome::SkippedExisting(planned_path));
        }

        let source = SourceImage::open(path)?;
        let image = self.transform(source.pixels, orientation);
        let (oriented_w, oriented_h) = image.dimensions();
        let plan = Plan::for_oriented(oriented_w, oriented_h).ok_or_else(|| Error::EmptyImage {
            path: path.to_path_buf(),
            width: oriented_w,
            height: oriented_h,
        })?;

        let out_path = if plan == planned {
            planned_path
        } else {
            warn!(
                path = %path.display(),
                header = ?planned.oriented,
                decoded = ?plan.oriented,
                "decoded size differs from header; renaming artifact"
            );
            let renamed = self.artifact_path(path, &plan);
            if renamed.exists() {
                info!(path = %renamed.display(), "artifact already exists; skipping");
                return Ok(Outcome::SkippedExisting(renamed));
            }
            renamed
        };

        let resized = resize_lanczos(&image, plan.target)?;
        info!(
            "Resized from {}x{} to {}x{}",
            oriented_w, oriented_h, plan.target.width, plan.target.height
        );

        self.write_artifact(&out_path, &resized)
    }

    /// Dither, forced rotate/crop and orientation normalization, in that order.
    fn transform(&self, pixels: RgbaImage, orientation: Option<u16>) -> RgbaImage {
        let mut image = pixels;
        if let Some(o) = orientation {
            image = apply_exif_orientation(image, o);
        }
        if let Some(disperser) = &self.options.disperser {
            image = disperser.dither(&image);
        }
        if self.options.force_rotate {
            image = force_rotate(image);
        }
        if self.options.force_crop {
            image = crop_center(image, CANVAS_WIDTH, CANVAS_HEIGHT);
        }
        normalize_orientation(image)
    }

    fn write_artifact(&self, path: &Path, image: &RgbaImage) -> Result<Outcome> {
        let file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                info!(path = %path.display(), "artifact appeared concurrently; skipping");
                return Ok(Outcome::SkippedExisting(path.to_path_buf()));
            }
            Err(err) => return Err(Error::io(path, err)),
        };

        let mut writer = BufWriter::new(file);
        let rgb = flatten_alpha(image);
        let quality = self.options.quality.clamp(1, 100);
        let encoded = JpegEncoder::new_with_quality(&mut writer, quality).encode_image(&rgb);
        let encoded = encoded.and_then(|()| writer.flush().map_err(ImageError::IoError));

        if let Err(source) = encoded {
            drop(writer);
            if let Err(err) = fs::remove_file(path) {
                warn!(path = %path.display(), "failed to remove partial artifact: {err}");
            }
            return Err(Error::Encode {
                path: path.to_path_buf(),
                source,
            });
        }

        info!(path = %path.display(), "Created new image");
        Ok(Outcome::Written(path.to_path_buf()))
    }

    /// Process `paths` in order. With [`ErrorPolicy::Abort`] the first failure
    /// ends the batch and is returned; with [`ErrorPolicy::Continue`] it is
    /// logged and counted.
    #[instrument(skip_all, fields(output = %self.output_dir.display(), files = paths.len()))]
    pub fn run_batch(&self, paths: &[PathBuf], policy: ErrorPolicy) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        for path in paths {
            match self.process(path) {
                Ok(Outcome::Written(_)) => report.written += 1,
                Ok(Outcome::SkippedExisting(_)) => report.skipped_existing += 1,
                Ok(Outcome::SkippedUnsupported) => report.skipped_unsupported += 1,
                Err(err) => match policy {
                    ErrorPolicy::Abort => return Err(err),
                    ErrorPolicy::Continue => {
                        error!(path = %path.display(), "processing failed: {:#}", anyhow::Error::from(err));
                        report.failed += 1;
                    }
                },
            }
        }
        info!(
            written = report.written,
            skipped_existing = report.skipped_existing,
            skipped_unsupported = report.skipped_unsupported,
            failed = report.failed,
            "batch complete"
        );
        Ok(report)
    }
}

/// JPEG has no alpha channel; composite over black so transparent palette
/// entries come out black.
fn flatten_alpha(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let scale = |c: u8| ((u16::from(c) * u16::from(a) + 127) / 255) as u8;
        Rgb([scale(r), scale(g), scale(b)])
    })
}

/// Create the output directory (and parents) if it is missing.
pub fn prepare_output_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(dir).map_err(|err| Error::io(dir, err))?;
    info!(dir = %dir.display(), "created output directory");
    Ok(())
}
