use std::path::PathBuf;

use thiserror::Error;

/// Library error type for inkcrop operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The configured input is not a valid glob pattern.
    #[error("invalid input pattern {pattern:?}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// Filesystem access failed for the given path.
    #[error("i/o error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source image could not be decoded.
    #[error("failed to decode {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The output artifact could not be encoded.
    #[error("failed to encode {path}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Resampling rejected the requested geometry.
    #[error(transparent)]
    Resize(#[from] fast_image_resize::ResizeError),

    /// The pixel buffer handed to the resampler was malformed.
    #[error(transparent)]
    ResizeBuffer(#[from] fast_image_resize::ImageBufferError),

    /// The decoded image has a zero-length edge and cannot be planned.
    #[error("image {path} has no pixels ({width}x{height})")]
    EmptyImage {
        path: PathBuf,
        width: u32,
        height: u32,
    },

    /// The directory-create subscription could not be established.
    #[error("failed to watch {path}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// Creating or removing the published slideshow pointer failed.
    #[error("slideshow pointer {path}")]
    Link {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input resolved to no files.
    #[error("no files matched {0:?}")]
    EmptyScan(String),

    /// The dither algorithm name is not one of the known kernels.
    #[error("unknown dither algorithm {0:?}")]
    UnknownAlgorithm(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
