use fast_image_resize as fir;
use image::RgbaImage;

use crate::error::{Error, Result};
use crate::processing::layout::TargetDimensions;

/// Lanczos3 resample of an RGBA buffer to exactly `target`.
pub fn resize_lanczos(source: &RgbaImage, target: TargetDimensions) -> Result<RgbaImage> {
    let TargetDimensions { width, height } = target;
    if source.dimensions() == (width, height) {
        return Ok(source.clone());
    }

    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )?;
    let mut dst_image = fir::images::Image::new(width, height, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3));
    let mut resizer = fir::Resizer::new();
    resizer.resize(&src_view, &mut dst_image, Some(&options))?;

    RgbaImage::from_raw(width, height, dst_image.into_vec()).ok_or(Error::ResizeBuffer(
        fir::ImageBufferError::InvalidBufferSize,
    ))
}
