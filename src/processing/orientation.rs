//! Quarter-turn rotation, center cropping and EXIF orientation.
//!
//! Every rotation here is a lossless quarter turn, so the rotated canvas is
//! always fully covered by source pixels and no fill color is ever sampled.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::{RgbaImage, imageops};
use tracing::{debug, info};

/// `true` when an image of this size is taller than it is wide.
#[must_use]
pub const fn is_portrait(width: u32, height: u32) -> bool {
    height > width
}

/// Turns portrait images a quarter turn counter-clockwise so the long edge is
/// horizontal. Landscape and square images pass through untouched.
pub fn normalize_orientation(image: RgbaImage) -> RgbaImage {
    let (width, height) = image.dimensions();
    if !is_portrait(width, height) {
        return image;
    }
    info!(width, height, "portrait image; rotating 90 degrees");
    imageops::rotate270(&image)
}

/// Unconditional quarter turn counter-clockwise requested by the user.
pub fn force_rotate(image: RgbaImage) -> RgbaImage {
    debug!(
        width = image.width(),
        height = image.height(),
        "forced 90 degree rotation"
    );
    imageops::rotate270(&image)
}

/// Size of a `(crop_w, crop_h)` window centered on a `(width, height)` image,
/// clipped to the image bounds.
#[must_use]
pub fn cropped_size(width: u32, height: u32, crop_w: u32, crop_h: u32) -> (u32, u32) {
    (width.min(crop_w), height.min(crop_h))
}

/// Crops a `(crop_w, crop_h)` window from the middle of `image`.
pub fn crop_center(image: RgbaImage, crop_w: u32, crop_h: u32) -> RgbaImage {
    let (width, height) = image.dimensions();
    let (out_w, out_h) = cropped_size(width, height, crop_w, crop_h);
    if (out_w, out_h) == (width, height) {
        return image;
    }
    let x = (width - out_w) / 2;
    let y = (height - out_h) / 2;
    debug!(width, height, out_w, out_h, x, y, "center crop");
    imageops::crop_imm(&image, x, y, out_w, out_h).to_image()
}

/// Reads the EXIF orientation tag (1..=8) if the file carries one.
pub fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let value = field.value.get_uint(0)?;
    let orientation = u16::try_from(value).ok()?;
    debug!(orientation, path = %path.display(), "exif orientation");
    Some(orientation)
}

/// Orientations 5 through 8 transpose the stored image.
#[must_use]
pub const fn orientation_swaps_axes(orientation: u16) -> bool {
    matches!(orientation, 5..=8)
}

/// Brings a stored image upright according to its EXIF orientation tag.
/// Unknown values leave the image as stored.
pub fn apply_exif_orientation(image: RgbaImage, orientation: u16) -> RgbaImage {
    match orientation {
        2 => imageops::flip_horizontal(&image),
        3 => imageops::rotate180(&image),
        4 => imageops::flip_vertical(&image),
        5 => imageops::flip_horizontal(&imageops::rotate90(&image)),
        6 => imageops::rotate90(&image),
        7 => imageops::flip_horizontal(&imageops::rotate270(&image)),
        8 => imageops::rotate270(&image),
        _ => image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Top-left red, everything else white.
    fn marked(width: u32, height: u32) -> RgbaImage {
        let mut img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img
    }

    #[test]
    fn portrait_is_turned_landscape() {
        let out = normalize_orientation(marked(3, 5));
        assert_eq!(out.dimensions(), (5, 3));
        // counter-clockwise: the top-left corner moves to bottom-left
        assert_eq!(out.get_pixel(0, 2).0, [255, 0, 0, 255]);
    }

    #[test]
    fn landscape_and_square_are_untouched() {
        let wide = marked(5, 3);
        assert_eq!(normalize_orientation(wide.clone()), wide);
        let square = marked(4, 4);
        assert_eq!(normalize_orientation(square.clone()), square);
    }

    #[test]
    fn forced_rotation_swaps_axes_even_for_landscape() {
        assert_eq!(force_rotate(marked(5, 3)).dimensions(), (3, 5));
    }

    #[test]
    fn crop_center_takes_middle_window() {
        let img = RgbaImage::from_fn(6, 4, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let out = crop_center(img, 2, 2);
        assert_eq!(out.dimensions(), (2, 2));
        assert_eq!(out.get_pixel(0, 0).0, [2, 1, 0, 255]);
    }

    #[test]
    fn crop_center_clips_to_smaller_images() {
        let out = crop_center(marked(100, 30), 60, 540);
        assert_eq!(out.dimensions(), (60, 30));
        assert_eq!(cropped_size(2000, 300, 960, 540), (960, 300));
    }

    #[test]
    fn exif_rotations_match_axis_swap() {
        for orientation in 1..=8u16 {
            let out = apply_exif_orientation(marked(5, 3), orientation);
            let expected = if orientation_swaps_axes(orientation) {
                (3, 5)
            } else {
                (5, 3)
            };
            assert_eq!(out.dimensions(), expected, "orientation {orientation}");
        }
    }
}
