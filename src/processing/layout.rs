//! Aspect-preserving geometry for the fixed display canvas.

/// Width of the display canvas every artifact is planned against.
pub const CANVAS_WIDTH: u32 = 960;
/// Height of the display canvas every artifact is planned against.
pub const CANVAS_HEIGHT: u32 = 540;

/// Planned output size. Never exceeds the bounding box it was planned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDimensions {
    pub width: u32,
    pub height: u32,
}

/// Letterbox padding that centers a planned image on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CenterOffset {
    pub x: u32,
    pub y: u32,
}

/// Scale `(src_w, src_h)` by `min(max_w / src_w, max_h / src_h)` and floor both edges.
///
/// Returns `None` when either source edge (or either bound) is zero. The
/// comparison is done on integer cross products so an exact fit lands exactly
/// on the bound instead of one pixel short. Edges that would floor to zero are
/// kept at one pixel so the result stays resizable.
pub fn contain_within(src_w: u32, src_h: u32, max_w: u32, max_h: u32) -> Option<TargetDimensions> {
    if src_w == 0 || src_h == 0 || max_w == 0 || max_h == 0 {
        return None;
    }
    let (sw, sh) = (u64::from(src_w), u64::from(src_h));
    let (mw, mh) = (u64::from(max_w), u64::from(max_h));

    // width ratio < height ratio  <=>  mw / sw < mh / sh  <=>  mw * sh < mh * sw
    let (width, height) = if mw * sh < mh * sw {
        (mw, sh * mw / sw)
    } else {
        (sw * mh / sh, mh)
    };

    Some(TargetDimensions {
        width: width.max(1) as u32,
        height: height.max(1) as u32,
    })
}

/// Same as [`contain_within`] against the fixed canvas.
pub fn plan_for_canvas(src_w: u32, src_h: u32) -> Option<TargetDimensions> {
    contain_within(src_w, src_h, CANVAS_WIDTH, CANVAS_HEIGHT)
}

/// Half the padding on each axis, truncated.
///
/// Odd differences leave the extra pixel on the right/bottom edge.
pub fn center_offset(inner: TargetDimensions, outer_w: u32, outer_h: u32) -> CenterOffset {
    CenterOffset {
        x: outer_w.saturating_sub(inner.width) / 2,
        y: outer_h.saturating_sub(inner.height) / 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> TargetDimensions {
        TargetDimensions { width, height }
    }

    #[test]
    fn wide_image_is_width_bound() {
        // 4000x2000: min(0.24, 0.27) = 0.24
        assert_eq!(plan_for_canvas(4000, 2000), Some(dims(960, 480)));
    }

    #[test]
    fn square_image_is_height_bound() {
        assert_eq!(plan_for_canvas(1000, 1000), Some(dims(540, 540)));
    }

    #[test]
    fn exact_sixteen_by_nine_fills_canvas() {
        assert_eq!(plan_for_canvas(1920, 1080), Some(dims(960, 540)));
        assert_eq!(plan_for_canvas(480, 270), Some(dims(960, 540)));
    }

    #[test]
    fn small_images_are_upscaled() {
        assert_eq!(plan_for_canvas(600, 300), Some(dims(960, 480)));
    }

    #[test]
    fn zero_edges_are_rejected() {
        assert_eq!(plan_for_canvas(0, 100), None);
        assert_eq!(plan_for_canvas(100, 0), None);
        assert_eq!(contain_within(10, 10, 0, 10), None);
    }

    #[test]
    fn degenerate_strip_keeps_one_pixel() {
        assert_eq!(plan_for_canvas(100_000, 1), Some(dims(960, 1)));
    }

    #[test]
    fn bounds_and_ratio_hold_across_sizes() {
        for w in (1..=4000).step_by(37) {
            for h in (1..=3000).step_by(41) {
                let t = plan_for_canvas(w, h).unwrap();
                assert!(t.width <= CANVAS_WIDTH, "{w}x{h} -> {t:?}");
                assert!(t.height <= CANVAS_HEIGHT, "{w}x{h} -> {t:?}");
                assert!(
                    t.width == CANVAS_WIDTH || t.height == CANVAS_HEIGHT,
                    "{w}x{h} -> {t:?} touches neither bound"
                );

                // w/h == W/H within one pixel of flooring on the derived edge.
                let scale = f64::min(
                    f64::from(CANVAS_WIDTH) / f64::from(w),
                    f64::from(CANVAS_HEIGHT) / f64::from(h),
                );
                let ideal_w = f64::from(w) * scale;
                let ideal_h = f64::from(h) * scale;
                assert!((f64::from(t.width) - ideal_w).abs() <= 1.0, "{w}x{h} -> {t:?}");
                assert!((f64::from(t.height) - ideal_h).abs() <= 1.0, "{w}x{h} -> {t:?}");
            }
        }
    }

    #[test]
    fn offsets_truncate_odd_padding() {
        assert_eq!(center_offset(dims(960, 480), 960, 540), CenterOffset { x: 0, y: 30 });
        assert_eq!(center_offset(dims(540, 540), 960, 540), CenterOffset { x: 210, y: 0 });
        // 960 - 721 = 239 -> 119, leaving 120 on the right.
        assert_eq!(center_offset(dims(721, 540), 960, 540), CenterOffset { x: 119, y: 0 });
    }
}
