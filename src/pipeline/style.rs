//! Style transforms applied to the bare QR raster before it is placed on
//! the canvas.
//!
//! A transform may grow the raster (the shadow needs room to spread); the
//! growth is reported as `inset` so the compositor can keep the code itself
//! at its nominal position.

use crate::config::{Color, StyleVariant};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

/// Corner radius of the `rounded` mask, in pixels.
pub const CORNER_RADIUS: f32 = 10.0;

/// Transparent border added around the code by `shadow`.
pub const SHADOW_MARGIN: u32 = 10;
/// Shadow offset to the right and down.
pub const SHADOW_OFFSET: u32 = 3;
pub const SHADOW_SIGMA: f32 = 3.0;
/// 20% black.
pub const SHADOW_ALPHA: u8 = 51;

/// A styled code raster and how far the code sits inside it.
#[derive(Debug, Clone)]
pub struct StyledCode {
    pub image: RgbaImage,
    /// Offset of the code's top-left corner within `image`.
    pub inset: u32,
}

/// Apply the per-code part of `variant`.
///
/// `gradient` only changes the canvas background, so the code passes
/// through untouched, like `default`.
pub fn apply(code: RgbaImage, variant: StyleVariant) -> StyledCode {
    match variant {
        StyleVariant::Default | StyleVariant::Gradient => StyledCode { image: code, inset: 0 },
        StyleVariant::Rounded => StyledCode {
            image: round_corners(code, CORNER_RADIUS),
            inset: 0,
        },
        StyleVariant::Shadow => StyledCode {
            image: drop_shadow(&code),
            inset: SHADOW_MARGIN,
        },
    }
}

/// Multiply alpha by an anti-aliased rounded-rectangle mask.
pub fn round_corners(mut img: RgbaImage, radius: f32) -> RgbaImage {
    let (w, h) = (img.width() as f32, img.height() as f32);
    let r = radius.min(w / 2.0).min(h / 2.0);
    if r <= 0.0 {
        return img;
    }

    for (x, y, px) in img.enumerate_pixels_mut() {
        let (fx, fy) = (x as f32 + 0.5, y as f32 + 0.5);
        let cx = fx.clamp(r, w - r);
        let cy = fy.clamp(r, h - r);
        let dist = ((fx - cx).powi(2) + (fy - cy).powi(2)).sqrt();
        let coverage = (r - dist + 0.5).clamp(0.0, 1.0);
        if coverage < 1.0 {
            px[3] = (px[3] as f32 * coverage).round() as u8;
        }
    }
    img
}

/// Code on a transparent margin with a blurred shadow underneath.
pub fn drop_shadow(code: &RgbaImage) -> RgbaImage {
    let (w, h) = code.dimensions();
    let mut canvas = RgbaImage::new(w + 2 * SHADOW_MARGIN, h + 2 * SHADOW_MARGIN);

    let at = (SHADOW_MARGIN + SHADOW_OFFSET) as i32;
    draw_filled_rect_mut(
        &mut canvas,
        Rect::at(at, at).of_size(w, h),
        Rgba([0, 0, 0, SHADOW_ALPHA]),
    );
    let mut canvas = image::imageops::blur(&canvas, SHADOW_SIGMA);

    image::imageops::overlay(&mut canvas, code, SHADOW_MARGIN as i64, SHADOW_MARGIN as i64);
    canvas
}

/// Diagonal gradient from `from` at the top-left to `to` at the
/// bottom-right.
pub fn gradient_background(width: u32, height: u32, from: Color, to: Color) -> RgbaImage {
    let dx = width.saturating_sub(1).max(1) as f32;
    let dy = height.saturating_sub(1).max(1) as f32;
    RgbaImage::from_fn(width, height, |x, y| {
        let t = (x as f32 / dx + y as f32 / dy) / 2.0;
        from.lerp(to, t).to_rgba()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(size: u32) -> RgbaImage {
        RgbaImage::from_pixel(size, size, Rgba([0, 0, 0, 255]))
    }

    #[test]
    fn default_leaves_code_untouched() {
        let s = apply(solid(50), StyleVariant::Default);
        assert_eq!(s.inset, 0);
        assert_eq!(s.image, solid(50));
    }

    #[test]
    fn rounded_clears_corners_and_keeps_edges() {
        let s = apply(solid(100), StyleVariant::Rounded);
        assert_eq!(s.inset, 0);
        let img = &s.image;
        for (x, y) in [(0, 0), (99, 0), (0, 99), (99, 99)] {
            assert_eq!(img.get_pixel(x, y)[3], 0, "corner ({x},{y})");
        }
        // Middle of each edge and the centre stay opaque.
        for (x, y) in [(50, 0), (0, 50), (99, 50), (50, 99), (50, 50)] {
            assert_eq!(img.get_pixel(x, y)[3], 255, "edge ({x},{y})");
        }
    }

    #[test]
    fn rounded_edge_is_anti_aliased() {
        let img = round_corners(solid(100), CORNER_RADIUS);
        // The top row fades in across the corner arc.
        let partial = (0..10).any(|x| {
            let a = img.get_pixel(x, 0)[3];
            a > 0 && a < 255
        });
        assert!(partial);
    }

    #[test]
    fn shadow_grows_raster_and_darkens_offset_side() {
        let code = RgbaImage::from_pixel(60, 60, Rgba([255, 255, 255, 255]));
        let s = apply(code, StyleVariant::Shadow);
        assert_eq!(s.inset, SHADOW_MARGIN);
        assert_eq!(s.image.dimensions(), (80, 80));

        // Code is copied at the inset.
        assert_eq!(*s.image.get_pixel(10, 10), Rgba([255, 255, 255, 255]));
        // Shadow spills past the bottom-right edge of the code …
        assert!(s.image.get_pixel(71, 71)[3] > 0);
        // … but not past the top-left.
        assert_eq!(s.image.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn gradient_runs_corner_to_corner() {
        let img = gradient_background(101, 51, Color::WHITE, Color::NEUTRAL);
        assert_eq!(*img.get_pixel(0, 0), Color::WHITE.to_rgba());
        assert_eq!(*img.get_pixel(100, 50), Color::NEUTRAL.to_rgba());
        let mid = img.get_pixel(50, 25)[0];
        assert!(mid < 255 && mid > 0xF0, "mid = {mid}");
    }

    #[test]
    fn gradient_handles_single_pixel() {
        let img = gradient_background(1, 1, Color::WHITE, Color::NEUTRAL);
        assert_eq!(*img.get_pixel(0, 0), Color::WHITE.to_rgba());
    }
}
