//! QR raster: encode a URL and paint it at an exact pixel size.

use crate::config::Color;
use crate::error::ComposeError;
use image::RgbaImage;
use qrcode::{EcLevel, QrCode};

/// Light modules around the symbol, on every side.
pub const QUIET_ZONE: usize = 2;

/// Error-correction level for every code; level M survives ~15% damage.
pub const EC_LEVEL: EcLevel = EcLevel::M;

/// Encode `data` and render it as a `size × size` RGBA raster.
///
/// Each output pixel samples the module it falls into, so the image is
/// always exactly `size` wide even when `size` is not a multiple of the
/// module count.
pub fn render_code(
    data: &str,
    size: u32,
    foreground: Color,
    background: Color,
) -> Result<RgbaImage, ComposeError> {
    if size == 0 {
        return Err(ComposeError::InvalidStyle("code size must be > 0".into()));
    }

    let code = QrCode::with_error_correction_level(data.as_bytes(), EC_LEVEL)
        .map_err(|e| ComposeError::Encode(e.to_string()))?;
    let width = code.width();
    let modules = code.to_colors();
    let span = (width + 2 * QUIET_ZONE) as u64;

    let dark = foreground.to_rgba();
    let light = background.to_rgba();

    let module_at = |px: u32| (px as u64 * span / size as u64) as usize;

    Ok(RgbaImage::from_fn(size, size, |x, y| {
        let (mx, my) = (module_at(x), module_at(y));
        let inside = (QUIET_ZONE..QUIET_ZONE + width).contains(&mx)
            && (QUIET_ZONE..QUIET_ZONE + width).contains(&my);
        if !inside {
            return light;
        }
        match modules[(my - QUIET_ZONE) * width + (mx - QUIET_ZONE)] {
            qrcode::Color::Dark => dark,
            qrcode::Color::Light => light,
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://localhost:3000/preview/deck-1739000000000000-42";

    #[test]
    fn raster_has_exact_size() {
        for size in [21, 100, 300, 301] {
            let img = render_code(URL, size, Color::BLACK, Color::WHITE).unwrap();
            assert_eq!(img.dimensions(), (size, size));
        }
    }

    #[test]
    fn quiet_zone_and_finder_pattern() {
        let img = render_code(URL, 300, Color::BLACK, Color::WHITE).unwrap();
        // Outer corner is quiet zone.
        assert_eq!(*img.get_pixel(0, 0), Color::WHITE.to_rgba());

        // The first symbol module is the top-left finder pattern, always dark.
        let code = QrCode::with_error_correction_level(URL.as_bytes(), EC_LEVEL).unwrap();
        let span = (code.width() + 2 * QUIET_ZONE) as u32;
        let px = (QUIET_ZONE as u32 * 300).div_ceil(span) + 1;
        assert_eq!(*img.get_pixel(px, px), Color::BLACK.to_rgba());
    }

    #[test]
    fn uses_configured_colours() {
        let navy = Color::rgb(0x00, 0x1f, 0x5c);
        let cream = Color::rgb(0xff, 0xf8, 0xe7);
        let img = render_code(URL, 120, navy, cream).unwrap();
        assert!(img.pixels().all(|p| *p == navy.to_rgba() || *p == cream.to_rgba()));
        assert!(img.pixels().any(|p| *p == navy.to_rgba()));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let long = "x".repeat(5000);
        let err = render_code(&long, 300, Color::BLACK, Color::WHITE).unwrap_err();
        assert!(matches!(err, ComposeError::Encode(_)), "got {err:?}");
    }

    #[test]
    fn zero_size_is_rejected() {
        let err = render_code(URL, 0, Color::BLACK, Color::WHITE).unwrap_err();
        assert!(matches!(err, ComposeError::InvalidStyle(_)));
    }
}
