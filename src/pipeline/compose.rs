//! Code-image compositor: QR raster + style + captions → one PNG.
//!
//! ## Layout
//!
//! ```text
//!  y = 0   ┌──────────── image_width ────────────┐
//!  y = 15  │        Deck Name (bold caption)       │  40 px strip
//!  y = 60  │          ┌──────────────┐             │
//!          │          │   QR code    │ code_size   │
//!          │          └──────────────┘             │
//!  +20     │           Scan to preview             │  30 px strip
//!          └───────────────────────────────────────┘ image_height
//! ```
//!
//! The code is centred horizontally. Style transforms that grow the raster
//! (the shadow) are placed so the code itself still starts at y = 60.

use super::caption::CaptionStrip;
use super::encode::encode_rgba;
use super::{qr, style as styling};
use crate::config::{Color, StyleConfig, StyleVariant};
use crate::error::ComposeError;
use image::RgbaImage;
use resvg::usvg::fontdb;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Top edge of the code on the canvas.
pub const CODE_TOP: u32 = 60;
/// Top edge of the primary caption strip.
pub const CAPTION_TOP: u32 = 15;
/// Space between the bottom of the code and the hint strip.
pub const HINT_GAP: u32 = 20;

/// Renders code images. Holds the font database so it is scanned once,
/// not per image; clones share it.
#[derive(Clone)]
pub struct CodeImageCompositor {
    fontdb: Arc<fontdb::Database>,
}

impl fmt::Debug for CodeImageCompositor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeImageCompositor")
            .field("fonts", &self.fontdb.len())
            .finish()
    }
}

impl Default for CodeImageCompositor {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeImageCompositor {
    /// Compositor using the fonts installed on this machine.
    pub fn new() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        info!("Loaded {} system font faces for captions", db.len());
        Self::with_font_database(db)
    }

    /// Compositor with a caller-supplied font set. An empty database is
    /// valid: captions are then skipped by the text renderer.
    pub fn with_font_database(db: fontdb::Database) -> Self {
        Self { fontdb: Arc::new(db) }
    }

    /// Build the full canvas for `url` without encoding it.
    pub fn compose(&self, url: &str, caption: &str, style: &StyleConfig) -> Result<RgbaImage, ComposeError> {
        style
            .validate()
            .map_err(|e| ComposeError::InvalidStyle(e.to_string()))?;

        let (width, height) = (style.image_width, style.image_height);
        let mut canvas = match style.variant {
            StyleVariant::Gradient => {
                styling::gradient_background(width, height, style.background, Color::NEUTRAL)
            }
            _ => RgbaImage::from_pixel(width, height, style.background.to_rgba()),
        };

        let code = qr::render_code(url, style.code_size, style.foreground, style.background)?;
        let styled = styling::apply(code, style.variant);

        let left = ((width - style.code_size) / 2) as i64;
        let inset = styled.inset as i64;
        image::imageops::overlay(&mut canvas, &styled.image, left - inset, CODE_TOP as i64 - inset);

        let title = CaptionStrip::primary(
            width,
            caption,
            &style.caption_font,
            style.caption_size,
            style.caption_color,
        )
        .render(&self.fontdb)?;
        image::imageops::overlay(&mut canvas, &title, 0, CAPTION_TOP as i64);

        let hint = CaptionStrip::hint(width, &style.caption_font, style.caption_color)
            .render(&self.fontdb)?;
        let hint_top = CODE_TOP + style.code_size + HINT_GAP;
        image::imageops::overlay(&mut canvas, &hint, 0, hint_top as i64);

        debug!(
            "Composed {:?} code image {}x{} for {}",
            style.variant, width, height, url
        );
        Ok(canvas)
    }

    /// Compose and PNG-encode. CPU-bound; see [`Self::render_async`].
    pub fn render(&self, url: &str, caption: &str, style: &StyleConfig) -> Result<Vec<u8>, ComposeError> {
        let canvas = self.compose(url, caption, style)?;
        Ok(encode_rgba(canvas)?)
    }

    /// [`Self::render`] on the blocking pool.
    pub async fn render_async(
        &self,
        url: String,
        caption: String,
        style: StyleConfig,
    ) -> Result<Vec<u8>, ComposeError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.render(&url, &caption, &style))
            .await
            .map_err(|e| ComposeError::Panicked(format!("Compose task panicked: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://localhost:3000/preview/Annual_Review-1739000000000000-7";

    fn compositor() -> CodeImageCompositor {
        CodeImageCompositor::with_font_database(fontdb::Database::new())
    }

    fn style(variant: StyleVariant) -> StyleConfig {
        StyleConfig {
            variant,
            ..StyleConfig::default()
        }
    }

    #[test]
    fn canvas_matches_configured_size() {
        let c = compositor();
        for variant in [
            StyleVariant::Default,
            StyleVariant::Rounded,
            StyleVariant::Gradient,
            StyleVariant::Shadow,
        ] {
            let img = c.compose(URL, "Annual Review", &style(variant)).unwrap();
            assert_eq!(img.dimensions(), (400, 450), "{variant:?}");
        }
    }

    #[test]
    fn code_is_centred_at_fixed_top() {
        let s = style(StyleVariant::Default);
        let canvas = compositor().compose(URL, "x", &s).unwrap();
        let code = qr::render_code(URL, s.code_size, s.foreground, s.background).unwrap();
        let left = (s.image_width - s.code_size) / 2;
        for (x, y, px) in code.enumerate_pixels() {
            assert_eq!(canvas.get_pixel(left + x, CODE_TOP + y), px, "({x},{y})");
        }
    }

    #[test]
    fn shadow_keeps_code_position() {
        let plain = compositor().compose(URL, "x", &style(StyleVariant::Default)).unwrap();
        let shadowed = compositor().compose(URL, "x", &style(StyleVariant::Shadow)).unwrap();
        let left = 50;
        for y in CODE_TOP..CODE_TOP + 300 {
            for x in left..left + 300 {
                assert_eq!(plain.get_pixel(x, y), shadowed.get_pixel(x, y));
            }
        }
        // Just past the code's bottom-right corner the shadow shows through.
        let below = shadowed.get_pixel(left + 300 + 1, CODE_TOP + 300 + 1);
        assert!(below[0] < 255, "expected shadow, got {below:?}");
    }

    #[test]
    fn gradient_background_spans_canvas() {
        let img = compositor().compose(URL, "x", &style(StyleVariant::Gradient)).unwrap();
        assert_eq!(*img.get_pixel(0, 0), Color::WHITE.to_rgba());
        assert_eq!(*img.get_pixel(399, 449), Color::NEUTRAL.to_rgba());
    }

    #[test]
    fn render_produces_png_of_canvas_size() {
        let png = compositor().render(URL, "Annual Review", &style(StyleVariant::Rounded)).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!((img.width(), img.height()), (400, 450));
    }

    #[test]
    fn canvas_narrower_than_code_is_rejected() {
        let s = StyleConfig {
            image_width: 100,
            ..StyleConfig::default()
        };
        let err = compositor().compose(URL, "x", &s).unwrap_err();
        assert!(matches!(err, ComposeError::InvalidStyle(_)));
    }

    #[tokio::test]
    async fn render_async_runs_off_thread() {
        let png = compositor()
            .render_async(URL.into(), "Deck".into(), StyleConfig::default())
            .await
            .unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
    }
}
