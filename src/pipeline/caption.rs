//! Caption text above and below the code, rendered through SVG.
//!
//! Text layout and font fallback are left to `usvg`/`fontdb`; this module
//! only builds the markup for one strip and rasterises it. Every piece of
//! user-controlled text is escaped before it lands in the markup.

use crate::config::Color;
use crate::error::ComposeError;
use image::{Rgba, RgbaImage};
use resvg::tiny_skia;
use resvg::usvg;
use std::path::Path;
use std::sync::Arc;

/// Longest caption kept before truncation, in chars.
pub const CAPTION_MAX_CHARS: usize = 25;

/// Secondary line under the code.
pub const SCAN_HINT: &str = "Scan to preview";

pub const PRIMARY_STRIP_HEIGHT: u32 = 40;
pub const PRIMARY_TEXT_Y: u32 = 25;
pub const HINT_STRIP_HEIGHT: u32 = 30;
pub const HINT_TEXT_Y: u32 = 15;
pub const HINT_FONT_SIZE: u32 = 12;
pub const HINT_OPACITY: f32 = 0.7;

/// Caption for a deck: the file stem, cut to [`CAPTION_MAX_CHARS`] chars
/// with `...` appended when longer.
pub fn format_caption(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    if stem.chars().count() > CAPTION_MAX_CHARS {
        let mut cut: String = stem.chars().take(CAPTION_MAX_CHARS).collect();
        cut.push_str("...");
        cut
    } else {
        stem
    }
}

/// Escape `& < > " '` for use in XML text and attribute values.
pub fn escape_markup(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// One horizontal strip of centred text.
#[derive(Debug, Clone)]
pub struct CaptionStrip<'a> {
    pub width: u32,
    pub height: u32,
    /// Vertical centre of the text inside the strip.
    pub text_y: u32,
    pub text: &'a str,
    pub font: &'a str,
    pub size: u32,
    pub color: Color,
    pub bold: bool,
    pub opacity: f32,
}

impl<'a> CaptionStrip<'a> {
    /// Bold deck name above the code.
    pub fn primary(width: u32, text: &'a str, font: &'a str, size: u32, color: Color) -> Self {
        Self {
            width,
            height: PRIMARY_STRIP_HEIGHT,
            text_y: PRIMARY_TEXT_Y,
            text,
            font,
            size,
            color,
            bold: true,
            opacity: 1.0,
        }
    }

    /// Faded "Scan to preview" under the code.
    pub fn hint(width: u32, font: &'a str, color: Color) -> Self {
        Self {
            width,
            height: HINT_STRIP_HEIGHT,
            text_y: HINT_TEXT_Y,
            text: SCAN_HINT,
            font,
            size: HINT_FONT_SIZE,
            color,
            bold: false,
            opacity: HINT_OPACITY,
        }
    }

    pub fn to_svg(&self) -> String {
        let weight = if self.bold { r#" font-weight="bold""# } else { "" };
        let opacity = if self.opacity < 1.0 {
            format!(r#" opacity="{}""#, self.opacity)
        } else {
            String::new()
        };
        format!(
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}">"#,
                r#"<text x="{x}" y="{y}" font-family="{family}, sans-serif" font-size="{size}"{weight}"#,
                r#" fill="{fill}"{opacity} text-anchor="middle" dominant-baseline="middle">{text}</text>"#,
                "</svg>"
            ),
            w = self.width,
            h = self.height,
            x = self.width / 2,
            y = self.text_y,
            family = escape_markup(self.font),
            size = self.size,
            weight = weight,
            fill = self.color,
            opacity = opacity,
            text = escape_markup(self.text),
        )
    }

    pub fn render(&self, fontdb: &Arc<usvg::fontdb::Database>) -> Result<RgbaImage, ComposeError> {
        rasterize_svg(&self.to_svg(), fontdb)
    }
}

/// Parse and rasterise an SVG document at its intrinsic size.
pub fn rasterize_svg(
    svg: &str,
    fontdb: &Arc<usvg::fontdb::Database>,
) -> Result<RgbaImage, ComposeError> {
    let options = usvg::Options {
        fontdb: Arc::clone(fontdb),
        ..Default::default()
    };
    let tree = usvg::Tree::from_str(svg, &options).map_err(|e| ComposeError::Markup(e.to_string()))?;

    let size = tree.size().to_int_size();
    let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height()).ok_or_else(|| {
        ComposeError::InvalidStyle(format!("empty caption strip {}x{}", size.width(), size.height()))
    })?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    // tiny-skia stores premultiplied alpha; `image` expects straight alpha.
    let mut img = RgbaImage::new(size.width(), size.height());
    for (dst, src) in img.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    Ok(img)
}
