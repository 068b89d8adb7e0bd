//! Configuration types for batch conversion and QR-image styling.
//!
//! Batch behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. The visual treatment of the generated code image
//! lives in [`StyleConfig`]; callers that only want to change a few knobs
//! fill in a [`StyleOverrides`] and call [`StyleOverrides::apply_defaults`].

use crate::error::DeckQrError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default side length of the QR code raster, in pixels.
pub const DEFAULT_CODE_SIZE: u32 = 300;

/// Extra canvas width around the code when `image_width` is not set.
pub const CANVAS_WIDTH_PADDING: u32 = 100;

/// Extra canvas height around the code when `image_height` is not set.
/// Leaves room for the caption above and the hint below.
pub const CANVAS_HEIGHT_PADDING: u32 = 150;

/// Largest accepted code size or canvas side, in pixels.
pub const MAX_DIMENSION: u32 = 4096;

/// Configuration for a batch run.
///
/// # Example
/// ```rust
/// use deckqr::BatchConfig;
///
/// let config = BatchConfig::builder()
///     .concurrency(4)
///     .task_timeout_secs(120)
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 4);
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Decks converted at the same time (group size). Default: 3.
    ///
    /// Every deck in flight holds one staged copy and one `soffice`
    /// process, so this is also the ceiling on those resources.
    pub concurrency: usize,

    /// Wall-clock budget for one deck, in seconds. Default: 300.
    ///
    /// A deck that exceeds it becomes a failure outcome and its artifacts
    /// are purged; the rest of its group is unaffected.
    pub task_timeout_secs: u64,

    /// Style applied to every generated code image.
    pub style: StyleConfig,

    /// Write a placeholder `preview.html` when LibreOffice is not installed
    /// instead of failing the deck. Default: true.
    pub fallback_preview: bool,

    /// Optional progress sink, notified once per completed group.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            task_timeout_secs: 300,
            style: StyleConfig::default(),
            fallback_preview: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("concurrency", &self.concurrency)
            .field("task_timeout_secs", &self.task_timeout_secs)
            .field("style", &self.style)
            .field("fallback_preview", &self.fallback_preview)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    /// Zero is accepted here and rejected by [`Self::build`].
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn task_timeout_secs(mut self, secs: u64) -> Self {
        self.config.task_timeout_secs = secs;
        self
    }

    pub fn style(mut self, style: StyleConfig) -> Self {
        self.config.style = style;
        self
    }

    pub fn fallback_preview(mut self, v: bool) -> Self {
        self.config.fallback_preview = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating scheduling constraints.
    ///
    /// The style is not checked here: an unusable style fails each deck at
    /// compositing time and still yields a full report.
    pub fn build(self) -> Result<BatchConfig, DeckQrError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(DeckQrError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.task_timeout_secs == 0 {
            return Err(DeckQrError::InvalidConfig(
                "Task timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Colours ──────────────────────────────────────────────────────────────

/// An opaque 24-bit RGB colour, written as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0x00, 0x00, 0x00);
    pub const WHITE: Color = Color::rgb(0xFF, 0xFF, 0xFF);
    /// Default caption colour.
    pub const CHARCOAL: Color = Color::rgb(0x33, 0x33, 0x33);
    /// End stop of the `gradient` background.
    pub const NEUTRAL: Color = Color::rgb(0xF0, 0xF0, 0xF0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, 255])
    }

    /// Linear interpolation towards `other`; `t` is clamped to 0–1.
    pub fn lerp(self, other: Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Color::rgb(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = DeckQrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DeckQrError::InvalidConfig(format!(
                "colour must be #rrggbb, got '{s}'"
            )));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|e| DeckQrError::InvalidConfig(format!("colour '{s}': {e}")))
        };
        Ok(Color::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl TryFrom<String> for Color {
    type Error = DeckQrError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

// ── Style ────────────────────────────────────────────────────────────────

/// Visual treatment applied to the QR code image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleVariant {
    /// Plain code on a flat background. (default)
    #[default]
    Default,
    /// Code corners masked to a rounded rectangle.
    Rounded,
    /// Diagonal background → light-grey gradient behind the code.
    Gradient,
    /// Soft drop shadow under the code.
    Shadow,
}

impl FromStr for StyleVariant {
    type Err = DeckQrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(StyleVariant::Default),
            "rounded" => Ok(StyleVariant::Rounded),
            "gradient" => Ok(StyleVariant::Gradient),
            "shadow" => Ok(StyleVariant::Shadow),
            other => Err(DeckQrError::InvalidConfig(format!(
                "unknown style '{other}' (expected default, rounded, gradient, shadow)"
            ))),
        }
    }
}

/// Fully resolved style for one code image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleConfig {
    /// Side of the square QR raster in pixels.
    pub code_size: u32,
    pub image_width: u32,
    pub image_height: u32,
    /// Dark modules.
    pub foreground: Color,
    /// Light modules and the canvas fill.
    pub background: Color,
    pub caption_color: Color,
    pub caption_size: u32,
    pub caption_font: String,
    pub variant: StyleVariant,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            code_size: DEFAULT_CODE_SIZE,
            image_width: DEFAULT_CODE_SIZE + CANVAS_WIDTH_PADDING,
            image_height: DEFAULT_CODE_SIZE + CANVAS_HEIGHT_PADDING,
            foreground: Color::BLACK,
            background: Color::WHITE,
            caption_color: Color::CHARCOAL,
            caption_size: 16,
            caption_font: "Arial".to_string(),
            variant: StyleVariant::Default,
        }
    }
}

impl StyleConfig {
    /// Check that the layout can hold the code.
    pub fn validate(&self) -> Result<(), DeckQrError> {
        if self.code_size == 0 {
            return Err(DeckQrError::InvalidConfig("code size must be > 0".into()));
        }
        for (what, value) in [
            ("code size", self.code_size),
            ("image width", self.image_width),
            ("image height", self.image_height),
        ] {
            if value > MAX_DIMENSION {
                return Err(DeckQrError::InvalidConfig(format!(
                    "{what} {value} exceeds the {MAX_DIMENSION}px limit"
                )));
            }
        }
        if self.image_width < self.code_size {
            return Err(DeckQrError::InvalidConfig(format!(
                "image width {} is smaller than code size {}",
                self.image_width, self.code_size
            )));
        }
        if self.caption_size == 0 {
            return Err(DeckQrError::InvalidConfig("caption size must be > 0".into()));
        }
        if self.caption_font.trim().is_empty() {
            return Err(DeckQrError::InvalidConfig("caption font must not be empty".into()));
        }
        Ok(())
    }
}

/// Partial style: every field optional, merged over the defaults by
/// [`StyleOverrides::apply_defaults`].
///
/// Deserialises the JSON shape used by upload forms, including the legacy
/// key names (`qrSize`, `style`, `textColor`, …).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleOverrides {
    #[serde(alias = "qrSize")]
    pub code_size: Option<u32>,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
    #[serde(alias = "foregroundColor")]
    pub foreground: Option<String>,
    #[serde(alias = "backgroundColor")]
    pub background: Option<String>,
    #[serde(alias = "textColor")]
    pub caption_color: Option<String>,
    #[serde(alias = "textSize")]
    pub caption_size: Option<u32>,
    #[serde(alias = "textFont")]
    pub caption_font: Option<String>,
    #[serde(alias = "style")]
    pub variant: Option<StyleVariant>,
}

impl StyleOverrides {
    /// Parse overrides from a JSON object.
    pub fn from_json(json: &str) -> Result<Self, DeckQrError> {
        serde_json::from_str(json)
            .map_err(|e| DeckQrError::InvalidConfig(format!("style JSON: {e}")))
    }

    /// Merge over the defaults. Colours are parsed here; layout checks
    /// happen in [`StyleConfig::validate`] when a code image is composed.
    ///
    /// Canvas dimensions not given explicitly are derived from the
    /// effective code size, so `{"codeSize": 200}` yields a 300 × 350 canvas.
    pub fn apply_defaults(&self) -> Result<StyleConfig, DeckQrError> {
        let base = StyleConfig::default();
        let code_size = self.code_size.unwrap_or(base.code_size);
        let color = |v: &Option<String>, fallback: Color| -> Result<Color, DeckQrError> {
            v.as_deref().map(str::parse::<Color>).transpose().map(|c| c.unwrap_or(fallback))
        };

        let style = StyleConfig {
            code_size,
            image_width: self
                .image_width
                .unwrap_or(code_size.saturating_add(CANVAS_WIDTH_PADDING)),
            image_height: self
                .image_height
                .unwrap_or(code_size.saturating_add(CANVAS_HEIGHT_PADDING)),
            foreground: color(&self.foreground, base.foreground)?,
            background: color(&self.background, base.background)?,
            caption_color: color(&self.caption_color, base.caption_color)?,
            caption_size: self.caption_size.unwrap_or(base.caption_size),
            caption_font: self.caption_font.clone().unwrap_or(base.caption_font),
            variant: self.variant.unwrap_or(base.variant),
        };
        Ok(style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_zero_concurrency() {
        let err = BatchConfig::builder().concurrency(0).build().unwrap_err();
        assert!(matches!(err, DeckQrError::InvalidConfig(_)));
    }

    #[test]
    fn builder_keeps_values() {
        let c = BatchConfig::builder()
            .concurrency(7)
            .task_timeout_secs(30)
            .fallback_preview(false)
            .build()
            .unwrap();
        assert_eq!(c.concurrency, 7);
        assert_eq!(c.task_timeout(), Duration::from_secs(30));
        assert!(!c.fallback_preview);
    }

    #[test]
    fn default_style_derives_canvas() {
        let s = StyleConfig::default();
        assert_eq!((s.image_width, s.image_height), (400, 450));
    }

    #[test]
    fn overrides_derive_canvas_from_code_size() {
        let s = StyleOverrides {
            code_size: Some(200),
            ..Default::default()
        }
        .apply_defaults()
        .unwrap();
        assert_eq!((s.code_size, s.image_width, s.image_height), (200, 300, 350));
    }

    #[test]
    fn explicit_canvas_wins() {
        let s = StyleOverrides {
            code_size: Some(200),
            image_width: Some(500),
            image_height: Some(260),
            ..Default::default()
        }
        .apply_defaults()
        .unwrap();
        assert_eq!((s.image_width, s.image_height), (500, 260));
    }

    #[test]
    fn overrides_from_legacy_json() {
        let o = StyleOverrides::from_json(
            r##"{"qrSize": 240, "style": "shadow", "textColor": "#AA0000", "foregroundColor": "112233"}"##,
        )
        .unwrap();
        let s = o.apply_defaults().unwrap();
        assert_eq!(s.code_size, 240);
        assert_eq!(s.variant, StyleVariant::Shadow);
        assert_eq!(s.caption_color, Color::rgb(0xAA, 0, 0));
        assert_eq!(s.foreground, Color::rgb(0x11, 0x22, 0x33));
        assert_eq!(s.background, Color::WHITE);
    }

    #[test]
    fn bad_colour_is_rejected() {
        let o = StyleOverrides {
            background: Some("#12345".into()),
            ..Default::default()
        };
        assert!(o.apply_defaults().is_err());
        assert!("red".parse::<Color>().is_err());
    }

    #[test]
    fn colour_round_trips_through_display() {
        let c: Color = "#0aF0c3".parse().unwrap();
        assert_eq!(c.to_string(), "#0af0c3");
    }

    #[test]
    fn canvas_narrower_than_code_is_rejected() {
        let s = StyleOverrides {
            code_size: Some(300),
            image_width: Some(200),
            ..Default::default()
        }
        .apply_defaults()
        .unwrap();
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("smaller than code size"), "got: {err}");
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        let mut s = StyleConfig {
            code_size: 100_000,
            ..Default::default()
        };
        s.image_width = 100_400;
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("code size 100000"), "got: {err}");

        let s = StyleConfig {
            image_height: MAX_DIMENSION + 1,
            ..Default::default()
        };
        assert!(s.validate().is_err());

        let s = StyleConfig {
            code_size: MAX_DIMENSION,
            image_width: MAX_DIMENSION,
            image_height: MAX_DIMENSION,
            ..Default::default()
        };
        assert!(s.validate().is_ok());
    }

    #[test]
    fn builder_accepts_unusable_style() {
        let style = StyleConfig {
            image_width: 10,
            ..Default::default()
        };
        let c = BatchConfig::builder().style(style).build().unwrap();
        assert_eq!(c.style.image_width, 10);
    }

    #[test]
    fn variant_parses_case_insensitively() {
        assert_eq!("Rounded".parse::<StyleVariant>().unwrap(), StyleVariant::Rounded);
        assert!("sparkly".parse::<StyleVariant>().is_err());
    }
}
