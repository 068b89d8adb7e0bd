//! PDF rasterisation: render every page of the intermediate PDF to PNG via
//! pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is not safe to drive from async contexts. All pdfium calls run
//! on the blocking pool; only the encoded PNG bytes come back to the async
//! side, so a task that is cancelled mid-render never writes into the
//! converted directory afterwards.
//!
//! ## Why cap pixels, not DPI?
//!
//! Slide sizes vary (4:3, 16:9, custom poster sizes). Capping the longest
//! edge keeps memory bounded and gives previews a consistent size on phones,
//! which is where a scanned code lands.

use super::encode::encode_png;
use crate::error::ConvertError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment override for the pdfium shared library location.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// One rasterised slide, PNG-encoded.
#[derive(Debug, Clone)]
pub struct RenderedSlide {
    /// 1-indexed slide number.
    pub number: usize,
    pub png: Vec<u8>,
}

impl RenderedSlide {
    /// `slide-001.png`, `slide-002.png`, …
    pub fn file_name(&self) -> String {
        format!("slide-{:03}.png", self.number)
    }
}

/// Rasterise all pages of `pdf_path`.
pub async fn render_slides(
    pdf_path: &Path,
    max_pixels: u32,
    library: Option<PathBuf>,
) -> Result<Vec<RenderedSlide>, ConvertError> {
    let path = pdf_path.to_path_buf();

    tokio::task::spawn_blocking(move || render_slides_blocking(&path, max_pixels, library.as_deref()))
        .await
        .map_err(|e| ConvertError::Panicked(format!("Render task panicked: {}", e)))?
}

/// Bind pdfium: explicit path, then `PDFIUM_LIB_PATH`, then the working
/// directory, then the system library search path.
fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, ConvertError> {
    let explicit = library
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from));

    let bindings = match explicit {
        Some(path) => Pdfium::bind_to_library(&path),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ConvertError::PdfiumUnavailable(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of slide rendering.
fn render_slides_blocking(
    pdf_path: &Path,
    max_pixels: u32,
    library: Option<&Path>,
) -> Result<Vec<RenderedSlide>, ConvertError> {
    let pdfium = bind_pdfium(library)?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| ConvertError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    info!("PDF loaded: {} slides", pages.len());

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut slides = Vec::with_capacity(pages.len() as usize);

    for (idx, page) in pages.iter().enumerate() {
        let number = idx + 1;
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            ConvertError::RasterisationFailed {
                slide: number,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered slide {} → {}x{} px",
            number,
            image.width(),
            image.height()
        );

        let png = encode_png(&image).map_err(|e| ConvertError::RasterisationFailed {
            slide: number,
            detail: format!("PNG encoding failed: {}", e),
        })?;
        slides.push(RenderedSlide { number, png });
    }

    Ok(slides)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slide_file_names_are_zero_padded() {
        let s = RenderedSlide { number: 7, png: vec![] };
        assert_eq!(s.file_name(), "slide-007.png");
        let s = RenderedSlide { number: 1234, png: vec![] };
        assert_eq!(s.file_name(), "slide-1234.png");
    }

    #[tokio::test]
    async fn bad_library_path_is_reported_as_unavailable() {
        let dir = tempfile::TempDir::new().unwrap();
        let pdf = dir.path().join("deck.pdf");
        std::fs::write(&pdf, b"%PDF-1.4\n").unwrap();
        let err = render_slides(&pdf, 800, Some(dir.path().join("libnothing.so")))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::PdfiumUnavailable(_)), "got {err:?}");
    }
}
