//! Slide conversion: a staged deck in, a directory of preview artifacts out.
//!
//! [`SlideConverter`] is the seam between the pipeline and whatever turns a
//! presentation into images. The shipped implementation,
//! [`OfficeConverter`], goes through two external pieces:
//!
//! ```text
//! deck.pptx ──soffice──▶ deck.pdf ──pdfium──▶ images/slide-001.png …
//! ```
//!
//! Either piece may be missing on a given host. A missing `soffice` yields
//! a placeholder `preview.html` (when enabled); a missing pdfium library
//! keeps the PDF without slide images. Both count as success with
//! `degraded = true`. A converter that runs and fails is always an error.

use super::caption::escape_markup;
use super::render::render_slides;
use crate::error::ConvertError;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Subdirectory of a converted deck holding the slide rasters.
pub const SLIDES_DIR: &str = "images";

/// Placeholder written when no real conversion was possible.
pub const FALLBACK_PREVIEW: &str = "preview.html";

/// Longest stderr excerpt carried into an error message.
const STDERR_EXCERPT: usize = 500;

/// What a converter left in its output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedDeck {
    pub output_dir: PathBuf,
    /// Slide images in slide order.
    pub slides: Vec<PathBuf>,
    /// Intermediate PDF, when one was produced.
    pub pdf: Option<PathBuf>,
    /// Reduced-fidelity preview (placeholder page or PDF only).
    pub degraded: bool,
}

impl ConvertedDeck {
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }
}

/// Turns one staged deck into preview artifacts under `output_dir`.
///
/// Implementations must only write below `output_dir`, and must not leave
/// background work running once the returned future is dropped.
#[async_trait]
pub trait SlideConverter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn convert(&self, staged: &Path, output_dir: &Path) -> Result<ConvertedDeck, ConvertError>;
}

/// Options for [`OfficeConverter`].
#[derive(Debug, Clone)]
pub struct OfficeConverterOptions {
    /// LibreOffice executable. Default: `soffice`.
    pub program: PathBuf,
    /// Longest edge of a rendered slide, in pixels. Default: 1600.
    pub max_slide_pixels: u32,
    /// Write [`FALLBACK_PREVIEW`] when `program` is not installed.
    pub fallback_preview: bool,
    /// Explicit pdfium shared library; otherwise `PDFIUM_LIB_PATH`, the
    /// working directory and the system search path are tried.
    pub pdfium_library: Option<PathBuf>,
}

impl Default for OfficeConverterOptions {
    fn default() -> Self {
        Self {
            program: PathBuf::from("soffice"),
            max_slide_pixels: 1600,
            fallback_preview: true,
            pdfium_library: None,
        }
    }
}

/// LibreOffice (headless) → PDF → pdfium slide rasters.
#[derive(Debug, Clone, Default)]
pub struct OfficeConverter {
    options: OfficeConverterOptions,
}

impl OfficeConverter {
    pub fn new(options: OfficeConverterOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &OfficeConverterOptions {
        &self.options
    }

    /// Run `soffice --convert-to pdf`. `Ok(false)` means the program is not
    /// installed.
    async fn run_office(&self, staged: &Path, output_dir: &Path) -> Result<bool, ConvertError> {
        let program = self.options.program.display().to_string();

        // Concurrent soffice processes sharing one user profile block each
        // other; give every run a throwaway profile.
        let profile = tempfile::TempDir::new().map_err(|e| ConvertError::Io {
            path: std::env::temp_dir(),
            source: e,
        })?;
        let profile_arg = format!("-env:UserInstallation=file://{}", profile.path().display());

        debug!("Running {} on {}", program, staged.display());
        let result = Command::new(&self.options.program)
            .arg(&profile_arg)
            .args(["--headless", "--convert-to", "pdf", "--outdir"])
            .arg(output_dir)
            .arg(staged)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(ConvertError::ToolUnavailable { program, source: e }),
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(ConvertError::ToolFailed {
                program,
                status: output.status.to_string(),
                stderr: excerpt(&stderr),
            });
        }
        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", program, stderr.trim());
        }
        Ok(true)
    }

    async fn write_fallback(&self, staged: &Path, output_dir: &Path) -> Result<ConvertedDeck, ConvertError> {
        let path = output_dir.join(FALLBACK_PREVIEW);
        let name = staged
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tokio::fs::write(&path, fallback_html(&name))
            .await
            .map_err(|e| ConvertError::Io { path, source: e })?;

        Ok(ConvertedDeck {
            output_dir: output_dir.to_path_buf(),
            slides: Vec::new(),
            pdf: None,
            degraded: true,
        })
    }
}

#[async_trait]
impl SlideConverter for OfficeConverter {
    fn name(&self) -> &str {
        "libreoffice"
    }

    async fn convert(&self, staged: &Path, output_dir: &Path) -> Result<ConvertedDeck, ConvertError> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| ConvertError::Io {
                path: output_dir.to_path_buf(),
                source: e,
            })?;

        if !self.run_office(staged, output_dir).await? {
            let program = self.options.program.display().to_string();
            if !self.options.fallback_preview {
                return Err(ConvertError::ToolUnavailable {
                    program,
                    source: io::Error::new(io::ErrorKind::NotFound, "not found on PATH"),
                });
            }
            warn!("{} not installed; writing placeholder preview", program);
            return self.write_fallback(staged, output_dir).await;
        }

        let pdf = find_pdf(staged, output_dir).await?;

        let slides = match render_slides(
            &pdf,
            self.options.max_slide_pixels,
            self.options.pdfium_library.clone(),
        )
        .await
        {
            Ok(slides) => slides,
            Err(ConvertError::PdfiumUnavailable(detail)) => {
                warn!("pdfium unavailable ({}); keeping PDF only", detail);
                return Ok(ConvertedDeck {
                    output_dir: output_dir.to_path_buf(),
                    slides: Vec::new(),
                    pdf: Some(pdf),
                    degraded: true,
                });
            }
            Err(e) => return Err(e),
        };

        let images_dir = output_dir.join(SLIDES_DIR);
        tokio::fs::create_dir_all(&images_dir)
            .await
            .map_err(|e| ConvertError::Io {
                path: images_dir.clone(),
                source: e,
            })?;

        let mut paths = Vec::with_capacity(slides.len());
        for slide in &slides {
            let path = images_dir.join(slide.file_name());
            tokio::fs::write(&path, &slide.png)
                .await
                .map_err(|e| ConvertError::Io {
                    path: path.clone(),
                    source: e,
                })?;
            paths.push(path);
        }

        info!("Converted {} → {} slides", staged.display(), paths.len());
        Ok(ConvertedDeck {
            output_dir: output_dir.to_path_buf(),
            slides: paths,
            pdf: Some(pdf),
            degraded: false,
        })
    }
}

/// soffice names its output after the input stem; fall back to any PDF in
/// the directory.
async fn find_pdf(staged: &Path, output_dir: &Path) -> Result<PathBuf, ConvertError> {
    if let Some(stem) = staged.file_stem() {
        let expected = output_dir.join(format!("{}.pdf", stem.to_string_lossy()));
        if tokio::fs::try_exists(&expected).await.unwrap_or(false) {
            return Ok(expected);
        }
    }

    let mut entries = tokio::fs::read_dir(output_dir)
        .await
        .map_err(|e| ConvertError::Io {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let is_pdf = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if is_pdf {
            return Ok(path);
        }
    }

    Err(ConvertError::MissingOutput {
        dir: output_dir.to_path_buf(),
    })
}

fn excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.chars().count() <= STDERR_EXCERPT {
        return trimmed.to_string();
    }
    let mut s: String = trimmed.chars().take(STDERR_EXCERPT).collect();
    s.push('…');
    s
}

/// Placeholder page for a deck that could not be converted.
pub fn fallback_html(file_name: &str) -> String {
    let name = escape_markup(file_name);
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{name}</title>
</head>
<body>
<h1>{name}</h1>
<p>Slide preview is not available for this presentation.</p>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn missing_program() -> OfficeConverterOptions {
        OfficeConverterOptions {
            program: PathBuf::from("/nonexistent/bin/soffice-for-tests"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_office_writes_placeholder() {
        let dir = TempDir::new().unwrap();
        let staged = dir.path().join("deck-1-1.pptx");
        std::fs::write(&staged, b"pptx").unwrap();
        let out = dir.path().join("converted/deck-1-1");

        let deck = OfficeConverter::new(missing_program())
            .convert(&staged, &out)
            .await
            .unwrap();

        assert!(deck.degraded);
        assert_eq!(deck.slide_count(), 0);
        assert!(deck.pdf.is_none());
        let html = std::fs::read_to_string(out.join(FALLBACK_PREVIEW)).unwrap();
        assert!(html.contains("deck-1-1.pptx"));
    }

    #[tokio::test]
    async fn missing_office_without_fallback_fails() {
        let dir = TempDir::new().unwrap();
        let staged = dir.path().join("deck.pptx");
        std::fs::write(&staged, b"pptx").unwrap();

        let options = OfficeConverterOptions {
            fallback_preview: false,
            ..missing_program()
        };
        let err = OfficeConverter::new(options)
            .convert(&staged, &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::ToolUnavailable { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_office_is_an_error() {
        let dir = TempDir::new().unwrap();
        let staged = dir.path().join("deck.pptx");
        std::fs::write(&staged, b"pptx").unwrap();

        let options = OfficeConverterOptions {
            program: PathBuf::from("false"),
            ..Default::default()
        };
        let err = OfficeConverter::new(options)
            .convert(&staged, &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::ToolFailed { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clean_exit_without_pdf_is_an_error() {
        let dir = TempDir::new().unwrap();
        let staged = dir.path().join("deck.pptx");
        std::fs::write(&staged, b"pptx").unwrap();

        let options = OfficeConverterOptions {
            program: PathBuf::from("true"),
            ..Default::default()
        };
        let err = OfficeConverter::new(options)
            .convert(&staged, &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::MissingOutput { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn find_pdf_prefers_stem_match() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("other.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("deck.pdf"), b"x").unwrap();
        let found = find_pdf(Path::new("/uploads/deck.pptx"), dir.path()).await.unwrap();
        assert_eq!(found, dir.path().join("deck.pdf"));
    }

    #[test]
    fn fallback_html_escapes_name() {
        let html = fallback_html("<b>R&D</b>.pptx");
        assert!(html.contains("&lt;b&gt;R&amp;D&lt;/b&gt;.pptx"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn stderr_excerpt_is_bounded() {
        let long = "e".repeat(2000);
        assert_eq!(excerpt(&long).chars().count(), STDERR_EXCERPT + 1);
        assert_eq!(excerpt("  short \n"), "short");
    }
}
