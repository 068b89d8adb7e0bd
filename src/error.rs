//! Error types for the deckqr library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DeckQrError`] — **Fatal**: the batch cannot start at all (missing
//!   source directory, invalid concurrency, unusable workspace). Returned as
//!   `Err(DeckQrError)` from the top-level batch entry points.
//!
//! * [`TaskError`] — **Non-fatal**: a single deck failed (converter exited
//!   non-zero, QR payload too long, task hung) but every other deck is fine.
//!   Stored inside [`crate::output::ConversionOutcome::Failure`] so a report
//!   always accounts for every input file.
//!
//! Component-level errors ([`ConvertError`], [`ComposeError`]) are mapped to
//! [`TaskError`] at the task boundary.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the deckqr library.
///
/// Per-deck failures use [`TaskError`] and are stored in
/// [`crate::output::ConversionOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum DeckQrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The batch source directory does not exist.
    #[error("Source directory not found: '{path}'\nCheck the path exists and is a directory.")]
    SourceDirNotFound { path: PathBuf },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or style validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Workspace directories could not be created or read.
    #[error("Workspace I/O failed at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The batch report could not be written.
    #[error("Failed to write report '{path}': {source}")]
    ReportWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single deck.
///
/// The batch continues; the message ends up in the report's `error` field.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum TaskError {
    /// Copying the source into the uploads area failed.
    #[error("staging failed: {0}")]
    Stage(String),

    /// The external slide converter failed.
    #[error("conversion failed: {0}")]
    Convert(String),

    /// QR rendering or image composition failed.
    #[error("QR image generation failed: {0}")]
    Compose(String),

    /// The task did not reach a terminal state within its time budget.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// A step panicked; the payload message is kept.
    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Failure of the external document → slides conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The converter binary could not be launched.
    #[error("'{program}' is not available: {source}")]
    ToolUnavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The converter ran but reported failure.
    #[error("'{program}' exited with {status}: {stderr}")]
    ToolFailed {
        program: String,
        status: String,
        stderr: String,
    },

    /// The converter exited cleanly but left no PDF behind.
    #[error("no PDF produced in '{dir}'")]
    MissingOutput { dir: PathBuf },

    /// The pdfium shared library could not be bound. The caller keeps the
    /// PDF and marks the preview degraded instead of failing the deck.
    #[error("pdfium library unavailable: {0}")]
    PdfiumUnavailable(String),

    /// pdfium could not open the intermediate PDF.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Rasterising a slide failed.
    #[error("rasterisation failed for slide {slide}: {detail}")]
    RasterisationFailed { slide: usize, detail: String },

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("converter task panicked: {0}")]
    Panicked(String),
}

/// Failure while rendering the QR-code image.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// The URL does not fit in a QR code at the configured redundancy.
    #[error("cannot encode URL as QR code: {0}")]
    Encode(String),

    /// The style cannot produce a sensible layout.
    #[error("invalid style: {0}")]
    InvalidStyle(String),

    /// The generated caption markup was rejected by the SVG parser.
    #[error("caption markup rejected: {0}")]
    Markup(String),

    #[error("PNG encoding failed: {0}")]
    Png(#[from] image::ImageError),

    #[error("render task panicked: {0}")]
    Panicked(String),
}

impl From<ConvertError> for TaskError {
    fn from(e: ConvertError) -> Self {
        TaskError::Convert(e.to_string())
    }
}

impl From<ComposeError> for TaskError {
    fn from(e: ComposeError) -> Self {
        TaskError::Compose(e.to_string())
    }
}
