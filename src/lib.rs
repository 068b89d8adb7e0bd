//! # deckqr
//!
//! Batch-convert slide decks into browsable previews, each with a captioned
//! QR-code image that links to it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! source dir (*.ppt, *.pptx)
//!  │
//!  ├─ 1. Discover  list decks, sorted by name
//!  ├─ 2. Group     split into groups of `concurrency`, one group at a time
//!  │   └─ per deck, concurrently:
//!  │       ├─ Stage    copy into uploads/<id>.<ext>
//!  │       ├─ Convert  soffice → PDF → pdfium → converted/<id>/images/
//!  │       ├─ URL      <base>/preview/<id>
//!  │       └─ Compose  QR + style + captions → qrcodes/<id>.png
//!  ├─ 3. Summarise counts, success ratio, outcomes in input order
//!  └─ 4. Report    batch-report-<millis>.json (never overwritten)
//! ```
//!
//! A deck that fails at any step becomes a failure outcome and its
//! partial artifacts are removed; the batch always runs to the end.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deckqr::{convert_directory, write_report, BatchConfig, Workspace};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BatchConfig::builder().concurrency(3).build()?;
//!     let workspace = Workspace::new("./data");
//!     let report = convert_directory("./source-ppts", &workspace, "http://localhost:3000", &config).await?;
//!     println!("{}/{} decks converted", report.success_count, report.total_files);
//!     write_report(&report, "./data".as_ref()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## External tools
//!
//! | Tool | Needed for | When missing |
//! |------|------------|--------------|
//! | LibreOffice (`soffice`) | deck → PDF | placeholder `preview.html`, deck marked degraded |
//! | pdfium shared library | PDF → slide PNGs | PDF kept, deck marked degraded |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `deckqr` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! deckqr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{collect_source_files, convert_directory, convert_directory_with, BatchScheduler};
pub use config::{BatchConfig, BatchConfigBuilder, Color, StyleConfig, StyleOverrides, StyleVariant};
pub use error::{ComposeError, ConvertError, DeckQrError, TaskError};
pub use output::{BatchReport, ConversionOutcome, SourceFile};
pub use pipeline::compose::CodeImageCompositor;
pub use pipeline::converter::{ConvertedDeck, OfficeConverter, OfficeConverterOptions, SlideConverter};
pub use pipeline::identity::FileId;
pub use pipeline::task::{preview_url_builder, ConversionTask, UrlBuilder};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use report::{summarize, write_report, ReportContext};
pub use workspace::{CleanupSummary, PreviewInfo, StorageStats, Workspace};
