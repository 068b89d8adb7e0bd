//! CLI binary for deckqr.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `BatchConfig`, runs one batch (or a cleanup sweep) and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use deckqr::report::format_summary;
use deckqr::{
    collect_source_files, write_report, BatchConfig, BatchProgressCallback, BatchReport,
    BatchScheduler, CodeImageCompositor, ConversionOutcome, ConversionTask, OfficeConverter,
    OfficeConverterOptions, ProgressCallback, ReportContext, StyleConfig, StyleOverrides,
    StyleVariant, Workspace,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over all decks, advanced a group at
/// a time, with a log line per finished deck.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} decks  {msg}  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize, total_groups: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.set_message(format!("group 1/{}", total_groups.max(1)));
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Converting {total_files} deck(s) in {total_groups} group(s)…"
            ))
        ));
    }

    fn on_group_complete(&self, group: usize, total_groups: usize, processed: usize, _total: usize) {
        self.bar.set_position(processed as u64);
        let next = (group + 1).min(total_groups);
        self.bar.set_message(format!("group {next}/{total_groups}"));
    }

    fn on_outcome(&self, index: usize, outcome: &ConversionOutcome) {
        let line = match outcome {
            ConversionOutcome::Success {
                original_name,
                slide_count,
                degraded,
                ..
            } => format!(
                "  {} {:>3}. {}  {}",
                green("✓"),
                index + 1,
                original_name,
                dim(&if *degraded {
                    "placeholder preview".to_string()
                } else {
                    format!("{slide_count} slides")
                }),
            ),
            ConversionOutcome::Failure { file_name, error } => {
                // Truncate very long error messages to keep output tidy.
                let msg = if error.chars().count() > 80 {
                    format!("{}\u{2026}", error.chars().take(79).collect::<String>())
                } else {
                    error.clone()
                };
                format!("  {} {:>3}. {}  {}", red("✗"), index + 1, file_name, red(&msg))
            }
        };
        self.bar.println(line);
    }

    fn on_batch_complete(&self, report: &BatchReport) {
        self.bar.finish_and_clear();
        if report.failure_count == 0 {
            eprintln!(
                "{} {} deck(s) converted successfully",
                green("✔"),
                bold(&report.success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} deck(s) converted  ({} failed)",
                if report.success_count == 0 {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&report.success_count.to_string()),
                report.total_files,
                red(&report.failure_count.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert every deck in ./source-ppts
  deckqr

  # Another folder, public URL, 5 at a time
  deckqr --source ~/talks --url https://decks.example.com --concurrency 5

  # Rounded navy codes with a custom caption font
  deckqr --style rounded --foreground '#001f5c' --caption-font 'Inter'

  # Style from a JSON file (same keys as the upload form)
  deckqr --style-json style.json

  # Remove staged uploads older than a day
  deckqr --cleanup-older-than 24

STYLES:
  default    plain code on the background colour
  rounded    code corners rounded (10 px)
  gradient   background fades diagonally to light grey
  shadow     soft drop shadow under the code

OUTPUT LAYOUT (under --workspace):
  uploads/<id>.<ext>          staged copy of each deck
  converted/<id>/images/      slide-001.png, slide-002.png, …
  converted/<id>/preview.html placeholder when LibreOffice is missing
  qrcodes/<id>.png            captioned QR code
  batch-report-<millis>.json  one per run (see --report-dir)

ENVIRONMENT VARIABLES:
  DECKQR_SOURCE, DECKQR_BASE_URL, DECKQR_CONCURRENCY, DECKQR_WORKSPACE, …
                          defaults for the matching flags
  PDFIUM_LIB_PATH         Path to an existing libpdfium
  RUST_LOG                Override log filter (e.g. deckqr=debug)

SETUP:
  LibreOffice provides `soffice` for deck → PDF conversion. Without it every
  deck gets a placeholder preview. pdfium renders slides; without it only the
  PDF is kept. Both cases still produce a QR code.
"#;

/// Convert a folder of slide decks into previews and captioned QR codes.
#[derive(Parser, Debug)]
#[command(
    name = "deckqr",
    version,
    about = "Convert a folder of slide decks into previews and captioned QR codes",
    long_about = "Convert every .ppt/.pptx file in a folder into a slide preview (via LibreOffice \
and pdfium) and a PNG QR code that links to it. Decks are processed in groups of --concurrency; \
a failing deck never stops the batch. A JSON report is written at the end of every run.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Folder with .ppt / .pptx files.
    #[arg(short, long, env = "DECKQR_SOURCE", default_value = "./source-ppts")]
    source: PathBuf,

    /// Base URL encoded in the QR codes (`<url>/preview/<id>`).
    #[arg(short, long, env = "DECKQR_BASE_URL", default_value = "http://localhost:3000")]
    url: String,

    /// Decks converted at the same time.
    #[arg(short, long, env = "DECKQR_CONCURRENCY", default_value_t = 3,
          value_parser = clap::value_parser!(u64).range(1..))]
    concurrency: u64,

    /// Root of uploads/, converted/ and qrcodes/.
    #[arg(short, long, env = "DECKQR_WORKSPACE", default_value = ".")]
    workspace: PathBuf,

    /// Where the batch report is written. Default: the workspace root.
    #[arg(long, env = "DECKQR_REPORT_DIR")]
    report_dir: Option<PathBuf>,

    /// Code style.
    #[arg(long, env = "DECKQR_STYLE", value_enum)]
    style: Option<StyleArg>,

    /// JSON file with style settings; flags below override it.
    #[arg(long, env = "DECKQR_STYLE_JSON")]
    style_json: Option<PathBuf>,

    /// QR code side length in pixels.
    #[arg(long)]
    code_size: Option<u32>,

    /// Canvas width. Default: code size + 100.
    #[arg(long)]
    image_width: Option<u32>,

    /// Canvas height. Default: code size + 150.
    #[arg(long)]
    image_height: Option<u32>,

    /// Dark module colour (#rrggbb).
    #[arg(long)]
    foreground: Option<String>,

    /// Light module and canvas colour (#rrggbb).
    #[arg(long)]
    background: Option<String>,

    /// Caption colour (#rrggbb).
    #[arg(long)]
    caption_color: Option<String>,

    /// Caption font size in pixels.
    #[arg(long)]
    caption_size: Option<u32>,

    /// Caption font family.
    #[arg(long)]
    caption_font: Option<String>,

    /// Seconds one deck may take before it is abandoned.
    #[arg(long, env = "DECKQR_TASK_TIMEOUT", default_value_t = 300,
          value_parser = clap::value_parser!(u64).range(1..))]
    task_timeout: u64,

    /// Fail decks instead of writing a placeholder when LibreOffice is missing.
    #[arg(long, env = "DECKQR_NO_FALLBACK")]
    no_fallback: bool,

    /// LibreOffice executable.
    #[arg(long, env = "DECKQR_SOFFICE", default_value = "soffice")]
    soffice: PathBuf,

    /// pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Longest edge of a rendered slide, in pixels.
    #[arg(long, env = "DECKQR_SLIDE_PIXELS", default_value_t = 1600,
          value_parser = clap::value_parser!(u32).range(100..=8000))]
    slide_pixels: u32,

    /// Only delete staged uploads older than this many hours, then exit.
    #[arg(long, value_name = "HOURS")]
    cleanup_older_than: Option<u64>,

    /// Print the report as JSON on stdout instead of the summary.
    #[arg(long, env = "DECKQR_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DECKQR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DECKQR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DECKQR_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StyleArg {
    Default,
    Rounded,
    Gradient,
    Shadow,
}

impl From<StyleArg> for StyleVariant {
    fn from(v: StyleArg) -> Self {
        match v {
            StyleArg::Default => StyleVariant::Default,
            StyleArg::Rounded => StyleVariant::Rounded,
            StyleArg::Gradient => StyleVariant::Gradient,
            StyleArg::Shadow => StyleVariant::Shadow,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let workspace = Workspace::new(&cli.workspace);

    // ── Cleanup-only mode ────────────────────────────────────────────────
    if let Some(hours) = cli.cleanup_older_than {
        let summary = workspace
            .cleanup_older_than(Duration::from_secs(hours.saturating_mul(3600)))
            .await
            .context("Cleanup failed")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
            );
        } else if !cli.quiet {
            eprintln!(
                "{} removed {} staged upload(s) older than {}h",
                green("✔"),
                bold(&summary.deleted_count.to_string()),
                hours
            );
            for e in &summary.errors {
                eprintln!("  {} {}", red("✗"), e);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Discover decks ───────────────────────────────────────────────────
    let files = collect_source_files(&cli.source)
        .await
        .context("Cannot read source folder")?;
    if files.is_empty() && !cli.quiet {
        eprintln!(
            "{} no .ppt/.pptx files in {}",
            cyan("⚠"),
            cli.source.display()
        );
    }

    workspace
        .ensure_layout()
        .await
        .context("Cannot prepare workspace")?;

    // ── Run batch ────────────────────────────────────────────────────────
    let start = Instant::now();
    let converter = OfficeConverter::new(OfficeConverterOptions {
        program: cli.soffice.clone(),
        max_slide_pixels: cli.slide_pixels,
        fallback_preview: config.fallback_preview,
        pdfium_library: cli.pdfium_lib.clone(),
    });
    let task = ConversionTask::new(
        workspace.clone(),
        Arc::new(converter),
        CodeImageCompositor::new(),
        deckqr::preview_url_builder(cli.url.as_str()),
    )
    .with_style(config.style.clone())
    .with_timeout(config.task_timeout());

    let report = BatchScheduler::new(task)
        .with_progress(config.progress_callback.clone())
        .with_context(ReportContext {
            source_dir: Some(cli.source.clone()),
            base_url: Some(cli.url.clone()),
        })
        .run(&files, config.concurrency)
        .await
        .context("Batch failed")?;

    // ── Report ───────────────────────────────────────────────────────────
    // A report that cannot be written is logged; the run itself still
    // completed and its summary is printed below.
    let report_dir = cli.report_dir.clone().unwrap_or_else(|| cli.workspace.clone());
    let report_path = match write_report(&report, &report_dir).await {
        Ok(path) => Some(path),
        Err(e) => {
            error!("Could not write batch report: {}", e);
            None
        }
    };

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        print!("{}", format_summary(&report));
        if let Some(path) = report_path {
            println!("Report: {}", path.display());
        }
        eprintln!(
            "{}",
            dim(&format!("{}ms total", start.elapsed().as_millis()))
        );
    }

    Ok(())
}

/// Map CLI args to `BatchConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<BatchConfig> {
    let style = resolve_style(cli).await?;
    if let Err(e) = style.validate() {
        warn!("{e}; every deck will fail at the QR image step");
    }

    let mut builder = BatchConfig::builder()
        .concurrency(cli.concurrency as usize)
        .task_timeout_secs(cli.task_timeout)
        .fallback_preview(!cli.no_fallback)
        .style(style);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `--style-json` first, then individual flags on top, then defaults.
async fn resolve_style(cli: &Cli) -> Result<StyleConfig> {
    let mut overrides = match cli.style_json {
        Some(ref path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read style JSON from {:?}", path))?;
            StyleOverrides::from_json(&json)?
        }
        None => StyleOverrides::default(),
    };

    if let Some(v) = cli.style {
        overrides.variant = Some(v.into());
    }
    if cli.code_size.is_some() {
        overrides.code_size = cli.code_size;
    }
    if cli.image_width.is_some() {
        overrides.image_width = cli.image_width;
    }
    if cli.image_height.is_some() {
        overrides.image_height = cli.image_height;
    }
    if cli.foreground.is_some() {
        overrides.foreground = cli.foreground.clone();
    }
    if cli.background.is_some() {
        overrides.background = cli.background.clone();
    }
    if cli.caption_color.is_some() {
        overrides.caption_color = cli.caption_color.clone();
    }
    if cli.caption_size.is_some() {
        overrides.caption_size = cli.caption_size;
    }
    if cli.caption_font.is_some() {
        overrides.caption_font = cli.caption_font.clone();
    }

    overrides.apply_defaults().context("Invalid style")
}
