//! Batch entry points: discover decks, run them in bounded groups, report.
//!
//! ## Why fixed groups instead of a sliding window?
//!
//! Every deck in flight owns an `soffice` process, which is by far the most
//! expensive resource here. Groups of `concurrency` decks are started
//! together and the next group waits for the slowest member, so the number
//! of live converter processes never exceeds the limit and progress can be
//! reported as "group N of M" with real, monotonic counts.
//!
//! Outcomes are stored by input position, not completion order: the report
//! lists decks in the order they were found.

use crate::config::BatchConfig;
use crate::error::DeckQrError;
use crate::output::{BatchReport, ConversionOutcome, SourceFile};
use crate::pipeline::compose::CodeImageCompositor;
use crate::pipeline::converter::{OfficeConverter, OfficeConverterOptions, SlideConverter};
use crate::pipeline::task::{preview_url_builder, ConversionTask};
use crate::progress::ProgressCallback;
use crate::report::{summarize, ReportContext};
use crate::workspace::Workspace;
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Extensions picked up by [`collect_source_files`], compared
/// case-insensitively.
pub const SOURCE_EXTENSIONS: [&str; 2] = ["ppt", "pptx"];

/// List the presentation files directly inside `dir`, sorted by name.
///
/// # Errors
/// [`DeckQrError::SourceDirNotFound`] if `dir` does not exist or is not a
/// directory.
pub async fn collect_source_files(dir: &Path) -> Result<Vec<SourceFile>, DeckQrError> {
    let is_dir = tokio::fs::metadata(dir)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(DeckQrError::SourceDirNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| DeckQrError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| DeckQrError::Io {
        path: dir.to_path_buf(),
        source: e,
    })? {
        let path = entry.path();
        let wanted = path
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy();
                SOURCE_EXTENSIONS.iter().any(|w| ext.eq_ignore_ascii_case(w))
            })
            .unwrap_or(false);
        // Follows symlinks, unlike `DirEntry::file_type`.
        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if wanted && is_file {
            files.push(SourceFile::from_path(path));
        }
    }

    files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    debug!("Found {} presentation(s) in {}", files.len(), dir.display());
    Ok(files)
}

/// Runs decks through a [`ConversionTask`] in groups of bounded size.
#[derive(Clone)]
pub struct BatchScheduler {
    task: ConversionTask,
    progress: Option<ProgressCallback>,
    context: ReportContext,
}

impl BatchScheduler {
    pub fn new(task: ConversionTask) -> Self {
        Self {
            task,
            progress: None,
            context: ReportContext::default(),
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Source directory and base URL to record in the report.
    pub fn with_context(mut self, context: ReportContext) -> Self {
        self.context = context;
        self
    }

    /// Process `files`, at most `concurrency_limit` at a time.
    ///
    /// Returns exactly one outcome per input file, in input order. Failing
    /// decks never stop the batch.
    ///
    /// # Errors
    /// [`DeckQrError::InvalidConfig`] when `concurrency_limit` is 0; no deck
    /// is touched in that case.
    pub async fn run(
        &self,
        files: &[SourceFile],
        concurrency_limit: usize,
    ) -> Result<BatchReport, DeckQrError> {
        if concurrency_limit == 0 {
            return Err(DeckQrError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }

        let start = Instant::now();
        let total_files = files.len();
        let total_groups = total_files.div_ceil(concurrency_limit);
        info!(
            "Starting batch: {} deck(s) in {} group(s) of ≤{}",
            total_files, total_groups, concurrency_limit
        );

        if let Some(ref cb) = self.progress {
            cb.on_batch_start(total_files, total_groups);
        }

        let mut outcomes: Vec<ConversionOutcome> = Vec::with_capacity(total_files);
        for (idx, group) in files.chunks(concurrency_limit).enumerate() {
            let first = outcomes.len();
            // join_all yields results in the order of its input futures.
            let results = join_all(group.iter().map(|file| self.task.process(file))).await;
            outcomes.extend(results);

            let failed = outcomes[first..].iter().filter(|o| !o.is_success()).count();
            info!(
                "Group {}/{} complete: {} ok, {} failed ({}/{} decks)",
                idx + 1,
                total_groups,
                group.len() - failed,
                failed,
                outcomes.len(),
                total_files
            );

            if let Some(ref cb) = self.progress {
                cb.on_group_complete(idx + 1, total_groups, outcomes.len(), total_files);
                for (offset, outcome) in outcomes[first..].iter().enumerate() {
                    cb.on_outcome(first + offset, outcome);
                }
            }
        }

        let report = summarize(outcomes, &self.context);
        info!(
            "Batch complete: {}/{} succeeded in {}ms",
            report.success_count,
            report.total_files,
            start.elapsed().as_millis()
        );

        if let Some(ref cb) = self.progress {
            cb.on_batch_complete(&report);
        }
        Ok(report)
    }
}

/// Convert every deck in `source_dir` with LibreOffice and system fonts.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(BatchReport)` once every deck has an outcome, even if some or all of
/// them failed (check `report.failure_count`). The report is not written to
/// disk; see [`crate::report::write_report`].
///
/// # Errors
/// Only setup problems are fatal: missing source directory, zero
/// concurrency, or a workspace that cannot be created. An unusable style
/// turns every deck into a failure outcome instead.
pub async fn convert_directory(
    source_dir: impl AsRef<Path>,
    workspace: &Workspace,
    base_url: &str,
    config: &BatchConfig,
) -> Result<BatchReport, DeckQrError> {
    let converter = OfficeConverter::new(OfficeConverterOptions {
        fallback_preview: config.fallback_preview,
        ..Default::default()
    });
    convert_directory_with(
        source_dir,
        workspace,
        base_url,
        config,
        Arc::new(converter),
        CodeImageCompositor::new(),
    )
    .await
}

/// [`convert_directory`] with an explicit converter and compositor.
pub async fn convert_directory_with(
    source_dir: impl AsRef<Path>,
    workspace: &Workspace,
    base_url: &str,
    config: &BatchConfig,
    converter: Arc<dyn SlideConverter>,
    compositor: CodeImageCompositor,
) -> Result<BatchReport, DeckQrError> {
    let source_dir = source_dir.as_ref();
    info!("Starting batch from {}", source_dir.display());

    // ── Step 1: Validate ─────────────────────────────────────────────────
    // Only scheduling limits are fatal; a bad style fails each deck instead.
    if config.concurrency == 0 {
        return Err(DeckQrError::InvalidConfig(
            "Concurrency must be ≥ 1".into(),
        ));
    }

    // ── Step 2: Discover decks ───────────────────────────────────────────
    let files = collect_source_files(source_dir).await?;

    // ── Step 3: Prepare workspace ────────────────────────────────────────
    workspace.ensure_layout().await?;

    // ── Step 4: Run groups ───────────────────────────────────────────────
    let task = ConversionTask::new(
        workspace.clone(),
        converter,
        compositor,
        preview_url_builder(base_url),
    )
    .with_style(config.style.clone())
    .with_timeout(config.task_timeout());

    BatchScheduler::new(task)
        .with_progress(config.progress_callback.clone())
        .with_context(ReportContext {
            source_dir: Some(source_dir.to_path_buf()),
            base_url: Some(base_url.to_string()),
        })
        .run(&files, config.concurrency)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn collects_presentations_case_insensitively_sorted() {
        let dir = TempDir::new().unwrap();
        for name in ["b.PPTX", "a.ppt", "notes.txt", "c.pptx", "deck.pdf", "noext"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("folder.pptx")).unwrap();

        let files = collect_source_files(dir.path()).await.unwrap();
        let names: Vec<_> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, ["a.ppt", "b.PPTX", "c.pptx"]);
        assert_eq!(files[0].source_path, dir.path().join("a.ppt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_presentations_are_collected() {
        let dir = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        let target = elsewhere.path().join("real.pptx");
        std::fs::write(&target, b"x").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("linked.pptx")).unwrap();
        std::os::unix::fs::symlink(
            elsewhere.path().join("missing.pptx"),
            dir.path().join("dangling.pptx"),
        )
        .unwrap();

        let files = collect_source_files(dir.path()).await.unwrap();
        let names: Vec<_> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, ["linked.pptx"]);
    }

    #[tokio::test]
    async fn empty_directory_yields_no_files() {
        let dir = TempDir::new().unwrap();
        assert!(collect_source_files(dir.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_directory_is_fatal() {
        let err = collect_source_files(Path::new("/definitely/not/here"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeckQrError::SourceDirNotFound { .. }));
    }
}
