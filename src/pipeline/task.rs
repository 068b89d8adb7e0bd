//! One deck, start to finish: stage → convert → URL → code image.
//!
//! [`ConversionTask::process`] never fails and never panics past its own
//! boundary. Whatever goes wrong becomes a
//! [`ConversionOutcome::Failure`], and every artifact the attempt created
//! is removed first, so a failed deck leaves nothing behind in the
//! workspace.

use super::caption::format_caption;
use super::compose::CodeImageCompositor;
use super::converter::SlideConverter;
use super::identity::FileId;
use crate::config::StyleConfig;
use crate::error::TaskError;
use crate::output::{ConversionOutcome, SourceFile};
use crate::workspace::Workspace;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Maps a file id to the URL encoded in its QR code.
pub type UrlBuilder = Arc<dyn Fn(&FileId) -> String + Send + Sync>;

/// `<base>/preview/<id>`, with trailing slashes on `base` ignored.
pub fn preview_url_builder(base: impl Into<String>) -> UrlBuilder {
    let base = base.into().trim_end_matches('/').to_string();
    Arc::new(move |id: &FileId| format!("{base}/preview/{id}"))
}

/// Default time budget for one deck.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(300);

/// Converts a single deck. Shared by every task of a batch.
#[derive(Clone)]
pub struct ConversionTask {
    workspace: Workspace,
    converter: Arc<dyn SlideConverter>,
    compositor: CodeImageCompositor,
    style: StyleConfig,
    url_builder: UrlBuilder,
    timeout: Duration,
}

impl fmt::Debug for ConversionTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionTask")
            .field("workspace", &self.workspace)
            .field("converter", &self.converter.name())
            .field("style", &self.style)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ConversionTask {
    pub fn new(
        workspace: Workspace,
        converter: Arc<dyn SlideConverter>,
        compositor: CodeImageCompositor,
        url_builder: UrlBuilder,
    ) -> Self {
        Self {
            workspace,
            converter,
            compositor,
            style: StyleConfig::default(),
            url_builder,
            timeout: DEFAULT_TASK_TIMEOUT,
        }
    }

    pub fn with_style(mut self, style: StyleConfig) -> Self {
        self.style = style;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Run the deck through every step and report how it ended.
    pub async fn process(&self, file: &SourceFile) -> ConversionOutcome {
        let start = Instant::now();
        let id = FileId::generate(&file.file_name);
        info!("Processing {} as {}", file.file_name, id);

        // A panic in one deck must not unwind through the group's join_all.
        let steps = AssertUnwindSafe(self.run_steps(file, &id)).catch_unwind();
        let result = match tokio::time::timeout(self.timeout, steps).await {
            Ok(Ok(result)) => result,
            Ok(Err(payload)) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
            Err(_) => Err(TaskError::Timeout {
                secs: self.timeout.as_secs(),
            }),
        };

        match result {
            Ok(outcome) => {
                info!(
                    "{} done in {}ms",
                    file.file_name,
                    start.elapsed().as_millis()
                );
                outcome
            }
            Err(e) => {
                warn!("{} failed: {}", file.file_name, e);
                if let Err(purge) = self.workspace.delete_artifacts(&id).await {
                    warn!("Could not purge artifacts of {}: {}", id, purge);
                }
                ConversionOutcome::failure(&file.file_name, e)
            }
        }
    }

    async fn run_steps(&self, file: &SourceFile, id: &FileId) -> Result<ConversionOutcome, TaskError> {
        // ── Step 1: Stage ────────────────────────────────────────────────
        let staged = self.workspace.stage(file, id).await.map_err(|e| {
            TaskError::Stage(format!("{}: {}", file.source_path.display(), e))
        })?;

        // ── Step 2: Convert ──────────────────────────────────────────────
        let deck = self
            .converter
            .convert(&staged, &self.workspace.converted_dir(id))
            .await?;
        debug!(
            "{} produced {} slides (degraded: {})",
            self.converter.name(),
            deck.slide_count(),
            deck.degraded
        );

        // ── Step 3: Preview URL ──────────────────────────────────────────
        let preview_url = (self.url_builder)(id);

        // ── Step 4: Code image ───────────────────────────────────────────
        let png = self
            .compositor
            .render_async(
                preview_url.clone(),
                format_caption(&file.file_name),
                self.style.clone(),
            )
            .await?;

        let code_image_path = self.workspace.code_image_path(id);
        let write = async {
            tokio::fs::create_dir_all(self.workspace.qrcodes_dir()).await?;
            tokio::fs::write(&code_image_path, &png).await
        };
        write.await.map_err(|e| {
            TaskError::Compose(format!("writing {}: {}", code_image_path.display(), e))
        })?;

        Ok(ConversionOutcome::Success {
            file_id: id.clone(),
            original_name: file.file_name.clone(),
            preview_url,
            code_image_path,
            slide_count: deck.slide_count(),
            degraded: deck.degraded,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
