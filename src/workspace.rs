//! On-disk layout shared by the pipeline and the serving layer.
//!
//! ```text
//! <root>/uploads/<id>.<ext>      staged copy of the source deck
//! <root>/converted/<id>/...      converter output (opaque here)
//! <root>/qrcodes/<id>.png        composed code image
//! ```
//!
//! Everything is addressed by [`FileId`]; nothing in this module looks
//! inside a converted directory except [`Workspace::preview`].

use crate::error::DeckQrError;
use crate::output::SourceFile;
use crate::pipeline::converter::{FALLBACK_PREVIEW, SLIDES_DIR};
use crate::pipeline::identity::FileId;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Root of the three artifact areas.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn converted_root(&self) -> PathBuf {
        self.root.join("converted")
    }

    pub fn qrcodes_dir(&self) -> PathBuf {
        self.root.join("qrcodes")
    }

    /// `uploads/<id>.<ext>`; the extension is taken from the original name.
    pub fn staged_path(&self, id: &FileId, file_name: &str) -> PathBuf {
        let name = match Path::new(file_name).extension() {
            Some(ext) => format!("{id}.{}", ext.to_string_lossy()),
            None => id.to_string(),
        };
        self.uploads_dir().join(name)
    }

    pub fn converted_dir(&self, id: &FileId) -> PathBuf {
        self.converted_root().join(id.as_str())
    }

    pub fn code_image_path(&self, id: &FileId) -> PathBuf {
        self.qrcodes_dir().join(format!("{id}.png"))
    }

    /// Create the three areas if they are missing.
    pub async fn ensure_layout(&self) -> Result<(), DeckQrError> {
        for dir in [self.uploads_dir(), self.converted_root(), self.qrcodes_dir()] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| DeckQrError::Io { path: dir, source: e })?;
        }
        Ok(())
    }

    /// Copy the source bytes to the staging area and return the staged path.
    pub async fn stage(&self, file: &SourceFile, id: &FileId) -> io::Result<PathBuf> {
        let target = self.staged_path(id, &file.file_name);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = tokio::fs::copy(&file.source_path, &target).await?;
        debug!(
            "Staged {} → {} ({} bytes)",
            file.source_path.display(),
            target.display(),
            bytes
        );
        Ok(target)
    }

    /// Remove every artifact belonging to `id`. Missing pieces are fine.
    ///
    /// Returns the number of entries actually removed.
    pub async fn delete_artifacts(&self, id: &FileId) -> io::Result<usize> {
        let mut removed = 0;

        let converted = self.converted_dir(id);
        if remove_if_exists(tokio::fs::remove_dir_all(&converted).await)? {
            removed += 1;
        }

        let code = self.code_image_path(id);
        if remove_if_exists(tokio::fs::remove_file(&code).await)? {
            removed += 1;
        }

        for staged in self.staged_files(id).await? {
            if remove_if_exists(tokio::fs::remove_file(&staged).await)? {
                removed += 1;
            }
        }

        debug!("Purged {} artifact(s) for {}", removed, id);
        Ok(removed)
    }

    /// Staged uploads whose name is `<id>` or `<id>.<ext>`.
    async fn staged_files(&self, id: &FileId) -> io::Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        let mut entries = match tokio::fs::read_dir(self.uploads_dir()).await {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(found),
            Err(e) => return Err(e),
        };
        let dotted = format!("{id}.");
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == id.as_str() || name.starts_with(&dotted) {
                found.push(entry.path());
            }
        }
        Ok(found)
    }

    /// Delete staged uploads older than `max_age`.
    ///
    /// Converted previews and code images are left alone: once a deck
    /// succeeded they belong to the serving layer.
    pub async fn cleanup_older_than(&self, max_age: Duration) -> Result<CleanupSummary, DeckQrError> {
        let dir = self.uploads_dir();
        let mut summary = CleanupSummary::default();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(summary),
            Err(e) => return Err(DeckQrError::Io { path: dir, source: e }),
        };
        let now = SystemTime::now();

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => return Err(DeckQrError::Io { path: dir, source: e }),
            };
            let path = entry.path();
            match file_age(&path, now).await {
                Ok(age) if age > max_age => match tokio::fs::remove_file(&path).await {
                    Ok(()) => {
                        debug!("Removed stale upload {}", path.display());
                        summary.deleted_count += 1;
                    }
                    Err(e) => summary
                        .errors
                        .push(format!("failed to delete {}: {e}", path.display())),
                },
                Ok(_) => {}
                Err(e) => summary
                    .errors
                    .push(format!("failed to stat {}: {e}", path.display())),
            }
        }

        info!(
            "Cleanup removed {} upload(s), {} error(s)",
            summary.deleted_count,
            summary.errors.len()
        );
        Ok(summary)
    }

    /// What the preview page needs to show a converted deck.
    pub async fn preview(&self, id: &FileId) -> Result<PreviewInfo, DeckQrError> {
        let dir = self.converted_dir(id);
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(DeckQrError::Io {
                path: dir,
                source: io::Error::new(io::ErrorKind::NotFound, "no converted preview"),
            });
        }

        let images = dir.join(SLIDES_DIR);
        let mut slides = Vec::new();
        if let Ok(mut entries) = tokio::fs::read_dir(&images).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let name = entry.file_name().to_string_lossy().into_owned();
                if is_slide_image(&name) {
                    slides.push(name);
                }
            }
        }
        slides.sort();

        let has_html_preview = tokio::fs::try_exists(dir.join(FALLBACK_PREVIEW))
            .await
            .unwrap_or(false);

        Ok(PreviewInfo {
            file_id: id.clone(),
            slide_urls: slides
                .iter()
                .map(|s| format!("/converted/{id}/{SLIDES_DIR}/{s}"))
                .collect(),
            total_slides: slides.len(),
            html_preview_url: has_html_preview.then(|| format!("/converted/{id}/{FALLBACK_PREVIEW}")),
        })
    }

    /// File count and byte size of each area.
    pub async fn storage_stats(&self) -> Result<StorageStats, DeckQrError> {
        let root = self.clone();
        tokio::task::spawn_blocking(move || StorageStats {
            uploads: area_stats(&root.uploads_dir()),
            converted: area_stats(&root.converted_root()),
            qrcodes: area_stats(&root.qrcodes_dir()),
        })
        .await
        .map_err(|e| DeckQrError::Internal(format!("Stats task panicked: {}", e)))
    }
}

/// Result of [`Workspace::cleanup_older_than`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupSummary {
    pub deleted_count: usize,
    pub errors: Vec<String>,
}

/// Result of [`Workspace::preview`]. URLs are relative to the server root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewInfo {
    pub file_id: FileId,
    pub slide_urls: Vec<String>,
    pub total_slides: usize,
    pub html_preview_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaStats {
    /// Top-level entries.
    pub count: usize,
    /// Bytes, recursively.
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    pub uploads: AreaStats,
    pub converted: AreaStats,
    pub qrcodes: AreaStats,
}

fn is_slide_image(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".png") || lower.ends_with(".jpg") || lower.ends_with(".jpeg")
}

/// `Ok(true)` if removed, `Ok(false)` if it was already gone.
fn remove_if_exists(result: io::Result<()>) -> io::Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

async fn file_age(path: &Path, now: SystemTime) -> io::Result<Duration> {
    let meta = tokio::fs::metadata(path).await?;
    let born = meta.created().or_else(|_| meta.modified())?;
    Ok(now.duration_since(born).unwrap_or_default())
}

fn area_stats(dir: &Path) -> AreaStats {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return AreaStats::default();
    };
    let mut stats = AreaStats::default();
    for entry in entries.flatten() {
        stats.count += 1;
        stats.size += dir_size(&entry.path());
    }
    stats
}

fn dir_size(path: &Path) -> u64 {
    let Ok(meta) = std::fs::symlink_metadata(path) else {
        return 0;
    };
    if !meta.is_dir() {
        return meta.len();
    }
    match std::fs::read_dir(path) {
        Ok(entries) => entries.flatten().map(|e| dir_size(&e.path())).sum(),
        Err(e) => {
            warn!("Could not size {}: {}", path.display(), e);
            0
        }
    }
}
