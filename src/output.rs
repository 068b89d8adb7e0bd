//! Batch inputs and results.
//!
//! A batch turns an ordered list of [`SourceFile`]s into exactly one
//! [`ConversionOutcome`] per file, collected into a [`BatchReport`].

use crate::pipeline::identity::FileId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One deck queued for conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    /// Name shown to users; the caption is derived from it.
    pub file_name: String,
    /// Where the original bytes live. Never modified.
    pub source_path: PathBuf,
}

impl SourceFile {
    pub fn new(file_name: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            file_name: file_name.into(),
            source_path: source_path.into(),
        }
    }

    /// Use the path's final component as the display name.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::new(file_name, path)
    }
}

/// Terminal record for one input file.
///
/// Serialises to the flat report shape
/// `{success, fileName, fileId?, previewUrl?, qrCodePath?, slideCount?, degraded?, error?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "OutcomeRecord", try_from = "OutcomeRecord")]
pub enum ConversionOutcome {
    Success {
        file_id: FileId,
        original_name: String,
        preview_url: String,
        code_image_path: PathBuf,
        /// Rasterised slides; 0 for a fallback preview.
        slide_count: usize,
        /// The converter produced a reduced-fidelity preview.
        degraded: bool,
    },
    Failure {
        file_name: String,
        error: String,
    },
}

impl ConversionOutcome {
    pub fn failure(file_name: impl Into<String>, error: impl ToString) -> Self {
        ConversionOutcome::Failure {
            file_name: file_name.into(),
            error: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ConversionOutcome::Success { .. })
    }

    /// The original file name, whichever variant this is.
    pub fn file_name(&self) -> &str {
        match self {
            ConversionOutcome::Success { original_name, .. } => original_name,
            ConversionOutcome::Failure { file_name, .. } => file_name,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ConversionOutcome::Success { .. } => None,
            ConversionOutcome::Failure { error, .. } => Some(error),
        }
    }
}

/// Wire shape of an outcome inside the JSON report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeRecord {
    success: bool,
    file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_id: Option<FileId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preview_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    qr_code_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    slide_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    degraded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<ConversionOutcome> for OutcomeRecord {
    fn from(o: ConversionOutcome) -> Self {
        match o {
            ConversionOutcome::Success {
                file_id,
                original_name,
                preview_url,
                code_image_path,
                slide_count,
                degraded,
            } => OutcomeRecord {
                success: true,
                file_name: original_name,
                file_id: Some(file_id),
                preview_url: Some(preview_url),
                qr_code_path: Some(code_image_path),
                slide_count: Some(slide_count),
                degraded: Some(degraded),
                error: None,
            },
            ConversionOutcome::Failure { file_name, error } => OutcomeRecord {
                success: false,
                file_name,
                file_id: None,
                preview_url: None,
                qr_code_path: None,
                slide_count: None,
                degraded: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<OutcomeRecord> for ConversionOutcome {
    type Error = String;

    fn try_from(r: OutcomeRecord) -> Result<Self, Self::Error> {
        if !r.success {
            return Ok(ConversionOutcome::Failure {
                file_name: r.file_name,
                error: r.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        match (r.file_id, r.preview_url, r.qr_code_path) {
            (Some(file_id), Some(preview_url), Some(code_image_path)) => {
                Ok(ConversionOutcome::Success {
                    file_id,
                    original_name: r.file_name,
                    preview_url,
                    code_image_path,
                    slide_count: r.slide_count.unwrap_or(0),
                    degraded: r.degraded.unwrap_or(false),
                })
            }
            _ => Err(format!(
                "successful outcome for '{}' is missing fileId, previewUrl or qrCodePath",
                r.file_name
            )),
        }
    }
}

/// Summary of one batch run. Built once, after every outcome is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub total_files: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// `success_count / total_files`, 0 for an empty batch.
    pub success_ratio: f64,
    /// One entry per input file, in input order.
    pub outcomes: Vec<ConversionOutcome>,
}

impl BatchReport {
    /// Report for a batch with no input files.
    pub fn empty() -> Self {
        crate::report::summarize(Vec::new(), &Default::default())
    }

    pub fn successes(&self) -> impl Iterator<Item = &ConversionOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ConversionOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn source_file_from_path_uses_basename() {
        let f = SourceFile::from_path("/decks/Quarterly Review.pptx");
        assert_eq!(f.file_name, "Quarterly Review.pptx");
        assert_eq!(f.source_path, PathBuf::from("/decks/Quarterly Review.pptx"));
    }

    #[test]
    fn failure_serialises_flat() {
        let o = ConversionOutcome::failure("b.ppt", "conversion failed: soffice exited 1");
        let v = serde_json::to_value(&o).unwrap();
        assert_eq!(
            v,
            json!({
                "success": false,
                "fileName": "b.ppt",
                "error": "conversion failed: soffice exited 1"
            })
        );
    }

    #[test]
    fn success_serialises_report_keys() {
        let o = ConversionOutcome::Success {
            file_id: FileId::from_raw("a-1-2"),
            original_name: "a.pptx".into(),
            preview_url: "http://h/preview/a-1-2".into(),
            code_image_path: PathBuf::from("qrcodes/a-1-2.png"),
            slide_count: 4,
            degraded: false,
        };
        let v = serde_json::to_value(&o).unwrap();
        assert_eq!(v["success"], json!(true));
        assert_eq!(v["fileName"], json!("a.pptx"));
        assert_eq!(v["fileId"], json!("a-1-2"));
        assert_eq!(v["qrCodePath"], json!("qrcodes/a-1-2.png"));
        assert!(v.get("error").is_none());

        let back: ConversionOutcome = serde_json::from_value(v).unwrap();
        assert_eq!(back, o);
    }

    #[test]
    fn success_record_without_paths_is_rejected() {
        let v = json!({"success": true, "fileName": "a.pptx"});
        assert!(serde_json::from_value::<ConversionOutcome>(v).is_err());
    }
}
