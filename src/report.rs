//! Result aggregation and durable batch reports.
//!
//! [`summarize`] is pure: it only counts. [`write_report`] is the single
//! side effect, performed once per run, and never replaces an earlier
//! report; each run gets its own `batch-report-<millis>.json`.

use crate::error::DeckQrError;
use crate::output::{BatchReport, ConversionOutcome};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Where a batch came from; copied into the report verbatim.
#[derive(Debug, Clone, Default)]
pub struct ReportContext {
    pub source_dir: Option<PathBuf>,
    pub base_url: Option<String>,
}

/// Fraction of successful outcomes; 0 when there are none at all.
pub fn success_ratio(success_count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        success_count as f64 / total as f64
    }
}

/// Count outcomes and package them, order unchanged.
pub fn summarize(outcomes: Vec<ConversionOutcome>, context: &ReportContext) -> BatchReport {
    let total_files = outcomes.len();
    let success_count = outcomes.iter().filter(|o| o.is_success()).count();
    let failure_count = total_files - success_count;

    BatchReport {
        timestamp: Utc::now(),
        source_dir: context.source_dir.clone(),
        base_url: context.base_url.clone(),
        total_files,
        success_count,
        failure_count,
        success_ratio: success_ratio(success_count, total_files),
        outcomes,
    }
}

/// Success ratio as a percentage with one decimal, e.g. `66.7%`.
pub fn format_percentage(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// End-of-run console summary: successes with their URL and image path,
/// failures with their error, then the success rate.
pub fn format_summary(report: &BatchReport) -> String {
    let mut out = String::new();
    if report.success_count > 0 {
        out.push_str(&format!("Successful conversions ({}):\n", report.success_count));
        for outcome in report.successes() {
            if let ConversionOutcome::Success {
                original_name,
                preview_url,
                code_image_path,
                degraded,
                ..
            } = outcome
            {
                let note = if *degraded { " (placeholder preview)" } else { "" };
                out.push_str(&format!("  ✓ {original_name}{note}\n"));
                out.push_str(&format!("      preview: {preview_url}\n"));
                out.push_str(&format!("      QR code: {}\n", code_image_path.display()));
            }
        }
    }
    if report.failure_count > 0 {
        out.push_str(&format!("Failed conversions ({}):\n", report.failure_count));
        for outcome in report.failures() {
            out.push_str(&format!(
                "  ✗ {}: {}\n",
                outcome.file_name(),
                outcome.error().unwrap_or("unknown error")
            ));
        }
    }
    out.push_str(&format!(
        "Success rate: {} ({}/{})\n",
        format_percentage(report.success_ratio),
        report.success_count,
        report.total_files
    ));
    out
}

/// Persist `report` as pretty JSON inside `dir` and return the file path.
///
/// The name is derived from the report timestamp; if that file already
/// exists a `-N` suffix is appended. The content is written to a temp file
/// in the same directory and then persisted without clobbering, so a crash
/// never leaves a truncated report behind.
pub async fn write_report(report: &BatchReport, dir: &Path) -> Result<PathBuf, DeckQrError> {
    let json = serde_json::to_vec_pretty(report)
        .map_err(|e| DeckQrError::Internal(format!("report serialisation: {e}")))?;
    let dir = dir.to_path_buf();
    let stamp = report.timestamp.timestamp_millis();

    tokio::task::spawn_blocking(move || write_report_blocking(&dir, stamp, &json))
        .await
        .map_err(|e| DeckQrError::Internal(format!("Report task panicked: {}", e)))?
}

fn write_report_blocking(dir: &Path, stamp: i64, json: &[u8]) -> Result<PathBuf, DeckQrError> {
    use std::io::Write;

    std::fs::create_dir_all(dir).map_err(|e| DeckQrError::ReportWriteFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        DeckQrError::ReportWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        }
    })?;
    if let Err(e) = tmp.write_all(json).and_then(|_| tmp.flush()) {
        return Err(DeckQrError::ReportWriteFailed {
            path: tmp.path().to_path_buf(),
            source: e,
        });
    }

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            format!("batch-report-{stamp}.json")
        } else {
            format!("batch-report-{stamp}-{attempt}.json")
        };
        let path = dir.join(name);
        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                info!("Report written to {}", path.display());
                return Ok(path);
            }
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!("{} exists, trying next suffix", path.display());
                tmp = e.file;
            }
            Err(e) => {
                return Err(DeckQrError::ReportWriteFailed {
                    path,
                    source: e.error,
                })
            }
        }
    }
    Err(DeckQrError::Internal(format!(
        "no free report name for stamp {stamp} in {}",
        dir.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::identity::FileId;

    fn ok(name: &str) -> ConversionOutcome {
        ConversionOutcome::Success {
            file_id: FileId::from_raw(format!("{name}-1-1")),
            original_name: name.to_string(),
            preview_url: format!("http://localhost:3000/preview/{name}-1-1"),
            code_image_path: PathBuf::from(format!("qrcodes/{name}-1-1.png")),
            slide_count: 1,
            degraded: false,
        }
    }

    #[test]
    fn empty_batch_has_zero_ratio() {
        let r = summarize(Vec::new(), &ReportContext::default());
        assert_eq!(r.total_files, 0);
        assert_eq!(r.success_count, 0);
        assert_eq!(r.failure_count, 0);
        assert_eq!(r.success_ratio, 0.0);
        assert!(r.outcomes.is_empty());
    }

    #[test]
    fn counts_and_ratio() {
        let outcomes = vec![
            ok("a.pptx"),
            ConversionOutcome::failure("b.ppt", "boom"),
            ok("c.pptx"),
        ];
        let r = summarize(outcomes.clone(), &ReportContext::default());
        assert_eq!(r.total_files, 3);
        assert_eq!(r.success_count, 2);
        assert_eq!(r.failure_count, 1);
        assert_eq!(r.success_count + r.failure_count, r.total_files);
        assert!((r.success_ratio - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(r.outcomes, outcomes);
    }

    #[test]
    fn ratio_stays_in_unit_interval() {
        for total in 0..6 {
            for ok in 0..=total {
                let ratio = success_ratio(ok, total);
                assert!((0.0..=1.0).contains(&ratio), "{ok}/{total} → {ratio}");
            }
        }
    }

    #[test]
    fn context_is_copied() {
        let ctx = ReportContext {
            source_dir: Some(PathBuf::from("./source-ppts")),
            base_url: Some("https://decks.example".into()),
        };
        let r = summarize(vec![], &ctx);
        assert_eq!(r.source_dir, ctx.source_dir);
        assert_eq!(r.base_url, ctx.base_url);
    }

    #[test]
    fn summary_lists_successes_failures_and_rate() {
        let outcomes = vec![
            ok("a.pptx"),
            ConversionOutcome::failure("b.ppt", "conversion failed: corrupt"),
            ok("c.pptx"),
        ];
        let text = format_summary(&summarize(outcomes, &ReportContext::default()));
        assert!(text.contains("Successful conversions (2):"));
        assert!(text.contains("✓ a.pptx"));
        assert!(text.contains("preview: http://localhost:3000/preview/c.pptx-1-1"));
        assert!(text.contains("Failed conversions (1):"));
        assert!(text.contains("✗ b.ppt: conversion failed: corrupt"));
        assert!(text.ends_with("Success rate: 66.7% (2/3)\n"));
    }

    #[test]
    fn summary_layout_is_exact() {
        let mut degraded = ok("d.pptx");
        if let ConversionOutcome::Success { degraded: flag, .. } = &mut degraded {
            *flag = true;
        }
        let outcomes = vec![degraded, ConversionOutcome::failure("e.ppt", "timed out after 5s")];
        let text = format_summary(&summarize(outcomes, &ReportContext::default()));
        assert_eq!(
            text,
            "Successful conversions (1):\n\
             \x20 ✓ d.pptx (placeholder preview)\n\
             \x20     preview: http://localhost:3000/preview/d.pptx-1-1\n\
             \x20     QR code: qrcodes/d.pptx-1-1.png\n\
             Failed conversions (1):\n\
             \x20 ✗ e.ppt: timed out after 5s\n\
             Success rate: 50.0% (1/2)\n"
        );
    }

    #[test]
    fn summary_of_empty_batch() {
        let text = format_summary(&BatchReport::empty());
        assert_eq!(text, "Success rate: 0.0% (0/0)\n");
    }

    #[tokio::test]
    async fn reports_are_never_overwritten() {
        let dir = tempfile::TempDir::new().unwrap();
        let report = summarize(vec![ok("a.pptx")], &ReportContext::default());

        let first = write_report(&report, dir.path()).await.unwrap();
        let second = write_report(&report, dir.path()).await.unwrap();
        assert_ne!(first, second);

        let json = std::fs::read_to_string(&first).unwrap();
        let back: BatchReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
        assert!(json.contains("\"totalFiles\": 1"));
    }
}
