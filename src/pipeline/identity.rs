//! File identifiers: the join key between a staged upload, its converted
//! preview directory and its code image.
//!
//! Format: `<sanitised stem>-<micros>-<random>`. The microsecond stamp is
//! forced to increase strictly within the process, so two identifiers minted
//! in one run never collide even for identical names in the same tick. The
//! random part keeps separate processes sharing a workspace apart.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

static NON_ALNUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9]").unwrap());

static LAST_STAMP: AtomicU64 = AtomicU64::new(0);

const RANDOM_SPAN: u32 = 1_000_000_000;

/// Globally unique token for one processed deck.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Mint a fresh identifier for `file_name`.
    pub fn generate(file_name: &str) -> Self {
        let base = sanitize_stem(file_name);
        let stamp = next_stamp();
        let random = rand::random_range(0..RANDOM_SPAN);
        FileId(format!("{base}-{stamp}-{random}"))
    }

    /// Wrap an identifier read back from disk or a report.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        FileId(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// File stem with every char outside `[A-Za-z0-9]` replaced by `_`.
pub fn sanitize_stem(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cleaned = NON_ALNUM.replace_all(&stem, "_").into_owned();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Wall-clock microseconds, bumped so each call returns a larger value
/// than the previous one.
fn next_stamp() -> u64 {
    let now = chrono::Utc::now().timestamp_micros().max(0) as u64;
    let mut last = LAST_STAMP.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_STAMP.compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
        {
            Ok(_) => return candidate,
            Err(actual) => last = actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn sanitises_stem() {
        assert_eq!(sanitize_stem("Q3 Review (final).pptx"), "Q3_Review__final_");
        assert_eq!(sanitize_stem("deck.v2.ppt"), "deck_v2");
        assert_eq!(sanitize_stem("年度总结.pptx"), "____");
        assert_eq!(sanitize_stem(".pptx"), "_pptx");
        assert_eq!(sanitize_stem(""), "file");
    }

    #[test]
    fn id_starts_with_sanitised_stem() {
        let id = FileId::generate("My Deck.pptx");
        assert!(id.as_str().starts_with("My_Deck-"), "got {id}");
        assert_eq!(id.as_str().split('-').count(), 3);
    }

    #[test]
    fn identical_names_get_distinct_ids() {
        let ids: HashSet<FileId> = (0..2000).map(|_| FileId::generate("same.pptx")).collect();
        assert_eq!(ids.len(), 2000);
    }

    #[test]
    fn stamps_strictly_increase_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..500).map(|_| next_stamp()).collect::<Vec<_>>()))
            .collect();
        let mut all = HashSet::new();
        for h in handles {
            let stamps = h.join().unwrap();
            assert!(stamps.windows(2).all(|w| w[0] < w[1]));
            all.extend(stamps);
        }
        assert_eq!(all.len(), 2000);
    }
}
