// src/change_detector.rs
//! Fingerprint comparison and bounded unified diffs.
//!
//! The store is only touched on `FirstObservation` and `Changed`; an
//! unchanged page leaves every persisted byte as it was.

use chrono::{DateTime, Local};
use metrics::counter;
use sha2::{Digest, Sha256};
use similar::TextDiff;

use crate::error::StoreError;
use crate::store::FingerprintStore;

/// Rendered diffs longer than this are cut and marked.
pub const MAX_DIFF_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    FirstObservation,
    Unchanged,
    /// `diff` is `None` when no previous snapshot could be read.
    Changed { diff: Option<String> },
    FetchError { cause: String },
}

impl ChangeOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeOutcome::FirstObservation => "first-observation",
            ChangeOutcome::Unchanged => "unchanged",
            ChangeOutcome::Changed { .. } => "changed",
            ChangeOutcome::FetchError { .. } => "fetch-error",
        }
    }
}

/// Hex-encoded SHA-256 of the text.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

#[derive(Debug, Clone)]
pub struct ChangeDetector {
    store: FingerprintStore,
}

impl ChangeDetector {
    pub fn new(store: FingerprintStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &FingerprintStore {
        &self.store
    }

    pub fn detect(&self, source_id: &str, new_text: &str) -> Result<ChangeOutcome, StoreError> {
        self.detect_at(source_id, source_id, new_text, Local::now())
    }

    /// Like [`detect`](Self::detect); `target` is what the change log records
    /// (usually the URL) and `now` stamps the snapshot.
    pub fn detect_at(
        &self,
        source_id: &str,
        target: &str,
        new_text: &str,
        now: DateTime<Local>,
    ) -> Result<ChangeOutcome, StoreError> {
        let digest = content_hash(new_text);

        let Some(previous) = self.store.load_fingerprint(source_id)? else {
            tracing::info!(source = source_id, "first observation, storing reference");
            self.store.save_fingerprint(source_id, &digest)?;
            self.store.write_snapshot(source_id, new_text, now)?;
            return Ok(ChangeOutcome::FirstObservation);
        };

        if previous.digest == digest {
            tracing::debug!(source = source_id, "no change");
            return Ok(ChangeOutcome::Unchanged);
        }

        tracing::info!(source = source_id, "change detected");
        counter!("monitor_changes_detected_total").increment(1);

        self.store.write_snapshot(source_id, new_text, now)?;
        let diff = match self.store.previous_snapshot(source_id) {
            Ok(Some(old)) => Some(render_diff(&old, new_text, source_id, MAX_DIFF_CHARS)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(source = source_id, error = %e, "previous snapshot unreadable");
                None
            }
        };
        self.store.save_fingerprint(source_id, &digest)?;
        self.store.append_change_log(source_id, target, now)?;

        Ok(ChangeOutcome::Changed { diff })
    }
}

/// Line-oriented unified diff, cut to `max_chars` characters.
pub fn render_diff(old: &str, new: &str, label: &str, max_chars: usize) -> String {
    let from = format!("{label}_previous");
    let to = format!("{label}_current");
    let diff = TextDiff::from_lines(old, new);
    let text = diff.unified_diff().context_radius(3).header(&from, &to).to_string();
    truncate_chars(text, max_chars)
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str(&format!("\n... (diff truncated, {total} characters total)"));
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> (tempfile::TempDir, ChangeDetector) {
        let tmp = tempfile::tempdir().unwrap();
        let det = ChangeDetector::new(FingerprintStore::new(tmp.path()));
        (tmp, det)
    }

    #[test]
    fn hash_is_fixed_length_hex() {
        let h = content_hash("Hello world");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(h, content_hash("Hello brave world"));
    }

    #[test]
    fn identical_text_twice_is_first_then_unchanged() {
        let (_tmp, det) = detector();
        assert_eq!(
            det.detect("src", "same text").unwrap(),
            ChangeOutcome::FirstObservation
        );
        let fp_path = det.store().source_dir("src").join("fingerprint.txt");
        let before = std::fs::read(&fp_path).unwrap();
        let snapshots_before = det.store().snapshot_paths("src").unwrap();

        assert_eq!(det.detect("src", "same text").unwrap(), ChangeOutcome::Unchanged);
        assert_eq!(std::fs::read(&fp_path).unwrap(), before);
        assert_eq!(det.store().snapshot_paths("src").unwrap(), snapshots_before);
    }

    #[test]
    fn change_produces_bounded_diff_and_updates_fingerprint() {
        let (_tmp, det) = detector();
        det.detect("src", "Hello world").unwrap();
        let out = det.detect("src", "Hello brave world").unwrap();
        let ChangeOutcome::Changed { diff: Some(diff) } = out else {
            panic!("expected a diff, got {out:?}");
        };
        assert!(diff.contains("-Hello world"), "{diff}");
        assert!(diff.contains("+Hello brave world"), "{diff}");
        assert_eq!(
            det.store().load_fingerprint("src").unwrap().unwrap().digest,
            content_hash("Hello brave world")
        );
        let log = std::fs::read_to_string(det.store().change_log_path("src")).unwrap();
        assert_eq!(log.lines().count(), 1);
    }

    #[test]
    fn similar_source_names_are_tracked_independently() {
        let (_tmp, det) = detector();
        let text = "Bolsa de empleo";
        assert_eq!(det.detect("Empleo A", text).unwrap(), ChangeOutcome::FirstObservation);
        assert_eq!(det.detect("Empleo_A", text).unwrap(), ChangeOutcome::FirstObservation);
        assert_eq!(det.detect("Empleo A", text).unwrap(), ChangeOutcome::Unchanged);
    }

    #[test]
    fn missing_previous_snapshot_reports_unavailable_diff() {
        let (_tmp, det) = detector();
        det.store().save_fingerprint("src", &content_hash("old")).unwrap();
        let out = det.detect("src", "new").unwrap();
        assert_eq!(out, ChangeOutcome::Changed { diff: None });
    }

    #[test]
    fn long_diffs_are_truncated_with_marker() {
        let old: String = (0..400).map(|i| format!("line {i}\n")).collect();
        let new: String = (0..400).map(|i| format!("changed {i}\n")).collect();
        let diff = render_diff(&old, &new, "x", 500);
        assert!(diff.starts_with("--- x_previous"));
        assert!(diff.contains("... (diff truncated,"));
        let body = diff.split("\n... (diff truncated").next().unwrap();
        assert_eq!(body.chars().count(), 500);
    }
}
