// src/store.rs
//! On-disk state per monitored source:
//!
//! ```text
//! <root>/<source>-<tag>/fingerprint.txt     hex SHA-256 of the last observed text
//! <root>/<source>-<tag>/snapshot_<ts>.txt   observed text, one per change
//! <root>/<source>-<tag>/changes.log         append-only, one line per change
//! ```
//!
//! `<source>` is the identifier with unsafe characters replaced and `<tag>`
//! the first 8 hex digits of the SHA-256 of the raw identifier, so two names
//! that clean up alike still get separate directories.
//!
//! Snapshot names sort chronologically; the diff only ever needs the two
//! most recent, so older ones are pruned beyond the retention count.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use sha2::{Digest, Sha256};

use crate::error::StoreError;

const FINGERPRINT_FILE: &str = "fingerprint.txt";
const CHANGE_LOG_FILE: &str = "changes.log";
const SNAPSHOT_PREFIX: &str = "snapshot_";
const SNAPSHOT_SUFFIX: &str = ".txt";

pub const DEFAULT_SNAPSHOT_RETENTION: usize = 10;
pub const MIN_SNAPSHOT_RETENTION: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub digest: String,
}

#[derive(Debug, Clone)]
pub struct FingerprintStore {
    root: PathBuf,
    retention: usize,
}

impl FingerprintStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            retention: DEFAULT_SNAPSHOT_RETENTION,
        }
    }

    /// Values below 2 are raised to 2.
    pub fn with_retention(mut self, keep: usize) -> Self {
        self.retention = keep.max(MIN_SNAPSHOT_RETENTION);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_dir(&self, source_id: &str) -> PathBuf {
        self.root.join(dir_name(source_id))
    }

    fn ensure_dir(&self, source_id: &str) -> Result<PathBuf, StoreError> {
        let dir = self.source_dir(source_id);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(dir)
    }

    pub fn load_fingerprint(&self, source_id: &str) -> Result<Option<Fingerprint>, StoreError> {
        let path = self.source_dir(source_id).join(FINGERPRINT_FILE);
        let digest = match fs::read_to_string(&path) {
            Ok(s) => s.trim().to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        if digest.is_empty() {
            return Ok(None);
        }
        Ok(Some(Fingerprint { digest }))
    }

    /// The file holds exactly the hex digest, nothing else.
    pub fn save_fingerprint(&self, source_id: &str, digest: &str) -> Result<(), StoreError> {
        let dir = self.ensure_dir(source_id)?;
        write_atomic(&dir.join(FINGERPRINT_FILE), digest)
    }

    /// Persist `text` as the newest snapshot, then prune old ones.
    pub fn write_snapshot(
        &self,
        source_id: &str,
        text: &str,
        at: DateTime<Local>,
    ) -> Result<PathBuf, StoreError> {
        let dir = self.ensure_dir(source_id)?;
        let stamp = at.format("%Y%m%d_%H%M%S_%6f").to_string();
        let mut path = dir.join(format!("{SNAPSHOT_PREFIX}{stamp}{SNAPSHOT_SUFFIX}"));
        let mut n = 1;
        while path.exists() {
            path = dir.join(format!("{SNAPSHOT_PREFIX}{stamp}_{n:03}{SNAPSHOT_SUFFIX}"));
            n += 1;
        }
        write_atomic(&path, text)?;
        self.prune_snapshots(source_id)?;
        Ok(path)
    }

    /// Snapshot files, oldest first.
    pub fn snapshot_paths(&self, source_id: &str) -> Result<Vec<PathBuf>, StoreError> {
        let dir = self.source_dir(source_id);
        let entries = match fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&dir, e)),
        };
        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(SNAPSHOT_PREFIX) && n.ends_with(SNAPSHOT_SUFFIX))
            })
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Text of the second-most-recent snapshot, i.e. the one before the
    /// snapshot just written for the current run.
    pub fn previous_snapshot(&self, source_id: &str) -> Result<Option<String>, StoreError> {
        let paths = self.snapshot_paths(source_id)?;
        if paths.len() < 2 {
            return Ok(None);
        }
        let path = &paths[paths.len() - 2];
        fs::read_to_string(path)
            .map(Some)
            .map_err(|e| StoreError::io(path, e))
    }

    pub fn append_change_log(
        &self,
        source_id: &str,
        target: &str,
        at: DateTime<Local>,
    ) -> Result<(), StoreError> {
        let dir = self.ensure_dir(source_id)?;
        let path = dir.join(CHANGE_LOG_FILE);
        let line = format!(
            "[{}] change detected: {target}\n",
            at.format("%Y-%m-%d %H:%M:%S")
        );
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| f.write_all(line.as_bytes()))
            .map_err(|e| StoreError::io(&path, e))
    }

    pub fn change_log_path(&self, source_id: &str) -> PathBuf {
        self.source_dir(source_id).join(CHANGE_LOG_FILE)
    }

    fn prune_snapshots(&self, source_id: &str) -> Result<(), StoreError> {
        let paths = self.snapshot_paths(source_id)?;
        if paths.len() <= self.retention {
            return Ok(());
        }
        let excess = paths.len() - self.retention;
        for p in &paths[..excess] {
            if let Err(e) = fs::remove_file(p) {
                tracing::warn!(path = %p.display(), error = %e, "could not prune snapshot");
            }
        }
        Ok(())
    }
}

/// Write-then-rename so a crash never leaves a half-written record.
fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
}

/// Filesystem-safe directory name for a source identifier, unique per
/// identifier.
fn dir_name(source_id: &str) -> String {
    let tag = hex::encode(&Sha256::digest(source_id.as_bytes())[..4]);
    format!("{}-{tag}", readable_name(source_id))
}

fn readable_name(source_id: &str) -> String {
    let cleaned: String = source_id
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.chars().all(|c| c == '.' || c == '_') {
        "source".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(sec: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 16, 9, 0, sec).unwrap()
    }

    #[test]
    fn missing_fingerprint_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FingerprintStore::new(tmp.path());
        assert_eq!(store.load_fingerprint("ITC").unwrap(), None);
    }

    #[test]
    fn fingerprint_file_holds_only_the_digest() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FingerprintStore::new(tmp.path());
        store.save_fingerprint("ITC", "abc123").unwrap();
        let raw = fs::read_to_string(store.source_dir("ITC").join(FINGERPRINT_FILE)).unwrap();
        assert_eq!(raw, "abc123");
        assert_eq!(store.load_fingerprint("ITC").unwrap().unwrap().digest, "abc123");
    }

    #[test]
    fn previous_snapshot_is_second_most_recent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FingerprintStore::new(tmp.path());
        store.write_snapshot("s", "one", at(1)).unwrap();
        assert_eq!(store.previous_snapshot("s").unwrap(), None);
        store.write_snapshot("s", "two", at(2)).unwrap();
        store.write_snapshot("s", "three", at(3)).unwrap();
        assert_eq!(store.previous_snapshot("s").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn same_timestamp_does_not_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FingerprintStore::new(tmp.path());
        store.write_snapshot("s", "first", at(5)).unwrap();
        store.write_snapshot("s", "second", at(5)).unwrap();
        assert_eq!(store.snapshot_paths("s").unwrap().len(), 2);
        assert_eq!(store.previous_snapshot("s").unwrap().as_deref(), Some("first"));
    }

    #[test]
    fn retention_prunes_oldest_but_keeps_two() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FingerprintStore::new(tmp.path()).with_retention(0);
        let base = at(0);
        for i in 0..5 {
            store
                .write_snapshot("s", &format!("v{i}"), base + Duration::seconds(i))
                .unwrap();
        }
        let paths = store.snapshot_paths("s").unwrap();
        assert_eq!(paths.len(), MIN_SNAPSHOT_RETENTION);
        assert_eq!(store.previous_snapshot("s").unwrap().as_deref(), Some("v3"));
    }

    #[test]
    fn change_log_appends_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FingerprintStore::new(tmp.path());
        store.append_change_log("s", "https://a", at(1)).unwrap();
        store.append_change_log("s", "https://a", at(2)).unwrap();
        let log = fs::read_to_string(store.change_log_path("s")).unwrap();
        let lines: Vec<_> = log.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "[2026-10-16 09:00:01] change detected: https://a");
    }

    #[test]
    fn source_ids_become_safe_dir_names() {
        assert_eq!(readable_name("SCS: OPE 2016-17-18: General"), "SCS__OPE_2016-17-18__General");
        assert_eq!(readable_name("../.."), "source");
        assert_eq!(readable_name("Tablón GobCan"), "Tablón_GobCan");

        let dir = dir_name("../..");
        assert!(dir.starts_with("source-"));
        assert_eq!(dir.len(), "source-".len() + 8);
        assert_eq!(dir, dir_name("../.."));
    }

    #[test]
    fn names_that_clean_up_alike_keep_separate_state() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FingerprintStore::new(tmp.path());
        assert_ne!(store.source_dir("Empleo A"), store.source_dir("Empleo_A"));

        store.save_fingerprint("Empleo A", "aaaa").unwrap();
        assert_eq!(store.load_fingerprint("Empleo_A").unwrap(), None);
        store.save_fingerprint("Empleo_A", "bbbb").unwrap();
        assert_eq!(store.load_fingerprint("Empleo A").unwrap().unwrap().digest, "aaaa");
    }

    #[test]
    fn many_snapshots_in_one_second_stay_ordered() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FingerprintStore::new(tmp.path()).with_retention(20);
        for i in 0..12 {
            store.write_snapshot("s", &format!("v{i}"), at(7)).unwrap();
        }
        assert_eq!(store.snapshot_paths("s").unwrap().len(), 12);
        assert_eq!(store.previous_snapshot("s").unwrap().as_deref(), Some("v10"));
    }
}
