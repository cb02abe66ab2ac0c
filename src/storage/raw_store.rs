//! Durable Raw Store
//!
//! Writes every upstream response to a directory hierarchy mirroring the
//! resource's natural hierarchy (e.g. `raw/bill/117/hr/21/details.json`),
//! giving later stages a replayable, auditable source of truth.
//!
//! Guarantees:
//! - Writes are atomic (temp-file-then-rename), so a crash mid-write
//!   never leaves a corrupt primary file.
//! - An existing file is renamed to a timestamp-suffixed backup before
//!   being replaced; a failed write never destroys the backup chain.
//! - Backups expire after a configurable retention window.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::types::{Result, SyncError};

const BACKUP_MARKER: &str = ".bak.";

/// Result of a raw-store write.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub path: PathBuf,
    /// Hex SHA-256 of the stored payload bytes.
    pub digest: String,
    /// False when the incoming payload was byte-identical to the file
    /// already on disk and the write was skipped.
    pub written: bool,
}

/// File-first staging area for upstream responses.
pub struct RawStore {
    root: PathBuf,
}

impl RawStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, segments: &[&str]) -> Result<PathBuf> {
        if segments.is_empty() {
            return Err(SyncError::Storage("raw store path has no segments".into()));
        }
        let mut path = self.root.clone();
        for segment in segments {
            if segment.contains('/') || segment.contains("..") {
                return Err(SyncError::Storage(format!(
                    "invalid raw store path segment: '{segment}'"
                )));
            }
            path.push(segment);
        }
        Ok(path)
    }

    /// Persist a JSON payload, backing up any differing existing file.
    pub fn save(&self, payload: &Value, segments: &[&str]) -> Result<StoredFile> {
        let path = self.path_for(segments)?;
        let dir = path
            .parent()
            .ok_or_else(|| SyncError::Storage("raw store path has no parent".into()))?;
        fs::create_dir_all(dir)?;

        let bytes = serde_json::to_vec_pretty(payload)?;
        let digest = hex_digest(&bytes);

        if path.exists() {
            let existing = fs::read(&path)?;
            if existing == bytes {
                debug!(path = %path.display(), "Raw payload unchanged, skipping write");
                return Ok(StoredFile {
                    path,
                    digest,
                    written: false,
                });
            }
            let backup = backup_path(&path);
            fs::rename(&path, &backup)?;
            debug!(backup = %backup.display(), "Backed up previous raw file");
        }

        // Temp-then-rename keeps the primary file intact if this write dies
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;

        debug!(path = %path.display(), digest = %digest, "Saved raw payload");
        Ok(StoredFile {
            path,
            digest,
            written: true,
        })
    }

    /// Persist a raw text document (bill text XML) with the same backup
    /// and atomicity guarantees as JSON payloads.
    pub fn save_text(&self, content: &str, segments: &[&str]) -> Result<StoredFile> {
        let path = self.path_for(segments)?;
        let dir = path
            .parent()
            .ok_or_else(|| SyncError::Storage("raw store path has no parent".into()))?;
        fs::create_dir_all(dir)?;

        let bytes = content.as_bytes();
        let digest = hex_digest(bytes);

        if path.exists() {
            let existing = fs::read(&path)?;
            if existing == bytes {
                return Ok(StoredFile {
                    path,
                    digest,
                    written: false,
                });
            }
            fs::rename(&path, backup_path(&path))?;
        }

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(StoredFile {
            path,
            digest,
            written: true,
        })
    }

    /// Load a previously stored text document, or None when absent.
    pub fn load_text(&self, segments: &[&str]) -> Result<Option<String>> {
        let path = self.path_for(segments)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path)?))
    }

    /// Load a previously stored payload, or None when absent.
    pub fn load(&self, segments: &[&str]) -> Result<Option<Value>> {
        let path = self.path_for(segments)?;
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Remove backup files older than the retention window. Returns the
    /// number of backups removed.
    pub fn purge_backups(&self, retention_days: i64) -> Result<usize> {
        if !self.root.exists() {
            return Ok(0);
        }
        let cutoff = SystemTime::now()
            .checked_sub(Duration::from_secs(retention_days.max(0) as u64 * 86_400))
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut removed = 0;
        purge_dir(&self.root, cutoff, &mut removed)?;
        if removed > 0 {
            info!(removed, retention_days, "Purged expired raw backups");
        }
        Ok(removed)
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn backup_path(path: &Path) -> PathBuf {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("payload.json");
    path.with_file_name(format!("{name}{BACKUP_MARKER}{timestamp}"))
}

fn purge_dir(dir: &Path, cutoff: SystemTime, removed: &mut usize) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            purge_dir(&path, cutoff, removed)?;
            continue;
        }
        let is_backup = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.contains(BACKUP_MARKER));
        if !is_backup {
            continue;
        }
        let expired = entry
            .metadata()
            .and_then(|m| m.modified())
            .map(|mtime| mtime < cutoff)
            .unwrap_or(false);
        if expired {
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Failed to remove expired backup");
            } else {
                *removed += 1;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = RawStore::new(dir.path());
        let payload = json!({"bill": {"number": "21"}});

        let stored = store
            .save(&payload, &["bill", "117", "hr", "21", "details.json"])
            .unwrap();
        assert!(stored.written);
        assert!(stored.path.ends_with("bill/117/hr/21/details.json"));

        let loaded = store
            .load(&["bill", "117", "hr", "21", "details.json"])
            .unwrap()
            .unwrap();
        assert_eq!(loaded, payload);
    }

    #[test]
    fn test_save_and_load_text() {
        let dir = tempdir().unwrap();
        let store = RawStore::new(dir.path());
        let segments = ["bill", "117", "hr", "21", "text.xml"];

        let first = store.save_text("<bill/>", &segments).unwrap();
        assert!(first.written);
        let second = store.save_text("<bill/>", &segments).unwrap();
        assert!(!second.written);

        assert_eq!(
            store.load_text(&segments).unwrap().as_deref(),
            Some("<bill/>")
        );
        assert!(store.load_text(&["bill", "none.xml"]).unwrap().is_none());
    }

    #[test]
    fn test_load_missing_returns_none() {
        let dir = tempdir().unwrap();
        let store = RawStore::new(dir.path());
        assert!(store.load(&["bill", "none.json"]).unwrap().is_none());
    }

    #[test]
    fn test_overwrite_creates_backup() {
        let dir = tempdir().unwrap();
        let store = RawStore::new(dir.path());
        let segments = ["bill", "117", "hr", "21", "details.json"];

        store.save(&json!({"v": 1}), &segments).unwrap();
        store.save(&json!({"v": 2}), &segments).unwrap();

        let parent = dir.path().join("bill/117/hr/21");
        let backups: Vec<_> = fs::read_dir(&parent)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(BACKUP_MARKER))
            .collect();
        assert_eq!(backups.len(), 1);

        // Primary holds the new payload
        let loaded = store.load(&segments).unwrap().unwrap();
        assert_eq!(loaded["v"], 2);
    }

    #[test]
    fn test_identical_payload_skips_backup() {
        let dir = tempdir().unwrap();
        let store = RawStore::new(dir.path());
        let segments = ["bill", "117", "hr", "21", "details.json"];

        let first = store.save(&json!({"v": 1}), &segments).unwrap();
        let second = store.save(&json!({"v": 1}), &segments).unwrap();
        assert!(first.written);
        assert!(!second.written);
        assert_eq!(first.digest, second.digest);

        let parent = dir.path().join("bill/117/hr/21");
        let backup_count = fs::read_dir(&parent)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(BACKUP_MARKER))
            .count();
        assert_eq!(backup_count, 0);
    }

    #[test]
    fn test_purge_respects_retention() {
        let dir = tempdir().unwrap();
        let store = RawStore::new(dir.path());
        let segments = ["bill", "117", "hr", "21", "details.json"];
        store.save(&json!({"v": 1}), &segments).unwrap();
        store.save(&json!({"v": 2}), &segments).unwrap();

        // Fresh backups survive a 30-day retention pass
        assert_eq!(store.purge_backups(30).unwrap(), 0);
        // Zero-day retention removes everything backed up before "now";
        // wait out coarse filesystem timestamp granularity first
        std::thread::sleep(Duration::from_millis(1100));
        let removed = store.purge_backups(0).unwrap();
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_rejects_traversal_segments() {
        let dir = tempdir().unwrap();
        let store = RawStore::new(dir.path());
        assert!(store.save(&json!({}), &["..", "escape.json"]).is_err());
        assert!(store.save(&json!({}), &["a/b", "x.json"]).is_err());
    }
}
