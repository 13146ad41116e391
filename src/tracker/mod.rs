//! FileTracker: content-hashed change detection
//!
//! One record per tracked file: SHA-256 fingerprint, stat data, and the set
//! of entity ids the last ingestion produced from that file. Change
//! detection is content-based; mtime is recorded but never drives
//! invalidation on its own.

use crate::graph::EntityId;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Serialization version of [`TrackerExport`]
pub const TRACKER_VERSION: u32 = 1;

/// One tracked file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    /// Hex SHA-256 of the file content
    pub content_hash: String,
    pub size: u64,
    /// Modification time in unix seconds (informational only)
    pub mtime: i64,
    /// Entity ids produced when this file was last processed
    pub entities: HashSet<EntityId>,
}

/// Classification of a candidate file against the tracker
#[derive(Debug, Clone)]
pub enum FileStatus {
    /// Never seen before
    New,
    /// Content hash matches the record
    Unchanged(FileRecord),
    /// Content hash differs from the record
    Changed(FileRecord),
    /// Tracked, but the file no longer exists
    Deleted(FileRecord),
}

/// Aggregate tracker counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerStats {
    pub file_count: usize,
    pub entity_count: usize,
}

/// Snapshot for the persistence round-trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerExport {
    pub version: u32,
    pub records: Vec<FileRecord>,
}

/// Hex SHA-256 of a byte buffer
pub fn fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Content-hashed file tracker
#[derive(Debug, Default)]
pub struct FileTracker {
    records: DashMap<PathBuf, FileRecord>,
}

impl FileTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file and the entities produced from it
    ///
    /// Reads the file to compute the fingerprint and stat data.
    pub fn track(&self, path: &Path, entities: HashSet<EntityId>) -> io::Result<()> {
        let content = std::fs::read(path)?;
        let meta = std::fs::metadata(path)?;
        let mtime = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        self.records.insert(
            path.to_path_buf(),
            FileRecord {
                path: path.to_path_buf(),
                content_hash: fingerprint(&content),
                size: meta.len(),
                mtime,
                entities,
            },
        );
        Ok(())
    }

    /// Classify a path by re-reading its content
    pub fn classify(&self, path: &Path) -> io::Result<FileStatus> {
        let record = self.records.get(path).map(|r| r.clone());

        if !path.exists() {
            return Ok(match record {
                Some(rec) => FileStatus::Deleted(rec),
                None => FileStatus::New,
            });
        }

        let Some(rec) = record else {
            return Ok(FileStatus::New);
        };

        let content = std::fs::read(path)?;
        if fingerprint(&content) == rec.content_hash {
            Ok(FileStatus::Unchanged(rec))
        } else {
            Ok(FileStatus::Changed(rec))
        }
    }

    /// The stored record for a path
    pub fn record(&self, path: &Path) -> Option<FileRecord> {
        self.records.get(path).map(|r| r.clone())
    }

    /// All tracked paths
    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        self.records.iter().map(|r| r.key().clone()).collect()
    }

    /// Union of entity sets over files currently classified Changed or
    /// Deleted
    pub fn stale_entities(&self) -> HashSet<EntityId> {
        // Snapshot the key set first; classify re-enters the map
        let mut stale = HashSet::new();
        for path in self.tracked_paths() {
            match self.classify(&path) {
                Ok(FileStatus::Changed(rec)) | Ok(FileStatus::Deleted(rec)) => {
                    stale.extend(rec.entities);
                }
                _ => {}
            }
        }
        stale
    }

    /// Forget a path; returns the removed record
    pub fn untrack(&self, path: &Path) -> Option<FileRecord> {
        self.records.remove(path).map(|(_, rec)| rec)
    }

    /// Forget everything
    pub fn clear(&self) {
        self.records.clear();
    }

    /// File and entity counts
    pub fn stats(&self) -> TrackerStats {
        let entity_count = self.records.iter().map(|r| r.entities.len()).sum();
        TrackerStats {
            file_count: self.records.len(),
            entity_count,
        }
    }

    /// Snapshot for persistence
    pub fn export(&self) -> TrackerExport {
        TrackerExport {
            version: TRACKER_VERSION,
            records: self.records.iter().map(|r| r.value().clone()).collect(),
        }
    }

    /// Replace state with a persisted snapshot
    pub fn import(&self, export: TrackerExport) {
        self.records.clear();
        for record in export.records {
            self.records.insert(record.path.clone(), record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn ids(names: &[&str]) -> HashSet<EntityId> {
        names
            .iter()
            .map(|n| EntityId::function("M", *n, 0))
            .collect()
    }

    #[test]
    fn untracked_existing_file_is_new() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ex");
        fs::write(&path, "defmodule M do end").unwrap();

        let tracker = FileTracker::new();
        assert!(matches!(tracker.classify(&path).unwrap(), FileStatus::New));
    }

    #[test]
    fn tracked_unmodified_file_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ex");
        fs::write(&path, "defmodule M do end").unwrap();

        let tracker = FileTracker::new();
        tracker.track(&path, ids(&["f"])).unwrap();

        match tracker.classify(&path).unwrap() {
            FileStatus::Unchanged(rec) => assert_eq!(rec.entities, ids(&["f"])),
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[test]
    fn content_change_is_detected_even_with_same_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ex");
        fs::write(&path, "aaaa").unwrap();

        let tracker = FileTracker::new();
        tracker.track(&path, ids(&["f"])).unwrap();

        fs::write(&path, "aaab").unwrap();
        assert!(matches!(
            tracker.classify(&path).unwrap(),
            FileStatus::Changed(_)
        ));
    }

    #[test]
    fn touch_without_content_change_stays_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ex");
        fs::write(&path, "same").unwrap();

        let tracker = FileTracker::new();
        tracker.track(&path, ids(&["f"])).unwrap();

        // Rewrite identical bytes; mtime may move, hash does not.
        fs::write(&path, "same").unwrap();
        assert!(matches!(
            tracker.classify(&path).unwrap(),
            FileStatus::Unchanged(_)
        ));
    }

    #[test]
    fn missing_tracked_file_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ex");
        fs::write(&path, "x").unwrap();

        let tracker = FileTracker::new();
        tracker.track(&path, ids(&["f", "g"])).unwrap();
        fs::remove_file(&path).unwrap();

        match tracker.classify(&path).unwrap() {
            FileStatus::Deleted(rec) => assert_eq!(rec.entities.len(), 2),
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[test]
    fn stale_entities_unions_changed_and_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let changed = dir.path().join("changed.ex");
        let deleted = dir.path().join("deleted.ex");
        let same = dir.path().join("same.ex");
        for p in [&changed, &deleted, &same] {
            fs::write(p, "original").unwrap();
        }

        let tracker = FileTracker::new();
        tracker.track(&changed, ids(&["a"])).unwrap();
        tracker.track(&deleted, ids(&["b"])).unwrap();
        tracker.track(&same, ids(&["c"])).unwrap();

        fs::write(&changed, "modified").unwrap();
        fs::remove_file(&deleted).unwrap();

        let stale = tracker.stale_entities();
        assert_eq!(stale, ids(&["a", "b"]));
    }

    #[test]
    fn export_import_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ex");
        fs::write(&path, "x").unwrap();

        let tracker = FileTracker::new();
        tracker.track(&path, ids(&["f"])).unwrap();

        let export = tracker.export();
        assert_eq!(export.version, TRACKER_VERSION);

        let other = FileTracker::new();
        other.import(export);
        assert_eq!(other.record(&path).unwrap(), tracker.record(&path).unwrap());
        assert_eq!(other.stats().file_count, 1);
    }

    #[test]
    fn untrack_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ex");
        fs::write(&path, "x").unwrap();

        let tracker = FileTracker::new();
        tracker.track(&path, ids(&["f"])).unwrap();

        let removed = tracker.untrack(&path).unwrap();
        assert_eq!(removed.entities, ids(&["f"]));
        assert!(tracker.untrack(&path).is_none());

        tracker.track(&path, ids(&["f"])).unwrap();
        tracker.clear();
        assert_eq!(tracker.stats().file_count, 0);
    }
}
