//! UndoLog: persistent refactor history
//!
//! One binary-serialized file per entry under
//! `<root>/<project_hash>/`, each carrying full pre-edit snapshots of the
//! affected files. `undo` restores the most recent non-undone entry's
//! snapshots and marks it undone; `redo` only returns the recorded
//! parameters, it never re-applies the operation itself.

use crate::persist::project_hash;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from undo-log operations
#[derive(Debug, Error)]
pub enum UndoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("undo entry encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,
}

/// Whether the recorded operation succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndoOutcome {
    Success,
    Failure,
}

/// One recorded refactor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoEntry {
    pub id: String,
    /// Operation kind, e.g. `rename_function`
    pub operation: String,
    /// Unix milliseconds
    pub timestamp: i64,
    pub parameters: HashMap<String, String>,
    pub affected_paths: Vec<PathBuf>,
    /// Full pre-edit content per affected path
    pub snapshots: HashMap<PathBuf, String>,
    pub outcome: UndoOutcome,
    pub undone: bool,
}

/// Per-project undo history
#[derive(Debug, Clone)]
pub struct UndoLog {
    project_dir: PathBuf,
}

impl UndoLog {
    /// Log rooted at an explicit directory, scoped to one project
    pub fn new(root: impl Into<PathBuf>, project_root: &Path) -> Self {
        let project_dir = root.into().join(project_hash(project_root));
        Self { project_dir }
    }

    /// Default root: `<home>/.ragex/undo`
    pub fn default_root() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ragex")
            .join("undo")
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.project_dir.join(id)
    }

    fn write_entry(&self, entry: &UndoEntry) -> Result<(), UndoError> {
        std::fs::create_dir_all(&self.project_dir)?;
        std::fs::write(self.entry_path(&entry.id), bincode::serialize(entry)?)?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<UndoEntry>, UndoError> {
        if !self.project_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for item in std::fs::read_dir(&self.project_dir)? {
            let item = item?;
            if !item.file_type()?.is_file() {
                continue;
            }
            let bytes = std::fs::read(item.path())?;
            match bincode::deserialize::<UndoEntry>(&bytes) {
                Ok(entry) => entries.push(entry),
                Err(_) => continue, // unreadable entry; skip
            }
        }
        // Newest first; ids embed the timestamp so they tiebreak stably
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(entries)
    }

    /// Append an entry; returns its id
    pub fn push(
        &self,
        operation: &str,
        parameters: HashMap<String, String>,
        snapshots: HashMap<PathBuf, String>,
        outcome: UndoOutcome,
    ) -> Result<String, UndoError> {
        // Fixed-width sequence keeps same-millisecond ids ordered
        static SEQ: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let timestamp = chrono::Utc::now().timestamp_millis();
        let entry = UndoEntry {
            id: format!("{}_{:08}_{}", timestamp, seq, uuid::Uuid::new_v4()),
            operation: operation.to_string(),
            timestamp,
            parameters,
            affected_paths: snapshots.keys().cloned().collect(),
            snapshots,
            outcome,
            undone: false,
        };
        self.write_entry(&entry)?;
        Ok(entry.id)
    }

    /// Restore the most recent non-undone successful entry's snapshots
    /// and mark it undone
    pub fn undo(&self) -> Result<UndoEntry, UndoError> {
        let entry = self
            .read_all()?
            .into_iter()
            .find(|e| !e.undone && e.outcome == UndoOutcome::Success)
            .ok_or(UndoError::NothingToUndo)?;

        for (path, content) in &entry.snapshots {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)?;
        }

        let mut updated = entry.clone();
        updated.undone = true;
        self.write_entry(&updated)?;
        Ok(updated)
    }

    /// The most recently undone entry, for the caller to re-execute
    ///
    /// The log itself re-applies nothing and the entry stays undone.
    pub fn redo(&self) -> Result<UndoEntry, UndoError> {
        self.read_all()?
            .into_iter()
            .find(|e| e.undone)
            .ok_or(UndoError::NothingToRedo)
    }

    /// History, newest first
    pub fn list(&self, limit: usize, include_undone: bool) -> Result<Vec<UndoEntry>, UndoError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| include_undone || !e.undone)
            .take(limit)
            .collect())
    }

    /// Drop history beyond the newest `keep_last` entries; returns how many
    /// were removed
    pub fn clear(&self, keep_last: usize) -> Result<usize, UndoError> {
        let entries = self.read_all()?;
        let mut removed = 0;
        for entry in entries.iter().skip(keep_last) {
            std::fs::remove_file(self.entry_path(&entry.id))?;
            removed += 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn log_in(dir: &Path) -> UndoLog {
        UndoLog::new(dir.join("undo"), Path::new("/proj"))
    }

    #[test]
    fn push_then_list_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(dir.path());

        let first = log
            .push("rename_function", params(&[("old", "a")]), HashMap::new(), UndoOutcome::Success)
            .unwrap();
        let second = log
            .push("rename_module", params(&[("old", "M")]), HashMap::new(), UndoOutcome::Success)
            .unwrap();

        let entries = log.list(10, true).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, second);
        assert_eq!(entries[1].id, first);
        assert_eq!(entries[0].operation, "rename_module");
    }

    #[test]
    fn undo_restores_snapshots_and_marks_undone() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(dir.path());
        let file = dir.path().join("a.ex");
        fs::write(&file, "after refactor").unwrap();

        let mut snapshots = HashMap::new();
        snapshots.insert(file.clone(), "before refactor".to_string());
        log.push("rename_function", HashMap::new(), snapshots, UndoOutcome::Success)
            .unwrap();

        let undone = log.undo().unwrap();
        assert!(undone.undone);
        assert_eq!(fs::read_to_string(&file).unwrap(), "before refactor");

        // Nothing left to undo
        assert!(matches!(log.undo(), Err(UndoError::NothingToUndo)));
    }

    #[test]
    fn undo_skips_failed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(dir.path());
        let file = dir.path().join("a.ex");
        fs::write(&file, "current").unwrap();

        let mut snapshots = HashMap::new();
        snapshots.insert(file.clone(), "failed-op snapshot".to_string());
        log.push("rename_function", HashMap::new(), snapshots, UndoOutcome::Failure)
            .unwrap();

        assert!(matches!(log.undo(), Err(UndoError::NothingToUndo)));
        assert_eq!(fs::read_to_string(&file).unwrap(), "current");
    }

    #[test]
    fn redo_returns_parameters_without_reapplying() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(dir.path());
        let file = dir.path().join("a.ex");
        fs::write(&file, "v2").unwrap();

        let mut snapshots = HashMap::new();
        snapshots.insert(file.clone(), "v1".to_string());
        log.push(
            "rename_function",
            params(&[("old_name", "foo"), ("new_name", "bar")]),
            snapshots,
            UndoOutcome::Success,
        )
        .unwrap();

        assert!(matches!(log.redo(), Err(UndoError::NothingToRedo)));

        log.undo().unwrap();
        let redo = log.redo().unwrap();
        assert_eq!(redo.parameters.get("new_name").map(String::as_str), Some("bar"));
        // File untouched by redo
        assert_eq!(fs::read_to_string(&file).unwrap(), "v1");
    }

    #[test]
    fn list_can_exclude_undone() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(dir.path());
        log.push("op", HashMap::new(), HashMap::new(), UndoOutcome::Success)
            .unwrap();
        log.undo().unwrap();

        assert_eq!(log.list(10, false).unwrap().len(), 0);
        assert_eq!(log.list(10, true).unwrap().len(), 1);
    }

    #[test]
    fn clear_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(dir.path());
        for i in 0..5 {
            log.push(&format!("op{}", i), HashMap::new(), HashMap::new(), UndoOutcome::Success)
                .unwrap();
        }
        let removed = log.clear(2).unwrap();
        assert_eq!(removed, 3);
        assert_eq!(log.list(10, true).unwrap().len(), 2);
    }

    #[test]
    fn projects_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let log_a = UndoLog::new(dir.path().join("undo"), Path::new("/proj-a"));
        let log_b = UndoLog::new(dir.path().join("undo"), Path::new("/proj-b"));

        log_a
            .push("op", HashMap::new(), HashMap::new(), UndoOutcome::Success)
            .unwrap();
        assert_eq!(log_b.list(10, true).unwrap().len(), 0);
    }
}
