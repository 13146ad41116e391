//! BackupVault: per-project, per-file backup history
//!
//! Layout: `<root>/<project_hash>/<filename_hash>/<backup_id>[.gz]`, with a
//! `<backup_id>.meta.json` sidecar per snapshot. Project identity comes
//! from the nearest `.git` ancestor of the file (falling back to its parent
//! directory), so backups of one repository share a shelf. Ids embed a
//! random suffix, which keeps cross-process appends collision-free.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;

/// Errors from backup operations
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backup not found: {id}")]
    NotFound { id: String },

    #[error("backup metadata error: {0}")]
    Meta(#[from] serde_json::Error),
}

/// One stored snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupEntry {
    /// `YYYYMMDD_HHMMSS_<8-hex>`
    pub id: String,
    pub original_path: PathBuf,
    pub stored_path: PathBuf,
    /// Size of the original content in bytes
    pub size: u64,
    /// Unix seconds
    pub created_at: i64,
    /// The original file's mtime at snapshot time, unix seconds
    pub original_mtime: i64,
    pub compressed: bool,
}

fn path_hash(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

fn rand_hex8() -> String {
    let mut bytes = [0u8; 4];
    let _ = getrandom::getrandom(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Walk ancestors to the nearest VCS marker; fall back to the parent dir
fn project_root_of(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("/"));
    let mut dir = parent;
    loop {
        if dir.join(".git").exists() {
            return dir.to_path_buf();
        }
        match dir.parent() {
            Some(up) => dir = up,
            None => return parent.to_path_buf(),
        }
    }
}

/// Per-file backup store with FIFO retention
#[derive(Debug, Clone)]
pub struct BackupVault {
    root: PathBuf,
}

impl BackupVault {
    /// Vault rooted at an explicit directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default root: `<home>/.ragex/backups`
    pub fn default_root() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ragex")
            .join("backups")
    }

    /// The shelf directory for one file
    fn shelf(&self, path: &Path) -> PathBuf {
        let project = project_root_of(path);
        self.root.join(path_hash(&project)).join(path_hash(path))
    }

    /// Snapshot a file before editing it
    pub fn create(&self, path: &Path, compress: bool) -> Result<BackupEntry, BackupError> {
        let content = std::fs::read(path)?;
        let meta = std::fs::metadata(path)?;
        let original_mtime = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let shelf = self.shelf(path);
        std::fs::create_dir_all(&shelf)?;

        let id = format!(
            "{}_{}",
            chrono::Utc::now().format("%Y%m%d_%H%M%S"),
            rand_hex8()
        );
        let stored_path = if compress {
            shelf.join(format!("{}.gz", id))
        } else {
            shelf.join(&id)
        };

        if compress {
            let file = std::fs::File::create(&stored_path)?;
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(&content)?;
            encoder.finish()?;
        } else {
            std::fs::write(&stored_path, &content)?;
        }

        let entry = BackupEntry {
            id: id.clone(),
            original_path: path.to_path_buf(),
            stored_path,
            size: content.len() as u64,
            created_at: chrono::Utc::now().timestamp(),
            original_mtime,
            compressed: compress,
        };
        std::fs::write(
            shelf.join(format!("{}.meta.json", id)),
            serde_json::to_vec_pretty(&entry)?,
        )?;
        Ok(entry)
    }

    /// Snapshots for a file, newest first
    pub fn list(&self, path: &Path, limit: Option<usize>) -> Result<Vec<BackupEntry>, BackupError> {
        let shelf = self.shelf(path);
        if !shelf.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for item in std::fs::read_dir(&shelf)? {
            let item = item?;
            let name = item.file_name().to_string_lossy().to_string();
            if !name.ends_with(".meta.json") {
                continue;
            }
            let bytes = std::fs::read(item.path())?;
            match serde_json::from_slice::<BackupEntry>(&bytes) {
                Ok(entry) => entries.push(entry),
                Err(_) => continue, // unreadable sidecar; ignore the snapshot
            }
        }

        // Ids sort chronologically (timestamp prefix)
        entries.sort_by(|a, b| b.id.cmp(&a.id));
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    fn find(&self, path: &Path, id: Option<&str>) -> Result<BackupEntry, BackupError> {
        let entries = self.list(path, None)?;
        match id {
            Some(id) => entries
                .into_iter()
                .find(|e| e.id == id)
                .ok_or_else(|| BackupError::NotFound { id: id.to_string() }),
            None => entries.into_iter().next().ok_or_else(|| BackupError::NotFound {
                id: "<latest>".to_string(),
            }),
        }
    }

    /// The stored content of a snapshot, decompressed
    pub fn read_content(&self, entry: &BackupEntry) -> Result<Vec<u8>, BackupError> {
        let raw = std::fs::read(&entry.stored_path)?;
        if entry.compressed {
            let mut decoder = GzDecoder::new(raw.as_slice());
            let mut content = Vec::new();
            decoder.read_to_end(&mut content)?;
            Ok(content)
        } else {
            Ok(raw)
        }
    }

    /// Restore a snapshot (the given id, or the most recent) over the
    /// original path
    pub fn restore(&self, path: &Path, id: Option<&str>) -> Result<BackupEntry, BackupError> {
        let entry = self.find(path, id)?;
        let content = self.read_content(&entry)?;

        let dir = entry
            .original_path
            .parent()
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let tmp = dir.join(format!(".ragex-restore.{}", rand_hex8()));
        std::fs::write(&tmp, &content)?;
        if let Err(e) = std::fs::rename(&tmp, &entry.original_path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(entry)
    }

    /// Prune snapshots beyond `keep`, oldest first; returns how many were
    /// removed
    pub fn cleanup(&self, path: &Path, keep: usize) -> Result<usize, BackupError> {
        let entries = self.list(path, None)?;
        let mut removed = 0;
        for entry in entries.iter().skip(keep) {
            let _ = std::fs::remove_file(&entry.stored_path);
            let shelf = self.shelf(path);
            let _ = std::fs::remove_file(shelf.join(format!("{}.meta.json", entry.id)));
            removed += 1;
        }
        Ok(removed)
    }

    /// Total stored bytes for one file's snapshots
    pub fn total_size(&self, path: &Path) -> Result<u64, BackupError> {
        let mut total = 0;
        for entry in self.list(path, None)? {
            if let Ok(meta) = std::fs::metadata(&entry.stored_path) {
                total += meta.len();
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn vault_and_file(content: &str) -> (tempfile::TempDir, BackupVault, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("project").join("lib").join("a.ex");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, content).unwrap();
        let vault = BackupVault::new(dir.path().join("backups"));
        (dir, vault, file)
    }

    #[test]
    fn id_format_is_timestamp_plus_hex() {
        let (_dir, vault, file) = vault_and_file("code");
        let entry = vault.create(&file, false).unwrap();
        // YYYYMMDD_HHMMSS_xxxxxxxx
        assert_eq!(entry.id.len(), 8 + 1 + 6 + 1 + 8);
        let suffix = entry.id.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn create_then_restore_round_trips() {
        let (_dir, vault, file) = vault_and_file("original content\n");
        vault.create(&file, false).unwrap();

        fs::write(&file, "clobbered\n").unwrap();
        vault.restore(&file, None).unwrap();

        assert_eq!(fs::read_to_string(&file).unwrap(), "original content\n");
    }

    #[test]
    fn compressed_backup_round_trips_transparently() {
        let (_dir, vault, file) = vault_and_file("squeeze me\n");
        let entry = vault.create(&file, true).unwrap();
        assert!(entry.compressed);
        assert!(entry.stored_path.to_string_lossy().ends_with(".gz"));

        fs::write(&file, "overwritten").unwrap();
        vault.restore(&file, None).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "squeeze me\n");
    }

    #[test]
    fn list_is_newest_first_and_limited() {
        let (_dir, vault, file) = vault_and_file("v1");
        let first = vault.create(&file, false).unwrap();
        fs::write(&file, "v2").unwrap();
        let second = vault.create(&file, false).unwrap();

        let all = vault.list(&file, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);

        let limited = vault.list(&file, Some(1)).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, second.id);
    }

    #[test]
    fn restore_specific_id() {
        let (_dir, vault, file) = vault_and_file("v1");
        let first = vault.create(&file, false).unwrap();
        fs::write(&file, "v2").unwrap();
        vault.create(&file, false).unwrap();
        fs::write(&file, "v3").unwrap();

        vault.restore(&file, Some(&first.id)).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "v1");
    }

    #[test]
    fn restore_unknown_id_fails() {
        let (_dir, vault, file) = vault_and_file("x");
        vault.create(&file, false).unwrap();
        assert!(matches!(
            vault.restore(&file, Some("20000101_000000_deadbeef")),
            Err(BackupError::NotFound { .. })
        ));
    }

    #[test]
    fn cleanup_keeps_newest() {
        let (_dir, vault, file) = vault_and_file("v1");
        let first = vault.create(&file, false).unwrap();
        fs::write(&file, "v2").unwrap();
        let second = vault.create(&file, false).unwrap();
        fs::write(&file, "v3").unwrap();
        let third = vault.create(&file, false).unwrap();

        let removed = vault.cleanup(&file, 2).unwrap();
        assert_eq!(removed, 1);

        let remaining: Vec<String> = vault
            .list(&file, None)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(remaining, vec![third.id, second.id]);
        assert!(!first.stored_path.exists());
    }

    #[test]
    fn total_size_sums_stored_files() {
        let (_dir, vault, file) = vault_and_file("1234567890");
        vault.create(&file, false).unwrap();
        assert_eq!(vault.total_size(&file).unwrap(), 10);
    }

    #[test]
    fn files_in_same_git_project_share_a_project_shelf() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("repo");
        fs::create_dir_all(project.join(".git")).unwrap();
        fs::create_dir_all(project.join("lib")).unwrap();
        let a = project.join("lib").join("a.ex");
        let b = project.join("b.ex");
        fs::write(&a, "a").unwrap();
        fs::write(&b, "b").unwrap();

        let vault = BackupVault::new(dir.path().join("backups"));
        let entry_a = vault.create(&a, false).unwrap();
        let entry_b = vault.create(&b, false).unwrap();

        // <root>/<project_hash>/<file_hash>/<id>: same project component
        let project_a = entry_a.stored_path.parent().unwrap().parent().unwrap();
        let project_b = entry_b.stored_path.parent().unwrap().parent().unwrap();
        assert_eq!(project_a, project_b);
    }

    #[test]
    fn missing_shelf_lists_empty() {
        let (_dir, vault, file) = vault_and_file("x");
        assert!(vault.list(&file, None).unwrap().is_empty());
        assert_eq!(vault.total_size(&file).unwrap(), 0);
    }
}
