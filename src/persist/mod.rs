//! Persistence: project-scoped on-disk cache
//!
//! Layout per project, under a cache root:
//!
//! ```text
//! <cache_root>/<project_hash>/
//!   nodes.bin      # graph nodes
//!   edges.bin      # graph edges
//!   embeddings.bin # id -> (vector, text)
//!   tracker.bin    # FileTracker export
//!   meta.json      # CacheMetadata
//! ```
//!
//! The project hash is the 16-hex prefix of the SHA-256 of the absolute
//! project root path. A load is accepted iff the cache version matches and
//! the stored model's dimensions equal the current model's; cross-model
//! reuse is allowed exactly when the vector lengths agree.

use crate::embedding::{EmbeddingRecord, EmbeddingStore, ModelInfo};
use crate::graph::{Edge, GraphStore, Node};
use crate::tracker::{FileTracker, TrackerExport, TRACKER_VERSION};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// On-disk cache format version
pub const CACHE_VERSION: u32 = 1;

const NODES_FILE: &str = "nodes.bin";
const EDGES_FILE: &str = "edges.bin";
const EMBEDDINGS_FILE: &str = "embeddings.bin";
const TRACKER_FILE: &str = "tracker.bin";
const META_FILE: &str = "meta.json";

/// Errors from cache save/load/maintenance
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("cache encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("cache metadata error: {0}")]
    Meta(#[from] serde_json::Error),
}

/// Metadata record written alongside the binary payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub version: u32,
    pub embedding_model_id: String,
    pub embedding_model_repo: String,
    pub dimensions: usize,
    /// Unix seconds
    pub created_at: i64,
    pub entity_count: usize,
    pub file_tracking_version: u32,
}

/// Result of a cache load attempt
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// Cache accepted; stores are hydrated
    Loaded { entity_count: usize },
    /// Model dimensions differ; stores left empty
    Incompatible {
        stored_model: ModelInfo,
        current_model: ModelInfo,
    },
    /// No cache exists for this project
    NotFound,
    /// Payload exists but cannot be decoded; treated as NotFound by
    /// callers, logged here
    Corrupt { reason: String },
}

/// Scope selector for clear/stats
#[derive(Debug, Clone)]
pub enum CacheScope {
    /// Only the current project's cache
    Current,
    /// Every project under the cache root
    All,
    /// Projects whose cache is older than the given age
    OlderThan(Duration),
}

/// Stats for one project's cache directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectCacheStats {
    pub project_hash: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub entity_count: Option<usize>,
    pub created_at: Option<i64>,
    pub model_id: Option<String>,
    pub dimensions: Option<usize>,
}

/// Aggregate cache stats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub projects: Vec<ProjectCacheStats>,
    pub total_size_bytes: u64,
}

/// 16-hex-digit prefix of the SHA-256 of the absolute project root path
pub fn project_hash(root: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(root.to_string_lossy().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

fn rand_hex_suffix() -> String {
    let mut bytes = [0u8; 4];
    // Zero suffix on RNG failure still yields a usable unique-enough temp name
    let _ = getrandom::getrandom(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Write bytes to a sibling temp file, then rename over the target
fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "cache".to_string());
    let tmp = dir.join(format!(".{}.tmp{}", name, rand_hex_suffix()));
    std::fs::write(&tmp, bytes)?;
    match std::fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = std::fs::remove_file(&tmp);
            Err(e)
        }
    }
}

fn dir_size(path: &Path) -> u64 {
    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum()
}

/// Project-scoped cache of graph + embeddings + tracker
#[derive(Debug, Clone)]
pub struct Persistence {
    cache_root: PathBuf,
    project_dir: PathBuf,
    project_hash: String,
}

impl Persistence {
    /// Bind a cache root to a project root
    pub fn new(cache_root: impl Into<PathBuf>, project_root: &Path) -> Self {
        let cache_root = cache_root.into();
        let hash = project_hash(project_root);
        let project_dir = cache_root.join(&hash);
        Self {
            cache_root,
            project_dir,
            project_hash: hash,
        }
    }

    /// The per-project cache directory
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Serialize all three stores plus metadata
    ///
    /// Each file is written via temp + rename; `meta.json` goes last so a
    /// torn save is seen as corrupt/absent rather than accepted.
    pub fn save(
        &self,
        graph: &GraphStore,
        embeddings: &EmbeddingStore,
        tracker: &FileTracker,
        model: &ModelInfo,
    ) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.project_dir)?;

        let (nodes, edges) = graph.export();
        let records = embeddings.iter();
        let tracker_export = tracker.export();
        let entity_count = nodes.len();

        atomic_write(
            &self.project_dir.join(NODES_FILE),
            &bincode::serialize(&nodes)?,
        )?;
        atomic_write(
            &self.project_dir.join(EDGES_FILE),
            &bincode::serialize(&edges)?,
        )?;
        atomic_write(
            &self.project_dir.join(EMBEDDINGS_FILE),
            &bincode::serialize(&records)?,
        )?;
        atomic_write(
            &self.project_dir.join(TRACKER_FILE),
            &bincode::serialize(&tracker_export)?,
        )?;

        let meta = CacheMetadata {
            version: CACHE_VERSION,
            embedding_model_id: model.id.clone(),
            embedding_model_repo: model.repo.clone(),
            dimensions: model.dimensions,
            created_at: chrono::Utc::now().timestamp(),
            entity_count,
            file_tracking_version: TRACKER_VERSION,
        };
        atomic_write(
            &self.project_dir.join(META_FILE),
            &serde_json::to_vec_pretty(&meta)?,
        )?;

        Ok(())
    }

    /// Attempt to hydrate the stores from this project's cache
    ///
    /// On any outcome other than `Loaded`, the stores are not touched.
    pub fn load(
        &self,
        graph: &GraphStore,
        embeddings: &EmbeddingStore,
        tracker: &FileTracker,
        current_model: &ModelInfo,
    ) -> LoadOutcome {
        let meta_path = self.project_dir.join(META_FILE);
        if !meta_path.exists() {
            return LoadOutcome::NotFound;
        }

        let meta: CacheMetadata = match std::fs::read(&meta_path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(|e| e.to_string()))
        {
            Ok(meta) => meta,
            Err(reason) => {
                warn!(project = %self.project_hash, %reason, "unreadable cache metadata");
                return LoadOutcome::Corrupt { reason };
            }
        };

        if meta.version != CACHE_VERSION {
            let reason = format!("unsupported cache version {}", meta.version);
            warn!(project = %self.project_hash, %reason, "rejecting cache");
            return LoadOutcome::Corrupt { reason };
        }

        if meta.dimensions != current_model.dimensions {
            return LoadOutcome::Incompatible {
                stored_model: ModelInfo {
                    id: meta.embedding_model_id,
                    repo: meta.embedding_model_repo,
                    dimensions: meta.dimensions,
                },
                current_model: current_model.clone(),
            };
        }

        match self.load_payloads() {
            Ok((nodes, edges, records, tracker_export)) => {
                let entity_count = nodes.len();
                graph.import(nodes, edges);
                embeddings.import(records);
                tracker.import(tracker_export);
                LoadOutcome::Loaded { entity_count }
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(project = %self.project_hash, %reason, "corrupt cache payload");
                LoadOutcome::Corrupt { reason }
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn load_payloads(
        &self,
    ) -> Result<(Vec<Node>, Vec<Edge>, Vec<EmbeddingRecord>, TrackerExport), CacheError> {
        let nodes = bincode::deserialize(&std::fs::read(self.project_dir.join(NODES_FILE))?)?;
        let edges = bincode::deserialize(&std::fs::read(self.project_dir.join(EDGES_FILE))?)?;
        let records =
            bincode::deserialize(&std::fs::read(self.project_dir.join(EMBEDDINGS_FILE))?)?;
        let tracker = bincode::deserialize(&std::fs::read(self.project_dir.join(TRACKER_FILE))?)?;
        Ok((nodes, edges, records, tracker))
    }

    fn read_meta(dir: &Path) -> Option<CacheMetadata> {
        let bytes = std::fs::read(dir.join(META_FILE)).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn project_dirs(&self) -> Result<Vec<PathBuf>, CacheError> {
        if !self.cache_root.exists() {
            return Ok(Vec::new());
        }
        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(&self.cache_root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Delete cached projects in scope; returns how many were removed
    pub fn clear(&self, scope: CacheScope) -> Result<usize, CacheError> {
        let targets: Vec<PathBuf> = match scope {
            CacheScope::Current => {
                if self.project_dir.exists() {
                    vec![self.project_dir.clone()]
                } else {
                    Vec::new()
                }
            }
            CacheScope::All => self.project_dirs()?,
            CacheScope::OlderThan(age) => {
                let cutoff = chrono::Utc::now().timestamp() - age.as_secs() as i64;
                self.project_dirs()?
                    .into_iter()
                    .filter(|dir| {
                        Self::read_meta(dir)
                            .map(|meta| meta.created_at < cutoff)
                            .unwrap_or(false)
                    })
                    .collect()
            }
        };

        let mut removed = 0;
        for dir in targets {
            std::fs::remove_dir_all(&dir)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Sizes, counts, and model info for cached projects in scope
    pub fn stats(&self, scope: CacheScope) -> Result<CacheStats, CacheError> {
        let dirs: Vec<PathBuf> = match scope {
            CacheScope::Current => {
                if self.project_dir.exists() {
                    vec![self.project_dir.clone()]
                } else {
                    Vec::new()
                }
            }
            _ => self.project_dirs()?,
        };

        let mut projects = Vec::new();
        let mut total = 0u64;
        for dir in dirs {
            let size = dir_size(&dir);
            total += size;
            let meta = Self::read_meta(&dir);
            projects.push(ProjectCacheStats {
                project_hash: dir
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                path: dir,
                size_bytes: size,
                entity_count: meta.as_ref().map(|m| m.entity_count),
                created_at: meta.as_ref().map(|m| m.created_at),
                model_id: meta.as_ref().map(|m| m.embedding_model_id.clone()),
                dimensions: meta.as_ref().map(|m| m.dimensions),
            });
        }

        Ok(CacheStats {
            projects,
            total_size_bytes: total,
        })
    }
}
