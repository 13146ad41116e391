//! Configuration
//!
//! Every recognized option has a default; a JSON config file overrides
//! defaults and the `RAGEX_CACHE_DIR` environment variable overrides the
//! configured cache root.

use crate::ingest::IngestOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// PageRank tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRankConfig {
    pub damping: f64,
    pub iters: usize,
    pub tol: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            iters: 100,
            tol: 1e-4,
        }
    }
}

/// Default vector-search cutoffs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSearchConfig {
    pub threshold: f32,
    pub limit: usize,
}

impl Default for VectorSearchConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            limit: 10,
        }
    }
}

/// Directory traversal bounds for analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub exclude_patterns: Vec<String>,
    pub max_depth: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let defaults = IngestOptions::default();
        Self {
            exclude_patterns: defaults.exclude_patterns,
            max_depth: defaults.max_depth,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagexConfig {
    /// Selects the embedding model (`hashing-trigram-<dims>` is the
    /// built-in fallback)
    pub embedding_model_id: String,
    /// Cache root override; `RAGEX_CACHE_DIR` wins over this
    pub cache_dir: Option<PathBuf>,
    pub max_backups_per_file: usize,
    pub compress_backups: bool,
    /// Path-search result cap
    pub max_paths: usize,
    /// Path-search depth cap
    pub max_depth: usize,
    pub pagerank: PageRankConfig,
    pub vector_search: VectorSearchConfig,
    pub analysis: AnalysisConfig,
    pub validate_by_default: bool,
    pub format_by_default: bool,
}

impl Default for RagexConfig {
    fn default() -> Self {
        Self {
            embedding_model_id: "hashing-trigram-384".to_string(),
            cache_dir: None,
            max_backups_per_file: 10,
            compress_backups: false,
            max_paths: 100,
            max_depth: 10,
            pagerank: PageRankConfig::default(),
            vector_search: VectorSearchConfig::default(),
            analysis: AnalysisConfig::default(),
            validate_by_default: true,
            format_by_default: false,
        }
    }
}

impl RagexConfig {
    /// Load from a JSON file; missing file means defaults
    pub fn load(path: Option<&Path>) -> Result<Self, std::io::Error> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let bytes = std::fs::read(path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// The effective cache root: env override, then config, then the OS
    /// cache directory
    pub fn effective_cache_dir(&self) -> PathBuf {
        if let Ok(dir) = std::env::var("RAGEX_CACHE_DIR") {
            return PathBuf::from(dir);
        }
        if let Some(dir) = &self.cache_dir {
            return dir.clone();
        }
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ragex")
    }

    /// Ingestion options derived from the analysis section
    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            exclude_patterns: self.analysis.exclude_patterns.clone(),
            max_depth: self.analysis.max_depth,
            ..IngestOptions::default()
        }
    }

    /// PageRank parameters derived from the pagerank section
    pub fn pagerank_params(&self) -> crate::graph::PageRankParams {
        crate::graph::PageRankParams {
            damping: self.pagerank.damping,
            max_iterations: self.pagerank.iters,
            tolerance: self.pagerank.tol,
        }
    }

    /// Path-search bounds
    pub fn path_search_params(&self) -> crate::graph::PathSearchParams {
        crate::graph::PathSearchParams {
            max_depth: self.max_depth,
            max_paths: self.max_paths,
        }
    }

    /// Editor defaults
    pub fn edit_options(&self) -> crate::edit::EditOptions {
        crate::edit::EditOptions {
            backup: true,
            validate: self.validate_by_default,
            format: self.format_by_default,
            compress_backups: self.compress_backups,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RagexConfig::default();
        assert_eq!(config.max_backups_per_file, 10);
        assert_eq!(config.max_paths, 100);
        assert_eq!(config.max_depth, 10);
        assert!((config.pagerank.damping - 0.85).abs() < f64::EPSILON);
        assert_eq!(config.pagerank.iters, 100);
        assert_eq!(config.vector_search.limit, 10);
        assert!(config.validate_by_default);
        assert!(!config.format_by_default);
    }

    #[test]
    fn partial_config_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"max_paths": 5, "compress_backups": true}"#).unwrap();

        let config = RagexConfig::load(Some(&path)).unwrap();
        assert_eq!(config.max_paths, 5);
        assert!(config.compress_backups);
        assert_eq!(config.max_depth, 10);
    }

    #[test]
    fn missing_config_path_uses_defaults() {
        let config = RagexConfig::load(None).unwrap();
        assert_eq!(config.max_paths, 100);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{nope").unwrap();
        assert!(RagexConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn edit_options_follow_flags() {
        let config = RagexConfig {
            validate_by_default: false,
            compress_backups: true,
            ..Default::default()
        };
        let opts = config.edit_options();
        assert!(opts.backup);
        assert!(!opts.validate);
        assert!(opts.compress_backups);
    }
}
