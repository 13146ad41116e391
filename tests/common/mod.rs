//! Common test utilities
//!
//! Builds an engine whose cache, backup, and undo roots all live inside a
//! temp directory, wired with the built-in line parser and the
//! deterministic hashing model so runs are hermetic and repeatable.

// Not every suite uses every helper
#![allow(dead_code)]

use ragex::engine::Collaborators;
use ragex::{HashingModel, LineParser, RagexConfig, RagexEngine};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A throwaway project with a fully isolated engine
pub struct TestProject {
    pub dir: tempfile::TempDir,
    pub engine: RagexEngine,
}

impl TestProject {
    pub fn new() -> Self {
        Self::with_dimensions(64)
    }

    /// Build with a specific hashing-model dimension (for cache
    /// compatibility scenarios)
    pub fn with_dimensions(dims: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_for(dir.path(), dims);
        Self { dir, engine }
    }

    /// A second engine over the same project directory (fresh stores,
    /// same cache)
    pub fn reopen(&self, dims: usize) -> RagexEngine {
        engine_for(self.dir.path(), dims)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a source file under the project root; returns its path
    pub fn write_source(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }
}

fn engine_for(root: &Path, dims: usize) -> RagexEngine {
    let config = RagexConfig {
        cache_dir: Some(root.join(".test-cache")),
        ..Default::default()
    };
    let mut collaborators = Collaborators {
        model: Arc::new(HashingModel::new(dims)),
        backup_root: Some(root.join(".test-backups")),
        undo_root: Some(root.join(".test-undo")),
        ..Default::default()
    };
    collaborators.parsers.register(Arc::new(LineParser));
    RagexEngine::with_collaborators(root, config, collaborators)
}

/// Module `M` with `f/1` and `g/2`, `f` calling `g`
pub const MODULE_A: &str = "\
defmodule M do
  @doc \"Entry point.\"
  def f(a) do
    g(a, 1)
  end

  def g(a, b) do
    {a, b}
  end
end
";

/// Same module with `h/0` added
pub const MODULE_A_PLUS_H: &str = "\
defmodule M do
  @doc \"Entry point.\"
  def f(a) do
    g(a, 1)
  end

  def g(a, b) do
    {a, b}
  end

  def h do
    :ok
  end
end
";
