//! Ragex: Code-Intelligence Server
//!
//! A knowledge-graph engine over multi-language source repositories. Source
//! files are parsed into structural facts (modules, functions, calls,
//! imports), augmented with dense-vector descriptions of each entity, and
//! served through hybrid structural + semantic queries. A safe editing core
//! applies atomic, validated, graph-aware edits and refactors.
//!
//! # Core Concepts
//!
//! - **Entities**: stable tagged identifiers for modules, functions, and files
//! - **Graph**: directed typed edges (calls, imports, defines, ...) kept as a bag
//! - **Embeddings**: one fixed-length vector per entity, fused with graph
//!   signals via Reciprocal Rank Fusion
//! - **Editor**: line-addressed changes with backups, validation, and
//!   all-or-nothing multi-file transactions
//!
//! # Example
//!
//! ```
//! use ragex::GraphStore;
//!
//! let graph = GraphStore::new();
//! assert_eq!(graph.stats().node_count, 0);
//! ```

pub mod config;
pub mod edit;
pub mod embedding;
pub mod engine;
pub mod graph;
pub mod ingest;
pub mod mcp;
pub mod persist;
pub mod refactor;
pub mod search;
pub mod tracker;

pub use config::RagexConfig;
pub use edit::{
    BackupEntry, BackupVault, Change, EditError, EditOptions, EditOutcome, Editor, FileEdit,
    Formatter, FormatterRegistry, Transaction, TransactionReport, ValidationIssue, Validator,
    ValidatorRegistry, Verdict,
};
pub use embedding::{
    EmbeddingError, EmbeddingModel, EmbeddingRecord, EmbeddingStore, HashingModel, ModelInfo,
    describe_node,
};
pub use engine::{CancellationToken, Collaborators, RagexEngine};
pub use graph::{
    AttrValue, Attrs, Degree, Edge, EdgeKind, EntityId, GraphReport, GraphStats, GraphStore, Node,
    NodeKind, PageRankParams, PathSearchParams, Visibility, degree_centrality, find_paths,
    graph_report, pagerank,
};
pub use ingest::{
    IngestError, IngestOptions, IngestReport, IngestionPipeline, LineParser, ParseError,
    ParsedFacts, Parser, ParserRegistry,
};
pub use persist::{
    CacheError, CacheMetadata, CacheScope, CacheStats, LoadOutcome, Persistence, project_hash,
};
pub use refactor::{
    AstEditor, AstEditorRegistry, AstOp, RefactorError, RefactorOutcome, RefactorScope, Refactorer,
    TokenEditor, UndoEntry, UndoLog, UndoOutcome,
};
pub use search::{
    FusedResult, HybridQuery, HybridStrategy, SearchResult, VectorQuery, cosine, hybrid_search,
    reciprocal_rank_fusion, vector_search,
};
pub use tracker::{FileRecord, FileStatus, FileTracker, TrackerExport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
