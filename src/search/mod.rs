//! Retrieval: exact vector search and hybrid graph + semantic fusion.

pub mod hybrid;
pub mod vector;

pub use hybrid::{
    hybrid_search, reciprocal_rank_fusion, FusedResult, HybridQuery, HybridStrategy, RRF_K,
};
pub use vector::{cosine, vector_search, SearchResult, VectorQuery};
