//! EmbeddingStore: EntityId → (vector, text)
//!
//! Sidecar to the graph. All vectors present share one length at any
//! instant; the first put fixes the dimension and mismatched puts fail.

use super::model::EmbeddingError;
use crate::graph::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// One stored embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: EntityId,
    pub vector: Vec<f32>,
    /// The description text the vector was generated from
    pub text: String,
}

#[derive(Debug, Default)]
struct StoreInner {
    records: HashMap<EntityId, EmbeddingRecord>,
    /// 0 when empty; otherwise the uniform vector length
    dims: usize,
}

/// Thread-safe embedding map with a uniform-dimension invariant
#[derive(Debug, Default)]
pub struct EmbeddingStore {
    inner: RwLock<StoreInner>,
}

impl EmbeddingStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an embedding
    ///
    /// Fails with [`EmbeddingError::DimensionMismatch`] when the vector's
    /// length differs from the store's, and with
    /// [`EmbeddingError::NonFinite`] when any component is NaN or infinite.
    pub fn put(
        &self,
        id: EntityId,
        vector: Vec<f32>,
        text: impl Into<String>,
    ) -> Result<(), EmbeddingError> {
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(EmbeddingError::NonFinite);
        }
        let mut inner = self.inner.write().unwrap();
        if inner.dims != 0 && vector.len() != inner.dims {
            return Err(EmbeddingError::DimensionMismatch {
                expected: inner.dims,
                actual: vector.len(),
            });
        }
        inner.dims = vector.len();
        inner.records.insert(
            id.clone(),
            EmbeddingRecord {
                id,
                vector,
                text: text.into(),
            },
        );
        Ok(())
    }

    /// Look up an embedding by id
    pub fn get(&self, id: &EntityId) -> Option<EmbeddingRecord> {
        self.inner.read().unwrap().records.get(id).cloned()
    }

    /// Remove an embedding; returns whether it existed
    pub fn delete(&self, id: &EntityId) -> bool {
        let mut inner = self.inner.write().unwrap();
        let removed = inner.records.remove(id).is_some();
        if inner.records.is_empty() {
            inner.dims = 0;
        }
        removed
    }

    /// Whether an embedding exists for this id
    pub fn contains(&self, id: &EntityId) -> bool {
        self.inner.read().unwrap().records.contains_key(id)
    }

    /// Snapshot of every record (the scan surface for vector search)
    pub fn iter(&self) -> Vec<EmbeddingRecord> {
        self.inner.read().unwrap().records.values().cloned().collect()
    }

    /// Number of stored embeddings
    pub fn size(&self) -> usize {
        self.inner.read().unwrap().records.len()
    }

    /// The uniform vector length, or 0 when empty
    pub fn dims(&self) -> usize {
        self.inner.read().unwrap().dims
    }

    /// Replace the whole store with a persisted snapshot
    pub fn import(&self, records: Vec<EmbeddingRecord>) {
        let mut inner = self.inner.write().unwrap();
        inner.dims = records.first().map(|r| r.vector.len()).unwrap_or(0);
        inner.records = records.into_iter().map(|r| (r.id.clone(), r)).collect();
    }

    /// Drop everything
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        *inner = StoreInner::default();
    }
}
