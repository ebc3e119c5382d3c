use async_trait::async_trait;
use common::helper::error_chain_fmt;
use uuid::Uuid;

use crate::domain::entities::{
    collection::CollectionSpec,
    point::{Embeddings, PayloadFilter, ScoredPoint, StoredPoint},
};

/// Contract required from the similarity index.
///
/// All mutations of the index go through this trait. Every operation can be called
/// concurrently on a shared instance.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates the collection if it does not exist yet.
    ///
    /// An existing collection must have the same dimension and similarity,
    /// otherwise `CollectionMismatch` is returned.
    async fn ensure_collection(&self, collection: &CollectionSpec) -> Result<(), VectorStoreError>;

    /// Inserts or fully replaces (vector and payload) the points, by id.
    ///
    /// The points of one call are all applied or the call fails.
    async fn upsert(
        &self,
        collection_name: &str,
        points: Vec<StoredPoint>,
    ) -> Result<(), VectorStoreError>;

    /// Number of points in the collection. With `exact` set to false, the returned number
    /// may be an approximation.
    async fn count(&self, collection_name: &str, exact: bool) -> Result<u64, VectorStoreError>;

    /// At most `limit` points, by descending score against `vector` with the collection
    /// similarity, restricted to the points whose payload satisfies `filter`
    async fn search(
        &self,
        collection_name: &str,
        vector: &[f32],
        limit: u64,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError>;

    async fn get_point(
        &self,
        collection_name: &str,
        id: Uuid,
    ) -> Result<StoredPoint, VectorStoreError>;

    async fn get_vector(
        &self,
        collection_name: &str,
        id: Uuid,
    ) -> Result<Embeddings, VectorStoreError> {
        Ok(self.get_point(collection_name, id).await?.vector)
    }

    async fn delete_collection(&self, collection_name: &str) -> Result<(), VectorStoreError>;

    /// Checks that the backend is reachable
    async fn health_check(&self) -> Result<(), VectorStoreError>;
}

#[derive(thiserror::Error)]
pub enum VectorStoreError {
    /// Transport error or timeout, safe to retry
    #[error("Vector store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Collection {collection} does not match the expected configuration: {reason}")]
    CollectionMismatch { collection: String, reason: String },
    #[error("Unknown collection {0}")]
    UnknownCollection(String),
    #[error("Point {id} not found in collection {collection}")]
    NotFound { collection: String, id: Uuid },
    #[error("Invalid point payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

impl VectorStoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, VectorStoreError::StoreUnavailable(_))
    }
}

impl std::fmt::Debug for VectorStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
