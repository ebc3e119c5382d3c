use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::{
    domain::entities::{
        collection::{normalize, CollectionSpec, Similarity},
        point::{PayloadFilter, ScoredPoint, StoredPoint},
    },
    ports::vector_store::{VectorStore, VectorStoreError},
};

/// Vector store keeping its collections in memory, searched by brute force.
///
/// Follows the behavior of the Qdrant backend: cosine collections store normalized vectors,
/// an upsert call is applied entirely or not at all, and points with equal scores keep their
/// insertion order.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, InMemoryCollection>>,
}

struct InMemoryCollection {
    spec: CollectionSpec,
    points: Vec<StoredPoint>,
    positions: HashMap<Uuid, usize>,
}

impl InMemoryCollection {
    fn new(spec: CollectionSpec) -> Self {
        Self {
            spec,
            points: vec![],
            positions: HashMap::new(),
        }
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), VectorStoreError> {
        if vector.len() as u64 != self.spec.dimension {
            return Err(VectorStoreError::CollectionMismatch {
                collection: self.spec.name.clone(),
                reason: format!(
                    "expected vectors of dimension {}, got {}",
                    self.spec.dimension,
                    vector.len()
                ),
            });
        }
        Ok(())
    }
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_collection(&self, collection: &CollectionSpec) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.write().await;

        match collections.get(&collection.name) {
            Some(existing) => check_spec(&existing.spec, collection),
            None => {
                info!(collection = %collection.name, "Creating in-memory collection");
                collections.insert(
                    collection.name.clone(),
                    InMemoryCollection::new(collection.clone()),
                );
                Ok(())
            }
        }
    }

    async fn upsert(
        &self,
        collection_name: &str,
        points: Vec<StoredPoint>,
    ) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(collection_name)
            .ok_or_else(|| VectorStoreError::UnknownCollection(collection_name.to_string()))?;

        // Nothing is applied if one of the points is rejected
        for point in &points {
            collection.check_dimension(&point.vector)?;
        }

        for mut point in points {
            if collection.spec.similarity == Similarity::Cosine {
                normalize(&mut point.vector);
            }

            match collection.positions.get(&point.id) {
                Some(&position) => collection.points[position] = point,
                None => {
                    collection
                        .positions
                        .insert(point.id, collection.points.len());
                    collection.points.push(point);
                }
            }
        }

        Ok(())
    }

    async fn count(&self, collection_name: &str, _exact: bool) -> Result<u64, VectorStoreError> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(collection_name)
            .ok_or_else(|| VectorStoreError::UnknownCollection(collection_name.to_string()))?;

        Ok(collection.points.len() as u64)
    }

    async fn search(
        &self,
        collection_name: &str,
        vector: &[f32],
        limit: u64,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(collection_name)
            .ok_or_else(|| VectorStoreError::UnknownCollection(collection_name.to_string()))?;
        collection.check_dimension(vector)?;

        let similarity = collection.spec.similarity;
        let mut scored: Vec<ScoredPoint> = collection
            .points
            .iter()
            .filter(|point| filter.map_or(true, |filter| filter.matches(&point.payload)))
            .map(|point| ScoredPoint {
                id: point.id,
                score: similarity.score(vector, &point.vector),
                payload: point.payload.clone(),
            })
            .collect();

        // Stable sort: equal scores keep the insertion order, NaN scores come last
        scored.sort_by(|a, b| rank(b.score).total_cmp(&rank(a.score)));
        scored.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

        Ok(scored)
    }

    async fn get_point(
        &self,
        collection_name: &str,
        id: Uuid,
    ) -> Result<StoredPoint, VectorStoreError> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(collection_name)
            .ok_or_else(|| VectorStoreError::UnknownCollection(collection_name.to_string()))?;

        collection
            .positions
            .get(&id)
            .map(|&position| collection.points[position].clone())
            .ok_or_else(|| VectorStoreError::NotFound {
                collection: collection_name.to_string(),
                id,
            })
    }

    async fn delete_collection(&self, collection_name: &str) -> Result<(), VectorStoreError> {
        self.collections.write().await.remove(collection_name);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }
}

/// Checks that an existing collection was created with the expected shape
pub fn check_spec(
    existing: &CollectionSpec,
    expected: &CollectionSpec,
) -> Result<(), VectorStoreError> {
    if existing.dimension != expected.dimension {
        return Err(VectorStoreError::CollectionMismatch {
            collection: expected.name.clone(),
            reason: format!(
                "dimension is {}, expected {}",
                existing.dimension, expected.dimension
            ),
        });
    }
    if existing.similarity != expected.similarity {
        return Err(VectorStoreError::CollectionMismatch {
            collection: expected.name.clone(),
            reason: format!(
                "similarity is {}, expected {}",
                existing.similarity, expected.similarity
            ),
        });
    }
    Ok(())
}

/// Sort key of a score: NaN ranks below any number
fn rank(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}
