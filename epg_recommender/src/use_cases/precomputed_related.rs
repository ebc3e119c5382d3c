use std::sync::Arc;

use async_once_cell::OnceCell;
use common::helper::error_chain_fmt;
use tracing::info;

use crate::{
    domain::entities::{
        collection::{CollectionSpec, Similarity},
        point::{from_payload, into_payload, PayloadFilter, StoredPoint},
        precomputed_related::{PrecomputedRelatedItem, SOURCE_CONTENT_ID_FIELD},
    },
    ports::vector_store::{VectorStore, VectorStoreError},
    use_cases::find_related_contents::DEFAULT_MAX_RELATED_LIMIT,
};

const PRECOMPUTED_COLLECTION_SUFFIX: &str = "_precomputed";

/// Related items computed outside of the service, saved and listed by source content.
///
/// They live in their own collection: each item is a point whose single-value vector is its
/// score, so that a dot-product search with `[1.0]` ranks the items by descending score.
pub struct PrecomputedRelatedContents {
    vector_store: Arc<dyn VectorStore>,
    collection: CollectionSpec,
    collection_ready: OnceCell<()>,
    max_limit: usize,
}

impl PrecomputedRelatedContents {
    /// Collection of the items related to the contents of `content_collection`
    pub fn collection_spec(content_collection: &str) -> CollectionSpec {
        CollectionSpec {
            name: format!("{}{}", content_collection, PRECOMPUTED_COLLECTION_SUFFIX),
            dimension: 1,
            similarity: Similarity::Dot,
        }
    }

    pub fn new(vector_store: Arc<dyn VectorStore>, content_collection: &str) -> Self {
        Self {
            vector_store,
            collection: Self::collection_spec(content_collection),
            collection_ready: OnceCell::new(),
            max_limit: DEFAULT_MAX_RELATED_LIMIT,
        }
    }

    /// Caps the number of items a single listing may return
    pub fn with_max_limit(mut self, max_limit: usize) -> Self {
        self.max_limit = max_limit;
        self
    }

    async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        self.collection_ready
            .get_or_try_init(self.vector_store.ensure_collection(&self.collection))
            .await?;

        Ok(())
    }

    /// Saves the items, replacing the ones with the same source and related contents.
    ///
    /// Returns the number of saved items. No item is saved if one of them is invalid.
    #[tracing::instrument(name = "Saving precomputed related items", skip(self, items), fields(nb_items = items.len()))]
    pub async fn save(
        &self,
        items: Vec<PrecomputedRelatedItem>,
    ) -> Result<usize, PrecomputedRelatedError> {
        if items.is_empty() {
            return Ok(0);
        }

        let points = items
            .iter()
            .enumerate()
            .map(|(position, item)| to_point(position, item))
            .collect::<Result<Vec<_>, _>>()?;
        let count = points.len();

        self.ensure_collection().await?;
        self.vector_store
            .upsert(&self.collection.name, points)
            .await?;

        info!(count, "Saved precomputed related items");
        Ok(count)
    }

    /// At most `k` items saved for `source_content_id`, by descending score.
    /// `k` is capped to the maximum limit of the use case.
    #[tracing::instrument(name = "Listing precomputed related items", skip(self))]
    pub async fn list(
        &self,
        source_content_id: &str,
        k: i64,
    ) -> Result<Vec<PrecomputedRelatedItem>, PrecomputedRelatedError> {
        if k <= 0 {
            return Ok(vec![]);
        }
        let limit = u64::try_from(k)
            .unwrap_or(u64::MAX)
            .min(self.max_limit as u64);

        let filter = PayloadFilter::new().must_match(SOURCE_CONTENT_ID_FIELD, source_content_id);
        let points = match self
            .vector_store
            .search(&self.collection.name, &[1.0], limit, Some(&filter))
            .await
        {
            Ok(points) => points,
            // Nothing has been saved yet
            Err(VectorStoreError::UnknownCollection(_)) => vec![],
            Err(error) => return Err(error.into()),
        };

        points
            .into_iter()
            .map(|point| from_payload(point.payload).map_err(VectorStoreError::from))
            .collect::<Result<Vec<_>, _>>()
            .map_err(PrecomputedRelatedError::from)
    }
}

fn to_point(
    position: usize,
    item: &PrecomputedRelatedItem,
) -> Result<StoredPoint, PrecomputedRelatedError> {
    if item.source_content_id.trim().is_empty() || item.content_id.trim().is_empty() {
        return Err(PrecomputedRelatedError::InvalidItem {
            position,
            reason: "source_content_id and content_id must not be empty".into(),
        });
    }
    if !item.score.is_finite() {
        return Err(PrecomputedRelatedError::InvalidItem {
            position,
            reason: format!("invalid score {}", item.score),
        });
    }

    Ok(StoredPoint {
        id: item.point_id(),
        vector: vec![item.score],
        payload: into_payload(item).map_err(VectorStoreError::from)?,
    })
}

#[derive(thiserror::Error)]
pub enum PrecomputedRelatedError {
    #[error("Invalid related item at position {position}: {reason}")]
    InvalidItem { position: usize, reason: String },
    #[error(transparent)]
    VectorStoreError(#[from] VectorStoreError),
}

impl std::fmt::Debug for PrecomputedRelatedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
