use std::sync::Arc;

use common::helper::error_chain_fmt;
use serde_json::Value as JsonValue;
use tracing::info;

use crate::{
    domain::entities::{
        content_point::{point_id_from_content_id, CHANNEL_ID_FIELD, CONTENT_ID_FIELD},
        point::{Payload, PayloadFilter, ScoredPoint},
        related_content::RelatedContent,
    },
    ports::vector_store::{VectorStore, VectorStoreError},
};

/// Number of related contents returned when the caller does not ask for a specific number
pub const DEFAULT_RELATED_LIMIT: i64 = 10;

/// Largest number of related contents returned, whatever the caller asks for
pub const DEFAULT_MAX_RELATED_LIMIT: usize = 1_000;

/// Finds the contents closest to an already indexed content, using its stored vector.
///
/// Nothing is embedded at query time.
pub struct FindRelatedContents {
    vector_store: Arc<dyn VectorStore>,
    collection_name: String,
    max_limit: usize,
}

impl FindRelatedContents {
    pub fn new(vector_store: Arc<dyn VectorStore>, collection_name: impl Into<String>) -> Self {
        Self {
            vector_store,
            collection_name: collection_name.into(),
            max_limit: DEFAULT_MAX_RELATED_LIMIT,
        }
    }

    /// Caps the number of related contents a single call may return
    pub fn with_max_limit(mut self, max_limit: usize) -> Self {
        self.max_limit = max_limit;
        self
    }

    /// At most `k` contents other than `content_id`, by descending similarity.
    /// `k` is capped to the maximum limit of the use case.
    ///
    /// With `same_channel`, only the contents of the channel of `content_id` are returned.
    /// A content without channel is not restricted.
    ///
    /// # Errors
    /// `UnknownContent` if `content_id` has not been ingested
    #[tracing::instrument(name = "Finding related contents", skip(self))]
    pub async fn execute(
        &self,
        content_id: &str,
        k: i64,
        same_channel: bool,
    ) -> Result<Vec<RelatedContent>, FindRelatedContentsError> {
        let source = self
            .vector_store
            .get_point(&self.collection_name, point_id_from_content_id(content_id))
            .await
            .map_err(|error| match error {
                VectorStoreError::NotFound { .. } | VectorStoreError::UnknownCollection(_) => {
                    FindRelatedContentsError::UnknownContent(content_id.to_string())
                }
                error => FindRelatedContentsError::VectorStoreError(error),
            })?;

        if k <= 0 {
            return Ok(vec![]);
        }
        let k = usize::try_from(k)
            .unwrap_or(usize::MAX)
            .min(self.max_limit);

        let filter = if same_channel {
            channel_of(&source.payload)
                .map(|channel| PayloadFilter::new().must_match(CHANNEL_ID_FIELD, channel))
        } else {
            None
        };

        // One more than asked, the source content being its own closest neighbor
        let limit = (k as u64).saturating_add(1);
        let points = self
            .vector_store
            .search(&self.collection_name, &source.vector, limit, filter.as_ref())
            .await?;

        let related: Vec<RelatedContent> = points
            .into_iter()
            .filter(|point| point.id != source.id)
            .take(k)
            .map(to_related_content)
            .collect();

        info!(nb_related = related.len(), "Found related contents");
        Ok(related)
    }
}

fn to_related_content(point: ScoredPoint) -> RelatedContent {
    let payload = &point.payload;

    RelatedContent {
        content_id: payload
            .get(CONTENT_ID_FIELD)
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| point.id.to_string()),
        score: point.score,
        title: payload
            .get("title")
            .and_then(JsonValue::as_str)
            .map(str::to_string),
        start_time: payload.get("start_time").and_then(JsonValue::as_i64),
        channel_id: channel_of(payload),
    }
}

/// Channel of a stored content, numbers being read as their decimal representation
fn channel_of(payload: &Payload) -> Option<String> {
    match payload.get(CHANNEL_ID_FIELD)? {
        JsonValue::String(channel) => Some(channel.clone()),
        JsonValue::Number(channel) => Some(channel.to_string()),
        _ => None,
    }
}

#[derive(thiserror::Error)]
pub enum FindRelatedContentsError {
    #[error("Unknown content {0}")]
    UnknownContent(String),
    #[error(transparent)]
    VectorStoreError(#[from] VectorStoreError),
}

impl std::fmt::Debug for FindRelatedContentsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
