use std::sync::Arc;

use async_once_cell::OnceCell;
use common::helper::error_chain_fmt;
use tracing::{info, warn};

use crate::{
    domain::entities::{
        collection::CollectionSpec,
        content_point::ContentPoint,
        content_record::{ContentRecord, InvalidRecordError, NormalizedContent},
        ingestion_summary::IngestionSummary,
        point::StoredPoint,
    },
    ports::{
        embeddings_service::{EmbeddingsService, EmbeddingsServiceError},
        vector_store::{VectorStore, VectorStoreError},
    },
};

/// Ingestion pipeline: validates records, embeds them by batches and saves them in the
/// content collection.
///
/// Records are keyed by their content id: ingesting a content again replaces it.
pub struct IngestContents {
    embeddings_service: Arc<dyn EmbeddingsService>,
    vector_store: Arc<dyn VectorStore>,
    collection: CollectionSpec,
    batch_size: usize,
    /// Set once the collection has been ensured, for the lifetime of the process
    collection_ready: OnceCell<()>,
}

impl IngestContents {
    pub fn new(
        embeddings_service: Arc<dyn EmbeddingsService>,
        vector_store: Arc<dyn VectorStore>,
        collection: CollectionSpec,
        batch_size: usize,
    ) -> Self {
        Self {
            embeddings_service,
            vector_store,
            collection,
            batch_size: batch_size.max(1),
            collection_ready: OnceCell::new(),
        }
    }

    pub fn collection(&self) -> &CollectionSpec {
        &self.collection
    }

    /// Creates or checks the content collection, only on the first successful call
    pub async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        self.collection_ready
            .get_or_try_init(self.vector_store.ensure_collection(&self.collection))
            .await?;

        Ok(())
    }

    /// Ingests a single record, with the same semantics as a bulk ingestion of this record
    #[tracing::instrument(name = "Ingesting content", skip(self))]
    pub async fn ingest_one(&self, record: ContentRecord) -> Result<(), IngestContentsError> {
        let content = record.normalize()?;

        self.ensure_collection().await?;
        self.ingest_batch(&[(0, content)]).await
    }

    pub async fn ingest_bulk(
        &self,
        records: Vec<ContentRecord>,
    ) -> Result<IngestionSummary, IngestContentsError> {
        self.ingest_parsed_bulk(records.into_iter().map(Ok).collect())
            .await
    }

    /// Ingests records, some of which may have already failed to be parsed.
    ///
    /// Every record is validated first. The valid ones are then processed by batches,
    /// in order: a batch which cannot be embedded or saved has its records reported as
    /// failed, and the next batches are still processed.
    ///
    /// # Errors
    /// Only when the content collection cannot be ensured: nothing has been saved then.
    #[tracing::instrument(name = "Ingesting contents in bulk", skip(self, records), fields(nb_records = records.len()))]
    pub async fn ingest_parsed_bulk(
        &self,
        records: Vec<Result<ContentRecord, InvalidRecordError>>,
    ) -> Result<IngestionSummary, IngestContentsError> {
        let mut summary = IngestionSummary::default();
        let mut contents = Vec::with_capacity(records.len());

        for (position, record) in records.into_iter().enumerate() {
            match record.and_then(|record| record.normalize()) {
                Ok(content) => contents.push((position, content)),
                Err(error) => {
                    summary.add_rejected(position, error.content_id(), error.to_string())
                }
            }
        }

        if contents.is_empty() {
            info!(rejected = summary.rejected, "No valid record to ingest");
            return Ok(summary);
        }

        self.ensure_collection().await?;

        for batch in contents.chunks(self.batch_size) {
            let first_position = batch.first().map(|(position, _)| *position);
            info!(?first_position, batch_size = batch.len(), "Ingesting batch");

            match self.ingest_batch(batch).await {
                Ok(()) => summary.accepted += batch.len(),
                Err(error) => {
                    warn!(?error, ?first_position, "Failed to ingest batch");

                    for (position, content) in batch {
                        summary.add_failed(*position, &content.payload.content_id, error.to_string());
                    }
                }
            }
        }

        info!(
            accepted = summary.accepted,
            rejected = summary.rejected,
            failed = summary.failed,
            "Ingested contents"
        );
        Ok(summary)
    }

    async fn ingest_batch(
        &self,
        batch: &[(usize, NormalizedContent)],
    ) -> Result<(), IngestContentsError> {
        let texts = batch
            .iter()
            .map(|(_, content)| content.text.clone())
            .collect();

        let embeddings = self.embeddings_service.embed_batch(texts).await?;
        if embeddings.len() != batch.len() {
            return Err(IngestContentsError::EmbeddingsServiceError(
                EmbeddingsServiceError::InvalidOutput(format!(
                    "{} embeddings generated for {} contents",
                    embeddings.len(),
                    batch.len()
                )),
            ));
        }

        let points = batch
            .iter()
            .zip(embeddings)
            .map(|((_, content), vector)| {
                StoredPoint::try_from(ContentPoint {
                    id: content.point_id,
                    payload: content.payload.clone(),
                    vector,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(VectorStoreError::from)?;

        self.vector_store
            .upsert(&self.collection.name, points)
            .await?;

        Ok(())
    }
}

#[derive(thiserror::Error)]
pub enum IngestContentsError {
    #[error(transparent)]
    InvalidRecord(#[from] InvalidRecordError),
    #[error(transparent)]
    EmbeddingsServiceError(#[from] EmbeddingsServiceError),
    #[error(transparent)]
    VectorStoreError(#[from] VectorStoreError),
}

impl std::fmt::Debug for IngestContentsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
