use std::time::Duration;

use async_trait::async_trait;
use common::helper::error_chain_fmt;

use crate::domain::entities::point::Embeddings;

/// Turns texts into fixed-length vectors.
///
/// Implementations are deterministic for a given model and are shared read-only between
/// concurrent requests.
#[async_trait]
pub trait EmbeddingsService: Send + Sync {
    /// Identity (and version) of the underlying model
    fn model_name(&self) -> &str;

    /// Length of every generated vector
    fn dimension(&self) -> u64;

    /// Whether the model is loaded and able to serve requests
    fn is_ready(&self) -> bool;

    /// Embeds each text, keeping the order and the number of the inputs
    async fn embed_batch(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Embeddings>, EmbeddingsServiceError>;

    async fn embed(&self, text: &str) -> Result<Embeddings, EmbeddingsServiceError> {
        self.embed_batch(vec![text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| EmbeddingsServiceError::InvalidOutput("no embeddings generated".into()))
    }
}

#[derive(thiserror::Error)]
pub enum EmbeddingsServiceError {
    #[error("Embeddings model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("Embeddings generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Unexpected embeddings output: {0}")]
    InvalidOutput(String),
}

impl std::fmt::Debug for EmbeddingsServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
