use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::{
    domain::entities::{collection::normalize, point::Embeddings},
    ports::embeddings_service::{EmbeddingsService, EmbeddingsServiceError},
};

/// Length of the character n-grams counted for each word
const NGRAM_SIZE: usize = 3;

/// Model-free embeddings: character trigrams of each word, hashed into a fixed number of buckets.
///
/// Texts sharing words or word stems ("dragon", "dragons") get close vectors, which is enough
/// for local development and tests. Vectors have a unit length, the empty text gives the zero
/// vector.
pub struct HashingEmbeddingsService {
    model_name: String,
    dimension: u64,
}

impl HashingEmbeddingsService {
    pub fn new(dimension: u64) -> Self {
        let dimension = dimension.max(1);

        Self {
            model_name: format!("hashing-trigrams-{}", dimension),
            dimension,
        }
    }

    pub fn embed_text(&self, text: &str) -> Embeddings {
        let mut vector = vec![0.0; self.dimension as usize];

        let text = text.to_lowercase();
        let words = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty());

        for word in words {
            // Pads the word so that its first and last letters get their own n-grams
            let chars: Vec<char> = format!(" {} ", word).chars().collect();

            for ngram in chars.windows(NGRAM_SIZE) {
                let ngram: String = ngram.iter().collect();
                vector[self.bucket(&ngram)] += 1.0;
            }
        }

        normalize(&mut vector);
        vector
    }

    fn bucket(&self, ngram: &str) -> usize {
        let digest = Sha256::digest(ngram.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);

        (u64::from_le_bytes(bytes) % self.dimension) as usize
    }
}

#[async_trait]
impl EmbeddingsService for HashingEmbeddingsService {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> u64 {
        self.dimension
    }

    fn is_ready(&self) -> bool {
        true
    }

    async fn embed_batch(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Embeddings>, EmbeddingsServiceError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}
