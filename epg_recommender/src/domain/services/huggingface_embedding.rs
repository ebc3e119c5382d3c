use std::{
    thread::{self, JoinHandle},
    time::Duration,
};

use async_trait::async_trait;
use rust_bert::pipelines::sentence_embeddings::{
    SentenceEmbeddingsBuilder, SentenceEmbeddingsModelType,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::{
    domain::entities::point::Embeddings,
    ports::embeddings_service::{EmbeddingsService, EmbeddingsServiceError},
};

/// Maximum number of embeddings requests waiting for the runner
const RUNNER_QUEUE_SIZE: usize = 100;

/// Model names accepted in `embedding.model_name`, the organisation prefix being optional
pub const SUPPORTED_MODELS: [&str; 8] = [
    "all-MiniLM-L12-v2",
    "all-MiniLM-L6-v2",
    "all-distilroberta-v1",
    "bert-base-nli-mean-tokens",
    "distiluse-base-multilingual-cased",
    "distiluse-base-multilingual-cased-v1",
    "paraphrase-albert-small-v2",
    "sentence-t5-base",
];

/// Service generating embeddings with sentence-embeddings models available from Hugging Face.
///
/// The model runs on a dedicated thread (the "runner"): encoding is CPU-bound and must not
/// block the async workers. Requests reach the runner through a channel, each one carrying
/// a oneshot sender for its result.
pub struct HuggingFaceEmbeddingsService {
    model_name: String,
    dimension: u64,
    timeout: Duration,
    sender_to_runner: mpsc::Sender<RunnerMessage>,
    thread_handle: JoinHandle<()>,
}

impl HuggingFaceEmbeddingsService {
    /// Spawns the runner and waits until it has loaded the model.
    ///
    /// The dimension of the embeddings is the one reported by the loaded model.
    /// Loading can be slow (the model is downloaded on first use): this is meant to be
    /// called once, at startup.
    #[tracing::instrument(name = "Loading embeddings model")]
    pub async fn try_new(
        model_name: &str,
        timeout: Duration,
    ) -> Result<Self, EmbeddingsServiceError> {
        let model_type = resolve_model(model_name)?;

        let (sender, receiver) = mpsc::channel(RUNNER_QUEUE_SIZE);
        let (ready_sender, ready_receiver) = oneshot::channel();

        let thread_handle = thread::Builder::new()
            .name("embeddings-runner".into())
            .spawn(move || Self::runner(model_type, receiver, ready_sender))
            .map_err(|e| EmbeddingsServiceError::ModelUnavailable(e.to_string()))?;

        let dimension = ready_receiver.await.map_err(|_| {
            EmbeddingsServiceError::ModelUnavailable(
                "embeddings runner stopped while loading the model".into(),
            )
        })??;
        info!(dimension, "Embeddings dimension read from the model");

        Ok(Self {
            model_name: model_name.to_string(),
            dimension,
            timeout,
            sender_to_runner: sender,
            thread_handle,
        })
    }

    /// The runner itself, in a sync context.
    ///
    /// Reports the outcome of the model loading through `ready` (the embeddings dimension on
    /// success), then encodes the received texts until every sender has been dropped.
    fn runner(
        model_type: SentenceEmbeddingsModelType,
        mut receiver: mpsc::Receiver<RunnerMessage>,
        ready: oneshot::Sender<Result<u64, EmbeddingsServiceError>>,
    ) {
        let loaded = SentenceEmbeddingsBuilder::remote(model_type)
            .create_model()
            .and_then(|model| {
                let dimension = model.get_embedding_dim()?;
                Ok((model, dimension))
            });
        let (model, dimension) = match loaded {
            Ok(loaded) => loaded,
            Err(error) => {
                error!(?error, "Failed to load embeddings model");
                let _ = ready.send(Err(EmbeddingsServiceError::ModelUnavailable(
                    error.to_string(),
                )));
                return;
            }
        };
        let dimension = match u64::try_from(dimension) {
            Ok(dimension) if dimension > 0 => dimension,
            _ => {
                let _ = ready.send(Err(EmbeddingsServiceError::InvalidOutput(format!(
                    "invalid embeddings dimension {}",
                    dimension
                ))));
                return;
            }
        };
        info!("Embeddings model loaded ✅");

        if ready.send(Ok(dimension)).is_err() {
            return;
        }

        while let Some((texts, sender)) = receiver.blocking_recv() {
            let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
            let embeddings = model
                .encode(&texts)
                .map_err(|e| EmbeddingsServiceError::ModelUnavailable(e.to_string()));

            if sender.send(embeddings).is_err() {
                debug!("Embeddings requester is gone, dropping its result");
            }
        }

        info!("Embeddings runner stopped");
    }
}

#[async_trait]
impl EmbeddingsService for HuggingFaceEmbeddingsService {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> u64 {
        self.dimension
    }

    fn is_ready(&self) -> bool {
        !self.thread_handle.is_finished()
    }

    #[tracing::instrument(name = "Generating embeddings", skip(self, texts), fields(nb_texts = texts.len()))]
    async fn embed_batch(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Embeddings>, EmbeddingsServiceError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let nb_texts = texts.len();

        let (sender, receiver) = oneshot::channel();

        let request = async {
            self.sender_to_runner
                .send((texts, sender))
                .await
                .map_err(|_| {
                    EmbeddingsServiceError::ModelUnavailable("embeddings runner stopped".into())
                })?;

            let embeddings = receiver.await.map_err(|_| {
                EmbeddingsServiceError::ModelUnavailable(
                    "embeddings runner dropped the request".into(),
                )
            })??;

            Ok::<_, EmbeddingsServiceError>(embeddings)
        };

        let embeddings = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| EmbeddingsServiceError::Timeout(self.timeout))??;

        if embeddings.len() != nb_texts {
            return Err(EmbeddingsServiceError::InvalidOutput(format!(
                "{} embeddings generated for {} texts",
                embeddings.len(),
                nb_texts
            )));
        }

        Ok(embeddings)
    }
}

/// Message type for the runner channel: the texts to encode and where to send their embeddings
type RunnerMessage = (
    Vec<String>,
    oneshot::Sender<Result<Vec<Embeddings>, EmbeddingsServiceError>>,
);

/// Finds the sentence-embeddings model matching a model name.
///
/// The organisation prefix is optional and the name is case-insensitive:
/// `sentence-transformers/all-MiniLM-L12-v2` and `all-minilm-l12-v2` select the same model.
/// Only the models of `SUPPORTED_MODELS` can be loaded.
pub fn resolve_model(model_name: &str) -> Result<SentenceEmbeddingsModelType, EmbeddingsServiceError> {
    let short_name = model_name
        .rsplit('/')
        .next()
        .unwrap_or(model_name)
        .to_lowercase();

    match short_name.as_str() {
        "all-minilm-l12-v2" => Ok(SentenceEmbeddingsModelType::AllMiniLmL12V2),
        "all-minilm-l6-v2" => Ok(SentenceEmbeddingsModelType::AllMiniLmL6V2),
        "all-distilroberta-v1" => Ok(SentenceEmbeddingsModelType::AllDistilrobertaV1),
        "bert-base-nli-mean-tokens" => Ok(SentenceEmbeddingsModelType::BertBaseNliMeanTokens),
        "distiluse-base-multilingual-cased" | "distiluse-base-multilingual-cased-v1" => {
            Ok(SentenceEmbeddingsModelType::DistiluseBaseMultilingualCased)
        }
        "paraphrase-albert-small-v2" => Ok(SentenceEmbeddingsModelType::ParaphraseAlbertSmallV2),
        "sentence-t5-base" => Ok(SentenceEmbeddingsModelType::SentenceT5Base),
        _ => Err(EmbeddingsServiceError::ModelUnavailable(format!(
            "unsupported embeddings model {}, expected one of: {}",
            model_name,
            SUPPORTED_MODELS.join(", ")
        ))),
    }
}
