use actix_web::{
    dev::Server,
    web::{self, Data},
    App, HttpServer,
};
use common::helper::error_chain_fmt;
use std::{net::TcpListener, sync::Arc};
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;

use crate::{
    configuration::{
        ApplicationSettings, EmbeddingProvider, EmbeddingSettings, Settings, VectorStoreProvider,
        VectorStoreSettings,
    },
    domain::{
        entities::collection::CollectionSpec,
        services::{
            hashing_embedding::HashingEmbeddingsService,
            huggingface_embedding::HuggingFaceEmbeddingsService,
        },
    },
    ports::{
        embeddings_service::{EmbeddingsService, EmbeddingsServiceError},
        vector_store::{VectorStore, VectorStoreError},
    },
    repositories::{
        in_memory_vector_store::InMemoryVectorStore, qdrant_vector_store::QdrantVectorStore,
    },
    routes::{
        bulk_ingest, extractor_error_handler, health_check, precomputed_related,
        related_contents, upsert_related,
    },
    use_cases::{
        find_related_contents::FindRelatedContents, ingest_contents::IngestContents,
        precomputed_related::PrecomputedRelatedContents,
    },
};

/// Holds the newly built server, and some useful properties
pub struct Application {
    server: Server,
    port: u16,
}

#[derive(thiserror::Error)]
pub enum ApplicationBuildError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error(transparent)]
    EmbeddingsServiceError(#[from] EmbeddingsServiceError),
    #[error(transparent)]
    VectorStoreError(#[from] VectorStoreError),
}

impl std::fmt::Debug for ApplicationBuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl Application {
    /// Builds the application with the embeddings service and the vector store selected
    /// in the settings.
    ///
    /// The embeddings model is loaded here, before the server accepts any request.
    ///
    /// # Parameters
    /// - nb_workers: number of actix-web workers
    ///   if `None`, the number of available physical CPUs is used as the worker count.
    #[tracing::instrument(name = "Building application", skip(settings))]
    pub async fn build(
        settings: Settings,
        nb_workers: Option<usize>,
    ) -> Result<Self, ApplicationBuildError> {
        let embeddings_service = get_embeddings_service(&settings.embedding).await?;
        let vector_store = get_vector_store(&settings.vector_store)?;

        Self::build_with(settings, nb_workers, embeddings_service, vector_store).await
    }

    /// Builds the application around already created dependencies
    pub async fn build_with(
        settings: Settings,
        nb_workers: Option<usize>,
        embeddings_service: Arc<dyn EmbeddingsService>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Result<Self, ApplicationBuildError> {
        let address = format!(
            "{}:{}",
            settings.application.host, settings.application.port
        );
        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();

        let collection = CollectionSpec {
            name: settings.vector_store.collection.clone(),
            dimension: embeddings_service.dimension(),
            similarity: settings.vector_store.similarity,
        };
        info!(
            collection = %collection.name,
            dimension = collection.dimension,
            similarity = %collection.similarity,
            model = embeddings_service.model_name(),
            "Using content collection"
        );

        let ingest_contents = IngestContents::new(
            embeddings_service.clone(),
            vector_store.clone(),
            collection,
            settings.application.ingest_batch_size,
        );

        // A collection created with another model or similarity stops the startup.
        // An unreachable store does not: the collection is then ensured on first ingestion.
        match ingest_contents.ensure_collection().await {
            Ok(()) => {}
            Err(error) if error.is_retryable() => {
                warn!(?error, "Could not ensure the content collection at startup")
            }
            Err(error) => return Err(error.into()),
        }

        let max_related_limit = settings.application.max_related_limit;
        let find_related_contents =
            FindRelatedContents::new(vector_store.clone(), &settings.vector_store.collection)
                .with_max_limit(max_related_limit);
        let precomputed_related_contents =
            PrecomputedRelatedContents::new(vector_store.clone(), &settings.vector_store.collection)
                .with_max_limit(max_related_limit);

        let server = run(
            listener,
            &settings.application,
            nb_workers,
            embeddings_service,
            vector_store,
            ingest_contents,
            find_related_contents,
            precomputed_related_contents,
        )?;

        Ok(Self { server, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// This function only returns when the application is stopped
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        info!("Running server ...");
        self.server.await
    }
}

/// listener: the consumer binds their own port
///
/// TracingLogger middleware: helps collecting telemetry data.
/// It generates a unique identifier for each incoming request: `request_id`.
///
/// # Parameters
/// - nb_workers: number of actix-web workers
///   if `None`, the number of available physical CPUs is used as the worker count.
#[allow(clippy::too_many_arguments)]
pub fn run(
    listener: TcpListener,
    settings: &ApplicationSettings,
    nb_workers: Option<usize>,
    embeddings_service: Arc<dyn EmbeddingsService>,
    vector_store: Arc<dyn VectorStore>,
    ingest_contents: IngestContents,
    find_related_contents: FindRelatedContents,
    precomputed_related_contents: PrecomputedRelatedContents,
) -> Result<Server, std::io::Error> {
    // Wraps the services and use cases in a `actix_web::Data` (`Arc`) to be able to register them
    // and access them from handlers.
    // They are shared among all threads.
    let embeddings_service: Data<dyn EmbeddingsService> = Data::from(embeddings_service);
    let vector_store: Data<dyn VectorStore> = Data::from(vector_store);
    let ingest_contents = Data::new(ingest_contents);
    let find_related_contents = Data::new(find_related_contents);
    let precomputed_related_contents = Data::new(precomputed_related_contents);

    let max_payload_bytes = settings.max_payload_bytes;

    // `move` to capture variables from the surrounding environment
    let server = HttpServer::new(move || {
        info!("Starting actix-web worker");

        App::new()
            .wrap(TracingLogger::default())
            .app_data(
                web::JsonConfig::default()
                    .limit(max_payload_bytes)
                    .error_handler(extractor_error_handler),
            )
            .app_data(web::QueryConfig::default().error_handler(extractor_error_handler))
            .route("/health", web::get().to(health_check))
            .route("/related/{content_id}", web::get().to(related_contents))
            .route("/bulk_ingest", web::post().to(bulk_ingest))
            .route("/upsert", web::post().to(upsert_related))
            .route(
                "/precomputed/{content_id}",
                web::get().to(precomputed_related),
            )
            .app_data(embeddings_service.clone())
            .app_data(vector_store.clone())
            .app_data(ingest_contents.clone())
            .app_data(find_related_contents.clone())
            .app_data(precomputed_related_contents.clone())
    })
    .listen(listener)?;

    // If no workers were set, use the actix-web settings (number of workers = number of physical CPUs)
    if let Some(nb_workers) = nb_workers {
        return Ok(server.workers(nb_workers).run());
    }

    // No await
    Ok(server.run())
}

/// Loads the embeddings model selected in the settings
pub async fn get_embeddings_service(
    settings: &EmbeddingSettings,
) -> Result<Arc<dyn EmbeddingsService>, EmbeddingsServiceError> {
    match settings.provider {
        EmbeddingProvider::HuggingFace => {
            let service =
                HuggingFaceEmbeddingsService::try_new(&settings.model_name, settings.timeout())
                    .await?;
            Ok(Arc::new(service))
        }
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbeddingsService::new(
            settings.hashing_dimension,
        ))),
    }
}

#[tracing::instrument(name = "Creating vector store client", skip(settings))]
pub fn get_vector_store(
    settings: &VectorStoreSettings,
) -> Result<Arc<dyn VectorStore>, VectorStoreError> {
    match settings.provider {
        VectorStoreProvider::Qdrant => Ok(Arc::new(QdrantVectorStore::try_new(settings)?)),
        VectorStoreProvider::InMemory => {
            warn!("Using an in-memory vector store: ingested contents are lost on restart");
            Ok(Arc::new(InMemoryVectorStore::new()))
        }
    }
}
