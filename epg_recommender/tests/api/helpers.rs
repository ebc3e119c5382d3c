use std::sync::Arc;

use async_trait::async_trait;
use common::telemetry::{get_tracing_subscriber, init_tracing_subscriber};
use epg_recommender::{
    configuration::{get_configuration, EmbeddingProvider, VectorStoreProvider},
    domain::{
        entities::{
            collection::CollectionSpec,
            point::{PayloadFilter, ScoredPoint, StoredPoint},
        },
        services::hashing_embedding::HashingEmbeddingsService,
    },
    ports::vector_store::{VectorStore, VectorStoreError},
    repositories::in_memory_vector_store::InMemoryVectorStore,
    startup::Application,
};
use once_cell::sync::Lazy;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Vector dimension of the embeddings used by the test app
pub const TEST_DIMENSION: u64 = 256;

// Ensures that the `tracing` stack is only initialized once using `once_cell`
static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();

    // The sink is part of the type returned by `get_tracing_subscriber`, hence the two branches
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber =
            get_tracing_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_tracing_subscriber(subscriber).expect("Failed to init tracing subscriber");
    } else {
        let subscriber =
            get_tracing_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_tracing_subscriber(subscriber).expect("Failed to init tracing subscriber");
    };
});

pub struct TestApp {
    pub address: String,
    pub port: u16,
    /// Store injected in the app, used to assert checks on the indexed points
    pub vector_store: Arc<dyn VectorStore>,
    pub collection: String,
    pub api_client: reqwest::Client,
}

/// A test API client / test suite
impl TestApp {
    pub async fn get_health(&self) -> reqwest::Response {
        self.api_client
            .get(&format!("{}/health", &self.address))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_bulk_ingest(&self, body: &JsonValue) -> reqwest::Response {
        self.api_client
            .post(&format!("{}/bulk_ingest", &self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// `query`: raw query string, ex: `k=3&same_channel=true`
    pub async fn get_related(&self, content_id: &str, query: &str) -> reqwest::Response {
        self.api_client
            .get(&format!("{}/related/{}?{}", &self.address, content_id, query))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_upsert(&self, body: &JsonValue) -> reqwest::Response {
        self.api_client
            .post(&format!("{}/upsert", &self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get_precomputed(&self, content_id: &str, query: &str) -> reqwest::Response {
        self.api_client
            .get(&format!(
                "{}/precomputed/{}?{}",
                &self.address, content_id, query
            ))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Number of points in the content collection
    pub async fn count_contents(&self) -> u64 {
        self.vector_store
            .count(&self.collection, true)
            .await
            .expect("Failed to count contents")
    }
}

/// Launches the server as a background task, with an in-memory vector store
///
/// When a tokio runtime is shut down all tasks spawned on it are dropped.
/// tokio::test spins up a new runtime at the beginning of each test case and they shut down at the end of each test case.
/// Therefore no need to implement any clean up logic to avoid leaking resources between test runs
pub async fn spawn_app() -> TestApp {
    spawn_app_with(Arc::new(InMemoryVectorStore::new())).await
}

pub async fn spawn_app_with(vector_store: Arc<dyn VectorStore>) -> TestApp {
    // The first time `initialize` is invoked the code in `TRACING` is executed.
    // All other invocations will instead skip execution.
    Lazy::force(&TRACING);

    // Randomizes configuration to ensure test isolation
    let configuration = {
        let mut c = get_configuration().expect("Failed to read configuration.");
        // Uses a random OS port: port 0 is special-cased at the OS level:
        // trying to bind port 0 will trigger an OS scan for an available port which will then be bound to the application.
        c.application.port = 0;
        c.vector_store.provider = VectorStoreProvider::InMemory;
        c.vector_store.collection = format!("test_{}", Uuid::new_v4().simple());
        c.embedding.provider = EmbeddingProvider::Hashing;
        c.embedding.hashing_dimension = TEST_DIMENSION;
        c
    };
    let collection = configuration.vector_store.collection.clone();

    // Only one actix-web worker is needed for integration tests
    let application = Application::build_with(
        configuration,
        Some(1),
        Arc::new(HashingEmbeddingsService::new(TEST_DIMENSION)),
        vector_store.clone(),
    )
    .await
    .expect("Failed to build application.");

    let application_port = application.port();

    // Launches the application as a background task
    let _ = tokio::spawn(application.run_until_stopped());

    TestApp {
        address: format!("http://127.0.0.1:{}", application_port),
        port: application_port,
        vector_store,
        collection,
        api_client: reqwest::Client::new(),
    }
}

/// A vector store whose backend cannot be reached
pub struct UnreachableVectorStore;

impl UnreachableVectorStore {
    fn error() -> VectorStoreError {
        VectorStoreError::StoreUnavailable("connection refused".into())
    }
}

#[async_trait]
impl VectorStore for UnreachableVectorStore {
    async fn ensure_collection(&self, _collection: &CollectionSpec) -> Result<(), VectorStoreError> {
        Err(Self::error())
    }

    async fn upsert(
        &self,
        _collection_name: &str,
        _points: Vec<StoredPoint>,
    ) -> Result<(), VectorStoreError> {
        Err(Self::error())
    }

    async fn count(&self, _collection_name: &str, _exact: bool) -> Result<u64, VectorStoreError> {
        Err(Self::error())
    }

    async fn search(
        &self,
        _collection_name: &str,
        _vector: &[f32],
        _limit: u64,
        _filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        Err(Self::error())
    }

    async fn get_point(
        &self,
        _collection_name: &str,
        _id: Uuid,
    ) -> Result<StoredPoint, VectorStoreError> {
        Err(Self::error())
    }

    async fn delete_collection(&self, _collection_name: &str) -> Result<(), VectorStoreError> {
        Err(Self::error())
    }

    async fn health_check(&self) -> Result<(), VectorStoreError> {
        Err(Self::error())
    }
}

/// The three contents of the "dragons" scenario, as sent by the EPG feed
pub fn dragons_feed() -> JsonValue {
    serde_json::json!([
        {
            "guid": "A",
            "title": "Dragons",
            "description": "fantasy drama",
            "startTime": 1_700_000_000,
            "channelId": 1
        },
        {
            "guid": "B",
            "title": "Dragon Riders",
            "description": "fantasy adventure",
            "startTime": 1_700_003_600,
            "channelId": 1
        },
        {
            "guid": "C",
            "title": "Evening News",
            "description": "local weather report",
            "startTime": 1_700_007_200,
            "channelId": "2"
        }
    ])
}
