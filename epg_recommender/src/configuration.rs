use std::time::Duration;

use secrecy::Secret;
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

use crate::domain::entities::collection::Similarity;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub vector_store: VectorStoreSettings,
    pub embedding: EmbeddingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    /// Filter level for traces if the RUST_LOG env variable has not been set
    pub log_level: String,
    /// Maximum number of records embedded and saved together during a bulk ingestion
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub ingest_batch_size: usize,
    /// Maximum size of a JSON request body, in bytes
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_payload_bytes: usize,
    /// Largest number of related contents a single request may return
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_related_limit: usize,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VectorStoreProvider {
    Qdrant,
    /// Not persisted: for local development
    InMemory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreSettings {
    pub provider: VectorStoreProvider,
    pub host: String,
    /// Qdrant gRPC port
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub api_key: Option<Secret<String>>,
    /// Collection of the embedded contents. Pre-computed related items are saved
    /// in a separate collection, suffixed with `_precomputed`.
    pub collection: String,
    pub similarity: Similarity,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl VectorStoreSettings {
    pub fn get_grpc_base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    #[serde(rename = "huggingface")]
    HuggingFace,
    Hashing,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    /// Hugging Face sentence-embeddings model, ex: `sentence-transformers/all-MiniLM-L12-v2`
    pub model_name: String,
    /// Vector dimension of the hashing provider
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub hashing_dimension: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl EmbeddingSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}

/// Env variables recognized without prefix, and the setting each one overrides
const WELL_KNOWN_ENV_VARIABLES: [(&str, &str); 6] = [
    ("API_PORT", "application.port"),
    ("QDRANT_HOST", "vector_store.host"),
    ("QDRANT_PORT", "vector_store.port"),
    ("COLLECTION_NAME", "vector_store.collection"),
    ("MODEL_NAME", "embedding.model_name"),
    ("SIMILARITY", "vector_store.similarity"),
];

/// Extracts app settings from configuration files and env variables
///
/// `base.yaml` should contain shared settings for all environments.
/// A specific env file should be created for each environment: `local.yaml` and `production.yaml`
/// The environment is set with the env var `APP_ENVIRONMENT`.
/// If `APP_ENVIRONMENT` is not set, `local.yaml` is the default.
///
/// Settings are also taken from environment variables: with a prefix of APP and '__' as separator
/// For ex: `APP_APPLICATION__PORT=5001` would set `Settings.application.port`.
/// Finally, the variables of `WELL_KNOWN_ENV_VARIABLES` (ex: `QDRANT_HOST`, `SIMILARITY`) take precedence.
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path =
        std::env::current_dir().map_err(|e| config::ConfigError::Foreign(Box::new(e)))?;
    let configuration_directory = base_path.join("configuration");

    // Detects the running environment.
    // Default to `local` if unspecified.
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;
    let environment_filename = format!("{}.yaml", environment.as_str());

    let mut builder = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        // Adds in settings from environment variables (with a prefix of APP and '__' as separator)
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        );

    for (variable, key) in WELL_KNOWN_ENV_VARIABLES {
        let value = std::env::var(variable)
            .ok()
            .map(|value| normalize_env_value(key, value));
        builder = builder.set_override_option(key, value)?;
    }

    builder.build()?.try_deserialize::<Settings>()
}

fn normalize_env_value(key: &str, value: String) -> String {
    if key == "vector_store.similarity" {
        value.to_lowercase()
    } else {
        value
    }
}

/// The possible runtime environment for our application.
#[derive(Debug, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}
