use std::{collections::HashMap, future::Future, time::Duration};

use async_trait::async_trait;
use qdrant_client::{
    prelude::{QdrantClient, QdrantClientConfig},
    qdrant::{
        self, point_id::PointIdOptions, value::Kind, vectors::VectorsOptions,
        vectors_config::Config, CollectionInfo, Condition, CountPoints, CreateCollection,
        Distance, Filter, PointId, PointStruct, SearchPoints, VectorParams, VectorsConfig,
    },
};
use secrecy::ExposeSecret;
use serde_json::{Number, Value as JsonValue};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    configuration::VectorStoreSettings,
    domain::entities::{
        collection::{CollectionSpec, Similarity},
        point::{Payload, PayloadFilter, ScoredPoint, StoredPoint},
    },
    ports::vector_store::{VectorStore, VectorStoreError},
};

/// Vector store backed by a Qdrant instance, reached through its gRPC API.
///
/// Every call is bounded by the configured timeout; a timeout or a transport error is
/// reported as `StoreUnavailable`.
pub struct QdrantVectorStore {
    client: QdrantClient,
    timeout: Duration,
}

impl QdrantVectorStore {
    /// Sets up the Qdrant client. No request is sent before the first operation.
    pub fn try_new(settings: &VectorStoreSettings) -> Result<Self, VectorStoreError> {
        let timeout = settings.timeout();

        let mut qdrant_config = QdrantClientConfig::from_url(&settings.get_grpc_base_url());
        qdrant_config.timeout = timeout;
        qdrant_config.connect_timeout = timeout;
        qdrant_config.api_key = settings
            .api_key
            .as_ref()
            .map(|api_key| api_key.expose_secret().to_string());

        let client = QdrantClient::new(Some(qdrant_config))
            .map_err(|e| VectorStoreError::StoreUnavailable(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Runs a Qdrant request, bounded by the store timeout
    async fn call<T, F>(
        &self,
        operation: &str,
        collection_name: &str,
        request: F,
    ) -> Result<T, VectorStoreError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(error)) => {
                warn!(?error, operation, collection_name, "Qdrant request failed");
                Err(classify_error(collection_name, &error.to_string()))
            }
            Err(_) => Err(VectorStoreError::StoreUnavailable(format!(
                "{} on collection {} timed out after {:?}",
                operation, collection_name, self.timeout
            ))),
        }
    }

    async fn create_collection(&self, collection: &CollectionSpec) -> Result<(), VectorStoreError> {
        let request = self.client.create_collection(&CreateCollection {
            collection_name: collection.name.clone(),
            vectors_config: Some(VectorsConfig {
                config: Some(Config::Params(VectorParams {
                    size: collection.dimension,
                    distance: distance(collection.similarity) as i32,
                    ..Default::default()
                })),
            }),
            ..Default::default()
        });

        match self.call("create_collection", &collection.name, request).await {
            Ok(_) => {
                info!(collection = %collection.name, "Created collection");
                Ok(())
            }
            // Created in the meantime by a concurrent call
            Err(error) if error.to_string().contains("already exists") => Ok(()),
            Err(error) => Err(error),
        }
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    #[tracing::instrument(name = "Ensuring Qdrant collection", skip(self))]
    async fn ensure_collection(&self, collection: &CollectionSpec) -> Result<(), VectorStoreError> {
        let collections = self
            .call(
                "list_collections",
                &collection.name,
                self.client.list_collections(),
            )
            .await?;

        let exists = collections
            .collections
            .iter()
            .any(|description| description.name == collection.name);

        if !exists {
            return self.create_collection(collection).await;
        }

        let response = self
            .call(
                "collection_info",
                &collection.name,
                self.client.collection_info(&collection.name),
            )
            .await?;

        let params = response
            .result
            .as_ref()
            .and_then(vector_params)
            .ok_or_else(|| VectorStoreError::CollectionMismatch {
                collection: collection.name.clone(),
                reason: "no single unnamed vector configuration".into(),
            })?;

        if params.size != collection.dimension {
            return Err(VectorStoreError::CollectionMismatch {
                collection: collection.name.clone(),
                reason: format!(
                    "dimension is {}, expected {}",
                    params.size, collection.dimension
                ),
            });
        }
        if params.distance != distance(collection.similarity) as i32 {
            return Err(VectorStoreError::CollectionMismatch {
                collection: collection.name.clone(),
                reason: format!("distance differs from {}", collection.similarity),
            });
        }

        Ok(())
    }

    #[tracing::instrument(name = "Saving points to Qdrant", skip(self, points), fields(nb_points = points.len()))]
    async fn upsert(
        &self,
        collection_name: &str,
        points: Vec<StoredPoint>,
    ) -> Result<(), VectorStoreError> {
        let points: Vec<PointStruct> = points.into_iter().map(PointStruct::from).collect();

        // Waits for the points to be applied before returning
        self.call(
            "upsert",
            collection_name,
            self.client
                .upsert_points_blocking(collection_name, points, None),
        )
        .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Counting Qdrant points", skip(self))]
    async fn count(&self, collection_name: &str, exact: bool) -> Result<u64, VectorStoreError> {
        let response = self
            .call(
                "count",
                collection_name,
                self.client.count(&CountPoints {
                    collection_name: collection_name.to_string(),
                    exact: Some(exact),
                    ..Default::default()
                }),
            )
            .await?;

        Ok(response.result.map(|result| result.count).unwrap_or_default())
    }

    #[tracing::instrument(name = "Searching Qdrant points", skip(self, vector))]
    async fn search(
        &self,
        collection_name: &str,
        vector: &[f32],
        limit: u64,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        let response = self
            .call(
                "search",
                collection_name,
                self.client.search_points(&SearchPoints {
                    collection_name: collection_name.to_string(),
                    vector: vector.to_vec(),
                    filter: filter.map(to_qdrant_filter),
                    limit,
                    with_payload: Some(true.into()),
                    ..Default::default()
                }),
            )
            .await?;

        // Points with an id we cannot read back are skipped
        Ok(response
            .result
            .into_iter()
            .filter_map(|point| {
                let id = point.id.as_ref().and_then(uuid_from_point_id)?;
                Some(ScoredPoint {
                    id,
                    score: point.score,
                    payload: from_qdrant_payload(point.payload),
                })
            })
            .collect())
    }

    #[tracing::instrument(name = "Getting Qdrant point", skip(self))]
    async fn get_point(
        &self,
        collection_name: &str,
        id: Uuid,
    ) -> Result<StoredPoint, VectorStoreError> {
        let response = self
            .call(
                "get_points",
                collection_name,
                self.client.get_points(
                    collection_name,
                    &[PointId::from(id.to_string())],
                    Some(true),
                    Some(true),
                    None,
                ),
            )
            .await?;

        let not_found = || VectorStoreError::NotFound {
            collection: collection_name.to_string(),
            id,
        };

        let point = response.result.into_iter().next().ok_or_else(not_found)?;
        let vector = match point.vectors.and_then(|vectors| vectors.vectors_options) {
            Some(VectorsOptions::Vector(vector)) => vector.data,
            _ => return Err(not_found()),
        };

        Ok(StoredPoint {
            id,
            vector,
            payload: from_qdrant_payload(point.payload),
        })
    }

    #[tracing::instrument(name = "Deleting Qdrant collection", skip(self))]
    async fn delete_collection(&self, collection_name: &str) -> Result<(), VectorStoreError> {
        self.call(
            "delete_collection",
            collection_name,
            self.client.delete_collection(collection_name),
        )
        .await?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), VectorStoreError> {
        self.call("health_check", "-", self.client.health_check())
            .await?;

        Ok(())
    }
}

fn distance(similarity: Similarity) -> Distance {
    match similarity {
        Similarity::Cosine => Distance::Cosine,
        Similarity::Dot => Distance::Dot,
    }
}

fn vector_params(info: &CollectionInfo) -> Option<&VectorParams> {
    let vectors_config = info.config.as_ref()?.params.as_ref()?.vectors_config.as_ref()?;

    match vectors_config.config.as_ref()? {
        Config::Params(params) => Some(params),
        Config::ParamsMap(_) => None,
    }
}

/// Maps the message of a Qdrant error to the store error kinds.
///
/// The Qdrant client only returns `anyhow` errors: the gRPC status is only found in the text.
fn classify_error(collection_name: &str, message: &str) -> VectorStoreError {
    if message.contains("Wrong input") {
        VectorStoreError::CollectionMismatch {
            collection: collection_name.to_string(),
            reason: message.to_string(),
        }
    } else if message.contains("Not found: Collection") || message.contains("doesn't exist") {
        VectorStoreError::UnknownCollection(collection_name.to_string())
    } else {
        VectorStoreError::StoreUnavailable(message.to_string())
    }
}

fn uuid_from_point_id(point_id: &PointId) -> Option<Uuid> {
    match point_id.point_id_options.as_ref()? {
        PointIdOptions::Uuid(uuid) => Uuid::parse_str(uuid).ok(),
        PointIdOptions::Num(num) => Some(Uuid::from_u128(*num as u128)),
    }
}

fn to_qdrant_filter(filter: &PayloadFilter) -> Filter {
    Filter::must(
        filter
            .conditions()
            .iter()
            .map(|condition| Condition::matches(condition.key.clone(), condition.value.clone())),
    )
}

impl From<StoredPoint> for PointStruct {
    fn from(point: StoredPoint) -> Self {
        Self {
            id: Some(point.id.to_string().into()),
            vectors: Some(point.vector.into()),
            payload: to_qdrant_payload(point.payload),
        }
    }
}

fn to_qdrant_payload(payload: Payload) -> HashMap<String, qdrant::Value> {
    payload
        .into_iter()
        .map(|(key, value)| (key, to_qdrant_value(value)))
        .collect()
}

fn from_qdrant_payload(payload: HashMap<String, qdrant::Value>) -> Payload {
    payload
        .into_iter()
        .map(|(key, value)| (key, from_qdrant_value(value)))
        .collect()
}

fn to_qdrant_value(value: JsonValue) -> qdrant::Value {
    let kind = match value {
        JsonValue::Null => Kind::NullValue(0),
        JsonValue::Bool(value) => Kind::BoolValue(value),
        JsonValue::Number(number) => match number.as_i64() {
            Some(integer) => Kind::IntegerValue(integer),
            None => Kind::DoubleValue(number.as_f64().unwrap_or_default()),
        },
        JsonValue::String(value) => Kind::StringValue(value),
        JsonValue::Array(values) => Kind::ListValue(qdrant::ListValue {
            values: values.into_iter().map(to_qdrant_value).collect(),
        }),
        JsonValue::Object(fields) => Kind::StructValue(qdrant::Struct {
            fields: to_qdrant_payload(fields),
        }),
    };

    qdrant::Value { kind: Some(kind) }
}

fn from_qdrant_value(value: qdrant::Value) -> JsonValue {
    match value.kind {
        None | Some(Kind::NullValue(_)) => JsonValue::Null,
        Some(Kind::BoolValue(value)) => JsonValue::Bool(value),
        Some(Kind::IntegerValue(value)) => JsonValue::Number(value.into()),
        Some(Kind::DoubleValue(value)) => Number::from_f64(value)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Some(Kind::StringValue(value)) => JsonValue::String(value),
        Some(Kind::ListValue(list)) => {
            JsonValue::Array(list.values.into_iter().map(from_qdrant_value).collect())
        }
        Some(Kind::StructValue(fields)) => JsonValue::Object(from_qdrant_payload(fields.fields)),
    }
}
