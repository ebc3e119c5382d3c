use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

pub type Embeddings = Vec<f32>;

/// Free-form payload stored alongside a vector
pub type Payload = Map<String, JsonValue>;

/// A point as it is persisted in a vector store collection
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPoint {
    pub id: Uuid,
    pub vector: Embeddings,
    pub payload: Payload,
}

/// A point returned by a similarity search, with its score against the query vector
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: Uuid,
    pub score: f32,
    pub payload: Payload,
}

/// Conjunction of keyword equality conditions on payload fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayloadFilter {
    conditions: Vec<FieldMatch>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch {
    pub key: String,
    pub value: String,
}

impl PayloadFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must_match(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push(FieldMatch {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn conditions(&self) -> &[FieldMatch] {
        &self.conditions
    }

    /// Whether the payload satisfies every condition.
    ///
    /// A field only matches a string value holding exactly the expected keyword.
    pub fn matches(&self, payload: &Payload) -> bool {
        self.conditions.iter().all(|condition| {
            payload.get(&condition.key).and_then(JsonValue::as_str) == Some(&condition.value)
        })
    }
}

/// Serializes a typed payload into the generic representation stored with a point
pub fn into_payload<T: Serialize>(value: &T) -> Result<Payload, serde_json::Error> {
    match serde_json::to_value(value)? {
        JsonValue::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "a point payload must be a JSON object, got {}",
            other
        ))),
    }
}

pub fn from_payload<T: DeserializeOwned>(payload: Payload) -> Result<T, serde_json::Error> {
    serde_json::from_value(JsonValue::Object(payload))
}
