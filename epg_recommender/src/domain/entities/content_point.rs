use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::point::{
    from_payload, into_payload, Embeddings, Payload, StoredPoint,
};

/// Payload key holding the channel of a content, used to filter same-channel contents
pub const CHANNEL_ID_FIELD: &str = "channel_id";
/// Payload key holding the original content identifier
pub const CONTENT_ID_FIELD: &str = "content_id";

/// An embedded content, as indexed in the content collection
#[derive(Debug, Clone, PartialEq)]
pub struct ContentPoint {
    pub id: Uuid,
    pub payload: ContentPointPayload,
    pub vector: Embeddings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ContentPointPayload {
    pub content_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Unix timestamp in seconds, as received
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

/// Maps a content identifier to the key of its point.
///
/// Vector stores only accept UUIDs (or integers) as keys: every content identifier, UUID-shaped
/// or not, is hashed into a UUID v5 of its exact bytes, so two distinct identifiers never share
/// a point. The original identifier is always kept in the payload, under `CONTENT_ID_FIELD`.
pub fn point_id_from_content_id(content_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, content_id.as_bytes())
}

impl TryFrom<ContentPoint> for StoredPoint {
    type Error = serde_json::Error;

    fn try_from(content_point: ContentPoint) -> Result<Self, Self::Error> {
        Ok(Self {
            id: content_point.id,
            payload: into_payload(&content_point.payload)?,
            vector: content_point.vector,
        })
    }
}

impl TryFrom<Payload> for ContentPointPayload {
    type Error = serde_json::Error;

    fn try_from(payload: Payload) -> Result<Self, Self::Error> {
        from_payload(payload)
    }
}
