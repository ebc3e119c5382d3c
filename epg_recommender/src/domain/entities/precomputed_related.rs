use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload key holding the content the related item was computed for
pub const SOURCE_CONTENT_ID_FIELD: &str = "source_content_id";

/// A related content scored by a consumer, stored as-is without any embedding
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PrecomputedRelatedItem {
    pub source_content_id: String,
    pub content_id: String,
    pub score: f32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
}

impl PrecomputedRelatedItem {
    /// One point per (source, related content) pair: posting the pair again replaces it
    pub fn point_id(&self) -> Uuid {
        let key = format!("{}\u{1f}{}", self.source_content_id, self.content_id);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
    }
}
