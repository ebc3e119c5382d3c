use serde::Serialize;

/// A content similar to the one of a query, as ranked by the vector store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedContent {
    pub content_id: String,
    pub score: f32,
    pub title: Option<String>,
    /// Unix timestamp in seconds
    pub start_time: Option<i64>,
    pub channel_id: Option<String>,
}
