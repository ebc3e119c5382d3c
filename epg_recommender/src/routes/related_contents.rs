use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use chrono::{TimeZone, Utc};
use common::helper::error_chain_fmt;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{json_error_response, vector_store_status_code};
use crate::{
    domain::entities::related_content::RelatedContent,
    use_cases::find_related_contents::{
        FindRelatedContents, FindRelatedContentsError, DEFAULT_RELATED_LIMIT,
    },
};

#[derive(Debug, Deserialize)]
pub struct RelatedContentsQuery {
    pub k: Option<i64>,
    pub same_channel: Option<bool>,
}

#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct RelatedContentResponse {
    pub content_id: String,
    pub score: f32,
    pub title: Option<String>,
    /// ISO 8601, UTC
    pub start_time: Option<String>,
    pub channel: Option<String>,
}

impl From<RelatedContent> for RelatedContentResponse {
    fn from(related: RelatedContent) -> Self {
        Self {
            content_id: related.content_id,
            score: related.score,
            title: related.title,
            start_time: related.start_time.and_then(to_iso_8601),
            channel: related.channel_id,
        }
    }
}

/// Formats a unix timestamp in seconds, ex: `2023-11-14T22:13:20+00:00`
fn to_iso_8601(timestamp: i64) -> Option<String> {
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .map(|date_time| date_time.to_rfc3339())
}

#[tracing::instrument(name = "Related contents handler", skip(find_related_contents))]
pub async fn related_contents(
    find_related_contents: web::Data<FindRelatedContents>,
    content_id: web::Path<String>,
    query: web::Query<RelatedContentsQuery>,
) -> Result<HttpResponse, RelatedContentsError> {
    let k = query.k.unwrap_or(DEFAULT_RELATED_LIMIT);
    let same_channel = query.same_channel.unwrap_or(false);

    let related = find_related_contents
        .execute(&content_id, k, same_channel)
        .await?;

    info!(content_id = %content_id, nb_related = related.len(), "Returning related contents");
    let response: Vec<RelatedContentResponse> =
        related.into_iter().map(RelatedContentResponse::from).collect();

    Ok(HttpResponse::Ok().json(response))
}

#[derive(thiserror::Error)]
pub enum RelatedContentsError {
    #[error(transparent)]
    FindRelatedContentsError(#[from] FindRelatedContentsError),
}

impl std::fmt::Debug for RelatedContentsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for RelatedContentsError {
    fn status_code(&self) -> StatusCode {
        match self {
            RelatedContentsError::FindRelatedContentsError(error) => match error {
                FindRelatedContentsError::UnknownContent(_) => StatusCode::NOT_FOUND,
                FindRelatedContentsError::VectorStoreError(error) => {
                    vector_store_status_code(error)
                }
            },
        }
    }

    #[tracing::instrument(name = "Response error from related_contents handler", skip(self), fields(error = %self))]
    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        json_error_response(self.status_code(), self)
    }
}
