use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use common::helper::error_chain_fmt;
use serde::Deserialize;
use serde_json::json;

use super::{json_error_response, vector_store_status_code};
use crate::{
    domain::entities::precomputed_related::PrecomputedRelatedItem,
    use_cases::{
        find_related_contents::DEFAULT_RELATED_LIMIT,
        precomputed_related::{PrecomputedRelatedContents, PrecomputedRelatedError},
    },
};

/// One item or a list of items
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UpsertRelatedBody {
    Many(Vec<PrecomputedRelatedItem>),
    One(PrecomputedRelatedItem),
}

impl UpsertRelatedBody {
    fn into_items(self) -> Vec<PrecomputedRelatedItem> {
        match self {
            UpsertRelatedBody::Many(items) => items,
            UpsertRelatedBody::One(item) => vec![item],
        }
    }
}

/// Saves related items computed by a consumer. They are not embedded, and the content
/// collection is left untouched.
#[tracing::instrument(name = "Upsert related items handler", skip(precomputed_related, body))]
pub async fn upsert_related(
    precomputed_related: web::Data<PrecomputedRelatedContents>,
    body: web::Json<UpsertRelatedBody>,
) -> Result<HttpResponse, PrecomputedRelatedRouteError> {
    let count = precomputed_related.save(body.into_inner().into_items()).await?;

    Ok(HttpResponse::Ok().json(json!({ "status": "ok", "count": count })))
}

#[derive(Debug, Deserialize)]
pub struct PrecomputedRelatedQuery {
    pub k: Option<i64>,
}

#[tracing::instrument(name = "Precomputed related items handler", skip(precomputed_related))]
pub async fn precomputed_related(
    precomputed_related: web::Data<PrecomputedRelatedContents>,
    content_id: web::Path<String>,
    query: web::Query<PrecomputedRelatedQuery>,
) -> Result<HttpResponse, PrecomputedRelatedRouteError> {
    let k = query.k.unwrap_or(DEFAULT_RELATED_LIMIT);

    let items = precomputed_related.list(&content_id, k).await?;

    Ok(HttpResponse::Ok().json(items))
}

#[derive(thiserror::Error)]
pub enum PrecomputedRelatedRouteError {
    #[error(transparent)]
    PrecomputedRelatedError(#[from] PrecomputedRelatedError),
}

impl std::fmt::Debug for PrecomputedRelatedRouteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for PrecomputedRelatedRouteError {
    fn status_code(&self) -> StatusCode {
        match self {
            PrecomputedRelatedRouteError::PrecomputedRelatedError(error) => match error {
                PrecomputedRelatedError::InvalidItem { .. } => StatusCode::BAD_REQUEST,
                PrecomputedRelatedError::VectorStoreError(error) => {
                    vector_store_status_code(error)
                }
            },
        }
    }

    #[tracing::instrument(name = "Response error from precomputed related handlers", skip(self), fields(error = %self))]
    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        json_error_response(self.status_code(), self)
    }
}
