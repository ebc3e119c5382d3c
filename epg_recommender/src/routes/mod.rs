mod bulk_ingest;
mod health_check;
mod precomputed_related;
mod related_contents;

pub use bulk_ingest::*;
pub use health_check::*;
pub use precomputed_related::*;
pub use related_contents::*;

use actix_web::{
    http::{header::ContentType, StatusCode},
    HttpRequest, HttpResponse, ResponseError,
};
use serde_json::json;

use crate::ports::{embeddings_service::EmbeddingsServiceError, vector_store::VectorStoreError};

/// Error responses share the same shape: `{"error": <message>}`
pub fn json_error_response(status: StatusCode, error: &impl std::fmt::Display) -> HttpResponse {
    HttpResponse::build(status)
        .insert_header(ContentType::json())
        .json(json!({ "error": error.to_string() }))
}

/// Replaces the plain text body of actix-web extractor errors (invalid JSON body or query)
/// by a JSON error body, keeping their status code
pub fn extractor_error_handler<E: ResponseError + 'static>(
    error: E,
    _request: &HttpRequest,
) -> actix_web::Error {
    let response = json_error_response(error.status_code(), &error);
    actix_web::error::InternalError::from_response(error, response).into()
}

/// A missing point or collection is reported as not found, a transient backend error as
/// a temporary unavailability
fn vector_store_status_code(error: &VectorStoreError) -> StatusCode {
    match error {
        VectorStoreError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        VectorStoreError::NotFound { .. } | VectorStoreError::UnknownCollection(_) => {
            StatusCode::NOT_FOUND
        }
        VectorStoreError::CollectionMismatch { .. } | VectorStoreError::InvalidPayload(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn embeddings_status_code(error: &EmbeddingsServiceError) -> StatusCode {
    match error {
        EmbeddingsServiceError::ModelUnavailable(_) | EmbeddingsServiceError::Timeout(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        EmbeddingsServiceError::InvalidOutput(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
