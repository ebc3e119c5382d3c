use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::warn;

use crate::ports::{embeddings_service::EmbeddingsService, vector_store::VectorStore};

/// Ready when the embeddings model is loaded and the vector store answers
#[tracing::instrument(name = "Health check handler", skip(embeddings_service, vector_store))]
pub async fn health_check(
    embeddings_service: web::Data<dyn EmbeddingsService>,
    vector_store: web::Data<dyn VectorStore>,
) -> HttpResponse {
    let embedder_ready = embeddings_service.is_ready();
    let vector_store_ready = match vector_store.health_check().await {
        Ok(()) => true,
        Err(error) => {
            warn!(?error, "Vector store is not reachable");
            false
        }
    };

    if embedder_ready && vector_store_ready {
        return HttpResponse::Ok().json(json!({ "status": "ok" }));
    }

    HttpResponse::ServiceUnavailable().json(json!({
        "status": "unavailable",
        "embedder": embedder_ready,
        "vector_store": vector_store_ready,
    }))
}
