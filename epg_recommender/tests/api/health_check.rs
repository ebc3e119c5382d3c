use std::sync::Arc;

use serde_json::{json, Value as JsonValue};

use crate::helpers::{spawn_app, spawn_app_with, UnreachableVectorStore};

#[tokio::test]
async fn health_check_works() {
    // Arranges
    let app = spawn_app().await;

    // Acts
    let response = app.get_health().await;

    // Asserts
    assert_eq!(200, response.status().as_u16());
    let body: JsonValue = response.json().await.unwrap();
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn health_check_reports_an_unreachable_vector_store() {
    let app = spawn_app_with(Arc::new(UnreachableVectorStore)).await;

    let response = app.get_health().await;

    assert_eq!(503, response.status().as_u16());
    let body: JsonValue = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "status": "unavailable", "embedder": true, "vector_store": false })
    );
}
