use std::sync::Arc;

use epg_recommender::routes::RelatedContentResponse;
use serde_json::Value as JsonValue;

use crate::helpers::{dragons_feed, spawn_app, spawn_app_with, TestApp, UnreachableVectorStore};

async fn spawn_app_with_dragons() -> TestApp {
    let app = spawn_app().await;
    let response = app.post_bulk_ingest(&dragons_feed()).await;
    assert_eq!(200, response.status().as_u16());
    app
}

async fn related_ids(app: &TestApp, content_id: &str, query: &str) -> Vec<String> {
    let response = app.get_related(content_id, query).await;
    assert_eq!(200, response.status().as_u16());

    let related: Vec<RelatedContentResponse> = response.json().await.unwrap();
    related.into_iter().map(|r| r.content_id).collect()
}

#[tokio::test]
async fn contents_about_dragons_are_related_to_each_other() {
    let app = spawn_app_with_dragons().await;

    assert_eq!(related_ids(&app, "A", "k=1").await, vec!["B"]);
}

#[tokio::test]
async fn the_queried_content_is_never_returned() {
    let app = spawn_app_with_dragons().await;

    for content_id in ["A", "B", "C"] {
        let related = related_ids(&app, content_id, "k=2").await;

        assert!(related.len() <= 2);
        assert!(!related.iter().any(|id| id == content_id));
    }
}

#[tokio::test]
async fn k_defaults_to_ten_and_can_exceed_the_corpus() {
    let app = spawn_app_with_dragons().await;

    assert_eq!(related_ids(&app, "A", "").await.len(), 2);
    assert_eq!(related_ids(&app, "A", "k=50").await.len(), 2);
}

#[tokio::test]
async fn related_contents_have_an_iso_start_time_and_a_channel() {
    let app = spawn_app_with_dragons().await;

    let response = app.get_related("B", "k=5").await;
    let related: Vec<RelatedContentResponse> = response.json().await.unwrap();

    let dragons = related
        .iter()
        .find(|r| r.content_id == "A")
        .expect("A should be related to B");
    assert_eq!(dragons.title.as_deref(), Some("Dragons"));
    assert_eq!(
        dragons.start_time.as_deref(),
        Some("2023-11-14T22:13:20+00:00")
    );
    assert_eq!(dragons.channel.as_deref(), Some("1"));
    assert!(related.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn same_channel_only_returns_contents_of_the_queried_channel() {
    let app = spawn_app_with_dragons().await;

    let all = related_ids(&app, "A", "k=10").await;
    let same_channel = related_ids(&app, "A", "k=10&same_channel=true").await;

    assert_eq!(same_channel, vec!["B"]);
    assert!(same_channel.iter().all(|id| all.contains(id)));
    assert!(related_ids(&app, "C", "same_channel=true").await.is_empty());
}

#[tokio::test]
async fn a_non_positive_k_returns_an_empty_list() {
    let app = spawn_app_with_dragons().await;

    assert!(related_ids(&app, "A", "k=0").await.is_empty());
    assert!(related_ids(&app, "A", "k=-1").await.is_empty());
}

#[tokio::test]
async fn an_unknown_content_returns_a_404() {
    let app = spawn_app_with_dragons().await;

    let response = app.get_related("unknown", "k=3").await;

    assert_eq!(404, response.status().as_u16());
    let body: JsonValue = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("unknown"));
}

#[tokio::test]
async fn an_invalid_k_returns_a_400() {
    let app = spawn_app_with_dragons().await;

    let response = app.get_related("A", "k=many").await;

    assert_eq!(400, response.status().as_u16());
    let body: JsonValue = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn an_unreachable_vector_store_returns_a_503() {
    let app = spawn_app_with(Arc::new(UnreachableVectorStore)).await;

    let response = app.get_related("A", "k=3").await;

    assert_eq!(503, response.status().as_u16());
}
