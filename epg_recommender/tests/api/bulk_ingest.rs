use std::sync::Arc;

use epg_recommender::domain::entities::{
    content_point::{point_id_from_content_id, ContentPointPayload},
    point::from_payload,
};
use fake::{faker::lorem::en::Sentence, Fake};
use serde_json::{json, Value as JsonValue};

use crate::helpers::{dragons_feed, spawn_app, spawn_app_with, UnreachableVectorStore};

#[tokio::test]
async fn an_empty_feed_is_not_an_error() {
    let app = spawn_app().await;

    let response = app.post_bulk_ingest(&json!([])).await;

    assert_eq!(200, response.status().as_u16());
    let body: JsonValue = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["count"], 0);
    assert_eq!(body["accepted"], 0);
    assert_eq!(body["rejected"], 0);
    assert_eq!(body["failed"], 0);
}

#[tokio::test]
async fn valid_items_are_indexed() {
    let app = spawn_app().await;

    let response = app.post_bulk_ingest(&dragons_feed()).await;

    assert_eq!(200, response.status().as_u16());
    let body: JsonValue = response.json().await.unwrap();
    assert_eq!(body["count"], 3);
    assert_eq!(body["accepted"], 3);
    assert_eq!(app.count_contents().await, 3);

    let point = app
        .vector_store
        .get_point(&app.collection, point_id_from_content_id("A"))
        .await
        .unwrap();
    let payload: ContentPointPayload = from_payload(point.payload).unwrap();
    assert_eq!(payload.content_id, "A");
    assert_eq!(payload.channel_id.as_deref(), Some("1"));
    assert_eq!(payload.start_time, Some(1_700_000_000));
}

#[tokio::test]
async fn invalid_items_are_reported_without_failing_the_others() {
    let app = spawn_app().await;
    let feed = json!([
        { "guid": "A", "title": "Dragons" },
        { "guid": "B" },
        { "guid": "C", "title": "Evening News", "startTime": "tonight" },
        { "title": "No identifier" },
        { "guid": "E", "title": "Cooking Show", "channelId": 7 }
    ]);

    let response = app.post_bulk_ingest(&feed).await;

    assert_eq!(200, response.status().as_u16());
    let body: JsonValue = response.json().await.unwrap();
    assert_eq!(body["count"], 5);
    assert_eq!(body["accepted"], 2);
    assert_eq!(body["rejected"], 3);
    let rejected: Vec<(u64, JsonValue)> = body["rejected_items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| (item["position"].as_u64().unwrap(), item["content_id"].clone()))
        .collect();
    assert_eq!(
        rejected,
        vec![(1, json!("B")), (2, json!("C")), (3, JsonValue::Null)]
    );
    assert_eq!(app.count_contents().await, 2);
}

#[tokio::test]
async fn ingesting_the_same_feed_twice_does_not_duplicate_contents() {
    let app = spawn_app().await;

    app.post_bulk_ingest(&dragons_feed()).await;
    let mut feed = dragons_feed();
    feed[0]["title"] = json!("Dragons: the return");
    let response = app.post_bulk_ingest(&feed).await;

    assert_eq!(200, response.status().as_u16());
    assert_eq!(app.count_contents().await, 3);
    let point = app
        .vector_store
        .get_point(&app.collection, point_id_from_content_id("A"))
        .await
        .unwrap();
    let payload: ContentPointPayload = from_payload(point.payload).unwrap();
    assert_eq!(payload.title, "Dragons: the return");
}

#[tokio::test]
async fn a_large_feed_is_fully_indexed() {
    let app = spawn_app().await;
    let feed: Vec<JsonValue> = (0..120)
        .map(|i| {
            let title: String = Sentence(2..6).fake();
            json!({ "guid": format!("content-{}", i), "title": title, "channelId": i % 4 })
        })
        .collect();

    let response = app.post_bulk_ingest(&JsonValue::Array(feed)).await;

    assert_eq!(200, response.status().as_u16());
    let body: JsonValue = response.json().await.unwrap();
    assert_eq!(body["accepted"], 120);
    assert_eq!(app.count_contents().await, 120);
}

#[tokio::test]
async fn a_body_which_is_not_a_list_returns_a_400() {
    let app = spawn_app().await;

    let response = app
        .post_bulk_ingest(&json!({ "guid": "A", "title": "Dragons" }))
        .await;

    assert_eq!(400, response.status().as_u16());
    let body: JsonValue = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn an_unreachable_vector_store_returns_a_503() {
    let app = spawn_app_with(Arc::new(UnreachableVectorStore)).await;

    let response = app.post_bulk_ingest(&dragons_feed()).await;

    assert_eq!(503, response.status().as_u16());
}

#[tokio::test]
async fn uuid_shaped_identifiers_differing_by_case_are_not_merged() {
    let app = spawn_app().await;
    let feed = json!([
        { "guid": "67e55044-10b1-426f-9247-bb680e5fe0c8", "title": "Dragons" },
        { "guid": "67E55044-10B1-426F-9247-BB680E5FE0C8", "title": "Evening News" }
    ]);

    let response = app.post_bulk_ingest(&feed).await;

    assert_eq!(200, response.status().as_u16());
    assert_eq!(app.count_contents().await, 2);
    let response = app
        .get_related("67E55044-10B1-426F-9247-BB680E5FE0C8", "k=5")
        .await;
    assert_eq!(200, response.status().as_u16());
    let items: Vec<JsonValue> = response.json().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["content_id"], "67e55044-10b1-426f-9247-bb680e5fe0c8");
}
