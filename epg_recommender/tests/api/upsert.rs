use serde_json::{json, Value as JsonValue};

use crate::helpers::spawn_app;

fn related_item(source: &str, content: &str, score: f64) -> JsonValue {
    json!({
        "source_content_id": source,
        "content_id": content,
        "score": score,
        "title": format!("Title of {}", content),
        "start_time": "2023-11-14T22:13:20+00:00",
        "channel": "1"
    })
}

#[tokio::test]
async fn precomputed_items_are_listed_by_descending_score() {
    // Arranges
    let app = spawn_app().await;
    let body = json!([
        related_item("A", "B", 0.25),
        related_item("A", "C", 0.75),
        related_item("Z", "C", 1.0),
        related_item("A", "D", 0.5)
    ]);

    // Acts
    let response = app.post_upsert(&body).await;

    // Asserts
    assert_eq!(200, response.status().as_u16());
    let body: JsonValue = response.json().await.unwrap();
    assert_eq!(body, json!({ "status": "ok", "count": 4 }));

    let response = app.get_precomputed("A", "k=2").await;
    assert_eq!(200, response.status().as_u16());
    let items: Vec<JsonValue> = response.json().await.unwrap();
    let content_ids: Vec<&str> = items
        .iter()
        .map(|item| item["content_id"].as_str().unwrap())
        .collect();
    assert_eq!(content_ids, vec!["C", "D"]);
    assert_eq!(items[0]["title"], "Title of C");
}

#[tokio::test]
async fn a_single_item_can_be_posted() {
    let app = spawn_app().await;

    let response = app.post_upsert(&related_item("A", "B", 0.5)).await;

    assert_eq!(200, response.status().as_u16());
    let body: JsonValue = response.json().await.unwrap();
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn posting_a_pair_again_replaces_its_score() {
    let app = spawn_app().await;

    app.post_upsert(&json!([related_item("A", "B", 0.25)])).await;
    app.post_upsert(&json!([related_item("A", "B", 0.5)])).await;

    let items: Vec<JsonValue> = app.get_precomputed("A", "").await.json().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["score"], 0.5);
}

#[tokio::test]
async fn precomputed_items_do_not_touch_the_content_collection() {
    let app = spawn_app().await;

    app.post_upsert(&json!([related_item("A", "B", 0.25)])).await;

    assert_eq!(app.count_contents().await, 0);
    assert_eq!(404, app.get_related("A", "k=3").await.status().as_u16());
}

#[tokio::test]
async fn an_item_without_content_id_returns_a_400() {
    let app = spawn_app().await;

    let response = app.post_upsert(&json!([related_item("A", "", 0.25)])).await;

    assert_eq!(400, response.status().as_u16());
    let body: JsonValue = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn nothing_is_listed_for_an_unknown_source() {
    let app = spawn_app().await;

    let response = app.get_precomputed("unknown", "k=5").await;

    assert_eq!(200, response.status().as_u16());
    let items: Vec<JsonValue> = response.json().await.unwrap();
    assert!(items.is_empty());
}
