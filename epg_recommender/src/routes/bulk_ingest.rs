use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use common::helper::error_chain_fmt;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{embeddings_status_code, json_error_response, vector_store_status_code};
use crate::{
    domain::entities::{
        content_record::{ContentRecord, InvalidRecordError},
        ingestion_summary::IngestionSummary,
    },
    use_cases::ingest_contents::{IngestContents, IngestContentsError},
};

/// A program guide entry, as sent by the EPG feed
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkIngestItem {
    pub guid: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Unix timestamp in seconds
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
}

/// Channels are identified by numbers by most feeds, by strings by a few
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ChannelId {
    Number(i64),
    Text(String),
}

impl From<BulkIngestItem> for ContentRecord {
    fn from(item: BulkIngestItem) -> Self {
        ContentRecord {
            content_id: item.guid,
            title: item.title,
            description: item.description,
            start_time: item.start_time,
            channel_id: item.channel_id.map(|channel_id| match channel_id {
                ChannelId::Number(number) => number.to_string(),
                ChannelId::Text(text) => text,
            }),
        }
    }
}

/// Each item is parsed on its own: a malformed item is rejected without failing the others
fn parse_item(item: JsonValue) -> Result<ContentRecord, InvalidRecordError> {
    let guid = item
        .get("guid")
        .and_then(JsonValue::as_str)
        .map(str::to_string);

    serde_json::from_value::<BulkIngestItem>(item)
        .map(ContentRecord::from)
        .map_err(|error| InvalidRecordError::Malformed {
            content_id: guid,
            reason: error.to_string(),
        })
}

#[derive(Debug, Serialize)]
pub struct BulkIngestResponse {
    pub status: &'static str,
    /// Number of received items
    pub count: usize,
    #[serde(flatten)]
    pub summary: IngestionSummary,
}

#[tracing::instrument(name = "Bulk ingest handler", skip(ingest_contents, body), fields(nb_items = body.len()))]
pub async fn bulk_ingest(
    ingest_contents: web::Data<IngestContents>,
    body: web::Json<Vec<JsonValue>>,
) -> Result<HttpResponse, BulkIngestError> {
    let records = body.into_inner().into_iter().map(parse_item).collect();

    let summary = ingest_contents.ingest_parsed_bulk(records).await?;

    Ok(HttpResponse::Ok().json(BulkIngestResponse {
        status: "ok",
        count: summary.total(),
        summary,
    }))
}

#[derive(thiserror::Error)]
pub enum BulkIngestError {
    #[error(transparent)]
    IngestContentsError(#[from] IngestContentsError),
}

impl std::fmt::Debug for BulkIngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for BulkIngestError {
    fn status_code(&self) -> StatusCode {
        match self {
            BulkIngestError::IngestContentsError(error) => match error {
                IngestContentsError::InvalidRecord(_) => StatusCode::BAD_REQUEST,
                IngestContentsError::EmbeddingsServiceError(error) => embeddings_status_code(error),
                IngestContentsError::VectorStoreError(error) => vector_store_status_code(error),
            },
        }
    }

    #[tracing::instrument(name = "Response error from bulk_ingest handler", skip(self), fields(error = %self))]
    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        json_error_response(self.status_code(), self)
    }
}
