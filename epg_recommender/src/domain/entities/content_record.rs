use common::helper::error_chain_fmt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::content_point::{point_id_from_content_id, ContentPointPayload},
    services::helpers::build_signature,
};

/// A raw program guide entry received for ingestion.
///
/// Every field is optional at this stage: a record missing its identifier or its title is
/// reported as invalid by `normalize` instead of failing the whole ingestion request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ContentRecord {
    pub content_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Unix timestamp in seconds
    pub start_time: Option<i64>,
    pub channel_id: Option<String>,
}

/// A validated record, ready to be embedded
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedContent {
    pub point_id: Uuid,
    pub text: String,
    pub payload: ContentPointPayload,
}

impl ContentRecord {
    pub fn new(content_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            content_id: Some(content_id.into()),
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_start_time(mut self, start_time: i64) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_channel_id(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    /// Validates the record and derives the text to embed and the payload to store.
    ///
    /// The start time is passed through untouched, its presentation is up to the callers.
    pub fn normalize(&self) -> Result<NormalizedContent, InvalidRecordError> {
        let content_id = non_blank(self.content_id.as_deref())
            .ok_or(InvalidRecordError::MissingContentId)?;
        let title = non_blank(self.title.as_deref())
            .ok_or_else(|| InvalidRecordError::MissingTitle(content_id.to_string()))?;
        let description = non_blank(self.description.as_deref());

        Ok(NormalizedContent {
            point_id: point_id_from_content_id(content_id),
            text: build_signature(title, description),
            payload: ContentPointPayload {
                content_id: content_id.to_string(),
                title: title.to_string(),
                description: description.map(str::to_string),
                start_time: self.start_time,
                channel_id: non_blank(self.channel_id.as_deref()).map(str::to_string),
            },
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

#[derive(thiserror::Error, Clone, PartialEq)]
pub enum InvalidRecordError {
    #[error("Invalid record: missing or empty content id")]
    MissingContentId,
    #[error("Invalid record {0}: missing or empty title")]
    MissingTitle(String),
    #[error("Invalid record: {reason}")]
    Malformed {
        content_id: Option<String>,
        reason: String,
    },
}

impl InvalidRecordError {
    /// The identifier of the rejected record, when it could be read
    pub fn content_id(&self) -> Option<&str> {
        match self {
            InvalidRecordError::MissingContentId => None,
            InvalidRecordError::MissingTitle(content_id) => Some(content_id),
            InvalidRecordError::Malformed { content_id, .. } => content_id.as_deref(),
        }
    }
}

impl std::fmt::Debug for InvalidRecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
