//! Webhook payloads, responses and errors.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::acquisition::AcquisitionError;
use crate::activation::ActivationResult;
use crate::error::{Classify, ErrorKind};
use crate::plex::PlexError;
use crate::pool::PoolError;

/// Events that trigger acquisition. Everything else is acknowledged and ignored.
pub const PROCESSABLE_EVENTS: &[&str] = &["media.play", "media.resume"];

/// The parts of a Plex webhook the service reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(rename = "Metadata", default)]
    pub metadata: Option<WebhookMetadata>,
}

impl WebhookPayload {
    pub fn rating_key(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.rating_key.as_deref())
            .filter(|k| !k.is_empty())
    }

    pub fn is_processable(&self) -> bool {
        self.event
            .as_deref()
            .is_some_and(|e| PROCESSABLE_EVENTS.contains(&e))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookMetadata {
    #[serde(rename = "ratingKey", default, deserialize_with = "optional_key")]
    pub rating_key: Option<String>,
    #[serde(rename = "type", default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

fn optional_key<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Key {
        Str(String),
        Num(i64),
    }
    Ok(Option::<Key>::deserialize(deserializer)?.map(|k| match k {
        Key::Str(s) => s,
        Key::Num(n) => n.to_string(),
    }))
}

/// JSON body of a webhook acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookBody {
    Success {
        subtitle: PathBuf,
        language: String,
        language_code: String,
        provider: String,
        upgraded: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        activation: Option<ActivationResult>,
    },
    KeptExisting {
        language: String,
        existing: PathBuf,
    },
    Ignored {
        event: Option<String>,
    },
    NotFound {
        message: String,
    },
    Error {
        message: String,
    },
}

impl WebhookBody {
    pub fn label(&self) -> &'static str {
        match self {
            WebhookBody::Success { .. } => "success",
            WebhookBody::KeptExisting { .. } => "kept_existing",
            WebhookBody::Ignored { .. } => "ignored",
            WebhookBody::NotFound { .. } => "not_found",
            WebhookBody::Error { .. } => "error",
        }
    }
}

/// HTTP status plus body, independent of the HTTP framework.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookResponse {
    pub status_code: u16,
    pub body: WebhookBody,
}

impl WebhookResponse {
    pub fn new(status_code: u16, body: WebhookBody) -> Self {
        Self { status_code, body }
    }
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("No rating key")]
    MissingRatingKey,

    #[error("Could not get media info: {0}")]
    Metadata(#[from] PlexError),

    #[error("Could not get file path for rating key {0}")]
    MissingFilePath(String),

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error("Worker pool unavailable: {0}")]
    Pool(#[from] PoolError),
}

impl WebhookError {
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookError::InvalidJson(_) | WebhookError::MissingRatingKey => 400,
            _ => 500,
        }
    }

    pub fn into_response(self) -> WebhookResponse {
        WebhookResponse::new(
            self.status_code(),
            WebhookBody::Error {
                message: self.to_string(),
            },
        )
    }
}

impl Classify for WebhookError {
    fn kind(&self) -> ErrorKind {
        match self {
            WebhookError::InvalidJson(_) | WebhookError::MissingRatingKey => ErrorKind::Other,
            WebhookError::Metadata(e) => e.kind(),
            WebhookError::MissingFilePath(_) => ErrorKind::MediaServer,
            WebhookError::Acquisition(e) => e.kind(),
            WebhookError::Pool(e) => e.kind(),
        }
    }
}
