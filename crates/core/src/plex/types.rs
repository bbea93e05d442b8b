//! Plex domain types and the media server capability.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::error::{Classify, ErrorKind};

/// What the pipeline needs to know about a library item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaInfo {
    pub rating_key: String,
    /// Movie title, or the show title for episodes.
    pub title: String,
    /// `movie`, `episode`, ...
    pub media_type: String,
    pub year: Option<u32>,
    pub imdb_id: Option<String>,
    /// Local path of the first media part, after path mapping.
    pub file_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveSession {
    pub rating_key: String,
    pub session_id: String,
    pub title: Option<String>,
    pub player: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtitleStream {
    pub id: String,
    pub language_code: String,
    pub language: String,
    pub codec: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryLocation {
    pub id: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibrarySection {
    pub key: String,
    pub title: String,
    #[serde(rename = "type")]
    pub section_type: String,
    pub agent: String,
    pub scanner: String,
    pub language: String,
    pub locations: Vec<LibraryLocation>,
}

#[derive(Debug, Error)]
pub enum PlexError {
    #[error("Plex connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Plex request timed out")]
    Timeout,

    #[error("Plex API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse Plex response: {0}")]
    ParseError(String),

    #[error("No metadata for rating key {0}")]
    NotFound(String),

    #[error("No active session for rating key {0}")]
    NoActiveSession(String),

    #[error("No media part for rating key {0}")]
    NoMediaPart(String),

    #[error("No {language} subtitle stream for rating key {rating_key}")]
    SubtitleStreamNotFound {
        rating_key: String,
        language: String,
    },
}

impl Classify for PlexError {
    fn kind(&self) -> ErrorKind {
        match self {
            PlexError::NotFound(_) => ErrorKind::NotFound,
            PlexError::NoActiveSession(_)
            | PlexError::NoMediaPart(_)
            | PlexError::SubtitleStreamNotFound { .. } => ErrorKind::Activation,
            _ => ErrorKind::MediaServer,
        }
    }
}

/// Operations the service needs from the media server.
#[async_trait]
pub trait MediaServer: Send + Sync {
    async fn get_media_info(&self, rating_key: &str) -> Result<MediaInfo, PlexError>;

    async fn get_active_sessions(&self) -> Result<Vec<ActiveSession>, PlexError>;

    /// Switch the live playback session of `rating_key` to the `language` subtitle.
    async fn set_active_session_subtitle(
        &self,
        rating_key: &str,
        language: &str,
    ) -> Result<(), PlexError>;

    /// Store `language` as the item's subtitle for future plays.
    async fn set_default_subtitle_stream(
        &self,
        rating_key: &str,
        language: &str,
    ) -> Result<(), PlexError>;

    /// Ask Plex to rescan the item so new sidecar files show up as streams.
    async fn refresh_metadata(&self, rating_key: &str) -> Result<(), PlexError>;

    async fn library_sections(&self) -> Result<Vec<LibrarySection>, PlexError>;

    /// Translate a path as Plex sees it into a local path.
    fn map_path(&self, plex_path: &str) -> PathBuf;
}
