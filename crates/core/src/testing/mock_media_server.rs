//! Mock media server for testing.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::plex::{
    ActiveSession, LibrarySection, MediaInfo, MediaServer, PathMappings, PlexError,
};

/// A call made against the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaServerCall {
    GetMediaInfo(String),
    GetActiveSessions,
    SetActiveSessionSubtitle { rating_key: String, language: String },
    SetDefaultSubtitleStream { rating_key: String, language: String },
    RefreshMetadata(String),
    LibrarySections,
}

/// Mock implementation of the MediaServer trait.
///
/// Active-session selection succeeds only once `session_failures` calls have
/// failed, mimicking a session that shows up late.
#[derive(Debug, Clone)]
pub struct MockMediaServer {
    media: Arc<RwLock<HashMap<String, MediaInfo>>>,
    sessions: Arc<RwLock<Vec<ActiveSession>>>,
    libraries: Arc<RwLock<Vec<LibrarySection>>>,
    mappings: PathMappings,
    metadata_unavailable: Arc<RwLock<bool>>,
    session_failures: Arc<RwLock<u32>>,
    default_stream_fails: Arc<RwLock<bool>>,
    refresh_fails: Arc<RwLock<bool>>,
    calls: Arc<RwLock<Vec<MediaServerCall>>>,
}

impl Default for MockMediaServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMediaServer {
    pub fn new() -> Self {
        Self::with_mappings(&BTreeMap::new())
    }

    pub fn with_mappings(mappings: &BTreeMap<String, String>) -> Self {
        Self {
            media: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(RwLock::new(Vec::new())),
            libraries: Arc::new(RwLock::new(Vec::new())),
            mappings: PathMappings::new(mappings),
            metadata_unavailable: Arc::new(RwLock::new(false)),
            session_failures: Arc::new(RwLock::new(0)),
            default_stream_fails: Arc::new(RwLock::new(false)),
            refresh_fails: Arc::new(RwLock::new(false)),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn add_media(&self, info: MediaInfo) {
        self.media
            .write()
            .await
            .insert(info.rating_key.clone(), info);
    }

    pub async fn set_sessions(&self, sessions: Vec<ActiveSession>) {
        *self.sessions.write().await = sessions;
    }

    pub async fn set_libraries(&self, libraries: Vec<LibrarySection>) {
        *self.libraries.write().await = libraries;
    }

    /// Make every metadata lookup fail with a server error.
    pub async fn set_metadata_unavailable(&self, unavailable: bool) {
        *self.metadata_unavailable.write().await = unavailable;
    }

    /// Fail the next `n` active-session selections. `u32::MAX` fails them all.
    pub async fn fail_session_selection(&self, n: u32) {
        *self.session_failures.write().await = n;
    }

    pub async fn fail_default_stream(&self, fail: bool) {
        *self.default_stream_fails.write().await = fail;
    }

    pub async fn fail_refresh(&self, fail: bool) {
        *self.refresh_fails.write().await = fail;
    }

    pub async fn calls(&self) -> Vec<MediaServerCall> {
        self.calls.read().await.clone()
    }

    /// Count calls matching `predicate`.
    pub async fn count_calls(&self, predicate: impl Fn(&MediaServerCall) -> bool) -> usize {
        self.calls.read().await.iter().filter(|c| predicate(c)).count()
    }

    async fn record(&self, call: MediaServerCall) {
        self.calls.write().await.push(call);
    }
}

#[async_trait]
impl MediaServer for MockMediaServer {
    async fn get_media_info(&self, rating_key: &str) -> Result<MediaInfo, PlexError> {
        self.record(MediaServerCall::GetMediaInfo(rating_key.to_string()))
            .await;
        if *self.metadata_unavailable.read().await {
            return Err(PlexError::ApiError {
                status: 500,
                message: "mock metadata failure".to_string(),
            });
        }
        self.media
            .read()
            .await
            .get(rating_key)
            .cloned()
            .ok_or_else(|| PlexError::NotFound(rating_key.to_string()))
    }

    async fn get_active_sessions(&self) -> Result<Vec<ActiveSession>, PlexError> {
        self.record(MediaServerCall::GetActiveSessions).await;
        Ok(self.sessions.read().await.clone())
    }

    async fn set_active_session_subtitle(
        &self,
        rating_key: &str,
        language: &str,
    ) -> Result<(), PlexError> {
        self.record(MediaServerCall::SetActiveSessionSubtitle {
            rating_key: rating_key.to_string(),
            language: language.to_string(),
        })
        .await;

        let mut failures = self.session_failures.write().await;
        if *failures > 0 {
            if *failures != u32::MAX {
                *failures -= 1;
            }
            return Err(PlexError::NoActiveSession(rating_key.to_string()));
        }
        Ok(())
    }

    async fn set_default_subtitle_stream(
        &self,
        rating_key: &str,
        language: &str,
    ) -> Result<(), PlexError> {
        self.record(MediaServerCall::SetDefaultSubtitleStream {
            rating_key: rating_key.to_string(),
            language: language.to_string(),
        })
        .await;

        if *self.default_stream_fails.read().await {
            return Err(PlexError::SubtitleStreamNotFound {
                rating_key: rating_key.to_string(),
                language: language.to_string(),
            });
        }
        Ok(())
    }

    async fn refresh_metadata(&self, rating_key: &str) -> Result<(), PlexError> {
        self.record(MediaServerCall::RefreshMetadata(rating_key.to_string()))
            .await;
        if *self.refresh_fails.read().await {
            return Err(PlexError::Timeout);
        }
        Ok(())
    }

    async fn library_sections(&self) -> Result<Vec<LibrarySection>, PlexError> {
        self.record(MediaServerCall::LibrarySections).await;
        Ok(self.libraries.read().await.clone())
    }

    fn map_path(&self, plex_path: &str) -> PathBuf {
        self.mappings.apply(plex_path)
    }
}
