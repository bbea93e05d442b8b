//! Types shared by subtitle providers.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{Classify, ErrorKind};
use crate::release::ReleaseFingerprint;

/// What to search for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Movie title, or show title for episodes.
    pub title: String,
    pub year: Option<u32>,
    /// IMDb id such as `tt0113277`. Preferred over title search when known.
    pub imdb_id: Option<String>,
    /// Configured language code.
    pub language: String,
    pub fingerprint: ReleaseFingerprint,
    /// Media file name, for providers that can hash or match on it.
    pub filename: Option<String>,
}

/// One subtitle offered by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    /// Provider-scoped id.
    pub id: String,
    pub language: String,
    /// Release label the uploader attached.
    pub release: String,
    pub filename: String,
    /// Opaque reference handed back to the provider's `download`.
    pub download_ref: String,
    /// Every fingerprint token occurs in `release` + `filename`.
    pub perfect_match: bool,
    /// Fraction of fingerprint tokens found, 0.0 to 1.0.
    pub score: f64,
    /// Provider-reported download count.
    pub popularity: u64,
    pub provider: String,
}

/// Candidates from one provider plus the auth token used to obtain them.
#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
    pub candidates: Vec<SearchCandidate>,
    pub auth_token: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Provider request timed out")]
    Timeout,

    #[error("Provider authentication failed: {0}")]
    AuthFailed(String),

    #[error("Provider API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse provider response: {0}")]
    ParseError(String),

    #[error("Provider returned no download link")]
    MissingDownloadLink,

    #[error("Failed to write subtitle {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProviderError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl Classify for ProviderError {
    fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Io { .. } => ErrorKind::Other,
            _ => ErrorKind::ProviderCommunication,
        }
    }
}

/// A subtitle source.
#[async_trait]
pub trait SubtitleProvider: Send + Sync {
    /// Provider name for logging and outcomes.
    fn name(&self) -> &str;

    /// Find candidates for one language. Candidates come back unscored.
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, ProviderError>;

    /// Fetch `candidate` and write it to `output`, creating parent directories.
    async fn download(
        &self,
        candidate: &SearchCandidate,
        output: &Path,
        auth_token: Option<&str>,
    ) -> Result<(), ProviderError>;
}
