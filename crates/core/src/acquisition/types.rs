//! Types for the subtitle acquisition pipeline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::config::SubtitlesConfig;
use crate::error::{Classify, ErrorKind};
use crate::language::VerificationError;
use crate::provider::ProviderError;
use crate::retry::RetryError;

/// Probe order for existing sidecar subtitles.
pub const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "ass", "ssa", "vtt"];

/// Extension of every file the pipeline writes.
pub const OUTPUT_EXTENSION: &str = "srt";

/// One media item to fetch subtitles for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionRequest {
    /// Local path of the media file.
    pub media_path: PathBuf,
    pub title: String,
    pub year: Option<u32>,
    pub imdb_id: Option<String>,
}

/// Behaviour switches, taken from `[subtitles]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionSettings {
    /// Ordered; the first entry is the primary language.
    pub languages: Vec<String>,
    pub use_release_matching: bool,
    pub upgrade_on_perfect_match: bool,
    pub upgrade_on_popular: bool,
    pub popular_download_threshold: u64,
    pub download_attempts: u32,
    pub download_base_delay: Duration,
}

impl From<&SubtitlesConfig> for AcquisitionSettings {
    fn from(config: &SubtitlesConfig) -> Self {
        Self {
            languages: config.languages.clone(),
            use_release_matching: config.use_release_matching,
            upgrade_on_perfect_match: config.upgrade_on_perfect_match,
            upgrade_on_popular: config.upgrade_on_popular,
            popular_download_threshold: config.popular_download_threshold,
            download_attempts: config.download_attempts,
            download_base_delay: Duration::from_millis(config.download_base_delay_ms),
        }
    }
}

/// Where the media lives and which subtitles already sit next to it.
///
/// Rebuilt from the filesystem on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLocation {
    pub dir: PathBuf,
    /// File name without extension.
    pub base_name: String,
    pub existing: HashMap<String, PathBuf>,
}

impl MediaLocation {
    /// `{dir}/{base}.{language}.srt`
    pub fn output_path(&self, language: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}.{}", self.base_name, language, OUTPUT_EXTENSION))
    }

    pub fn existing_for(&self, language: &str) -> Option<&Path> {
        self.existing.get(language).map(PathBuf::as_path)
    }
}

/// Why an existing subtitle was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeReason {
    PerfectMatch,
    Popular,
}

impl UpgradeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpgradeReason::PerfectMatch => "perfect_match",
            UpgradeReason::Popular => "popular",
        }
    }
}

/// A subtitle written by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    /// Configured language code.
    pub language: String,
    /// ISO 639-2/T code Plex uses for the stream.
    pub language_code: String,
    pub provider: String,
    pub release: String,
    pub perfect_match: bool,
    /// An existing subtitle for this language was replaced.
    pub upgraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_reason: Option<UpgradeReason>,
}

/// How a pipeline run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AcquisitionOutcome {
    Downloaded(DownloadOutcome),
    /// An existing subtitle was kept; nothing was written.
    KeptExisting { language: String, path: PathBuf },
    /// No language produced a subtitle.
    NotFound,
}

impl AcquisitionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AcquisitionOutcome::Downloaded(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            AcquisitionOutcome::Downloaded(_) => "downloaded",
            AcquisitionOutcome::KeptExisting { .. } => "kept_existing",
            AcquisitionOutcome::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("no subtitle languages configured")]
    NoLanguages,

    #[error("invalid download retry settings: {0}")]
    InvalidRetry(#[from] RetryError),

    #[error("media path has no file name: {0}")]
    InvalidMediaPath(PathBuf),
}

impl Classify for AcquisitionError {
    fn kind(&self) -> ErrorKind {
        match self {
            AcquisitionError::NoLanguages | AcquisitionError::InvalidRetry(_) => {
                ErrorKind::Configuration
            }
            AcquisitionError::InvalidMediaPath(_) => ErrorKind::Other,
        }
    }
}

/// Failure of one download+verify unit.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Verification(#[from] VerificationError),
}

impl Classify for AttemptError {
    fn kind(&self) -> ErrorKind {
        match self {
            AttemptError::Provider(e) => e.kind(),
            AttemptError::Verification(e) => e.kind(),
        }
    }
}
