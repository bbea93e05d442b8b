//! Plex HTTP client.
//!
//! Requests carry `Accept: application/json` so every response is a JSON
//! `MediaContainer`.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::{debug, info, warn};

use crate::config::PlexConfig;
use crate::error::ErrorKind;
use crate::language::to_plex_code;
use crate::retry::RetryPolicy;

use super::types::{
    ActiveSession, LibraryLocation, LibrarySection, MediaInfo, MediaServer, PlexError,
    SubtitleStream,
};
use super::PathMappings;

const SUBTITLE_STREAM: u8 = 3;
const METADATA_ATTEMPTS: u32 = 3;
const METADATA_BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "MediaContainer")]
    container: T,
}

#[derive(Debug, Default, Deserialize)]
struct MetadataContainer {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<PlexMetadata>,
}

#[derive(Debug, Deserialize)]
struct PlexMetadata {
    #[serde(rename = "ratingKey", default)]
    rating_key: Option<String>,
    #[serde(rename = "type", default)]
    media_type: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "grandparentTitle", default)]
    grandparent_title: Option<String>,
    #[serde(default)]
    year: Option<u32>,
    #[serde(rename = "Guid", default)]
    guids: Vec<PlexGuid>,
    #[serde(rename = "Media", default)]
    media: Vec<PlexMedia>,
    #[serde(rename = "Session", default)]
    session: Option<PlexSession>,
    #[serde(rename = "Player", default)]
    player: Option<PlexPlayer>,
}

impl PlexMetadata {
    fn first_part(&self) -> Option<&PlexPart> {
        self.media.first().and_then(|m| m.parts.first())
    }

    fn imdb_id(&self) -> Option<String> {
        self.guids
            .iter()
            .find_map(|g| g.id.strip_prefix("imdb://"))
            .map(str::to_string)
    }
}

#[derive(Debug, Deserialize)]
struct PlexGuid {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PlexMedia {
    #[serde(rename = "Part", default)]
    parts: Vec<PlexPart>,
}

#[derive(Debug, Deserialize)]
struct PlexPart {
    #[serde(deserialize_with = "id_string")]
    id: String,
    #[serde(default)]
    file: Option<String>,
    #[serde(rename = "Stream", default)]
    streams: Vec<PlexStream>,
}

impl PlexPart {
    fn subtitle_stream_id(&self, plex_language: &str) -> Option<&str> {
        self.streams
            .iter()
            .filter(|s| s.stream_type == SUBTITLE_STREAM)
            .find(|s| s.language_code.as_deref() == Some(plex_language))
            .map(|s| s.id.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct PlexStream {
    #[serde(deserialize_with = "id_string")]
    id: String,
    #[serde(rename = "streamType")]
    stream_type: u8,
    #[serde(rename = "languageCode", default)]
    language_code: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    codec: Option<String>,
    #[serde(default)]
    selected: bool,
}

#[derive(Debug, Deserialize)]
struct PlexSession {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlexPlayer {
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "machineIdentifier", default)]
    machine_identifier: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SectionsContainer {
    #[serde(rename = "Directory", default)]
    directories: Vec<PlexDirectory>,
}

#[derive(Debug, Deserialize)]
struct PlexDirectory {
    #[serde(deserialize_with = "id_string")]
    key: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "type", default)]
    section_type: String,
    #[serde(default)]
    agent: String,
    #[serde(default)]
    scanner: String,
    #[serde(default)]
    language: String,
    #[serde(rename = "Location", default)]
    locations: Vec<PlexLocation>,
}

#[derive(Debug, Deserialize)]
struct PlexLocation {
    #[serde(deserialize_with = "id_string")]
    id: String,
    path: String,
}

/// Plex sends most ids as numbers but some as strings.
fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(i64),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    })
}

pub struct PlexClient {
    client: Client,
    base_url: String,
    token: String,
    mappings: PathMappings,
    metadata_retry: RetryPolicy,
}

impl PlexClient {
    pub fn new(config: &PlexConfig) -> Result<Self, PlexError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| PlexError::ConnectionFailed(e.to_string()))?;
        let metadata_retry = RetryPolicy::new(METADATA_ATTEMPTS, METADATA_BASE_DELAY)
            .map_err(|e| PlexError::ConnectionFailed(e.to_string()))?
            .retry_on(&[ErrorKind::MediaServer]);

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            mappings: PathMappings::new(&config.path_mappings),
            metadata_retry,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, PlexError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("Accept", "application/json")
            .header("X-Plex-Token", &self.token)
            .send()
            .await
            .map_err(map_send_error)?;

        let envelope: Envelope<T> = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| PlexError::ParseError(e.to_string()))?;
        Ok(envelope.container)
    }

    async fn put(&self, path: &str, query: &[(&str, &str)]) -> Result<(), PlexError> {
        let response = self
            .client
            .put(format!("{}{}", self.base_url, path))
            .header("Accept", "application/json")
            .header("X-Plex-Token", &self.token)
            .query(query)
            .send()
            .await
            .map_err(map_send_error)?;
        check_status(response).await?;
        Ok(())
    }

    async fn fetch_metadata(&self, rating_key: &str) -> Result<PlexMetadata, PlexError> {
        let container: MetadataContainer = self
            .get_json(&format!("/library/metadata/{}", rating_key))
            .await?;
        container
            .metadata
            .into_iter()
            .next()
            .ok_or_else(|| PlexError::NotFound(rating_key.to_string()))
    }

    async fn fetch_sessions(&self) -> Result<Vec<PlexMetadata>, PlexError> {
        let container: MetadataContainer = self.get_json("/status/sessions").await?;
        Ok(container.metadata)
    }

    /// Point `part_id` at the subtitle stream `stream_id`.
    async fn select_stream(&self, part_id: &str, stream_id: &str) -> Result<(), PlexError> {
        self.put(
            &format!("/library/parts/{}", part_id),
            &[("subtitleStreamID", stream_id)],
        )
        .await
    }

    /// Subtitle streams of an item.
    pub async fn subtitle_streams(&self, rating_key: &str) -> Result<Vec<SubtitleStream>, PlexError> {
        let metadata = self.fetch_metadata(rating_key).await?;
        Ok(metadata
            .media
            .iter()
            .flat_map(|m| m.parts.iter())
            .flat_map(|p| p.streams.iter())
            .filter(|s| s.stream_type == SUBTITLE_STREAM)
            .map(|s| SubtitleStream {
                id: s.id.clone(),
                language_code: s.language_code.clone().unwrap_or_default(),
                language: s.language.clone().unwrap_or_default(),
                codec: s.codec.clone().unwrap_or_default(),
                selected: s.selected,
            })
            .collect())
    }
}

#[async_trait]
impl MediaServer for PlexClient {
    async fn get_media_info(&self, rating_key: &str) -> Result<MediaInfo, PlexError> {
        debug!(rating_key, "Fetching media info");

        let metadata = self
            .metadata_retry
            .execute_with(
                || self.fetch_metadata(rating_key),
                |attempt, delay, e| {
                    warn!(rating_key, attempt = attempt + 1, ?delay, error = %e, "Metadata fetch failed, retrying")
                },
            )
            .await?;

        let media_type = metadata.media_type.clone().unwrap_or_default();
        // Episodes are searched by show name
        let title = match (&metadata.grandparent_title, media_type.as_str()) {
            (Some(show), "episode") => show.clone(),
            _ => metadata.title.clone().unwrap_or_default(),
        };

        let file_path = metadata
            .first_part()
            .and_then(|p| p.file.as_deref())
            .map(|f| self.mappings.apply(f));

        let info = MediaInfo {
            rating_key: rating_key.to_string(),
            title,
            media_type,
            year: metadata.year,
            imdb_id: metadata.imdb_id(),
            file_path,
        };
        info!(title = %info.title, year = ?info.year, media_type = %info.media_type, "Retrieved media info");
        Ok(info)
    }

    async fn get_active_sessions(&self) -> Result<Vec<ActiveSession>, PlexError> {
        let sessions = self
            .fetch_sessions()
            .await?
            .into_iter()
            .filter_map(|m| {
                let session_id = m.session.and_then(|s| s.id)?;
                Some(ActiveSession {
                    rating_key: m.rating_key?,
                    session_id,
                    title: m.title,
                    player: m.player.and_then(|p| p.title),
                })
            })
            .collect();
        Ok(sessions)
    }

    async fn set_active_session_subtitle(
        &self,
        rating_key: &str,
        language: &str,
    ) -> Result<(), PlexError> {
        let sessions = self.fetch_sessions().await?;
        let video = sessions
            .iter()
            .find(|m| {
                m.rating_key.as_deref() == Some(rating_key)
                    && m.session.as_ref().and_then(|s| s.id.as_ref()).is_some()
            })
            .ok_or_else(|| PlexError::NoActiveSession(rating_key.to_string()))?;

        if video
            .player
            .as_ref()
            .and_then(|p| p.machine_identifier.as_ref())
            .is_none()
        {
            warn!(rating_key, "Active session has no player machine identifier");
            return Err(PlexError::NoActiveSession(rating_key.to_string()));
        }

        let part = video
            .first_part()
            .ok_or_else(|| PlexError::NoMediaPart(rating_key.to_string()))?;
        let plex_language = to_plex_code(language);
        let stream_id = part.subtitle_stream_id(&plex_language).ok_or_else(|| {
            PlexError::SubtitleStreamNotFound {
                rating_key: rating_key.to_string(),
                language: plex_language.clone(),
            }
        })?;

        self.select_stream(&part.id, stream_id).await?;
        info!(rating_key, language = %plex_language, stream_id, "Set subtitle on active session");
        Ok(())
    }

    async fn set_default_subtitle_stream(
        &self,
        rating_key: &str,
        language: &str,
    ) -> Result<(), PlexError> {
        let metadata = self.fetch_metadata(rating_key).await?;
        let part = metadata
            .first_part()
            .ok_or_else(|| PlexError::NoMediaPart(rating_key.to_string()))?;
        let plex_language = to_plex_code(language);
        let stream_id = part.subtitle_stream_id(&plex_language).ok_or_else(|| {
            PlexError::SubtitleStreamNotFound {
                rating_key: rating_key.to_string(),
                language: plex_language.clone(),
            }
        })?;

        self.select_stream(&part.id, stream_id).await?;
        info!(rating_key, language = %plex_language, stream_id, "Set default subtitle stream");
        Ok(())
    }

    async fn refresh_metadata(&self, rating_key: &str) -> Result<(), PlexError> {
        info!(rating_key, "Refreshing Plex metadata");
        self.put(&format!("/library/metadata/{}/refresh", rating_key), &[])
            .await
    }

    async fn library_sections(&self) -> Result<Vec<LibrarySection>, PlexError> {
        let container: SectionsContainer = self
            .metadata_retry
            .execute(|| self.get_json("/library/sections"))
            .await?;

        let sections: Vec<LibrarySection> = container
            .directories
            .into_iter()
            .map(|d| LibrarySection {
                key: d.key,
                title: d.title,
                section_type: d.section_type,
                agent: d.agent,
                scanner: d.scanner,
                language: d.language,
                locations: d
                    .locations
                    .into_iter()
                    .map(|l| LibraryLocation {
                        id: l.id,
                        path: l.path,
                    })
                    .collect(),
            })
            .collect();
        info!(count = sections.len(), "Retrieved library sections");
        Ok(sections)
    }

    fn map_path(&self, plex_path: &str) -> PathBuf {
        self.mappings.apply(plex_path)
    }
}

fn map_send_error(e: reqwest::Error) -> PlexError {
    if e.is_timeout() {
        PlexError::Timeout
    } else if e.is_connect() {
        PlexError::ConnectionFailed(e.to_string())
    } else {
        PlexError::ApiError {
            status: e.status().map(|s| s.as_u16()).unwrap_or(0),
            message: e.to_string(),
        }
    }
}

async fn check_status(response: Response) -> Result<Response, PlexError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PlexError::ApiError {
        status: status.as_u16(),
        message: body.chars().take(200).collect(),
    })
}
