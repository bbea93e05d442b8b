//! Testing utilities and mock implementations.
//!
//! Mocks of every external capability (subtitle providers, the media
//! server, language verification) so the pipeline, activation and webhook
//! handling can be exercised end to end without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use subfetch_core::testing::{fixtures, MockMediaServer, MockProvider, MockVerifier};
//!
//! let provider = MockProvider::new("mock");
//! provider.set_results("en", vec![fixtures::candidate("1", 10)]).await;
//!
//! let server = MockMediaServer::new();
//! server.add_media(fixtures::media_info("42", "/media/Heat.mkv")).await;
//! ```

mod mock_media_server;
mod mock_provider;
mod mock_verifier;

pub use mock_media_server::{MediaServerCall, MockMediaServer};
pub use mock_provider::{MockProvider, RecordedDownload};
pub use mock_verifier::MockVerifier;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::PathBuf;

    use crate::plex::{LibraryLocation, LibrarySection, MediaInfo};
    use crate::provider::SearchCandidate;

    /// A candidate with no release text and the given popularity.
    pub fn candidate(id: &str, popularity: u64) -> SearchCandidate {
        SearchCandidate {
            id: id.to_string(),
            language: "en".to_string(),
            release: String::new(),
            filename: format!("{}.srt", id),
            download_ref: id.to_string(),
            perfect_match: false,
            score: 0.0,
            popularity,
            provider: "mock".to_string(),
        }
    }

    /// A candidate whose release label is `release`.
    pub fn release_candidate(id: &str, release: &str, popularity: u64) -> SearchCandidate {
        SearchCandidate {
            release: release.to_string(),
            ..candidate(id, popularity)
        }
    }

    /// Movie metadata with a local file path.
    pub fn media_info(rating_key: &str, file_path: &str) -> MediaInfo {
        MediaInfo {
            rating_key: rating_key.to_string(),
            title: "Heat".to_string(),
            media_type: "movie".to_string(),
            year: Some(1995),
            imdb_id: Some("tt0113277".to_string()),
            file_path: Some(PathBuf::from(file_path)),
        }
    }

    pub fn library_section(key: &str, title: &str, paths: &[&str]) -> LibrarySection {
        LibrarySection {
            key: key.to_string(),
            title: title.to_string(),
            section_type: "movie".to_string(),
            agent: "tv.plex.agents.movie".to_string(),
            scanner: "Plex Movie".to_string(),
            language: "en-US".to_string(),
            locations: paths
                .iter()
                .enumerate()
                .map(|(i, p)| LibraryLocation {
                    id: (i + 1).to_string(),
                    path: p.to_string(),
                })
                .collect(),
        }
    }

    /// Plex webhook JSON for `event` on `rating_key`.
    pub fn webhook_payload(event: &str, rating_key: &str) -> String {
        serde_json::json!({
            "event": event,
            "user": true,
            "owner": true,
            "Account": { "id": 1, "title": "owner" },
            "Player": { "local": true, "title": "Living Room" },
            "Metadata": {
                "ratingKey": rating_key,
                "type": "movie",
                "title": "Heat"
            }
        })
        .to_string()
    }

    /// SRT text long enough for language detection.
    pub fn english_srt() -> &'static str {
        "1\n00:00:01,000 --> 00:00:04,000\nWhere are you going tonight?\n\n2\n00:00:05,000 --> 00:00:08,000\nI told you already, I am going to the station to meet my brother.\n\n3\n00:00:09,000 --> 00:00:12,000\nHe is arriving on the last train from the city and he has no money.\n"
    }
}
