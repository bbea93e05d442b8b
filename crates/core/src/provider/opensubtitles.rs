//! OpenSubtitles.com REST provider.
//!
//! Auth is a JWT from `POST /login`, cached in a [`TokenCache`] for the
//! configured TTL. A 401 on any authenticated call drops the token and the
//! call is repeated once after a fresh login.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::OpenSubtitlesConfig;
use crate::language::{allowed_codes, to_alpha2};

use super::token::TokenCache;
use super::types::{
    ProviderError, SearchCandidate, SearchQuery, SearchResponse, SubtitleProvider,
};

const PROVIDER_NAME: &str = "opensubtitles";
const USER_AGENT: &str = concat!("subfetch v", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubtitlesResponse {
    #[serde(default)]
    data: Vec<SubtitleData>,
}

#[derive(Debug, Deserialize)]
struct SubtitleData {
    attributes: SubtitleAttributes,
}

#[derive(Debug, Deserialize)]
struct SubtitleAttributes {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    release: Option<String>,
    #[serde(default)]
    download_count: Option<u64>,
    #[serde(default)]
    files: Vec<SubtitleFile>,
}

#[derive(Debug, Deserialize)]
struct SubtitleFile {
    file_id: u64,
    #[serde(default)]
    file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    link: Option<String>,
}

pub struct OpenSubtitlesProvider {
    client: Client,
    download_client: Client,
    config: OpenSubtitlesConfig,
    tokens: TokenCache,
}

impl OpenSubtitlesProvider {
    pub fn new(config: OpenSubtitlesConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProviderError::ConnectionFailed(e.to_string()))?;
        let download_client = Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs as u64))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProviderError::ConnectionFailed(e.to_string()))?;
        let tokens = TokenCache::new(Duration::from_secs(config.token_ttl_secs));

        Ok(Self {
            client,
            download_client,
            config,
            tokens,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    async fn login(&self) -> Result<String, ProviderError> {
        info!("Authenticating with OpenSubtitles API");

        let response = self
            .client
            .post(self.url("/login"))
            .header("Api-Key", &self.config.api_key)
            .json(&serde_json::json!({
                "username": self.config.username,
                "password": self.config.password,
            }))
            .send()
            .await
            .map_err(map_send_error)?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::AuthFailed(truncate(&body)));
        }
        let login: LoginResponse = parse_json(check_status(response).await?).await?;

        login
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::AuthFailed("login response carried no token".into()))
    }

    async fn token(&self) -> Result<String, ProviderError> {
        self.tokens.get_or_refresh(|| self.login()).await
    }

    /// Send an authenticated request, re-authenticating once on 401.
    async fn send_authenticated<T, F>(
        &self,
        hint: Option<&str>,
        build: F,
    ) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
        F: Fn(&str) -> RequestBuilder,
    {
        let token = match hint {
            Some(t) => t.to_string(),
            None => self.token().await?,
        };

        let response = build(&token).send().await.map_err(map_send_error)?;
        let response = if response.status() == StatusCode::UNAUTHORIZED {
            warn!("OpenSubtitles token rejected, re-authenticating");
            self.tokens.invalidate(&token);
            let token = self.token().await?;
            build(&token).send().await.map_err(map_send_error)?
        } else {
            response
        };

        parse_json(check_status(response).await?).await
    }

    fn authed(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request
            .header("Api-Key", &self.config.api_key)
            .bearer_auth(token)
    }
}

#[async_trait]
impl SubtitleProvider for OpenSubtitlesProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, ProviderError> {
        let language = to_alpha2(&query.language)
            .map(str::to_string)
            .unwrap_or_else(|| query.language.to_lowercase());

        let mut params: Vec<(&str, String)> = vec![("languages", language)];
        match &query.imdb_id {
            Some(imdb_id) => {
                info!(imdb_id = %imdb_id, language = %query.language, "Searching by IMDb id");
                params.push(("imdb_id", imdb_id.trim_start_matches("tt").to_string()));
            }
            None => {
                info!(title = %query.title, language = %query.language, "Searching by title");
                params.push(("query", query.title.clone()));
                if let Some(year) = query.year {
                    params.push(("year", year.to_string()));
                }
            }
        }

        let url = self.url("/subtitles");
        let response: SubtitlesResponse = self
            .send_authenticated(None, |token| {
                self.authed(self.client.get(&url), token).query(&params)
            })
            .await?;

        let total = response.data.len();
        let allowed = allowed_codes(&query.language);
        let candidates: Vec<SearchCandidate> = response
            .data
            .into_iter()
            .filter_map(|sub| {
                let attrs = sub.attributes;
                let lang = attrs.language.unwrap_or_default().to_lowercase();
                if !allowed.contains(&lang) {
                    return None;
                }
                let file = attrs.files.into_iter().next()?;
                Some(SearchCandidate {
                    id: file.file_id.to_string(),
                    language: query.language.clone(),
                    release: attrs.release.unwrap_or_default(),
                    filename: file.file_name.unwrap_or_default(),
                    download_ref: file.file_id.to_string(),
                    perfect_match: false,
                    score: 0.0,
                    popularity: attrs.download_count.unwrap_or(0),
                    provider: PROVIDER_NAME.to_string(),
                })
            })
            .collect();

        info!(
            total,
            kept = candidates.len(),
            language = %query.language,
            "OpenSubtitles search complete"
        );

        Ok(SearchResponse {
            candidates,
            auth_token: self.tokens.current(),
        })
    }

    async fn download(
        &self,
        candidate: &SearchCandidate,
        output: &Path,
        auth_token: Option<&str>,
    ) -> Result<(), ProviderError> {
        let file_id: u64 = candidate.download_ref.parse().map_err(|_| {
            ProviderError::ParseError(format!("invalid file id '{}'", candidate.download_ref))
        })?;

        let url = self.url("/download");
        let body = serde_json::json!({ "file_id": file_id });
        let response: DownloadResponse = self
            .send_authenticated(auth_token, |token| {
                self.authed(self.client.post(&url), token).json(&body)
            })
            .await?;

        let link = response
            .link
            .filter(|l| !l.is_empty())
            .ok_or(ProviderError::MissingDownloadLink)?;
        debug!(link = %link.chars().take(50).collect::<String>(), "Downloading subtitle");

        let response = self
            .download_client
            .get(&link)
            .send()
            .await
            .map_err(map_send_error)?;
        let bytes = check_status(response)
            .await?
            .bytes()
            .await
            .map_err(map_send_error)?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ProviderError::io(parent, e))?;
        }
        tokio::fs::write(output, &bytes)
            .await
            .map_err(|e| ProviderError::io(output, e))?;

        info!(path = %output.display(), bytes = bytes.len(), "Downloaded subtitle");
        Ok(())
    }
}

fn map_send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else if e.is_connect() {
        ProviderError::ConnectionFailed(e.to_string())
    } else {
        ProviderError::ApiError {
            status: e.status().map(|s| s.as_u16()).unwrap_or(0),
            message: e.to_string(),
        }
    }
}

async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::ApiError {
        status: status.as_u16(),
        message: truncate(&body),
    })
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    response
        .json()
        .await
        .map_err(|e| ProviderError::ParseError(e.to_string()))
}

fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::ReleaseFingerprint;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> OpenSubtitlesConfig {
        OpenSubtitlesConfig {
            username: "user".into(),
            password: "pass".into(),
            api_key: "key".into(),
            base_url: base_url.into(),
            timeout_secs: 5,
            download_timeout_secs: 5,
            token_ttl_secs: 3600,
        }
    }

    fn query(language: &str, imdb_id: Option<&str>) -> SearchQuery {
        SearchQuery {
            title: "Heat".into(),
            year: Some(1995),
            imdb_id: imdb_id.map(str::to_string),
            language: language.into(),
            fingerprint: ReleaseFingerprint::default(),
            filename: None,
        }
    }

    async fn mount_login(server: &MockServer, token: &str) {
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(header("Api-Key", "key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": token })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_search_by_imdb_filters_language() {
        let server = MockServer::start().await;
        mount_login(&server, "jwt").await;
        Mock::given(method("GET"))
            .and(path("/subtitles"))
            .and(query_param("imdb_id", "0113277"))
            .and(query_param("languages", "nl"))
            .and(header("Authorization", "Bearer jwt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "attributes": {
                        "language": "nl",
                        "release": "Heat.1995.1080p.BluRay.x264-SPARKS",
                        "download_count": 321,
                        "files": [{ "file_id": 11, "file_name": "heat.srt" }, { "file_id": 12 }]
                    }},
                    { "attributes": {
                        "language": "en",
                        "release": "Heat.1995.720p",
                        "files": [{ "file_id": 21 }]
                    }},
                    { "attributes": { "language": "nl", "files": [] } }
                ]
            })))
            .mount(&server)
            .await;

        let provider = OpenSubtitlesProvider::new(config(&server.uri())).unwrap();
        let response = provider.search(&query("nl", Some("tt0113277"))).await.unwrap();

        assert_eq!(response.candidates.len(), 1);
        let c = &response.candidates[0];
        assert_eq!(c.id, "11");
        assert_eq!(c.download_ref, "11");
        assert_eq!(c.filename, "heat.srt");
        assert_eq!(c.popularity, 321);
        assert_eq!(c.provider, "opensubtitles");
        assert_eq!(c.language, "nl");
        assert_eq!(response.auth_token.as_deref(), Some("jwt"));
    }

    #[tokio::test]
    async fn test_search_by_title_and_year() {
        let server = MockServer::start().await;
        mount_login(&server, "jwt").await;
        Mock::given(method("GET"))
            .and(path("/subtitles"))
            .and(query_param("query", "Heat"))
            .and(query_param("year", "1995"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenSubtitlesProvider::new(config(&server.uri())).unwrap();
        let response = provider.search(&query("en", None)).await.unwrap();
        assert!(response.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_login_is_cached_across_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "jwt" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/subtitles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;

        let provider = OpenSubtitlesProvider::new(config(&server.uri())).unwrap();
        provider.search(&query("en", None)).await.unwrap();
        provider.search(&query("en", None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_unauthorized_relogs_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "jwt" })))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/subtitles"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/subtitles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;

        let provider = OpenSubtitlesProvider::new(config(&server.uri())).unwrap();
        assert!(provider.search(&query("en", None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let provider = OpenSubtitlesProvider::new(config(&server.uri())).unwrap();
        let err = provider.search(&query("en", None)).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthFailed(_)));
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let server = MockServer::start().await;
        mount_login(&server, "jwt").await;
        Mock::given(method("POST"))
            .and(path("/download"))
            .and(body_json(json!({ "file_id": 11 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "link": format!("{}/files/11.srt", server.uri())
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/11.srt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("1\n00:00:01,000 --> 00:00:02,000\nHi\n"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested").join("Heat.en.srt");
        let provider = OpenSubtitlesProvider::new(config(&server.uri())).unwrap();
        let candidate = crate::testing::fixtures::candidate("11", 5);

        provider.download(&candidate, &output, None).await.unwrap();
        let written = std::fs::read_to_string(&output).unwrap();
        assert!(written.contains("Hi"));
    }

    #[tokio::test]
    async fn test_download_server_error_is_communication_error() {
        let server = MockServer::start().await;
        mount_login(&server, "jwt").await;
        Mock::given(method("POST"))
            .and(path("/download"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let provider = OpenSubtitlesProvider::new(config(&server.uri())).unwrap();
        let candidate = crate::testing::fixtures::candidate("11", 5);

        let err = provider
            .download(&candidate, &dir.path().join("x.srt"), Some("jwt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ApiError { status: 503, .. }));
        assert_eq!(
            crate::error::Classify::kind(&err),
            crate::error::ErrorKind::ProviderCommunication
        );
    }

    #[tokio::test]
    async fn test_download_missing_link() {
        let server = MockServer::start().await;
        mount_login(&server, "jwt").await;
        Mock::given(method("POST"))
            .and(path("/download"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "remaining": 0 })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let provider = OpenSubtitlesProvider::new(config(&server.uri())).unwrap();
        let candidate = crate::testing::fixtures::candidate("11", 5);

        let err = provider
            .download(&candidate, &dir.path().join("x.srt"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingDownloadLink));
    }
}
