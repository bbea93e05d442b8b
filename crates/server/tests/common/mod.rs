//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock dependencies injected, enabling end-to-end webhook tests
//! without Plex or OpenSubtitles.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use subfetch_core::{
    load_config_from_str,
    testing::{MockMediaServer, MockProvider, MockVerifier},
    AcquisitionPipeline, AcquisitionSettings, MediaServer, SceneNameGuesser, SessionActivator,
    SubtitleProvider, WebhookService, WorkerPool,
};

/// Re-export fixtures for test convenience
pub use subfetch_core::testing::fixtures;

/// Plex-side library root mapped onto the fixture's temp directory.
pub const PLEX_ROOT: &str = "/plex/movies";

/// Test fixture for E2E testing with mock dependencies.
///
/// Provides an in-process server with fully controllable mocks for:
/// - The media server (MockMediaServer)
/// - Subtitle search and download (MockProvider)
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_webhook() {
///     let fixture = TestFixture::new().await;
///     let media = fixture.add_movie("42", "Heat.1995.mkv").await;
///
///     let response = fixture
///         .post_raw("/webhook", &fixtures::webhook_payload("media.play", "42"))
///         .await;
///     assert_eq!(response.status, 404);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock media server - register media, sessions and libraries
    pub media_server: MockMediaServer,
    /// Mock provider - configure search results
    pub provider: MockProvider,
    /// Local library directory `PLEX_ROOT` maps onto
    pub library_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub discovery_enabled: bool,
    pub webhook_path: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            discovery_enabled: true,
            webhook_path: "/webhook".to_string(),
        }
    }
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let library_dir = TempDir::new().expect("Failed to create library dir");
        let library_path = library_dir.path().display().to_string();

        let config = load_config_from_str(&format!(
            r#"
[server]
host = "127.0.0.1"
port = 9000
webhook_path = "{webhook_path}"

[plex]
url = "http://plex.test:32400"
token = "plex-token"

[plex.path_mappings]
"{PLEX_ROOT}" = "{library_path}"

[opensubtitles]
username = "user"
password = "secret-password"
api_key = "secret-key"

[subtitles]
languages = ["en", "nl"]
download_base_delay_ms = 1
session_base_delay_ms = 1

[discovery]
enabled = {discovery}
"#,
            webhook_path = test_config.webhook_path,
            discovery = test_config.discovery_enabled,
        ))
        .expect("Failed to parse test config");

        let media_server = MockMediaServer::with_mappings(&config.plex.path_mappings);
        let provider = MockProvider::new("mock");

        let server: Arc<dyn MediaServer> = Arc::new(media_server.clone());
        let pipeline = AcquisitionPipeline::new(
            vec![Arc::new(provider.clone()) as Arc<dyn SubtitleProvider>],
            Arc::new(MockVerifier::new()),
            Arc::new(SceneNameGuesser::new()),
            AcquisitionSettings::from(&config.subtitles),
        )
        .expect("Failed to create pipeline");
        let activator = SessionActivator::new(Arc::clone(&server), 3, Duration::from_millis(1))
            .expect("Failed to create activator");
        let webhooks = Arc::new(WebhookService::new(
            Arc::clone(&server),
            Arc::new(pipeline),
            activator,
            WorkerPool::new(config.workers.max_concurrent).expect("Failed to create pool"),
            config.subtitles.auto_select,
        ));

        let state = Arc::new(subfetch_server::state::AppState::new(
            config, webhooks, server,
        ));
        let router = subfetch_server::api::create_router(state);

        Self {
            router,
            media_server,
            provider,
            library_dir,
        }
    }

    /// Create a media file in the library and register it with the media server.
    ///
    /// Returns the local path of the file.
    pub async fn add_movie(&self, rating_key: &str, file_name: &str) -> PathBuf {
        let local = self.library_dir.path().join(file_name);
        std::fs::write(&local, b"video").expect("Failed to write media file");
        let local_str = local.to_str().expect("utf-8 temp path");
        self.media_server
            .add_media(fixtures::media_info(rating_key, local_str))
            .await;
        local
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.request_raw("POST", path, body.to_string(), "application/json")
            .await
    }

    /// Send the payload the way Plex does: a multipart form with a `payload` field.
    pub async fn post_multipart(&self, path: &str, payload: &str) -> TestResponse {
        let boundary = "subfetch-test-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"payload\"\r\n\
             Content-Type: application/json\r\n\r\n\
             {payload}\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"thumb\"; filename=\"thumb.jpg\"\r\n\
             Content-Type: image/jpeg\r\n\r\n\
             JPEGDATA\r\n\
             --{boundary}--\r\n"
        );
        self.request_raw(
            "POST",
            path,
            body,
            &format!("multipart/form-data; boundary={boundary}"),
        )
        .await
    }

    /// Send a request with raw string body and custom content type.
    pub async fn request_raw(
        &self,
        method: &str,
        path: &str,
        body: String,
        content_type: &str,
    ) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", content_type)
            .body(Body::from(body))
            .unwrap();

        self.send(request).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
