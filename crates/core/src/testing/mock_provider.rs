//! Mock subtitle provider for testing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::provider::{
    ProviderError, SearchCandidate, SearchQuery, SearchResponse, SubtitleProvider,
};

/// A recorded download for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDownload {
    pub candidate_id: String,
    pub output: PathBuf,
    pub auth_token: Option<String>,
}

/// Mock implementation of the SubtitleProvider trait.
///
/// - Per-language search results
/// - Search failures and a budget of failing downloads
/// - Recorded searches and downloads
///
/// Downloads write the configured content (or a placeholder) to the
/// requested path, so the pipeline sees a real file.
///
/// ```rust,ignore
/// let provider = MockProvider::new("mock");
/// provider.set_results("en", vec![fixtures::candidate("1", 10)]).await;
/// provider.fail_next_downloads(2).await;
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    name: String,
    results: Arc<RwLock<HashMap<String, Vec<SearchCandidate>>>>,
    contents: Arc<RwLock<HashMap<String, String>>>,
    fail_searches: Arc<RwLock<bool>>,
    failing_downloads: Arc<RwLock<u32>>,
    auth_token: Arc<RwLock<Option<String>>>,
    searches: Arc<RwLock<Vec<SearchQuery>>>,
    downloads: Arc<RwLock<Vec<RecordedDownload>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("mock")
    }
}

impl MockProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            results: Arc::new(RwLock::new(HashMap::new())),
            contents: Arc::new(RwLock::new(HashMap::new())),
            fail_searches: Arc::new(RwLock::new(false)),
            failing_downloads: Arc::new(RwLock::new(0)),
            auth_token: Arc::new(RwLock::new(Some("mock-token".to_string()))),
            searches: Arc::new(RwLock::new(Vec::new())),
            downloads: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Candidates returned for `language`.
    pub async fn set_results(&self, language: &str, candidates: Vec<SearchCandidate>) {
        self.results
            .write()
            .await
            .insert(language.to_string(), candidates);
    }

    /// File content written when candidate `id` is downloaded.
    pub async fn set_content(&self, id: &str, content: &str) {
        self.contents
            .write()
            .await
            .insert(id.to_string(), content.to_string());
    }

    pub async fn fail_searches(&self, fail: bool) {
        *self.fail_searches.write().await = fail;
    }

    /// Make the next `n` downloads fail with a connection error.
    pub async fn fail_next_downloads(&self, n: u32) {
        *self.failing_downloads.write().await = n;
    }

    pub async fn set_auth_token(&self, token: Option<&str>) {
        *self.auth_token.write().await = token.map(str::to_string);
    }

    pub async fn recorded_searches(&self) -> Vec<SearchQuery> {
        self.searches.read().await.clone()
    }

    pub async fn recorded_downloads(&self) -> Vec<RecordedDownload> {
        self.downloads.read().await.clone()
    }

    pub async fn search_count(&self) -> usize {
        self.searches.read().await.len()
    }

    pub async fn download_count(&self) -> usize {
        self.downloads.read().await.len()
    }

    pub async fn clear(&self) {
        self.searches.write().await.clear();
        self.downloads.write().await.clear();
    }
}

#[async_trait]
impl SubtitleProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, ProviderError> {
        self.searches.write().await.push(query.clone());

        if *self.fail_searches.read().await {
            return Err(ProviderError::ConnectionFailed(
                "mock search failure".to_string(),
            ));
        }

        let candidates = self
            .results
            .read()
            .await
            .get(&query.language)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|mut c| {
                c.provider = self.name.clone();
                c
            })
            .collect();

        Ok(SearchResponse {
            candidates,
            auth_token: self.auth_token.read().await.clone(),
        })
    }

    async fn download(
        &self,
        candidate: &SearchCandidate,
        output: &Path,
        auth_token: Option<&str>,
    ) -> Result<(), ProviderError> {
        self.downloads.write().await.push(RecordedDownload {
            candidate_id: candidate.id.clone(),
            output: output.to_path_buf(),
            auth_token: auth_token.map(str::to_string),
        });

        {
            let mut failing = self.failing_downloads.write().await;
            if *failing > 0 {
                *failing -= 1;
                return Err(ProviderError::ConnectionFailed(
                    "mock download failure".to_string(),
                ));
            }
        }

        let content = self
            .contents
            .read()
            .await
            .get(&candidate.id)
            .cloned()
            .unwrap_or_else(|| format!("1\n00:00:01,000 --> 00:00:02,000\n{}\n", candidate.id));

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ProviderError::io(parent, e))?;
        }
        tokio::fs::write(output, content)
            .await
            .map_err(|e| ProviderError::io(output, e))
    }
}
