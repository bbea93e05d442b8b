//! Mock language verifier for testing.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::language::{LanguageVerifier, VerificationError, Verdict};

/// Returns queued verdicts in order, then `Match` once the queue is empty.
#[derive(Debug, Clone, Default)]
pub struct MockVerifier {
    verdicts: Arc<Mutex<VecDeque<Verdict>>>,
    calls: Arc<Mutex<Vec<(PathBuf, String)>>>,
}

impl MockVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_verdict(&self, verdict: Verdict) {
        self.verdicts.lock().await.push_back(verdict);
    }

    pub async fn calls(&self) -> Vec<(PathBuf, String)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl LanguageVerifier for MockVerifier {
    async fn verify(&self, path: &Path, expected: &str) -> Result<Verdict, VerificationError> {
        self.calls
            .lock()
            .await
            .push((path.to_path_buf(), expected.to_string()));
        Ok(self
            .verdicts
            .lock()
            .await
            .pop_front()
            .unwrap_or(Verdict::Match))
    }
}
