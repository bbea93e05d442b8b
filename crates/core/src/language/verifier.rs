//! Post-download subtitle language verification.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::codes_match;
use crate::error::{Classify, ErrorKind};

/// Minimum cleaned text length before detection is attempted.
const MIN_TEXT_LEN: usize = 50;

static INDEX_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\d+\s*$").unwrap());
static TIMING_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{1,2}:\d{2}:\d{2}[,.]\d{3}\s*-->\s*\d{1,2}:\d{2}:\d{2}[,.]\d{3}[^\n]*").unwrap()
});
static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>|\{[^}]*\}").unwrap());

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("failed to read subtitle {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("subtitle language mismatch: expected {expected}, detected {detected}")]
    Mismatch { expected: String, detected: String },
}

impl Classify for VerificationError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Verification
    }
}

/// Result of checking a subtitle file against its expected language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Match,
    Mismatch { detected: String },
    /// Too little text or no confident guess. Treated as acceptable.
    Undetermined,
}

impl Verdict {
    pub fn is_acceptable(&self) -> bool {
        !matches!(self, Verdict::Mismatch { .. })
    }
}

#[async_trait]
pub trait LanguageVerifier: Send + Sync {
    async fn verify(&self, path: &Path, expected: &str) -> Result<Verdict, VerificationError>;
}

/// Detects the language of subtitle text with `whatlang`.
#[derive(Debug, Default, Clone)]
pub struct TextLanguageVerifier;

impl TextLanguageVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Verdict for already-loaded subtitle content.
    pub fn verify_text(&self, content: &str, expected: &str) -> Verdict {
        let text = clean_subtitle_text(content);
        if text.chars().count() < MIN_TEXT_LEN {
            debug!(len = text.len(), "Not enough text for language detection");
            return Verdict::Undetermined;
        }

        let Some(info) = whatlang::detect(&text) else {
            return Verdict::Undetermined;
        };
        if !info.is_reliable() {
            debug!(
                lang = info.lang().code(),
                confidence = info.confidence(),
                "Language detection not reliable"
            );
            return Verdict::Undetermined;
        }

        let detected = macrolanguage(info.lang().code());
        if codes_match(detected, expected) {
            info!(detected, "Language verified");
            Verdict::Match
        } else {
            warn!(expected, detected, "Language mismatch");
            Verdict::Mismatch {
                detected: detected.to_string(),
            }
        }
    }
}

#[async_trait]
impl LanguageVerifier for TextLanguageVerifier {
    async fn verify(&self, path: &Path, expected: &str) -> Result<Verdict, VerificationError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| VerificationError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let content = String::from_utf8_lossy(&bytes);
        Ok(self.verify_text(&content, expected))
    }
}

/// Drop cue numbers, timing lines and markup, then collapse whitespace.
pub fn clean_subtitle_text(content: &str) -> String {
    let text = INDEX_LINE.replace_all(content, "");
    let text = TIMING_LINE.replace_all(&text, "");
    let text = MARKUP.replace_all(&text, "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Detection reports ISO 639-3 individual languages; fold the ones whose
/// table entry is a macrolanguage.
fn macrolanguage(code: &str) -> &str {
    match code {
        "cmn" => "zho",
        "nob" | "nno" => "nor",
        "pes" => "fas",
        "arb" => "ara",
        "ekk" => "est",
        "lvs" => "lav",
        other => other,
    }
}
