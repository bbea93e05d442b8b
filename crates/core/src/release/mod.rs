//! Release fingerprinting.
//!
//! A [`ReleaseFingerprint`] is the ordered set of upper-case tokens (release
//! group, resolution, sources, codec) describing which encode a media file
//! is. Subtitles are timed against a particular encode, so candidates whose
//! release text contains every token are treated as perfect matches.

mod guesser;

pub use guesser::{FilenameGuesser, GuessError, GuessedRelease, SceneNameGuesser};

use serde::Serialize;
use tracing::{debug, warn};

/// Deduplicated, order-preserving, upper-case release tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReleaseFingerprint(Vec<String>);

impl ReleaseFingerprint {
    /// Build from raw tokens: upper-cased, empties dropped, first occurrence kept.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for token in tokens {
            let token = token.as_ref().trim().to_uppercase();
            if !token.is_empty() && !out.contains(&token) {
                out.push(token);
            }
        }
        Self(out)
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<GuessedRelease> for ReleaseFingerprint {
    fn from(g: GuessedRelease) -> Self {
        let tokens = g
            .release_group
            .into_iter()
            .chain(g.resolution)
            .chain(g.sources)
            .chain(g.video_codec);
        Self::from_tokens(tokens)
    }
}

/// Fingerprint for `filename`. Guesser failures yield an empty fingerprint.
pub fn extract(guesser: &dyn FilenameGuesser, filename: &str) -> ReleaseFingerprint {
    match guesser.guess(filename) {
        Ok(guessed) => {
            let fingerprint = ReleaseFingerprint::from(guessed);
            debug!(filename, tokens = ?fingerprint.tokens(), "Extracted release info");
            fingerprint
        }
        Err(e) => {
            warn!(filename, error = %e, "Failed to extract release info");
            ReleaseFingerprint::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedGuesser(Result<GuessedRelease, GuessError>);

    impl FilenameGuesser for FixedGuesser {
        fn guess(&self, _filename: &str) -> Result<GuessedRelease, GuessError> {
            self.0.clone()
        }
    }

    #[test]
    fn test_from_tokens_normalizes() {
        let fp = ReleaseFingerprint::from_tokens(["sparks", "", "1080p", "SPARKS", " x264 "]);
        assert_eq!(fp.tokens(), ["SPARKS", "1080P", "X264"]);
    }

    #[test]
    fn test_extract_flattens_and_dedups_in_order() {
        let guesser = FixedGuesser(Ok(GuessedRelease {
            release_group: Some("web".into()),
            resolution: Some("720p".into()),
            sources: vec!["Web".into(), "HDTV".into()],
            video_codec: Some("h264".into()),
        }));

        let fp = extract(&guesser, "whatever.mkv");
        assert_eq!(fp.tokens(), ["WEB", "720P", "HDTV", "H264"]);
    }

    #[test]
    fn test_extract_guesser_failure_is_empty() {
        let guesser = FixedGuesser(Err(GuessError::Empty));
        assert!(extract(&guesser, "").is_empty());
    }

    #[test]
    fn test_extract_with_scene_guesser() {
        let fp = extract(
            &SceneNameGuesser::new(),
            "Heat.1995.1080p.BluRay.x264-SPARKS.mkv",
        );
        assert_eq!(fp.tokens(), ["SPARKS", "1080P", "BLURAY", "X264"]);
    }
}
