//! Scene-style filename parsing.

use std::path::Path;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;

static RESOLUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(480p|576p|720p|1080[pi]|2160p|4k)\b").unwrap());
static SOURCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(blu-?ray|bdrip|brrip|web-?dl|web-?rip|hdtv|dvdrip|hdrip|remux|web)\b")
        .unwrap()
});
static CODEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(x\.?26[45]|h\.?26[45]|hevc|avc|av1|xvid|divx)\b").unwrap());
static GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-([A-Za-z0-9]+)(?:\[[^\]]*\])?$").unwrap());

const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "m4v", "mov", "wmv", "ts", "webm"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GuessError {
    #[error("empty filename")]
    Empty,
}

/// Release attributes recognised in a filename.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuessedRelease {
    pub release_group: Option<String>,
    pub resolution: Option<String>,
    pub sources: Vec<String>,
    pub video_codec: Option<String>,
}

/// Extracts release attributes from a media filename.
pub trait FilenameGuesser: Send + Sync {
    fn guess(&self, filename: &str) -> Result<GuessedRelease, GuessError>;
}

/// Regex guesser for `Title.Year.Resolution.Source.Codec-GROUP.ext` names.
#[derive(Debug, Default, Clone)]
pub struct SceneNameGuesser;

impl SceneNameGuesser {
    pub fn new() -> Self {
        Self
    }
}

impl FilenameGuesser for SceneNameGuesser {
    fn guess(&self, filename: &str) -> Result<GuessedRelease, GuessError> {
        let stem = release_stem(filename);
        if stem.is_empty() {
            return Err(GuessError::Empty);
        }
        // `_` is a word character and would hide token boundaries
        let stem = stem.replace('_', ".");

        let resolution = RESOLUTION
            .find(&stem)
            .map(|m| m.as_str().to_string());

        let mut sources: Vec<String> = Vec::new();
        for m in SOURCE.find_iter(&stem) {
            let source = m.as_str().to_string();
            if !sources.iter().any(|s| s.eq_ignore_ascii_case(&source)) {
                sources.push(source);
            }
        }

        let video_codec = CODEC.find(&stem).map(|m| m.as_str().to_string());

        let release_group = GROUP
            .captures(&stem)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .filter(|g| !is_known_token(g))
            .map(str::to_string);

        Ok(GuessedRelease {
            release_group,
            resolution,
            sources,
            video_codec,
        })
    }
}

/// File name without directories or a video extension.
fn release_stem(filename: &str) -> String {
    let name = Path::new(filename.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    match name.rsplit_once('.') {
        Some((stem, ext)) if VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => {
            stem.to_string()
        }
        _ => name.to_string(),
    }
}

/// `WEB-DL` ends with `-DL`; neither that nor other attribute tokens are groups.
fn is_known_token(candidate: &str) -> bool {
    candidate.eq_ignore_ascii_case("dl")
        || candidate.eq_ignore_ascii_case("rip")
        || RESOLUTION.is_match(candidate)
        || CODEC.is_match(candidate)
        || SOURCE.is_match(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guess(name: &str) -> GuessedRelease {
        SceneNameGuesser::new().guess(name).unwrap()
    }

    #[test]
    fn test_full_scene_name() {
        let g = guess("/media/movies/Heat.1995.1080p.BluRay.x264-SPARKS.mkv");
        assert_eq!(g.release_group.as_deref(), Some("SPARKS"));
        assert_eq!(g.resolution.as_deref(), Some("1080p"));
        assert_eq!(g.sources, vec!["BluRay"]);
        assert_eq!(g.video_codec.as_deref(), Some("x264"));
    }

    #[test]
    fn test_web_dl_is_not_a_group() {
        let g = guess("Show.S01E02.720p.WEB-DL.mkv");
        assert_eq!(g.sources, vec!["WEB-DL"]);
        assert_eq!(g.release_group, None);
    }

    #[test]
    fn test_multiple_sources_deduplicated() {
        let g = guess("Movie.2019.2160p.BluRay.REMUX.HEVC.bluray-FGT.mkv");
        assert_eq!(g.sources, vec!["BluRay", "REMUX"]);
        assert_eq!(g.video_codec.as_deref(), Some("HEVC"));
        assert_eq!(g.release_group.as_deref(), Some("FGT"));
    }

    #[test]
    fn test_underscores_and_bracket_suffix() {
        let g = guess("Movie_2010_720p_HDTV_XviD-LOL[rarbg].avi");
        assert_eq!(g.resolution.as_deref(), Some("720p"));
        assert_eq!(g.sources, vec!["HDTV"]);
        assert_eq!(g.video_codec.as_deref(), Some("XviD"));
        assert_eq!(g.release_group.as_deref(), Some("LOL"));
    }

    #[test]
    fn test_plain_name_has_no_attributes() {
        assert_eq!(guess("Home Video.mp4"), GuessedRelease::default());
    }

    #[test]
    fn test_empty_filename_fails() {
        assert_eq!(SceneNameGuesser::new().guess("  "), Err(GuessError::Empty));
        assert_eq!(SceneNameGuesser::new().guess(".mkv"), Err(GuessError::Empty));
    }
}
