//! Plex Media Server integration.

mod client;
mod types;

use std::collections::BTreeMap;
use std::path::PathBuf;

pub use client::PlexClient;
pub use types::*;

/// Plex-side path prefixes rewritten to local prefixes.
///
/// The longest matching prefix wins, so `/media/tv` can override `/media`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMappings(Vec<(String, String)>);

impl PathMappings {
    pub fn new(mappings: &BTreeMap<String, String>) -> Self {
        let mut pairs: Vec<(String, String)> = mappings
            .iter()
            .map(|(from, to)| (from.clone(), to.clone()))
            .collect();
        pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self(pairs)
    }

    pub fn apply(&self, plex_path: &str) -> PathBuf {
        for (from, to) in &self.0 {
            if let Some(rest) = plex_path.strip_prefix(from.as_str()) {
                return PathBuf::from(format!("{}{}", to, rest));
            }
        }
        PathBuf::from(plex_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mappings(pairs: &[(&str, &str)]) -> PathMappings {
        PathMappings::new(
            &pairs
                .iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_apply_prefix() {
        let m = mappings(&[("/media", "/mnt/library")]);
        assert_eq!(
            m.apply("/media/movies/Heat.mkv"),
            PathBuf::from("/mnt/library/movies/Heat.mkv")
        );
    }

    #[test]
    fn test_unmatched_path_unchanged() {
        let m = mappings(&[("/media", "/mnt/library")]);
        assert_eq!(m.apply("/data/x.mkv"), PathBuf::from("/data/x.mkv"));
    }

    #[test]
    fn test_longest_prefix_wins() {
        let m = mappings(&[("/media", "/mnt/a"), ("/media/tv", "/mnt/tv")]);
        assert_eq!(m.apply("/media/tv/show.mkv"), PathBuf::from("/mnt/tv/show.mkv"));
        assert_eq!(m.apply("/media/film.mkv"), PathBuf::from("/mnt/a/film.mkv"));
    }
}
