//! Candidate scoring and ranking.
//!
//! Candidates are ordered by perfect match first, then popularity, then
//! score, all descending. The sort is stable, so ties keep the order in
//! which providers returned them.

use std::cmp::Ordering;

use crate::provider::SearchCandidate;
use crate::release::ReleaseFingerprint;

/// Fraction of fingerprint tokens found in `label` + `filename`, and whether
/// all of them were found. An empty fingerprint scores 0 and never matches.
pub fn score(label: &str, filename: &str, fingerprint: &ReleaseFingerprint) -> (f64, bool) {
    if fingerprint.is_empty() {
        return (0.0, false);
    }

    let combined = format!("{} {}", label, filename).to_uppercase();
    let found = fingerprint
        .tokens()
        .iter()
        .filter(|token| combined.contains(token.as_str()))
        .count();

    let total = fingerprint.len();
    (found as f64 / total as f64, found == total)
}

/// Fill in `score` and `perfect_match` for each candidate.
pub fn score_candidates(candidates: &mut [SearchCandidate], fingerprint: &ReleaseFingerprint) {
    for candidate in candidates.iter_mut() {
        let (s, perfect) = score(&candidate.release, &candidate.filename, fingerprint);
        candidate.score = s;
        candidate.perfect_match = perfect;
    }
}

/// Total order used by [`rank`]: `Less` sorts first.
pub fn compare(a: &SearchCandidate, b: &SearchCandidate) -> Ordering {
    b.perfect_match
        .cmp(&a.perfect_match)
        .then_with(|| b.popularity.cmp(&a.popularity))
        .then_with(|| b.score.total_cmp(&a.score))
}

/// Sort candidates best first.
pub fn rank(mut candidates: Vec<SearchCandidate>) -> Vec<SearchCandidate> {
    candidates.sort_by(compare);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::candidate;

    fn fp(tokens: &[&str]) -> ReleaseFingerprint {
        ReleaseFingerprint::from_tokens(tokens.iter().copied())
    }

    #[test]
    fn test_score_fraction() {
        let fingerprint = fp(&["SPARKS", "1080P", "BLURAY", "X264"]);
        let (s, perfect) = score("Heat.1995.1080p.BluRay", "heat.srt", &fingerprint);
        assert_eq!(s, 0.5);
        assert!(!perfect);
    }

    #[test]
    fn test_score_perfect_across_label_and_filename() {
        let fingerprint = fp(&["SPARKS", "1080P", "BLURAY"]);
        let (s, perfect) = score("Heat 1080p BluRay", "Heat-sparks.srt", &fingerprint);
        assert_eq!(s, 1.0);
        assert!(perfect);
    }

    #[test]
    fn test_score_each_k_of_n() {
        let fingerprint = fp(&["AAA", "BBB", "CCC", "DDD", "EEE"]);
        let all = ["aaa", "bbb", "ccc", "ddd", "eee"];
        for k in 0..=all.len() {
            let label = all[..k].join(".");
            let (s, perfect) = score(&label, "", &fingerprint);
            assert_eq!(s, k as f64 / 5.0);
            assert_eq!(perfect, k == 5);
        }
    }

    #[test]
    fn test_empty_fingerprint_never_matches() {
        let (s, perfect) = score("anything at all", "x.srt", &ReleaseFingerprint::default());
        assert_eq!(s, 0.0);
        assert!(!perfect);
    }

    #[test]
    fn test_perfect_match_beats_popularity() {
        let mut a = candidate("a", 5);
        let b = candidate("b", 50);
        let mut c = candidate("c", 5);
        a.perfect_match = false;
        c.perfect_match = true;

        let ranked = rank(vec![a, b, c]);
        let ids: Vec<_> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c", "b", "a"]);
    }

    #[test]
    fn test_score_breaks_popularity_ties() {
        let mut a = candidate("a", 10);
        let mut b = candidate("b", 10);
        a.score = 0.25;
        b.score = 0.75;

        let ranked = rank(vec![a, b]);
        assert_eq!(ranked[0].id, "b");
    }

    #[test]
    fn test_full_ties_keep_discovery_order() {
        let ranked = rank(vec![candidate("x", 3), candidate("y", 3), candidate("z", 3)]);
        let ids: Vec<_> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["x", "y", "z"]);
    }

    #[test]
    fn test_score_candidates_sets_flags() {
        let mut list = vec![candidate("a", 1), candidate("b", 1)];
        list[0].release = "Movie.720p.WEB-GRP".into();
        list[1].release = "Movie.720p".into();

        score_candidates(&mut list, &fp(&["GRP", "720P"]));
        assert!(list[0].perfect_match);
        assert_eq!(list[1].score, 0.5);
        assert!(!list[1].perfect_match);
    }
}
