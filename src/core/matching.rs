//! Candidate scoring, ranking and result classification.

use std::collections::{BTreeSet, HashSet};

use crate::core::lyrics::{LyricsResult, ScoredCandidate, SearchCandidate, SongQuery};

/// Results below this score are discarded.
pub const SCORE_THRESHOLD: f64 = 60.0;
/// A strategy producing a result above this score stops query expansion.
pub const EARLY_EXIT_SCORE: f64 = 80.0;

const ARTIST_SEPARATORS: &[&str] = &["&", ",", ";", " feat.", " ft.", " vs.", " x "];
const INSTRUMENTAL_KEYWORDS: &[&str] = &["纯音乐", "instrumental", "no lyrics", "没有歌词", "纯音乐请欣赏"];

/// Similarity of two strings on a 0-100 scale.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    strsim::normalized_levenshtein(a, b) * 100.0
}

/// Order- and duplicate-insensitive token similarity on a 0-100 scale.
///
/// Shared tokens are compared against each side's full token set, so
/// `"doja cat"` against `"doja cat / lin yanjun"` scores 100.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let left: BTreeSet<&str> = a.split_whitespace().collect();
    let right: BTreeSet<&str> = b.split_whitespace().collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let join = |tokens: Vec<&str>| tokens.join(" ");
    let intersection = join(left.intersection(&right).copied().collect());
    let only_left = join(left.difference(&right).copied().collect());
    let only_right = join(right.difference(&left).copied().collect());

    let combine = |base: &str, rest: &str| match (base.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{} {}", base, rest),
    };
    let with_left = combine(&intersection, &only_left);
    let with_right = combine(&intersection, &only_right);

    let mut best = ratio(&with_left, &with_right);
    if !intersection.is_empty() {
        best = best
            .max(ratio(&intersection, &with_left))
            .max(ratio(&intersection, &with_right));
    }
    best
}

/// Scores a search hit against the query of the strategy that produced it.
pub fn score_candidate(query: &SongQuery, candidate: &SearchCandidate) -> f64 {
    let title_score = ratio(&query.title.to_lowercase(), &candidate.title.to_lowercase());
    if query.artist.is_empty() {
        return title_score;
    }

    let query_artist = query.artist.to_lowercase();
    let candidate_artist = candidate.artist.to_lowercase();
    let artist_score =
        (ratio(&query_artist, &candidate_artist) + token_set_ratio(&query_artist, &candidate_artist)) / 2.0;

    title_score * 0.6 + artist_score * 0.4
}

/// Cuts the artist at each known separator in turn.
pub fn simplify_artist(artist: &str) -> String {
    let mut cleaned = artist;
    for separator in ARTIST_SEPARATORS {
        if let Some((head, _)) = cleaned.split_once(separator) {
            cleaned = head;
        }
    }
    cleaned.trim().to_string()
}

/// True when every non-space character is ASCII.
pub fn is_ascii_query(artist: &str, title: &str) -> bool {
    artist
        .chars()
        .chain(title.chars())
        .filter(|c| *c != ' ')
        .all(|c| c.is_ascii())
}

/// Sorts by `(syllable_capable, score)` descending and drops repeated
/// `(provider, id)` pairs, keeping the best-ranked copy.
pub fn rank_candidates(mut candidates: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
    candidates.sort_by(|a, b| {
        b.syllable_capable
            .cmp(&a.syllable_capable)
            .then_with(|| b.score.total_cmp(&a.score))
    });

    let mut seen = HashSet::new();
    candidates.retain(|c| {
        seen.insert((
            c.candidate.provider_name.to_lowercase(),
            c.candidate.provider_song_id.clone(),
        ))
    });
    candidates
}

/// Empty results, or a line or two announcing there are no lyrics.
pub fn is_instrumental(lyrics: &LyricsResult) -> bool {
    if lyrics.lines.is_empty() {
        return true;
    }
    if lyrics.lines.len() > 2 {
        return false;
    }

    let text = lyrics
        .lines
        .iter()
        .map(|l| l.text.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    INSTRUMENTAL_KEYWORDS.iter().any(|k| text.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lyrics::Line;

    fn candidate(provider: &str, id: &str, title: &str, artist: &str) -> SearchCandidate {
        SearchCandidate {
            provider_name: provider.to_string(),
            provider_song_id: id.to_string(),
            title: title.to_string(),
            artist: artist.to_string(),
            album: String::new(),
            raw_match_score: 0.0,
        }
    }

    fn scored(provider: &str, id: &str, score: f64, syllable: bool) -> ScoredCandidate {
        ScoredCandidate {
            candidate: candidate(provider, id, "t", "a"),
            score,
            syllable_capable: syllable,
        }
    }

    #[test]
    fn test_ratio_bounds() {
        assert_eq!(ratio("shake it off", "shake it off"), 100.0);
        assert_eq!(ratio("abc", "xyz"), 0.0);
        assert_eq!(ratio("", ""), 100.0);
    }

    #[test]
    fn test_token_set_ratio_ignores_order_and_extras() {
        assert_eq!(token_set_ratio("taylor swift", "swift taylor"), 100.0);
        assert_eq!(token_set_ratio("doja cat", "doja cat / lin yanjun"), 100.0);
        assert_eq!(token_set_ratio("", "anything"), 0.0);
    }

    #[test]
    fn test_exact_match_scores_full() {
        let query = SongQuery::new("Shake It Off", "Taylor Swift");
        let hit = candidate("QQ Music", "1", "shake it off", "TAYLOR SWIFT");
        assert_eq!(score_candidate(&query, &hit), 100.0);
    }

    #[test]
    fn test_exact_artist_beats_partial_artist() {
        let query = SongQuery::new("Say So", "Doja Cat");
        let exact = candidate("x", "1", "Say So", "Doja Cat");
        let partial = candidate("x", "2", "Say So", "Doja Cat / Lin Yanjun");
        assert!(score_candidate(&query, &exact) > score_candidate(&query, &partial));
    }

    #[test]
    fn test_title_only_strategy_ignores_artist() {
        let query = SongQuery::new("Shake It Off", "");
        let hit = candidate("x", "1", "Shake It Off", "Someone Else");
        assert_eq!(score_candidate(&query, &hit), 100.0);
    }

    #[test]
    fn test_simplify_artist() {
        assert_eq!(simplify_artist("Calvin Harris feat. Rihanna"), "Calvin Harris");
        assert_eq!(simplify_artist("A & B, C"), "A");
        assert_eq!(simplify_artist("Skrillex x Diplo"), "Skrillex");
        assert_eq!(simplify_artist("Adele"), "Adele");
    }

    #[test]
    fn test_ascii_detection() {
        assert!(is_ascii_query("Aimer", "Zankyou Sanka"));
        assert!(!is_ascii_query("米津玄師", "Lemon"));
    }

    #[test]
    fn test_syllable_capability_outranks_score() {
        let ranked = rank_candidates(vec![
            scored("Netease", "1", 95.0, false),
            scored("QQ Music", "2", 65.0, true),
            scored("Kugou", "3", 70.0, true),
        ]);
        let ids: Vec<&str> = ranked.iter().map(|c| c.candidate.provider_song_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
    }

    #[test]
    fn test_ranking_is_stable_and_deduplicated() {
        let ranked = rank_candidates(vec![
            scored("Netease", "1", 90.0, false),
            scored("Netease", "2", 90.0, false),
            scored("netease", "1", 70.0, false),
        ]);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].candidate.provider_song_id, "1");
        assert_eq!(ranked[0].score, 90.0);
        assert_eq!(ranked[1].candidate.provider_song_id, "2");
    }

    #[test]
    fn test_instrumental_detection() {
        assert!(is_instrumental(&LyricsResult::empty()));
        assert!(is_instrumental(&LyricsResult::new(vec![Line::new(0.0, 0.0, "纯音乐，请欣赏")])));
        assert!(is_instrumental(&LyricsResult::new(vec![
            Line::new(0.0, 0.0, "Title"),
            Line::new(1.0, 1.0, "Instrumental"),
        ])));
        assert!(!is_instrumental(&LyricsResult::new(vec![
            Line::new(0.0, 0.0, "instrumental break"),
            Line::new(1.0, 1.0, "a"),
            Line::new(2.0, 2.0, "b"),
        ])));
        assert!(!is_instrumental(&LyricsResult::new(vec![Line::new(0.0, 0.0, "hello")])));
    }
}
