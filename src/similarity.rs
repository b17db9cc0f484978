// Similarity Scorer - bounded edit-distance similarity in [0,1]

use strsim::levenshtein;

/// Default acceptance threshold for "same person" name comparisons.
/// Scores must be strictly greater than this to count as a match.
pub const DEFAULT_NAME_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Similarity between two strings as `1 - distance / max(len, len, 1)`,
/// where distance is the classic single-character insert/delete/substitute
/// edit distance over chars.
///
/// Bounded to [0,1], symmetric, and 1.0 when both inputs are empty.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count()).max(1);
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_strings_score_one() {
        assert_eq!(similarity("dupont", "dupont"), 1.0);
        assert_eq!(similarity("a", "a"), 1.0);
    }

    #[test]
    fn test_both_empty_score_one() {
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn test_one_empty_scores_zero() {
        assert_eq!(similarity("jean", ""), 0.0);
        assert_eq!(similarity("", "jean"), 0.0);
    }

    #[test]
    fn test_symmetric() {
        let pairs = [("jean", "jan"), ("dupont", "dupond"), ("a", "xyz")];
        for (a, b) in pairs {
            assert_eq!(similarity(a, b), similarity(b, a));
        }
    }

    #[test]
    fn test_known_distances() {
        // "jan" -> "jean" is one insertion over max length 4
        assert!((similarity("jean", "jan") - 0.75).abs() < 1e-9);
        // "dupond" -> "dupont" is one substitution over max length 6
        assert!((similarity("dupont", "dupond") - (1.0 - 1.0 / 6.0)).abs() < 1e-9);
    }

    #[test]
    fn test_multibyte_chars_counted_as_single_edits() {
        // One substitution over 5 chars, not a byte-level distance
        assert!((similarity("jeanн", "jeans") - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_is_strict_boundary() {
        // One edit in a 6-char name scores below the default threshold,
        // one edit in a 7-char name scores above it
        assert!(similarity("dupont", "dupond") < DEFAULT_NAME_SIMILARITY_THRESHOLD);
        assert!(similarity("martine", "martina") > DEFAULT_NAME_SIMILARITY_THRESHOLD);
    }

    #[test]
    fn test_bounded_zero_one() {
        let pairs = [("abc", "xyzxyz"), ("", "x"), ("aaaa", "bbbb")];
        for (a, b) in pairs {
            let s = similarity(a, b);
            assert!((0.0..=1.0).contains(&s));
        }
    }
}
