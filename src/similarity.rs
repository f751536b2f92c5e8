//! Similarity scoring between a header and a schema spelling.
//!
//! Rules are applied in order, first match wins:
//!
//! 1. identical after [`normalize`] scores `1.0`
//! 2. one string containing the other scores `shorter / longer`
//! 3. otherwise `1 - levenshtein / max_len`
//!
//! Lengths are counted in characters. The containment rule uses the min and
//! max lengths of the pair, so the score is symmetric in both arguments.

use strsim::levenshtein;

use crate::normalize::normalize;

/// Scores two raw strings in `[0, 1]`, passing both through [`normalize`] first.
pub fn similarity(a: &str, b: &str) -> f64 {
    let left = normalize(a);
    let right = normalize(b);
    normalized_similarity(&left, &right)
}

/// Scores two strings that have already been passed through [`normalize`].
pub fn normalized_similarity(left: &str, right: &str) -> f64 {
    if left == right {
        return 1.0;
    }

    let left_len = left.chars().count();
    let right_len = right.chars().count();
    let longer = left_len.max(right_len);

    // An empty operand is contained in anything, which yields 0 / n.
    if left.contains(right) || right.contains(left) {
        let shorter = left_len.min(right_len);
        return shorter as f64 / longer as f64;
    }

    let distance = levenshtein(left, right);
    1.0 - distance as f64 / longer as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_after_normalization_scores_one() {
        assert_eq!(similarity("Reg_No", "reg no"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("  ", "_"), 1.0);
    }

    #[test]
    fn containment_scores_length_ratio() {
        // "reg" inside "reg number": 3 / 10
        let score = similarity("Reg", "reg number");
        assert!((score - 0.3).abs() < 1e-9);
        assert_eq!(similarity("Reg", "reg number"), similarity("reg number", "Reg"));
    }

    #[test]
    fn empty_against_non_empty_scores_zero() {
        assert_eq!(similarity("", "chassis"), 0.0);
        assert_eq!(similarity("vin", "   "), 0.0);
    }

    #[test]
    fn edit_distance_fallback() {
        // colour -> color: one deletion over six characters
        let score = similarity("colour", "color");
        assert!((score - (1.0 - 1.0 / 6.0)).abs() < 1e-9);
        // kitten / sitting: distance 3, max length 7
        let score = similarity("kitten", "sitting");
        assert!((score - (1.0 - 3.0 / 7.0)).abs() < 1e-9);
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        for (a, b) in [("abc", "xyz"), ("a", "bcdefg"), ("engine no", "chassis #")] {
            let score = similarity(a, b);
            assert!((0.0..=1.0).contains(&score), "{a} vs {b} = {score}");
        }
    }
}
