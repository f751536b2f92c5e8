//! Picks the canonical field a single header most likely represents.

use crate::{normalize::normalize, schema::FieldSpec, similarity::normalized_similarity};

pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// The top-scoring field for a header, whether or not it clears a threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldScore<'a> {
    pub field: &'a str,
    pub score: f64,
    /// The variation or alias that produced the score.
    pub matched: &'a str,
}

impl FieldScore<'_> {
    /// A zero score never counts as a match, even against a zero threshold.
    pub fn clears(&self, threshold: f64) -> bool {
        self.score > 0.0 && self.score >= threshold
    }
}

/// Scores `header` against every variation, then every alias, of every field
/// in schema order. Only a strictly higher score replaces the running best,
/// so ties go to the earliest field definition.
pub fn score_header<'a>(header: &str, schema: &'a [FieldSpec]) -> Option<FieldScore<'a>> {
    let normalized = normalize(header);
    let mut best: Option<FieldScore<'a>> = None;
    for spec in schema {
        for spelling in spec.spellings() {
            let score = normalized_similarity(&normalized, &normalize(spelling));
            if best.is_none_or(|current| score > current.score) {
                best = Some(FieldScore {
                    field: spec.field.as_str(),
                    score,
                    matched: spelling,
                });
            }
        }
    }
    best
}

/// Returns the best field for `header`, or `None` when nothing scores at
/// least `threshold`. Unmatched headers are dropped, never guessed.
pub fn best_match<'a>(header: &str, schema: &'a [FieldSpec], threshold: f64) -> Option<&'a str> {
    score_header(header, schema)
        .filter(|candidate| candidate.clears(threshold))
        .map(|candidate| candidate.field)
}
