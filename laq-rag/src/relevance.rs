//! Relevance scoring, threshold filtering and ranking of search hits.

use std::fmt;

use serde::Serialize;

use crate::record::{RecordMetadata, SearchHit};

/// Lowest score considered a strong match.
pub const STRONG_SCORE: f32 = 80.0;

/// Lowest score considered a moderate match.
pub const MODERATE_SCORE: f32 = 60.0;

/// Relevance percentage for a cosine distance: `(1 - distance) * 100`.
///
/// The result is not clamped; a store using a different
/// metric can produce values above 100 or below 0.
pub fn relevance_score(distance: f32) -> f32 {
    (1.0 - distance) * 100.0
}

/// Display band for a relevance score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchQuality {
    Strong,
    Moderate,
    Weak,
}

impl MatchQuality {
    /// Band for `score`. Only used for presentation, never for filtering.
    pub fn from_score(score: f32) -> Self {
        if score >= STRONG_SCORE {
            Self::Strong
        } else if score >= MODERATE_SCORE {
            Self::Moderate
        } else {
            Self::Weak
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Strong => "STRONG MATCH",
            Self::Moderate => "MODERATE MATCH",
            Self::Weak => "WEAK MATCH",
        }
    }
}

impl fmt::Display for MatchQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A search hit with its derived relevance score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevanceMatch {
    pub hit: SearchHit,
    pub score: f32,
}

impl RelevanceMatch {
    /// Score `hit` from its raw distance.
    pub fn new(hit: SearchHit) -> Self {
        let score = relevance_score(hit.distance);
        Self { hit, score }
    }

    pub fn quality(&self) -> MatchQuality {
        MatchQuality::from_score(self.score)
    }

    /// Typed view of the matched record's metadata.
    pub fn metadata(&self) -> RecordMetadata {
        self.hit.record_metadata()
    }

    /// Score rounded to two decimals, for display.
    pub fn display_score(&self) -> f32 {
        (self.score * 100.0).round() / 100.0
    }
}

/// Score `hits`, drop those below `min_score`, and keep at most `top_k`.
///
/// `hits` must already be in ascending-distance order (as every
/// [`VectorStore`](crate::VectorStore) returns them); that order is kept, so
/// the result is in descending score order with ties in input order.
pub fn rank(hits: Vec<SearchHit>, min_score: f32, top_k: usize) -> Vec<RelevanceMatch> {
    hits.into_iter().map(RelevanceMatch::new).filter(|m| m.score >= min_score).take(top_k).collect()
}

/// Counts of matches per [`MatchQuality`] band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QualityStats {
    pub strong: usize,
    pub moderate: usize,
    pub weak: usize,
}

impl QualityStats {
    pub fn from_matches(matches: &[RelevanceMatch]) -> Self {
        matches.iter().fold(Self::default(), |mut stats, m| {
            match m.quality() {
                MatchQuality::Strong => stats.strong += 1,
                MatchQuality::Moderate => stats.moderate += 1,
                MatchQuality::Weak => stats.weak += 1,
            }
            stats
        })
    }
}
