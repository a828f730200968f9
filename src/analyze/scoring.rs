//! Scoring engine: recency, source credibility and macro keyword signal.
//!
//! ```text
//! recency     = exp(-hours_since_publication / 24)
//! score       = (base_relevance*0.3 + recency*0.3 + credibility*0.4) * (1 + macro_boost)
//! ```
//!
//! Scores are relative ranking values and may exceed 1.0 when boosted.
//!
//! Non-determinism: recency depends on wall-clock time. `ScoringEngine::score`
//! reads `Utc::now()`; tests should call `score_at` with a fixed instant.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::keywords::MacroKeywords;
use super::topics::{TopicBucket, TopicClassifier};
use crate::candidate::Candidate;
use crate::source_weights::SourceCredibility;

pub const W_RELEVANCE: f64 = 0.3;
pub const W_RECENCY: f64 = 0.3;
pub const W_CREDIBILITY: f64 = 0.4;
pub const RECENCY_DECAY_HOURS: f64 = 24.0;

/// Age assigned to unparsable timestamps. Chosen so `exp(-age/24)` stays
/// strictly positive in f64.
pub const MAX_AGE_HOURS: f64 = 24.0 * 700.0;

/// A candidate plus its derived signals. Never mutated after scoring.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub recency_score: f64,
    pub credibility_score: f64,
    pub macro_boost: f64,
    pub topic_bucket: TopicBucket,
    pub score: f64,
}

impl ScoredCandidate {
    pub fn id(&self) -> &str {
        &self.candidate.id
    }

    pub fn title(&self) -> &str {
        &self.candidate.title
    }
}

/// `exp(-hours/24)` in (0, 1]. Future timestamps count as age zero.
///
/// Strictly decreasing up to [`MAX_AGE_HOURS`] (700 days). Older ages are clamped
/// there, so every story past that age shares the same floor score.
pub fn recency_score(hours_since_publication: f64) -> f64 {
    let h = if hours_since_publication.is_nan() {
        MAX_AGE_HOURS
    } else {
        hours_since_publication.clamp(0.0, MAX_AGE_HOURS)
    };
    (-h / RECENCY_DECAY_HOURS).exp()
}

pub fn composite_score(base_relevance: f64, recency: f64, credibility: f64, macro_boost: f64) -> f64 {
    (base_relevance * W_RELEVANCE + recency * W_RECENCY + credibility * W_CREDIBILITY)
        * (1.0 + macro_boost)
}

/// Descending by score, ties by id (ascending) so the order does not depend
/// on input order.
pub fn rank_order(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.candidate.id.cmp(&b.candidate.id))
}

#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    credibility: SourceCredibility,
    keywords: MacroKeywords,
    topics: TopicClassifier,
}

impl ScoringEngine {
    pub fn new(
        credibility: SourceCredibility,
        keywords: MacroKeywords,
        topics: TopicClassifier,
    ) -> Self {
        Self {
            credibility,
            keywords,
            topics,
        }
    }

    pub fn credibility(&self) -> &SourceCredibility {
        &self.credibility
    }

    /// Score against the current wall-clock time.
    pub fn score(&self, candidates: &[Candidate]) -> Vec<ScoredCandidate> {
        self.score_at(candidates, Utc::now())
    }

    /// Score every candidate against `now` and sort with `rank_order`.
    /// Same length as the input; a malformed candidate only degrades its own score.
    pub fn score_at(&self, candidates: &[Candidate], now: DateTime<Utc>) -> Vec<ScoredCandidate> {
        let mut out: Vec<ScoredCandidate> = candidates
            .iter()
            .map(|c| self.score_one(c, now))
            .collect();
        out.sort_by(rank_order);
        out
    }

    pub fn score_one(&self, c: &Candidate, now: DateTime<Utc>) -> ScoredCandidate {
        let hours = match c.parsed_published() {
            Some(published) => (now - published).num_milliseconds() as f64 / 3_600_000.0,
            None => MAX_AGE_HOURS,
        };
        let recency = recency_score(hours);
        let credibility = self.credibility.weight_for(&c.source);

        let text = c.scan_text();
        let macro_boost = self.keywords.boost(&text);
        let topic_bucket = self.topics.classify(&text);

        let score = composite_score(c.base_relevance(), recency, credibility, macro_boost);

        ScoredCandidate {
            candidate: c.clone(),
            recency_score: recency,
            credibility_score: credibility,
            macro_boost,
            topic_bucket,
            score,
        }
    }
}
