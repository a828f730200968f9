// src/analyze/fallback.rs
//! Deterministic selection used whenever model arbitration yields nothing usable.
//! No I/O; always succeeds for a non-empty shortlist.

use super::scoring::ScoredCandidate;
use crate::headline::FinalHeadline;

/// "<Bucket> story from <source> (credibility NN%)".
pub fn synthesized_rationale(c: &ScoredCandidate) -> String {
    let source = c.candidate.source.trim();
    let source = if source.is_empty() { "an unnamed outlet" } else { source };
    format!(
        "{} story from {} (credibility {:.0}%)",
        c.topic_bucket.label(),
        source,
        c.credibility_score * 100.0
    )
}

pub fn clamp_confidence(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Headline built purely from the candidate's own fields.
pub fn headline_from_candidate(index: usize, c: &ScoredCandidate) -> FinalHeadline {
    let published_at = c
        .candidate
        .parsed_published()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| c.candidate.published_at.clone());
    FinalHeadline {
        title: c.candidate.title.clone(),
        source: c.candidate.source.clone(),
        url: c.candidate.url.clone(),
        published_at,
        why_it_matters: synthesized_rationale(c),
        confidence: clamp_confidence(c.score),
        shortlist_index: index,
        candidate_id: c.candidate.id.clone(),
        topic: c.topic_bucket,
    }
}

/// First `cap` shortlist entries, in shortlist order.
pub fn fallback_headlines(shortlist: &[ScoredCandidate], cap: usize) -> Vec<FinalHeadline> {
    shortlist
        .iter()
        .take(cap)
        .enumerate()
        .map(|(i, c)| headline_from_candidate(i, c))
        .collect()
}
