// src/analyze/diversity.rs
//! Shortlisting and topic-bucket diversity.
//!
//! Two separate operations:
//! - `top_k`: plain truncation of a ranked list (pool → shortlist).
//! - `diversify`: one best item per bucket in priority order, then fill by score.

use super::scoring::ScoredCandidate;
use super::topics::TopicBucket;

pub const DEFAULT_SHORTLIST_SIZE: usize = 20;
pub const DEFAULT_OUTPUT_SIZE: usize = 5;

pub fn top_k(ranked: &[ScoredCandidate], k: usize) -> Vec<ScoredCandidate> {
    ranked.iter().take(k).cloned().collect()
}

/// Positions (into `ranked`) chosen by the two-pass diversity rule, ascending.
fn diversity_picks(ranked: &[ScoredCandidate], cap: usize) -> Vec<bool> {
    let mut taken = vec![false; ranked.len()];
    let mut count = 0usize;

    // Pass 1: best remaining item of each bucket, buckets in priority order.
    for bucket in TopicBucket::ALL {
        if count >= cap {
            break;
        }
        if let Some(pos) = ranked
            .iter()
            .enumerate()
            .position(|(i, c)| !taken[i] && c.topic_bucket == bucket)
        {
            taken[pos] = true;
            count += 1;
        }
    }

    // Pass 2: fill by score regardless of bucket.
    for flag in taken.iter_mut() {
        if count >= cap {
            break;
        }
        if !*flag {
            *flag = true;
            count += 1;
        }
    }
    taken
}

/// Select up to `cap` items guaranteeing bucket coverage where possible.
/// The selection is returned in input (score) order.
pub fn diversify(ranked: &[ScoredCandidate], cap: usize) -> Vec<ScoredCandidate> {
    let taken = diversity_picks(ranked, cap);
    ranked
        .iter()
        .zip(taken)
        .filter(|(_, t)| *t)
        .map(|(c, _)| c.clone())
        .collect()
}

/// The diversity picks first, then every other shortlist entry; both groups
/// keep score order. Length is unchanged.
pub fn diversified_shortlist(ranked: &[ScoredCandidate], head: usize) -> Vec<ScoredCandidate> {
    let taken = diversity_picks(ranked, head);
    let mut front = Vec::with_capacity(ranked.len());
    let mut back = Vec::new();
    for (c, t) in ranked.iter().zip(taken) {
        if t {
            front.push(c.clone());
        } else {
            back.push(c.clone());
        }
    }
    front.extend(back);
    front
}
