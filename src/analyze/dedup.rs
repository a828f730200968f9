// src/analyze/dedup.rs
//! Near-duplicate collapse over ranked candidates.
//!
//! Similarity is Jaccard over normalized title tokens. A newcomer that is
//! similar (>= threshold) to an already kept item replaces it in place when its
//! score is strictly higher; otherwise it is dropped. Survivors keep their
//! relative order. O(n²), bounded by the candidate pool size.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::scoring::ScoredCandidate;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.5;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "by", "for", "in", "of", "on", "or", "the", "to", "with",
];

pub fn default_token_aliases() -> HashMap<String, String> {
    [
        ("fed", "federal reserve"),
        ("bps", "basis points"),
        ("bp", "basis points"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Title tokenizer used for similarity.
#[derive(Debug, Clone)]
pub struct TitleTokenizer {
    aliases: HashMap<String, String>,
}

impl Default for TitleTokenizer {
    fn default() -> Self {
        Self::new(default_token_aliases())
    }
}

impl TitleTokenizer {
    pub fn new(aliases: HashMap<String, String>) -> Self {
        let aliases = aliases
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v.to_lowercase()))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        Self { aliases }
    }

    /// Lower-case, split on whitespace, trim edge punctuation, split digit/letter
    /// runs, drop stop-words, expand aliases.
    pub fn tokens(&self, title: &str) -> HashSet<String> {
        let decoded = html_escape::decode_html_entities(title).to_lowercase();
        let mut out = HashSet::new();
        for raw in decoded.split_whitespace() {
            let word = raw.trim_matches(|c: char| !c.is_alphanumeric());
            for piece in split_digit_runs(word) {
                if STOP_WORDS.contains(&piece.as_str()) {
                    continue;
                }
                match self.aliases.get(&piece) {
                    Some(expansion) => {
                        out.extend(expansion.split_whitespace().map(str::to_string));
                    }
                    None => {
                        out.insert(piece);
                    }
                }
            }
        }
        out
    }
}

/// "25bps" → ["25", "bps"]; "q3" → ["q", "3"]; "s&p" stays whole.
fn split_digit_runs(word: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut cur = String::new();
    let mut cur_digit: Option<bool> = None;
    for ch in word.chars() {
        let is_digit = ch.is_ascii_digit();
        let boundary = ch.is_alphabetic() || is_digit;
        match cur_digit {
            Some(d) if boundary && d != is_digit => {
                pieces.push(std::mem::take(&mut cur));
            }
            _ => {}
        }
        cur.push(ch);
        if boundary {
            cur_digit = Some(is_digit);
        }
    }
    if !cur.is_empty() {
        pieces.push(cur);
    }
    pieces
}

/// |A ∩ B| / |A ∪ B|. Two empty sets are not considered similar.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let inter = a.intersection(b).count();
    inter as f64 / union as f64
}

/// One-shot dedup with the default tokenizer.
pub fn dedup_by_title(ranked: Vec<ScoredCandidate>, threshold: f64) -> Vec<ScoredCandidate> {
    Deduplicator::new(TitleTokenizer::default(), threshold).dedup(ranked)
}

#[derive(Debug, Clone)]
pub struct Deduplicator {
    tokenizer: TitleTokenizer,
    threshold: f64,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(TitleTokenizer::default(), DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl Deduplicator {
    pub fn new(tokenizer: TitleTokenizer, threshold: f64) -> Self {
        let threshold = if threshold.is_finite() {
            threshold.clamp(0.0, 1.0)
        } else {
            DEFAULT_SIMILARITY_THRESHOLD
        };
        Self {
            tokenizer,
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        jaccard(&self.tokenizer.tokens(a), &self.tokenizer.tokens(b))
    }

    /// Collapse near-duplicates in a descending-score list.
    pub fn dedup(&self, ranked: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
        let mut kept: Vec<ScoredCandidate> = Vec::with_capacity(ranked.len());
        let mut kept_tokens: Vec<HashSet<String>> = Vec::with_capacity(ranked.len());

        for item in ranked {
            let tokens = self.tokenizer.tokens(item.title());
            let dup_of = kept_tokens
                .iter()
                .position(|t| jaccard(t, &tokens) >= self.threshold);

            match dup_of {
                Some(j) if item.score > kept[j].score => {
                    debug!(
                        target: "curation",
                        kept = %item.id(),
                        dropped = %kept[j].id(),
                        "duplicate replaced by higher-scored newcomer"
                    );
                    kept[j] = item;
                    kept_tokens[j] = tokens;
                }
                Some(j) => {
                    debug!(
                        target: "curation",
                        kept = %kept[j].id(),
                        dropped = %item.id(),
                        "duplicate dropped"
                    );
                }
                None => {
                    kept.push(item);
                    kept_tokens.push(tokens);
                }
            }
        }
        kept
    }
}
