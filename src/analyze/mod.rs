// src/analyze/mod.rs
//! Curation stages: scoring, deduplication, diversity, model arbitration and fallback.
//!
//! Each stage is a plain function or a small value type; `crate::pipeline::Curator`
//! strings them together.

pub mod ai_adapter;
pub mod arbitrator;
pub mod dedup;
pub mod diversity;
pub mod fallback;
pub mod keywords;
pub mod scoring;
pub mod topics;

// Re-export convenient types.
pub use crate::analyze::ai_adapter::{build_provider, ArbitrationError, CompletionProvider, DynProvider};
pub use crate::analyze::arbitrator::{Arbitration, Arbitrator};
pub use crate::analyze::dedup::{Deduplicator, TitleTokenizer};
pub use crate::analyze::diversity::{diversified_shortlist, diversify, top_k};
pub use crate::analyze::fallback::fallback_headlines;
pub use crate::analyze::keywords::MacroKeywords;
pub use crate::analyze::scoring::{ScoredCandidate, ScoringEngine};
pub use crate::analyze::topics::{TopicBucket, TopicClassifier, TopicRule};
