//! headline.rs: output structures: final headlines, pipeline metadata and the
//! ready / no-data outcome returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyze::topics::TopicBucket;

/// One curated headline. Built only by the arbitrator or the fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalHeadline {
    pub title: String,
    pub source: String,
    pub url: String,
    pub published_at: String,
    pub why_it_matters: String,
    /// In [0,1].
    pub confidence: f64,
    /// Position in the shortlist handed to the arbitrator.
    pub shortlist_index: usize,
    pub candidate_id: String,
    pub topic: TopicBucket,
}

/// Which stage produced the final selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPath {
    Model,
    Fallback,
}

/// Why the fallback ran. Observability only; callers still get a normal result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    Disabled,
    Transport,
    Timeout,
    Deadline,
    HttpStatus,
    Unparsable,
    NoValidSelections,
}

impl FallbackReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FallbackReason::Disabled => "disabled",
            FallbackReason::Transport => "transport",
            FallbackReason::Timeout => "timeout",
            FallbackReason::Deadline => "deadline",
            FallbackReason::HttpStatus => "http_status",
            FallbackReason::Unparsable => "unparsable",
            FallbackReason::NoValidSelections => "no_valid_selections",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineMeta {
    /// Candidates received from the source.
    pub candidates_reviewed: usize,
    /// Survivors of deduplication.
    pub after_dedup: usize,
    /// Size of the shortlist given to the arbitrator.
    pub shortlisted: usize,
    pub selection: SelectionPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
    pub provider: String,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_age_ms: Option<u64>,
    pub generated_at: DateTime<Utc>,
    /// Overall rationale from the model, if it gave one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurationResult {
    pub headlines: Vec<FinalHeadline>,
    pub meta: PipelineMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoData {
    pub reason: String,
    pub candidates_reviewed: usize,
}

/// What a caller gets: a populated list, or an explicit "no data" signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CurationOutcome {
    Ready(CurationResult),
    NoData(NoData),
}

impl CurationOutcome {
    pub fn headlines(&self) -> &[FinalHeadline] {
        match self {
            CurationOutcome::Ready(r) => &r.headlines,
            CurationOutcome::NoData(_) => &[],
        }
    }

    pub fn meta(&self) -> Option<&PipelineMeta> {
        match self {
            CurationOutcome::Ready(r) => Some(&r.meta),
            CurationOutcome::NoData(_) => None,
        }
    }

    pub fn is_cached(&self) -> bool {
        self.meta().map(|m| m.cached).unwrap_or(false)
    }
}
