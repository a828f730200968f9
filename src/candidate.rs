// src/candidate.rs
//! Candidate articles as delivered by the upstream news source, and the
//! `CandidateSource` seam the pipeline pulls them through.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CANDIDATES_PATH: &str = "data/candidates.json";
pub const ENV_CANDIDATES_PATH: &str = "CANDIDATES_PATH";

/// Relevance assumed when the upstream matcher did not supply one.
pub const DEFAULT_BASE_RELEVANCE: f64 = 0.5;

/// One unranked news item. Immutable once received.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    pub url: String,
    pub source: String,
    /// Raw publication timestamp as received (RFC 3339 preferred).
    pub published_at: String,
    /// Pre-existing relevance in [0,1] from the upstream matcher.
    #[serde(default)]
    pub relevance: Option<f64>,
}

impl Candidate {
    /// Parse `published_at`. Naive timestamps are read as UTC.
    pub fn parsed_published(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.published_at)
    }

    pub fn base_relevance(&self) -> f64 {
        match self.relevance {
            Some(r) if r.is_finite() => r.clamp(0.0, 1.0),
            _ => DEFAULT_BASE_RELEVANCE,
        }
    }

    /// Title and summary joined for keyword/topic scans, HTML entities decoded.
    pub fn scan_text(&self) -> String {
        let mut text = html_escape::decode_html_entities(&self.title).to_string();
        if let Some(summary) = self.summary.as_deref() {
            if !summary.trim().is_empty() {
                text.push(' ');
                text.push_str(&html_escape::decode_html_entities(summary));
            }
        }
        text
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Upstream supplier of already-relevant candidate articles.
#[async_trait::async_trait]
pub trait CandidateSource: Send + Sync {
    async fn fetch_candidates(&self) -> Result<Vec<Candidate>>;
    fn name(&self) -> &'static str;
}

/// In-memory pool; used for ad-hoc curation and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    items: Vec<Candidate>,
}

impl StaticSource {
    pub fn new(items: Vec<Candidate>) -> Self {
        Self { items }
    }
}

#[async_trait::async_trait]
impl CandidateSource for StaticSource {
    async fn fetch_candidates(&self) -> Result<Vec<Candidate>> {
        Ok(self.items.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Reads a JSON array of candidates from disk on every fetch, so an upstream
/// job can refresh the file without restarting the service.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$CANDIDATES_PATH` or `data/candidates.json`.
    pub fn from_env() -> Self {
        let path = std::env::var(ENV_CANDIDATES_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CANDIDATES_PATH));
        Self::new(path)
    }
}

#[async_trait::async_trait]
impl CandidateSource for JsonFileSource {
    async fn fetch_candidates(&self) -> Result<Vec<Candidate>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading candidates from {}", self.path.display()))?;
        let items: Vec<Candidate> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing candidates in {}", self.path.display()))?;
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "json_file"
    }
}
