// src/config/curation.rs
//! Curation tunables loaded from TOML.
//!
//! ```toml
//! [pipeline]
//! shortlist_size = 20
//! output_size = 5
//! cache_ttl_secs = 1800
//! deadline_ms = 20000
//!
//! [keywords]
//! phrases = ["federal reserve", "inflation"]
//! per_keyword = 0.1
//! cap = 3
//!
//! [dedup]
//! threshold = 0.5
//! token_aliases = { fed = "federal reserve" }
//!
//! [[topics]]
//! bucket = "macro_rates"
//! pattern = '\b(fed|inflation)\b'
//! ```
//!
//! Every section is optional. An empty `topics` list keeps the built-in table.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analyze::dedup::{
    default_token_aliases, Deduplicator, TitleTokenizer, DEFAULT_SIMILARITY_THRESHOLD,
};
use crate::analyze::diversity::{DEFAULT_OUTPUT_SIZE, DEFAULT_SHORTLIST_SIZE};
use crate::analyze::keywords::{
    default_macro_keywords, MacroKeywords, DEFAULT_KEYWORD_CAP, DEFAULT_PER_KEYWORD_BOOST,
};
use crate::analyze::scoring::ScoringEngine;
use crate::analyze::topics::{TopicClassifier, TopicRule};
use crate::source_weights::SourceCredibility;

pub const DEFAULT_CURATION_CONFIG_PATH: &str = "config/curation.toml";
pub const ENV_CURATION_CONFIG_PATH: &str = "CURATION_CONFIG_PATH";
pub const ENV_CACHE_TTL_SECS: &str = "CURATION_CACHE_TTL_SECS";
pub const ENV_DEADLINE_MS: &str = "CURATION_DEADLINE_MS";

/// Hard caps; configuration may lower them, never raise them.
pub const MAX_SHORTLIST_SIZE: usize = DEFAULT_SHORTLIST_SIZE;
pub const MAX_OUTPUT_SIZE: usize = DEFAULT_OUTPUT_SIZE;

pub const DEFAULT_CACHE_TTL_SECS: u64 = 30 * 60;
pub const DEFAULT_DEADLINE_MS: u64 = 20_000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurationConfig {
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub keywords: KeywordSection,
    #[serde(default)]
    pub dedup: DedupSection,
    #[serde(default)]
    pub topics: Vec<TopicRule>,
    /// Overrides `$SOURCE_CREDIBILITY_PATH` / the default credibility file.
    #[serde(default)]
    pub credibility_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_shortlist_size")]
    pub shortlist_size: usize,
    #[serde(default = "default_output_size")]
    pub output_size: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            shortlist_size: default_shortlist_size(),
            output_size: default_output_size(),
            cache_ttl_secs: default_cache_ttl_secs(),
            deadline_ms: default_deadline_ms(),
        }
    }
}

fn default_shortlist_size() -> usize {
    DEFAULT_SHORTLIST_SIZE
}
fn default_output_size() -> usize {
    DEFAULT_OUTPUT_SIZE
}
fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}
fn default_deadline_ms() -> u64 {
    DEFAULT_DEADLINE_MS
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordSection {
    #[serde(default = "default_macro_keywords")]
    pub phrases: Vec<String>,
    #[serde(default = "default_per_keyword")]
    pub per_keyword: f64,
    #[serde(default = "default_keyword_cap")]
    pub cap: usize,
}

impl Default for KeywordSection {
    fn default() -> Self {
        Self {
            phrases: default_macro_keywords(),
            per_keyword: default_per_keyword(),
            cap: default_keyword_cap(),
        }
    }
}

fn default_per_keyword() -> f64 {
    DEFAULT_PER_KEYWORD_BOOST
}
fn default_keyword_cap() -> usize {
    DEFAULT_KEYWORD_CAP
}

#[derive(Debug, Clone, Deserialize)]
pub struct DedupSection {
    #[serde(default = "default_dedup_threshold")]
    pub threshold: f64,
    #[serde(default = "default_token_aliases")]
    pub token_aliases: HashMap<String, String>,
}

impl Default for DedupSection {
    fn default() -> Self {
        Self {
            threshold: default_dedup_threshold(),
            token_aliases: default_token_aliases(),
        }
    }
}

fn default_dedup_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}

// parse optional integer env
fn parse_u64_env(raw: Option<String>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
}

impl CurationConfig {
    /// Load from `$CURATION_CONFIG_PATH` or `config/curation.toml`, then apply env
    /// overrides. A missing file yields defaults; an unreadable or invalid one is an error.
    pub fn load_default() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_CURATION_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CURATION_CONFIG_PATH));
        let mut cfg = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            tracing::info!(path = %path.display(), "no curation config file; using defaults");
            Self::default()
        };
        cfg.apply_env_overrides();
        Ok(cfg.sanitized())
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read curation config at {}: {}", path.display(), e)
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let cfg: CurationConfig = toml::from_str(s)?;
        Ok(cfg.sanitized())
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(ttl) = parse_u64_env(std::env::var(ENV_CACHE_TTL_SECS).ok()) {
            self.pipeline.cache_ttl_secs = ttl;
        }
        if let Some(ms) = parse_u64_env(std::env::var(ENV_DEADLINE_MS).ok()) {
            self.pipeline.deadline_ms = ms;
        }
    }

    /// Clamp sizes to the hard caps and keep `output_size <= shortlist_size`.
    pub fn sanitized(mut self) -> Self {
        let p = &mut self.pipeline;
        p.shortlist_size = p.shortlist_size.clamp(1, MAX_SHORTLIST_SIZE);
        p.output_size = p.output_size.clamp(1, MAX_OUTPUT_SIZE).min(p.shortlist_size);
        if p.deadline_ms == 0 {
            p.deadline_ms = DEFAULT_DEADLINE_MS;
        }
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.pipeline.cache_ttl_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.pipeline.deadline_ms)
    }

    pub fn credibility(&self) -> SourceCredibility {
        match &self.credibility_path {
            Some(p) => SourceCredibility::load_from_file(p),
            None => SourceCredibility::load_default(),
        }
    }

    pub fn topic_classifier(&self) -> anyhow::Result<TopicClassifier> {
        if self.topics.is_empty() {
            Ok(TopicClassifier::default())
        } else {
            TopicClassifier::from_rules(&self.topics)
        }
    }

    pub fn macro_keywords(&self) -> MacroKeywords {
        MacroKeywords::new(
            &self.keywords.phrases,
            self.keywords.per_keyword,
            self.keywords.cap,
        )
    }

    pub fn build_engine(&self) -> anyhow::Result<ScoringEngine> {
        Ok(ScoringEngine::new(
            self.credibility(),
            self.macro_keywords(),
            self.topic_classifier()?,
        ))
    }

    pub fn deduplicator(&self) -> Deduplicator {
        Deduplicator::new(
            TitleTokenizer::new(self.dedup.token_aliases.clone()),
            self.dedup.threshold,
        )
    }
}
