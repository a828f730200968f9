// src/pipeline.rs
//! Curator: source → score → dedup → shortlist → diversity → arbitration/fallback → cache.
//!
//! The whole run is bounded by one deadline. Fetching past it yields "no data";
//! arbitration past it falls back to the deterministic selection.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, histogram};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::analyze::ai_adapter::{build_provider, ArbitrationError};
use crate::analyze::arbitrator::Arbitrator;
use crate::analyze::dedup::Deduplicator;
use crate::analyze::diversity::{diversified_shortlist, top_k};
use crate::analyze::fallback::fallback_headlines;
use crate::analyze::scoring::ScoringEngine;
use crate::cache::{Lookup, ResultCache};
use crate::candidate::{Candidate, CandidateSource};
use crate::config::{AiConfig, CurationConfig};
use crate::headline::{
    CurationOutcome, CurationResult, FallbackReason, NoData, PipelineMeta, SelectionPath,
};
use crate::metrics::ensure_metrics_described;

impl From<&ArbitrationError> for FallbackReason {
    fn from(e: &ArbitrationError) -> Self {
        match e {
            ArbitrationError::Disabled | ArbitrationError::MissingApiKey(_) => {
                FallbackReason::Disabled
            }
            ArbitrationError::Transport(_) => FallbackReason::Transport,
            ArbitrationError::Timeout => FallbackReason::Timeout,
            ArbitrationError::HttpStatus { .. } => FallbackReason::HttpStatus,
            ArbitrationError::EmptyCompletion | ArbitrationError::Json(_) => {
                FallbackReason::Unparsable
            }
            ArbitrationError::NoValidSelections => FallbackReason::NoValidSelections,
        }
    }
}

pub struct Curator {
    source: Arc<dyn CandidateSource>,
    engine: ScoringEngine,
    dedup: Deduplicator,
    arbitrator: Arbitrator,
    cache: ResultCache<CurationResult>,
    shortlist_size: usize,
    output_size: usize,
    deadline: Duration,
}

impl Curator {
    /// Sizes are taken from `cfg` after clamping to the hard caps.
    pub fn new(
        source: Arc<dyn CandidateSource>,
        engine: ScoringEngine,
        arbitrator: Arbitrator,
        cfg: &CurationConfig,
    ) -> Self {
        let cfg = cfg.clone().sanitized();
        Self {
            source,
            engine,
            dedup: cfg.deduplicator(),
            arbitrator,
            cache: ResultCache::new(cfg.cache_ttl()),
            shortlist_size: cfg.pipeline.shortlist_size,
            output_size: cfg.pipeline.output_size,
            deadline: cfg.deadline(),
        }
    }

    /// Build every stage from configuration files.
    pub fn from_config(
        source: Arc<dyn CandidateSource>,
        cfg: &CurationConfig,
        ai: &AiConfig,
    ) -> anyhow::Result<Self> {
        let engine = cfg.build_engine()?;
        let arbitrator = Arbitrator::new(build_provider(ai), cfg.pipeline.output_size);
        Ok(Self::new(source, engine, arbitrator, cfg))
    }

    pub fn cache(&self) -> &ResultCache<CurationResult> {
        &self.cache
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Cached path with the configured deadline.
    pub async fn headlines(&self) -> CurationOutcome {
        self.headlines_within(self.deadline).await
    }

    /// Cached path. `deadline` bounds the whole call, including time spent queued
    /// behind a concurrent refresh; a cache hit is returned regardless.
    ///
    /// A caller that runs out of time in the queue curates on its own and the result
    /// is not stored. A deadline fallback produced under a budget shorter than the
    /// configured one is not stored either.
    pub async fn headlines_within(&self, deadline: Duration) -> CurationOutcome {
        ensure_metrics_described();
        let end = Instant::now() + deadline;
        let shortened = deadline < self.deadline;
        let lookup = self
            .cache
            .get_or_refresh_until(
                Some(end),
                || self.fetch_and_curate(end),
                |r: &CurationResult| {
                    !(shortened && r.meta.fallback_reason == Some(FallbackReason::Deadline))
                },
            )
            .await;
        match lookup {
            Lookup::Hit { mut value, age } => {
                counter!("curation_cache_hits_total").increment(1);
                value.meta.cached = true;
                value.meta.cache_age_ms = Some((age.as_millis() as u64).max(1));
                CurationOutcome::Ready(value)
            }
            Lookup::Refreshed(value) => CurationOutcome::Ready(value),
            Lookup::Uncached(value) => {
                debug!(target: "curation", ?deadline, "shortened-deadline fallback kept out of cache");
                CurationOutcome::Ready(value)
            }
            Lookup::Busy => {
                info!(target: "curation", ?deadline, "refresh still running at caller deadline; curating uncached");
                outcome(self.fetch_and_curate(end).await)
            }
            Lookup::Failed(no_data) => CurationOutcome::NoData(no_data),
        }
    }

    /// Uncached run over the configured source.
    pub async fn curate(&self, deadline: Duration) -> CurationOutcome {
        ensure_metrics_described();
        outcome(self.fetch_and_curate(Instant::now() + deadline).await)
    }

    /// Uncached run over a caller-supplied pool; the source and cache are not touched.
    pub async fn curate_pool(&self, pool: &[Candidate], deadline: Duration) -> CurationOutcome {
        ensure_metrics_described();
        outcome(self.curate_until(pool, Instant::now() + deadline).await)
    }

    async fn fetch_and_curate(&self, end: Instant) -> Result<CurationResult, NoData> {
        let pool = match timeout_at(end, self.source.fetch_candidates()).await {
            Ok(Ok(pool)) => pool,
            Ok(Err(e)) => {
                warn!(target: "curation", source = self.source.name(), error = ?e, "candidate source failed");
                return Err(no_data(format!("candidate source failed: {e}"), 0));
            }
            Err(_) => {
                warn!(target: "curation", source = self.source.name(), "candidate fetch exceeded deadline");
                return Err(no_data("candidate source timed out".to_string(), 0));
            }
        };
        self.curate_until(&pool, end).await
    }

    async fn curate_until(&self, pool: &[Candidate], end: Instant) -> Result<CurationResult, NoData> {
        let started = Instant::now();
        if pool.is_empty() {
            return Err(no_data("no candidates available".to_string(), 0));
        }

        let scored = self.engine.score(pool);
        let deduped = self.dedup.dedup(scored);
        let shortlist = diversified_shortlist(&top_k(&deduped, self.shortlist_size), self.output_size);

        let (mut headlines, selection, fallback_reason, rationale) =
            match timeout_at(end, self.arbitrator.arbitrate(&shortlist)).await {
                Ok(Ok(a)) => (a.headlines, SelectionPath::Model, None, a.rationale),
                Ok(Err(e)) => {
                    let reason = FallbackReason::from(&e);
                    warn!(target: "curation", reason = reason.as_str(), error = %e, "arbitration failed; using fallback");
                    (
                        fallback_headlines(&shortlist, self.output_size),
                        SelectionPath::Fallback,
                        Some(reason),
                        None,
                    )
                }
                Err(_) => {
                    warn!(target: "curation", "arbitration exceeded deadline; using fallback");
                    (
                        fallback_headlines(&shortlist, self.output_size),
                        SelectionPath::Fallback,
                        Some(FallbackReason::Deadline),
                        None,
                    )
                }
            };
        headlines.truncate(self.output_size);

        if let Some(reason) = fallback_reason {
            counter!("curation_fallback_total", "reason" => reason.as_str()).increment(1);
        }
        let path = match selection {
            SelectionPath::Model => "model",
            SelectionPath::Fallback => "fallback",
        };
        counter!("curation_runs_total", "selection" => path).increment(1);
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        histogram!("curation_pipeline_ms").record(elapsed_ms);

        info!(
            target: "curation",
            reviewed = pool.len(),
            after_dedup = deduped.len(),
            shortlisted = shortlist.len(),
            selected = headlines.len(),
            selection = path,
            elapsed_ms,
            "curation run complete"
        );

        Ok(CurationResult {
            headlines,
            meta: PipelineMeta {
                candidates_reviewed: pool.len(),
                after_dedup: deduped.len(),
                shortlisted: shortlist.len(),
                selection,
                fallback_reason,
                provider: self.arbitrator.provider_name().to_string(),
                cached: false,
                cache_age_ms: None,
                generated_at: Utc::now(),
                rationale,
            },
        })
    }
}

fn outcome(run: Result<CurationResult, NoData>) -> CurationOutcome {
    match run {
        Ok(r) => CurationOutcome::Ready(r),
        Err(nd) => CurationOutcome::NoData(nd),
    }
}

fn no_data(reason: String, candidates_reviewed: usize) -> NoData {
    counter!("curation_no_data_total").increment(1);
    NoData {
        reason,
        candidates_reviewed,
    }
}
