// src/lib.rs
// Public library surface for the service binary and integration tests.

pub mod api;
pub mod cache;
pub mod candidate;
pub mod config;
pub mod headline;
pub mod metrics;
pub mod pipeline;
pub mod source_weights;

// Curation stages (scoring, dedup, diversity, arbitration, fallback)
pub mod analyze;

use std::sync::Arc;

use shuttle_axum::axum::Router;
use tracing::info;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::candidate::{Candidate, CandidateSource, JsonFileSource, StaticSource};
pub use crate::headline::{CurationOutcome, CurationResult, FinalHeadline};
pub use crate::pipeline::Curator;

/// Build a curator from the default config locations and the JSON candidate file.
///
/// * `config/curation.toml` (or `$CURATION_CONFIG_PATH`)
/// * `config/ai.json` (or `$AI_CONFIG_PATH`; `AI_TEST_MODE=mock` forces the mock model)
/// * `data/candidates.json` (or `$CANDIDATES_PATH`)
pub fn build_curator() -> anyhow::Result<Curator> {
    let cfg = config::CurationConfig::load_default()?;
    let ai = config::AiConfig::load_default();
    let source = Arc::new(JsonFileSource::from_env());
    let curator = Curator::from_config(source, &cfg, &ai)?;
    info!(
        source = curator.source_name(),
        ttl_secs = cfg.pipeline.cache_ttl_secs,
        deadline_ms = cfg.pipeline.deadline_ms,
        ai_enabled = ai.enabled,
        provider = %ai.provider,
        "curator ready"
    );
    Ok(curator)
}

/// In-process app router (without `/metrics`); used by the binary and by tests.
pub async fn app() -> anyhow::Result<Router> {
    Ok(router(AppState::new(build_curator()?)))
}
