use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use shuttle_axum::axum::{
    extract::{Query, State},
    http::{header::HeaderName, HeaderValue},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::candidate::Candidate;
use crate::headline::CurationOutcome;
use crate::pipeline::Curator;

pub const CACHE_HEADER: &str = "x-curation-cache";

/// Caller-supplied deadlines are clamped to this range.
const MIN_DEADLINE_MS: u64 = 1;
const MAX_DEADLINE_MS: u64 = 120_000;

#[derive(Clone)]
pub struct AppState {
    curator: Arc<Curator>,
}

impl AppState {
    pub fn new(curator: Curator) -> Self {
        Self {
            curator: Arc::new(curator),
        }
    }

    pub fn curator(&self) -> &Curator {
        &self.curator
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/headlines", get(headlines))
        .route("/curate", post(curate))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct DeadlineQuery {
    #[serde(default)]
    deadline_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CurateReq {
    candidates: Vec<Candidate>,
    #[serde(default)]
    deadline_ms: Option<u64>,
}

fn effective_deadline(requested: Option<u64>, default: Duration) -> Duration {
    match requested {
        Some(ms) => Duration::from_millis(ms.clamp(MIN_DEADLINE_MS, MAX_DEADLINE_MS)),
        None => default,
    }
}

async fn headlines(
    State(state): State<AppState>,
    Query(q): Query<DeadlineQuery>,
) -> impl IntoResponse {
    let curator = state.curator();
    let deadline = effective_deadline(q.deadline_ms, curator.deadline());
    let outcome = curator.headlines_within(deadline).await;
    let flag = if outcome.is_cached() { "HIT" } else { "MISS" };
    (
        [(HeaderName::from_static(CACHE_HEADER), HeaderValue::from_static(flag))],
        Json(outcome),
    )
}

async fn curate(State(state): State<AppState>, Json(body): Json<CurateReq>) -> Json<CurationOutcome> {
    let curator = state.curator();
    let deadline = effective_deadline(body.deadline_ms, curator.deadline());
    Json(curator.curate_pool(&body.candidates, deadline).await)
}
