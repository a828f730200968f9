//! Integration tests for `/headlines` cache behavior with the mock model.
//!
//! Covered (strict):
//! - MISS → HIT within the freshness window (via `X-Curation-Cache` header)
//! - identical content on the HIT, with `cached = true` and a nonzero age
//! - expiry driven by `CURATION_CACHE_TTL_SECS`
//! - no-data runs never populate the cache
//!
//! The app is built exactly like the binary builds it (`headline_curator::app()`),
//! with config paths pointed at temp files.

use axum::{
    body::{self, Body},
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use serde_json::{json, Value};
use serial_test::serial;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;
use tower::ServiceExt; // for oneshot

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheDetect {
    Hit,
    Miss,
}

fn header_cache_signal(headers: &HeaderMap) -> CacheDetect {
    let v = headers
        .get("X-Curation-Cache")
        .expect("X-Curation-Cache header must be present")
        .to_str()
        .expect("X-Curation-Cache header must be valid ASCII")
        .trim()
        .to_ascii_uppercase();
    match v.as_str() {
        "HIT" => CacheDetect::Hit,
        "MISS" => CacheDetect::Miss,
        other => panic!("X-Curation-Cache must be HIT or MISS, got: {other}"),
    }
}

/// Write a candidates file and point the app at it plus a missing curation config.
fn set_common_env(dir: &TempDir, candidates: &Value, ttl_secs: u64) {
    let path = dir.path().join("candidates.json");
    std::fs::write(&path, candidates.to_string()).expect("write candidates");
    std::env::set_var("CANDIDATES_PATH", path.display().to_string());
    std::env::set_var(
        "CURATION_CONFIG_PATH",
        dir.path().join("missing.toml").display().to_string(),
    );
    std::env::set_var("CURATION_CACHE_TTL_SECS", ttl_secs.to_string());
    std::env::remove_var("CURATION_DEADLINE_MS");
    std::env::set_var("AI_TEST_MODE", "mock");
}

fn clear_env() {
    for k in [
        "CANDIDATES_PATH",
        "CURATION_CONFIG_PATH",
        "CURATION_CACHE_TTL_SECS",
        "AI_TEST_MODE",
    ] {
        std::env::remove_var(k);
    }
}

fn sample_candidates() -> Value {
    let ts = |h: i64| (Utc::now() - ChronoDuration::hours(h)).to_rfc3339_opts(SecondsFormat::Secs, true);
    json!([
        {"id": "a", "title": "Fed holds rates steady", "url": "https://example.com/a", "source": "Reuters", "published_at": ts(1)},
        {"id": "b", "title": "Oil climbs as OPEC trims output", "url": "https://example.com/b", "source": "Bloomberg", "published_at": ts(2)},
        {"id": "c", "title": "Nvidia unveils new AI chips", "url": "https://example.com/c", "source": "CNBC", "published_at": ts(3)},
        {"id": "d", "title": "Dow closes at record high", "url": "https://example.com/d", "source": "MarketWatch", "published_at": ts(1)},
        {"id": "e", "title": "Retailer raises guidance after profit beat", "url": "https://example.com/e", "source": "WSJ", "published_at": ts(4)},
        {"id": "f", "title": "SEC opens probe into listings", "url": "https://example.com/f", "source": "Axios", "published_at": ts(5)}
    ])
}

async fn build_app() -> Router {
    headline_curator::app()
        .await
        .expect("app() should build Router in tests")
}

/// GET /headlines. Returns (status, headers, json body).
async fn get_headlines(app: &Router, query: &str) -> (StatusCode, HeaderMap, Value) {
    let req = Request::builder()
        .method("GET")
        .uri(format!("/headlines{query}"))
        .body(Body::empty())
        .expect("request build");

    let resp = app.clone().oneshot(req).await.expect("router response");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    let v: Value = serde_json::from_slice(&bytes).expect("json body");
    (status, headers, v)
}

// --- TESTS ---

#[tokio::test]
#[serial]
async fn cache_miss_then_hit_with_identical_content() {
    let dir = tempfile::tempdir().expect("tempdir");
    set_common_env(&dir, &sample_candidates(), 1800);
    let app = build_app().await;

    let (s1, h1, v1) = get_headlines(&app, "").await;
    assert_eq!(s1, StatusCode::OK);
    assert_eq!(header_cache_signal(&h1), CacheDetect::Miss, "first call should be MISS");
    assert_eq!(v1["meta"]["cached"], false);

    sleep(Duration::from_millis(5)).await;

    let (s2, h2, v2) = get_headlines(&app, "").await;
    assert_eq!(s2, StatusCode::OK);
    assert_eq!(header_cache_signal(&h2), CacheDetect::Hit, "second call should be HIT");
    assert_eq!(v2["meta"]["cached"], true);
    assert!(v2["meta"]["cache_age_ms"].as_u64().unwrap_or(0) > 0);
    assert_eq!(v1["headlines"], v2["headlines"], "cached content must be identical");
    assert_eq!(v1["meta"]["generated_at"], v2["meta"]["generated_at"]);

    clear_env();
}

#[tokio::test]
#[serial]
async fn cache_expires_after_ttl_and_turns_into_miss_again() {
    let dir = tempfile::tempdir().expect("tempdir");
    set_common_env(&dir, &sample_candidates(), 1);
    let app = build_app().await;

    let (_, h1, _) = get_headlines(&app, "").await;
    assert_eq!(header_cache_signal(&h1), CacheDetect::Miss);
    let (_, h2, _) = get_headlines(&app, "").await;
    assert_eq!(header_cache_signal(&h2), CacheDetect::Hit);

    // Comfortably past the 1s window.
    sleep(Duration::from_millis(1500)).await;

    let (_, h3, v3) = get_headlines(&app, "").await;
    assert_eq!(header_cache_signal(&h3), CacheDetect::Miss, "expired entry must be recomputed");
    assert_eq!(v3["meta"]["cached"], false);

    clear_env();
}

#[tokio::test]
#[serial]
async fn no_data_is_never_cached() {
    let dir = tempfile::tempdir().expect("tempdir");
    set_common_env(&dir, &json!([]), 1800);
    let app = build_app().await;

    for _ in 0..2 {
        let (status, headers, v) = get_headlines(&app, "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(header_cache_signal(&headers), CacheDetect::Miss);
        assert_eq!(v["status"], "no_data");
    }

    clear_env();
}

#[tokio::test]
#[serial]
async fn missing_candidates_file_is_no_data() {
    let dir = tempfile::tempdir().expect("tempdir");
    set_common_env(&dir, &sample_candidates(), 1800);
    std::env::set_var(
        "CANDIDATES_PATH",
        dir.path().join("nope.json").display().to_string(),
    );
    let app = build_app().await;

    let (status, headers, v) = get_headlines(&app, "?deadline_ms=2000").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(header_cache_signal(&headers), CacheDetect::Miss);
    assert_eq!(v["status"], "no_data");
    assert!(v["reason"].as_str().unwrap_or_default().contains("candidate source failed"));

    clear_env();
}
