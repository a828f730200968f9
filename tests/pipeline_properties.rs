// tests/pipeline_properties.rs
//
// Stage-level properties over realistic pools:
// - scoring is order-independent and repeatable at a fixed instant
// - recency strictly decreases with age and stays in (0, 1]
// - dedup is idempotent
// - diversity covers the five highest-priority buckets when present
// - near-duplicate Fed headlines collapse to the higher-scored one

use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use headline_curator::analyze::diversity::{diversify, top_k};
use headline_curator::analyze::scoring::recency_score;
use headline_curator::analyze::{Deduplicator, ScoringEngine, TopicBucket};
use headline_curator::Candidate;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 21, 0, 0).unwrap()
}

fn cand(id: &str, title: &str, source: &str, hours_ago: i64) -> Candidate {
    Candidate {
        id: id.into(),
        title: title.into(),
        summary: None,
        url: format!("https://example.com/{id}"),
        source: source.into(),
        published_at: (now() - Duration::hours(hours_ago)).to_rfc3339_opts(SecondsFormat::Secs, true),
        relevance: None,
    }
}

fn pool() -> Vec<Candidate> {
    vec![
        cand("m1", "Fed holds rates steady, signals two cuts", "Reuters", 1),
        cand("m2", "Treasury yields fall after soft CPI print", "Bloomberg", 3),
        cand("g1", "Oil jumps as OPEC extends output curbs", "Bloomberg", 2),
        cand("g2", "Gold hits record on Middle East tensions", "CNBC", 7),
        cand("t1", "Nvidia unveils new AI chips for data centers", "CNBC", 3),
        cand("t2", "Software makers slide on cloud spending worries", "Barron's", 9),
        cand("i1", "Wall Street closes at record as rally broadens", "MarketWatch", 1),
        cand("i2", "Stock futures edge higher before the open", "Benzinga", 6),
        cand("e1", "Retailer lifts guidance after quarterly profit beat", "WSJ", 4),
        cand("e2", "Chipmaker agrees to acquisition by rival", "Seeking Alpha", 10),
        cand("r1", "SEC opens probe into exchange listings", "Axios", 5),
        cand("r2", "Senate advances stablecoin bill", "Yahoo Finance", 12),
        cand("x1", "Fed raises rates by 25bps", "Motley Fool", 2),
        cand("x2", "Federal Reserve raises rates 25 basis points", "Reuters", 2),
        cand("bad", "Mystery item with broken timestamp", "Unknown Blog", 0),
    ]
}

fn ids<T, F: Fn(&T) -> &str>(items: &[T], f: F) -> Vec<String> {
    items.iter().map(|i| f(i).to_string()).collect()
}

#[test]
fn scoring_is_independent_of_input_order() {
    let engine = ScoringEngine::default();
    let baseline = engine.score_at(&pool(), now());

    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..10 {
        let mut shuffled = pool();
        shuffled.shuffle(&mut rng);
        let again = engine.score_at(&shuffled, now());
        assert_eq!(again, baseline);
    }
}

#[test]
fn scoring_is_sorted_and_keeps_every_candidate() {
    let mut items = pool();
    items.last_mut().unwrap().published_at = "yesterday-ish".into();
    let scored = ScoringEngine::default().score_at(&items, now());
    assert_eq!(scored.len(), items.len());
    assert!(scored.windows(2).all(|w| w[0].score >= w[1].score));
    let broken = scored.iter().find(|s| s.id() == "bad").unwrap();
    assert!(broken.recency_score > 0.0 && broken.recency_score < 1e-6);
}

#[test]
fn recency_strictly_decreases_and_stays_in_unit_interval() {
    let mut prev = f64::INFINITY;
    for h in [0.0, 0.5, 1.0, 6.0, 24.0, 72.0, 240.0, 1000.0] {
        let r = recency_score(h);
        assert!(r > 0.0 && r <= 1.0, "recency {r} at {h}h");
        assert!(r < prev, "recency must fall with age");
        prev = r;
    }
    assert!((recency_score(0.0) - 1.0).abs() < 1e-12);
    assert!((recency_score(24.0) - (-1.0f64).exp()).abs() < 1e-12);
}

#[test]
fn dedup_is_idempotent_on_a_realistic_pool() {
    let dedup = Deduplicator::default();
    let scored = ScoringEngine::default().score_at(&pool(), now());
    let once = dedup.dedup(scored);
    let twice = dedup.dedup(once.clone());
    assert_eq!(once, twice);
}

#[test]
fn fed_near_duplicates_keep_higher_scored_story() {
    let scored = ScoringEngine::default().score_at(&pool(), now());
    let deduped = Deduplicator::default().dedup(scored);
    let kept = ids(&deduped, |s| s.id());
    assert!(kept.contains(&"x2".to_string()), "Reuters copy outranks Motley Fool");
    assert!(!kept.contains(&"x1".to_string()));
}

#[test]
fn diversity_covers_top_five_buckets() {
    let engine = ScoringEngine::default();
    let scored = engine.score_at(&pool(), now());
    let deduped = Deduplicator::default().dedup(scored);
    let shortlist = top_k(&deduped, 20);
    let picks = diversify(&shortlist, 5);

    assert_eq!(picks.len(), 5);
    let buckets: Vec<TopicBucket> = picks.iter().map(|p| p.topic_bucket).collect();
    for b in &TopicBucket::ALL[..5] {
        assert!(buckets.contains(b), "missing bucket {b:?} in {buckets:?}");
    }
    assert!(picks.windows(2).all(|w| w[0].score >= w[1].score));
}
