//! Scoring behavior tests against an in-memory database
//!
//! Tests cover:
//! - Rejection of unknown categories and metrics without side effects
//! - Additive accumulation
//! - Exact count-normalized category score
//! - Composite score as the weighted sum of category scores
//! - Dense, score-ordered rank positions after recomputation

use std::sync::Arc;

use sqlx::SqlitePool;
use vortex_common::db::init_memory_database;
use vortex_common::events::EventBus;
use vortex_common::MetricCategory;
use vortex_gm::config::{set_setting, RuntimeSettings};
use vortex_gm::services::accumulator::{self, MetricObservation, Rejection};
use vortex_gm::services::scorer::{self, CategoryScores, Normalization};
use vortex_gm::services::{ScoringEngine, TrackOutcome};

const TOLERANCE: f64 = 1e-9;

async fn setup() -> (ScoringEngine, SqlitePool) {
    let pool = init_memory_database().await.expect("memory database");
    let engine = ScoringEngine::new(
        pool.clone(),
        Arc::new(EventBus::new(100)),
        RuntimeSettings::default(),
    );
    (engine, pool)
}

async fn row_count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}

fn observation(user_id: i64, category: &str, metric_key: &str, value: f64) -> MetricObservation {
    MetricObservation {
        user_id,
        category: category.to_string(),
        metric_key: metric_key.to_string(),
        value,
        context: None,
    }
}

// =============================================================================
// Rejection
// =============================================================================

#[tokio::test]
async fn test_unknown_category_and_metric_leave_state_untouched() {
    let (engine, pool) = setup().await;

    let unknown_category = engine
        .record_metric(&observation(1, "curator", "peer_reviews", 5.0))
        .await
        .unwrap();
    assert!(matches!(
        unknown_category,
        TrackOutcome::Rejected(Rejection::UnknownCategory(ref c)) if c == "curator"
    ));

    let unknown_metric = engine
        .record_metric(&observation(1, "creator", "trading_volume_tola", 5.0))
        .await
        .unwrap();
    assert!(matches!(
        unknown_metric,
        TrackOutcome::Rejected(Rejection::UnknownMetric { .. })
    ));

    for table in [
        "user_metrics",
        "behavior_patterns",
        "category_rankings",
        "user_rankings",
        "ranking_history",
    ] {
        assert_eq!(row_count(&pool, table).await, 0, "{} was written", table);
    }
}

// =============================================================================
// Accumulation
// =============================================================================

#[tokio::test]
async fn test_repeated_observations_accumulate() {
    let (engine, pool) = setup().await;

    for value in [1.0, 2.5, 4.0] {
        engine
            .record_metric(&observation(7, "collector", "active_swaps", value))
            .await
            .unwrap();
    }

    let mut conn = pool.acquire().await.unwrap();
    let metrics = accumulator::load_user_metrics(&mut conn, 7).await.unwrap();
    assert_eq!(metrics.len(), 1);
    assert!((metrics[0].value - 7.5).abs() < TOLERANCE);

    // One behavior record per accepted observation
    drop(conn);
    assert_eq!(row_count(&pool, "behavior_patterns").await, 3);
}

// =============================================================================
// Category score
// =============================================================================

#[tokio::test]
async fn test_count_normalized_category_score_is_exact() {
    let (engine, _pool) = setup().await;

    engine
        .record_metric(&observation(2, "creator", "weekly_artwork_uploads", 10.0))
        .await
        .unwrap();
    engine
        .record_metric(&observation(2, "creator", "originality_score", 150.0))
        .await
        .unwrap();
    let outcome = engine
        .record_metric(&observation(2, "creator", "peer_reviews", -5.0))
        .await
        .unwrap();

    let recorded = match outcome {
        TrackOutcome::Recorded(r) => r,
        TrackOutcome::Rejected(r) => panic!("rejected: {}", r),
    };

    // min(10,100)*0.15 + min(150,100)*0.20 + max(-5,0)*0.10 = 21.5; / 8 metrics
    let creator = recorded.ranking.category_scores[&MetricCategory::Creator];
    assert_eq!(creator, scorer::round2(21.5 / 8.0));
    assert_eq!(creator, 2.69);
}

#[test]
fn test_weight_sum_variant_differs_from_count() {
    let value_of = |key: &str| if key == "originality_score" { 50.0 } else { 0.0 };
    let by_count = scorer::category_score(MetricCategory::Creator, value_of, Normalization::MetricCount);
    let by_weight = scorer::category_score(MetricCategory::Creator, value_of, Normalization::WeightSum);
    assert_eq!(by_count, 1.25);
    assert!((by_weight - 10.0).abs() < TOLERANCE);
}

// =============================================================================
// Composite score
// =============================================================================

#[tokio::test]
async fn test_composite_is_weighted_sum_of_category_scores() {
    let (engine, _pool) = setup().await;

    let inputs = [
        ("creator", "originality_score", 80.0),
        ("collector", "purchase_frequency", 40.0),
        ("marketplace", "trading_volume_tola", 250.0),
        ("community", "mentorship_score", 12.0),
    ];
    let mut last = None;
    for (category, key, value) in inputs {
        last = Some(engine.record_metric(&observation(3, category, key, value)).await.unwrap());
    }

    let recorded = match last {
        Some(TrackOutcome::Recorded(r)) => r,
        other => panic!("unexpected outcome: {:?}", other),
    };

    let scores: &CategoryScores = &recorded.ranking.category_scores;
    let expected: f64 = MetricCategory::ALL
        .iter()
        .map(|c| scores[c] * c.weight())
        .sum();
    assert!(
        (recorded.ranking.composite_score - expected).abs() < 0.01,
        "composite {} vs weighted sum {}",
        recorded.ranking.composite_score,
        expected
    );
}

// =============================================================================
// Rank positions
// =============================================================================

#[tokio::test]
async fn test_ranks_dense_and_ordered_after_recompute() {
    let (engine, pool) = setup().await;

    let values = [(10, 30.0), (11, 90.0), (12, 30.0), (13, 5.0), (14, 60.0)];
    for (user_id, value) in values {
        engine
            .record_metric(&observation(user_id, "marketplace", "feature_adoption", value))
            .await
            .unwrap();
    }
    engine
        .record_metric(&observation(13, "community", "mentorship_score", 10.0))
        .await
        .unwrap();

    assert_eq!(engine.recompute_all_rankings().await.unwrap(), 5);

    for category in MetricCategory::ALL {
        let rows: Vec<(i64, f64, i64)> = sqlx::query_as(
            "SELECT user_id, score, rank_position FROM category_rankings WHERE category = ? ORDER BY rank_position",
        )
        .bind(category.as_str())
        .fetch_all(&pool)
        .await
        .unwrap();

        let positions: Vec<i64> = rows.iter().map(|r| r.2).collect();
        assert_eq!(positions, (1..=rows.len() as i64).collect::<Vec<_>>(), "{}", category);
        for pair in rows.windows(2) {
            assert!(pair[0].1 >= pair[1].1, "{} not ordered by score", category);
            if pair[0].1 == pair[1].1 {
                assert!(pair[0].0 < pair[1].0, "{} tie not broken by user id", category);
            }
        }
    }

    let composite: Vec<(i64, f64, i64)> = sqlx::query_as(
        "SELECT user_id, composite_score, rank_position FROM user_rankings ORDER BY rank_position",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(composite.iter().map(|r| r.2).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    assert!(composite.windows(2).all(|p| p[0].1 >= p[1].1));
    assert_eq!(composite[0].0, 11);
}

#[tokio::test]
async fn test_recompute_applies_changed_normalization() {
    let (engine, pool) = setup().await;
    engine
        .record_metric(&observation(20, "community", "mentorship_score", 50.0))
        .await
        .unwrap();

    set_setting(&pool, "scoring_normalization", "weight_sum").await.unwrap();
    let settings = RuntimeSettings::load(&pool).await.unwrap();
    let reloaded = ScoringEngine::new(pool.clone(), Arc::new(EventBus::new(10)), settings);
    reloaded.recompute_all_rankings().await.unwrap();

    let score: f64 = sqlx::query_scalar(
        "SELECT score FROM category_rankings WHERE user_id = 20 AND category = 'community'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    // 50 × 0.20 over a weight sum of 1.0
    assert!((score - 10.0).abs() < TOLERANCE);
}
