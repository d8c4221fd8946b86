//! Ranking updater
//!
//! Keeps `category_rankings` and `user_rankings` in step with stored metrics.
//! After any score write the rank positions of every category and of the
//! composite table are rewritten as a dense 1..N sequence ordered by score
//! descending, ties broken by user id ascending.
//!
//! All functions run on the caller's connection; callers wrap a full update
//! in one transaction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use uuid::Uuid;
use vortex_common::db::{CategoryRanking, CompositeRanking, RankingHistoryPoint, Trend};
use vortex_common::events::RankingChange;
use vortex_common::{MetricCategory, Result};

use crate::services::accumulator::{self, MetricValues};
use crate::services::scorer::{self, CategoryScores, Normalization};

/// Result of re-scoring one user
#[derive(Debug, Clone, Serialize)]
pub struct RankingUpdate {
    pub user_id: i64,
    pub category_scores: CategoryScores,
    pub composite_score: f64,
    /// Present when the user already had a composite ranking
    pub change: Option<RankingChange>,
}

/// Upsert one category score together with the metric snapshot it came from
pub async fn upsert_category_ranking(
    conn: &mut SqliteConnection,
    user_id: i64,
    category: MetricCategory,
    score: f64,
    snapshot: &serde_json::Value,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO category_rankings (user_id, category, score, rank_position, metrics_data, updated_at)
        VALUES (?, ?, ?, 0, ?, ?)
        ON CONFLICT(user_id, category) DO UPDATE SET
            score = excluded.score,
            metrics_data = excluded.metrics_data,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(category.as_str())
    .bind(score)
    .bind(serde_json::to_string(snapshot)?)
    .bind(at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Rewrite rank positions of one category; returns the number of ranked users
pub async fn rerank_category(conn: &mut SqliteConnection, category: MetricCategory) -> Result<usize> {
    let users: Vec<i64> = sqlx::query_scalar(
        "SELECT user_id FROM category_rankings WHERE category = ? ORDER BY score DESC, user_id ASC",
    )
    .bind(category.as_str())
    .fetch_all(&mut *conn)
    .await?;

    for (index, &user_id) in users.iter().enumerate() {
        sqlx::query("UPDATE category_rankings SET rank_position = ? WHERE user_id = ? AND category = ?")
            .bind(index as i64 + 1)
            .bind(user_id)
            .bind(category.as_str())
            .execute(&mut *conn)
            .await?;
    }

    Ok(users.len())
}

/// Rewrite rank positions of every category
pub async fn rerank_all_categories(conn: &mut SqliteConnection) -> Result<()> {
    for category in MetricCategory::ALL {
        rerank_category(conn, category).await?;
    }
    Ok(())
}

/// Stored composite score of a user, `None` when unranked
pub async fn previous_composite(conn: &mut SqliteConnection, user_id: i64) -> Result<Option<f64>> {
    let score = sqlx::query_scalar("SELECT composite_score FROM user_rankings WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(score)
}

/// Upsert the composite row; `ranking_data` holds the category scores
pub async fn upsert_composite(
    conn: &mut SqliteConnection,
    user_id: i64,
    composite_score: f64,
    scores: &CategoryScores,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_rankings (user_id, composite_score, ranking_data, last_updated, rank_position)
        VALUES (?, ?, ?, ?, 0)
        ON CONFLICT(user_id) DO UPDATE SET
            composite_score = excluded.composite_score,
            ranking_data = excluded.ranking_data,
            last_updated = excluded.last_updated
        "#,
    )
    .bind(user_id)
    .bind(composite_score)
    .bind(serde_json::to_string(scores)?)
    .bind(at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Rewrite global rank positions; returns the number of ranked users
pub async fn rerank_composite(conn: &mut SqliteConnection) -> Result<usize> {
    let users: Vec<i64> = sqlx::query_scalar(
        "SELECT user_id FROM user_rankings ORDER BY composite_score DESC, user_id ASC",
    )
    .fetch_all(&mut *conn)
    .await?;

    for (index, &user_id) in users.iter().enumerate() {
        sqlx::query("UPDATE user_rankings SET rank_position = ? WHERE user_id = ?")
            .bind(index as i64 + 1)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(users.len())
}

pub async fn append_history(
    conn: &mut SqliteConnection,
    user_id: i64,
    composite_score: f64,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO ranking_history (guid, user_id, composite_score, recorded_at) VALUES (?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(composite_score)
    .bind(at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Composite history of a user since `since`, oldest first
pub async fn history_since(
    conn: &mut SqliteConnection,
    user_id: i64,
    since: DateTime<Utc>,
) -> Result<Vec<RankingHistoryPoint>> {
    let rows: Vec<(f64, DateTime<Utc>)> = sqlx::query_as(
        r#"
        SELECT composite_score, recorded_at
        FROM ranking_history
        WHERE user_id = ? AND recorded_at >= ?
        ORDER BY recorded_at ASC, rowid ASC
        "#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(composite_score, recorded_at)| RankingHistoryPoint {
            composite_score,
            recorded_at,
        })
        .collect())
}

/// Latest `limit` history points of a user, newest first
pub async fn recent_history(
    conn: &mut SqliteConnection,
    user_id: i64,
    limit: i64,
) -> Result<Vec<RankingHistoryPoint>> {
    let rows: Vec<(f64, DateTime<Utc>)> = sqlx::query_as(
        r#"
        SELECT composite_score, recorded_at
        FROM ranking_history
        WHERE user_id = ?
        ORDER BY recorded_at DESC, rowid DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(composite_score, recorded_at)| RankingHistoryPoint {
            composite_score,
            recorded_at,
        })
        .collect())
}

/// Describe the move from `previous` to `new_score`
pub fn analyze_change(previous: f64, new_score: f64, scores: &CategoryScores) -> RankingChange {
    let score_change = scorer::round2(new_score - previous);
    RankingChange {
        previous_score: previous,
        new_score,
        score_change,
        trend: Trend::from_change(score_change),
        magnitude: score_change.abs(),
        primary_driver: scorer::primary_driver(scores),
        recommendations: scorer::improvement_recommendations(scores),
    }
}

/// Write category rows and the composite row of one user from its metric values
///
/// Does not touch rank positions.
async fn write_user_scores(
    conn: &mut SqliteConnection,
    user_id: i64,
    values: &MetricValues,
    normalization: Normalization,
    at: DateTime<Utc>,
) -> Result<(CategoryScores, f64)> {
    let scores = scorer::score_all(|category, key| values.value(category, key), normalization);

    for (&category, &score) in &scores {
        let snapshot = values.category_snapshot(category);
        upsert_category_ranking(conn, user_id, category, score, &snapshot, at).await?;
    }

    let composite = scorer::composite_score(&scores);
    upsert_composite(conn, user_id, composite, &scores, at).await?;

    Ok((scores, composite))
}

/// Re-score one user and rewrite every rank position
pub async fn update_user_rankings(
    conn: &mut SqliteConnection,
    user_id: i64,
    normalization: Normalization,
    at: DateTime<Utc>,
) -> Result<RankingUpdate> {
    let values = accumulator::load_metric_values(conn, user_id).await?;
    let previous = previous_composite(conn, user_id).await?;

    let (category_scores, composite_score) =
        write_user_scores(conn, user_id, &values, normalization, at).await?;

    rerank_all_categories(conn).await?;
    rerank_composite(conn).await?;
    append_history(conn, user_id, composite_score, at).await?;

    let change = previous.map(|prev| analyze_change(prev, composite_score, &category_scores));

    Ok(RankingUpdate {
        user_id,
        category_scores,
        composite_score,
        change,
    })
}

/// Rebuild every user's scores from stored metrics; returns the user count
///
/// Positions are rewritten once at the end. No history rows are written.
pub async fn recompute_all(
    conn: &mut SqliteConnection,
    normalization: Normalization,
    at: DateTime<Utc>,
) -> Result<usize> {
    let users = accumulator::users_with_metrics(conn).await?;

    for &user_id in &users {
        let values = accumulator::load_metric_values(conn, user_id).await?;
        write_user_scores(conn, user_id, &values, normalization, at).await?;
    }

    rerank_all_categories(conn).await?;
    rerank_composite(conn).await?;

    Ok(users.len())
}

/// Category rows of one user in catalog order
pub async fn load_category_rankings(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Vec<CategoryRanking>> {
    let rows = sqlx::query(
        r#"
        SELECT user_id, category, score, rank_position, metrics_data, updated_at
        FROM category_rankings
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut rankings = rows
        .iter()
        .map(CategoryRanking::from_row)
        .collect::<Result<Vec<_>>>()?;
    rankings.sort_by_key(|r| r.category);
    Ok(rankings)
}

/// Composite row of one user
pub async fn load_composite(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Option<CompositeRanking>> {
    let row = sqlx::query(
        r#"
        SELECT user_id, composite_score, rank_position, ranking_data, last_updated
        FROM user_rankings
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(CompositeRanking::from_row).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::accumulator::{store_metric, validate, MetricObservation};
    use vortex_common::db::init_memory_database;

    async fn observe(conn: &mut SqliteConnection, user_id: i64, category: MetricCategory, key: &str, value: f64) {
        let obs = validate(&MetricObservation::new(user_id, category, key, value)).unwrap();
        store_metric(conn, &obs, Utc::now()).await.unwrap();
    }

    async fn positions(conn: &mut SqliteConnection, category: MetricCategory) -> Vec<(i64, f64, i64)> {
        sqlx::query_as(
            "SELECT user_id, score, rank_position FROM category_rankings WHERE category = ? ORDER BY rank_position",
        )
        .bind(category.as_str())
        .fetch_all(&mut *conn)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_first_update_has_no_change() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        observe(&mut conn, 1, MetricCategory::Creator, "originality_score", 80.0).await;
        let update = update_user_rankings(&mut conn, 1, Normalization::MetricCount, Utc::now())
            .await
            .unwrap();

        assert!(update.change.is_none());
        assert_eq!(update.category_scores.len(), 4);
        // 80 × 0.20 / 8 = 2.0; composite 2.0 × 0.30
        assert_eq!(update.category_scores[&MetricCategory::Creator], 2.0);
        assert!((update.composite_score - 0.6).abs() < 1e-9);

        let composite = load_composite(&mut conn, 1).await.unwrap().unwrap();
        assert_eq!(composite.rank_position, 1);
        assert_eq!(composite.category_scores["creator"], 2.0);
    }

    #[tokio::test]
    async fn test_second_update_reports_change() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        observe(&mut conn, 1, MetricCategory::Creator, "originality_score", 80.0).await;
        update_user_rankings(&mut conn, 1, Normalization::WeightSum, Utc::now())
            .await
            .unwrap();
        observe(&mut conn, 1, MetricCategory::Creator, "originality_score", 10.0).await;
        let update = update_user_rankings(&mut conn, 1, Normalization::WeightSum, Utc::now())
            .await
            .unwrap();

        let change = update.change.unwrap();
        // Weight-sum creator score: 16 → 18; composite 4.8 → 5.4
        assert!((change.previous_score - 4.8).abs() < 1e-9);
        assert!((change.new_score - 5.4).abs() < 1e-9);
        assert!((change.score_change - 0.6).abs() < 1e-9);
        assert_eq!(change.trend, Trend::Positive);
        assert_eq!(change.primary_driver, MetricCategory::Creator);
        assert_eq!(change.recommendations.len(), 4);

        let history = recent_history(&mut conn, 1, 20).await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_ranks_are_dense_with_user_id_tiebreak() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        observe(&mut conn, 3, MetricCategory::Community, "mentorship_score", 30.0).await;
        observe(&mut conn, 1, MetricCategory::Community, "mentorship_score", 30.0).await;
        observe(&mut conn, 2, MetricCategory::Community, "mentorship_score", 90.0).await;
        for user in [3, 1, 2] {
            update_user_rankings(&mut conn, user, Normalization::MetricCount, Utc::now())
                .await
                .unwrap();
        }

        let rows = positions(&mut conn, MetricCategory::Community).await;
        assert_eq!(
            rows.iter().map(|(u, _, p)| (*u, *p)).collect::<Vec<_>>(),
            vec![(2, 1), (1, 2), (3, 3)]
        );

        // Users without creator metrics still hold creator rows at score 0
        let creator = positions(&mut conn, MetricCategory::Creator).await;
        assert_eq!(creator.iter().map(|(_, _, p)| *p).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_recompute_all_applies_normalization() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        observe(&mut conn, 1, MetricCategory::Creator, "originality_score", 50.0).await;
        observe(&mut conn, 2, MetricCategory::Creator, "originality_score", 100.0).await;

        let users = recompute_all(&mut conn, Normalization::WeightSum, Utc::now()).await.unwrap();
        assert_eq!(users, 2);

        let top = load_composite(&mut conn, 2).await.unwrap().unwrap();
        assert_eq!(top.rank_position, 1);
        // 100 × 0.20 = 20 creator; composite 6.0
        assert!((top.composite_score - 6.0).abs() < 1e-9);

        // Recompute writes no history
        assert!(recent_history(&mut conn, 1, 20).await.unwrap().is_empty());
    }

    #[test]
    fn test_analyze_negative_change() {
        let mut scores = CategoryScores::new();
        scores.insert(MetricCategory::Marketplace, 60.0);
        let change = analyze_change(20.0, 15.0, &scores);
        assert_eq!(change.trend, Trend::Negative);
        assert_eq!(change.magnitude, 5.0);
        assert_eq!(change.primary_driver, MetricCategory::Marketplace);
        assert!(change.recommendations.is_empty());
    }
}
