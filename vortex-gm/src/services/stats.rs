//! User statistics and platform overview

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use std::collections::{BTreeMap, HashMap};
use vortex_common::db::{BehaviorRecord, CategoryRanking, JourneyStage, RankingHistoryPoint, Trend, UserMetric};
use vortex_common::{time, MetricCategory, Result};

use crate::services::accumulator;
use crate::services::insights;
use crate::services::journey;
use crate::services::leaderboard::{self, LeaderboardEntry};
use crate::services::ranking;
use crate::services::scorer::{self, Normalization};

/// Behavior records returned in user stats
pub const ACTIVITY_HISTORY_LIMIT: i64 = 20;
/// Days of ranking history behind the growth trajectory
pub const GROWTH_WINDOW_DAYS: i64 = 30;

/// One configured metric with the user's current value
#[derive(Debug, Clone, Serialize)]
pub struct MetricStatus {
    pub key: &'static str,
    pub weight: f64,
    pub target_minimum: Option<f64>,
    pub description: &'static str,
    pub current_value: f64,
    pub last_updated: Option<DateTime<Utc>>,
    pub context: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryMetrics {
    pub weight: f64,
    pub score: f64,
    pub metrics: Vec<MetricStatus>,
}

pub type CompleteMetrics = BTreeMap<MetricCategory, CategoryMetrics>;

/// Every category and configured metric for a user, scored from stored values
pub async fn complete_metrics(
    conn: &mut SqliteConnection,
    user_id: i64,
    normalization: Normalization,
) -> Result<CompleteMetrics> {
    let rows = accumulator::load_user_metrics(conn, user_id).await?;
    let stored: HashMap<(MetricCategory, &str), &UserMetric> = rows
        .iter()
        .map(|m| ((m.category, m.metric_key.as_str()), m))
        .collect();

    let mut complete = CompleteMetrics::new();
    for category in MetricCategory::ALL {
        let metrics: Vec<MetricStatus> = category
            .metrics()
            .iter()
            .map(|definition| {
                let current = stored.get(&(category, definition.key));
                MetricStatus {
                    key: definition.key,
                    weight: definition.weight,
                    target_minimum: definition.target_minimum,
                    description: definition.description,
                    current_value: current.map(|m| m.value).unwrap_or(0.0),
                    last_updated: current.map(|m| m.updated_at),
                    context: current
                        .map(|m| m.context.clone())
                        .unwrap_or_else(|| serde_json::json!({})),
                }
            })
            .collect();

        let score = scorer::category_score(
            category,
            |key| {
                metrics
                    .iter()
                    .find(|m| m.key == key)
                    .map(|m| m.current_value)
                    .unwrap_or(0.0)
            },
            normalization,
        );

        complete.insert(
            category,
            CategoryMetrics {
                weight: category.weight(),
                score,
                metrics,
            },
        );
    }

    Ok(complete)
}

#[derive(Debug, Clone, Serialize)]
pub struct GrowthTrajectory {
    pub trend: Trend,
    /// Percent change from the first to the last point in the window
    pub growth_rate: f64,
    pub data_points: Vec<RankingHistoryPoint>,
}

impl GrowthTrajectory {
    /// `points` must be ordered oldest first
    pub fn from_history(points: Vec<RankingHistoryPoint>) -> Self {
        let (first, last) = match (points.first(), points.last()) {
            (Some(first), Some(last)) => (first.composite_score, last.composite_score),
            _ => {
                return Self {
                    trend: Trend::NoData,
                    growth_rate: 0.0,
                    data_points: points,
                }
            }
        };

        let growth_rate = if first > 0.0 {
            (last - first) / first * 100.0
        } else {
            0.0
        };

        Self {
            trend: Trend::from_change(growth_rate),
            growth_rate: scorer::round2(growth_rate),
            data_points: points,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub user_id: i64,
    /// `None` when the user has no composite ranking
    pub rank: Option<i64>,
    pub journey_stage: JourneyStage,
    pub influence_score: f64,
    pub activity_history: Vec<BehaviorRecord>,
    pub category_rankings: Vec<CategoryRanking>,
    pub metric_breakdown: Vec<UserMetric>,
    pub growth_trajectory: GrowthTrajectory,
    /// Insight blob of the latest behavior record
    pub insights: serde_json::Value,
}

/// Mean raw value over the user's stored metrics
pub fn influence_score(metrics: &[UserMetric]) -> f64 {
    if metrics.is_empty() {
        return 0.0;
    }
    let total: f64 = metrics.iter().map(|m| m.value).sum();
    scorer::round2(total / metrics.len() as f64)
}

pub async fn user_stats(conn: &mut SqliteConnection, user_id: i64) -> Result<UserStats> {
    let now = time::now();

    let rank = leaderboard::user_rank(conn, user_id).await?;
    let journey_stage = journey::journey_stage(conn, user_id).await?;
    let metric_breakdown = accumulator::load_user_metrics(conn, user_id).await?;
    let activity_history = insights::recent_behavior(conn, user_id, ACTIVITY_HISTORY_LIMIT).await?;
    let category_rankings = ranking::load_category_rankings(conn, user_id).await?;
    let history =
        ranking::history_since(conn, user_id, time::days_before(now, GROWTH_WINDOW_DAYS)).await?;

    let insights = activity_history
        .first()
        .map(|record| record.insights.clone())
        .unwrap_or_else(|| serde_json::json!({ "status": "no_recent_analysis" }));

    Ok(UserStats {
        user_id,
        rank,
        journey_stage,
        influence_score: influence_score(&metric_breakdown),
        activity_history,
        category_rankings,
        metric_breakdown,
        growth_trajectory: GrowthTrajectory::from_history(history),
        insights,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionActivity {
    pub action_type: String,
    pub count: i64,
    pub average_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub weight: f64,
    pub metric_count: usize,
    pub top_metrics: Vec<&'static str>,
    /// Mean raw value of metrics updated in the last 24 hours
    pub average_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub recent_activity: Vec<ActionActivity>,
    pub active_users: i64,
    pub top_performers: BTreeMap<MetricCategory, Vec<LeaderboardEntry>>,
    pub category_summary: BTreeMap<MetricCategory, CategorySummary>,
    pub generated_at: DateTime<Utc>,
}

pub async fn overview(conn: &mut SqliteConnection) -> Result<Overview> {
    let now = time::now();
    let last_hour = time::hours_before(now, 1);
    let last_day = time::hours_before(now, 24);

    let activity: Vec<(String, i64, Option<f64>)> = sqlx::query_as(
        r#"
        SELECT action_type, COUNT(*), AVG(metric_value)
        FROM behavior_patterns
        WHERE recorded_at >= ?
        GROUP BY action_type
        ORDER BY action_type
        "#,
    )
    .bind(last_hour)
    .fetch_all(&mut *conn)
    .await?;

    let active_users: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT user_id) FROM behavior_patterns WHERE recorded_at >= ?")
            .bind(last_hour)
            .fetch_one(&mut *conn)
            .await?;

    let mut category_summary = BTreeMap::new();
    for category in MetricCategory::ALL {
        let average: Option<f64> = sqlx::query_scalar(
            "SELECT AVG(metric_value) FROM user_metrics WHERE metric_category = ? AND updated_at >= ?",
        )
        .bind(category.as_str())
        .bind(last_day)
        .fetch_one(&mut *conn)
        .await?;

        category_summary.insert(
            category,
            CategorySummary {
                weight: category.weight(),
                metric_count: category.metrics().len(),
                top_metrics: category.metrics().iter().take(3).map(|m| m.key).collect(),
                average_value: scorer::round2(average.unwrap_or(0.0)),
            },
        );
    }

    Ok(Overview {
        recent_activity: activity
            .into_iter()
            .map(|(action_type, count, average)| ActionActivity {
                action_type,
                count,
                average_value: scorer::round2(average.unwrap_or(0.0)),
            })
            .collect(),
        active_users,
        top_performers: leaderboard::top_performers(conn).await?,
        category_summary,
        generated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::accumulator::{store_metric, validate, MetricObservation};
    use vortex_common::db::init_memory_database;

    fn point(score: f64) -> RankingHistoryPoint {
        RankingHistoryPoint {
            composite_score: score,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_growth_trajectory() {
        let empty = GrowthTrajectory::from_history(vec![]);
        assert_eq!(empty.trend, Trend::NoData);
        assert_eq!(empty.growth_rate, 0.0);

        let up = GrowthTrajectory::from_history(vec![point(10.0), point(12.0), point(15.0)]);
        assert_eq!(up.trend, Trend::Positive);
        assert_eq!(up.growth_rate, 50.0);

        let down = GrowthTrajectory::from_history(vec![point(20.0), point(15.0)]);
        assert_eq!(down.trend, Trend::Negative);
        assert_eq!(down.growth_rate, -25.0);

        // Zero starting score has no defined rate
        let from_zero = GrowthTrajectory::from_history(vec![point(0.0), point(5.0)]);
        assert_eq!(from_zero.growth_rate, 0.0);
        assert_eq!(from_zero.trend, Trend::Positive);
    }

    #[tokio::test]
    async fn test_complete_metrics_lists_catalog() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let obs = validate(
            &MetricObservation::new(1, MetricCategory::Creator, "weekly_artwork_uploads", 3.0)
                .with_context(serde_json::json!({"artwork_id": 12})),
        )
        .unwrap();
        store_metric(&mut conn, &obs, Utc::now()).await.unwrap();

        let complete = complete_metrics(&mut conn, 1, Normalization::WeightSum).await.unwrap();
        assert_eq!(complete.len(), 4);

        let creator = &complete[&MetricCategory::Creator];
        assert_eq!(creator.metrics.len(), 8);
        assert_eq!(creator.weight, 0.30);
        // 3 × 0.15 / 1.0
        assert!((creator.score - 0.45).abs() < 1e-9);

        let uploads = &creator.metrics[0];
        assert_eq!(uploads.key, "weekly_artwork_uploads");
        assert_eq!(uploads.target_minimum, Some(2.0));
        assert_eq!(uploads.current_value, 3.0);
        assert!(uploads.last_updated.is_some());
        assert_eq!(uploads.context["artwork_id"], 12);

        let untouched = &creator.metrics[1];
        assert_eq!(untouched.current_value, 0.0);
        assert!(untouched.last_updated.is_none());
    }

    #[tokio::test]
    async fn test_user_stats_for_unknown_user() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let stats = user_stats(&mut conn, 77).await.unwrap();
        assert!(stats.rank.is_none());
        assert_eq!(stats.influence_score, 0.0);
        assert_eq!(stats.growth_trajectory.trend, Trend::NoData);
        assert_eq!(stats.insights["status"], "no_recent_analysis");
        assert_eq!(stats.journey_stage, JourneyStage::Unregistered);
    }

    #[tokio::test]
    async fn test_overview_on_empty_database() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let overview = overview(&mut conn).await.unwrap();
        assert!(overview.recent_activity.is_empty());
        assert_eq!(overview.active_users, 0);
        assert_eq!(overview.category_summary.len(), 4);
        let community = &overview.category_summary[&MetricCategory::Community];
        assert_eq!(community.metric_count, 6);
        assert_eq!(community.top_metrics.len(), 3);
        assert_eq!(community.average_value, 0.0);
    }
}
