//! Behavior analysis
//!
//! Every accepted observation appends one behavior record carrying the
//! user's journey stage and an insight blob. Records are read back for
//! display only.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use uuid::Uuid;
use vortex_common::db::{BehaviorRecord, JourneyStage};
use vortex_common::Result;

use crate::services::scorer::{self, CategoryScores};

/// Fallback when a metric has no dedicated recommendation
pub const DEFAULT_RECOMMENDATION: &str = "Continue your excellent progress!";

/// Fixed recommendation text for a metric key
pub fn recommendation_for(metric_key: &str) -> &'static str {
    match metric_key {
        "weekly_artwork_uploads" => "Consider setting a consistent upload schedule to maintain engagement",
        "originality_score" => "Experiment with new techniques to increase originality",
        "collection_diversity_score" => "Explore different artistic styles to diversify your collection",
        "trading_volume_tola" => "Participate in more marketplace activities to increase your trading volume",
        _ => DEFAULT_RECOMMENDATION,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BehaviorPattern {
    /// Records with the same action type inside the frequency window
    pub frequency: i64,
}

/// Insight blob stored with each behavior record
#[derive(Debug, Clone, Serialize)]
pub struct Insights {
    pub behavior_pattern: BehaviorPattern,
    pub engagement_level: f64,
    pub recommendation: String,
}

impl Insights {
    pub fn build(frequency: i64, scores: &CategoryScores, metric_key: &str) -> Self {
        Self {
            behavior_pattern: BehaviorPattern { frequency },
            engagement_level: scorer::engagement_level(scores),
            recommendation: recommendation_for(metric_key).to_string(),
        }
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Number of the user's behavior records of `action_type` recorded at or after `since`
pub async fn action_frequency(
    conn: &mut SqliteConnection,
    user_id: i64,
    action_type: &str,
    since: DateTime<Utc>,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM behavior_patterns
        WHERE user_id = ? AND action_type = ? AND recorded_at >= ?
        "#,
    )
    .bind(user_id)
    .bind(action_type)
    .bind(since)
    .fetch_one(&mut *conn)
    .await?;

    Ok(count)
}

/// Append a behavior record
#[allow(clippy::too_many_arguments)]
pub async fn record_behavior(
    conn: &mut SqliteConnection,
    user_id: i64,
    action_type: &str,
    metric_key: &str,
    value: f64,
    journey_stage: JourneyStage,
    insights: serde_json::Value,
    at: DateTime<Utc>,
) -> Result<BehaviorRecord> {
    let guid = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO behavior_patterns
            (guid, user_id, action_type, metric_key, metric_value, journey_stage, ai_insights, recorded_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&guid)
    .bind(user_id)
    .bind(action_type)
    .bind(metric_key)
    .bind(value)
    .bind(journey_stage.as_str())
    .bind(serde_json::to_string(&insights)?)
    .bind(at)
    .execute(&mut *conn)
    .await?;

    Ok(BehaviorRecord {
        guid,
        user_id,
        action_type: action_type.to_string(),
        metric_key: metric_key.to_string(),
        value,
        journey_stage,
        insights,
        recorded_at: at,
    })
}

/// Most recent behavior records of a user, newest first
pub async fn recent_behavior(
    conn: &mut SqliteConnection,
    user_id: i64,
    limit: i64,
) -> Result<Vec<BehaviorRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, user_id, action_type, metric_key, metric_value, journey_stage, ai_insights, recorded_at
        FROM behavior_patterns
        WHERE user_id = ?
        ORDER BY recorded_at DESC, rowid DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(BehaviorRecord::from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vortex_common::db::init_memory_database;
    use vortex_common::time;
    use vortex_common::MetricCategory;

    #[test]
    fn test_recommendation_fallback() {
        assert_eq!(
            recommendation_for("originality_score"),
            "Experiment with new techniques to increase originality"
        );
        assert_eq!(recommendation_for("mentorship_score"), DEFAULT_RECOMMENDATION);
    }

    #[test]
    fn test_insights_shape() {
        let mut scores = CategoryScores::new();
        scores.insert(MetricCategory::Creator, 20.0);
        scores.insert(MetricCategory::Collector, 0.0);
        scores.insert(MetricCategory::Marketplace, 0.0);
        scores.insert(MetricCategory::Community, 0.0);

        let value = Insights::build(3, &scores, "trading_volume_tola").to_value().unwrap();
        assert_eq!(value["behavior_pattern"]["frequency"], 3);
        // 20 × 0.30 / 1.0
        assert_eq!(value["engagement_level"], 6.0);
        assert!(value["recommendation"].as_str().unwrap().contains("trading volume"));
    }

    #[tokio::test]
    async fn test_frequency_counts_window_and_action_type() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let now = Utc::now();
        let empty = serde_json::json!({});

        for at in [now, time::days_before(now, 2), time::days_before(now, 10)] {
            record_behavior(
                &mut conn,
                1,
                "creator_action",
                "peer_reviews",
                1.0,
                JourneyStage::Unregistered,
                empty.clone(),
                at,
            )
            .await
            .unwrap();
        }
        record_behavior(
            &mut conn,
            1,
            "community_action",
            "mentorship_score",
            1.0,
            JourneyStage::Unregistered,
            empty.clone(),
            now,
        )
        .await
        .unwrap();

        let since = time::days_before(now, 7);
        assert_eq!(action_frequency(&mut conn, 1, "creator_action", since).await.unwrap(), 2);
        assert_eq!(action_frequency(&mut conn, 1, "community_action", since).await.unwrap(), 1);
        assert_eq!(action_frequency(&mut conn, 2, "creator_action", since).await.unwrap(), 0);

        let recent = recent_behavior(&mut conn, 1, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].recorded_at >= recent[1].recorded_at);
    }
}
