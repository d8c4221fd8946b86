//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

use crate::catalog::MetricCategory;
use crate::{Error, Result};

/// Coarse classification of user progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JourneyStage {
    Unregistered,
    Onboarding,
    Developing,
    Established,
}

impl JourneyStage {
    /// Derive the stage from the subscription plan and milestone count
    ///
    /// No (or an empty) plan is `unregistered`; fewer than 3 milestones is
    /// `onboarding`, fewer than 7 `developing`, otherwise `established`.
    pub fn from_progress(subscription_plan: Option<&str>, completed_milestones: usize) -> Self {
        match subscription_plan {
            None => JourneyStage::Unregistered,
            Some(plan) if plan.trim().is_empty() => JourneyStage::Unregistered,
            Some(_) if completed_milestones < 3 => JourneyStage::Onboarding,
            Some(_) if completed_milestones < 7 => JourneyStage::Developing,
            Some(_) => JourneyStage::Established,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JourneyStage::Unregistered => "unregistered",
            JourneyStage::Onboarding => "onboarding",
            JourneyStage::Developing => "developing",
            JourneyStage::Established => "established",
        }
    }
}

impl fmt::Display for JourneyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JourneyStage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "unregistered" => Ok(JourneyStage::Unregistered),
            "onboarding" => Ok(JourneyStage::Onboarding),
            "developing" => Ok(JourneyStage::Developing),
            "established" => Ok(JourneyStage::Established),
            other => Err(Error::Internal(format!("Unknown journey stage: {}", other))),
        }
    }
}

/// Direction of a score change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Positive,
    Negative,
    NoData,
}

impl Trend {
    /// Zero change counts as positive
    pub fn from_change(change: f64) -> Self {
        if change >= 0.0 {
            Trend::Positive
        } else {
            Trend::Negative
        }
    }
}

fn parse_category(raw: &str) -> Result<MetricCategory> {
    raw.parse::<MetricCategory>()
        .map_err(|_| Error::Internal(format!("Corrupt category in database: {}", raw)))
}

fn parse_json(raw: Option<String>) -> Result<serde_json::Value> {
    match raw {
        Some(text) if !text.is_empty() => Ok(serde_json::from_str(&text)?),
        _ => Ok(serde_json::Value::Null),
    }
}

/// Row of `user_metrics`
#[derive(Debug, Clone, Serialize)]
pub struct UserMetric {
    pub user_id: i64,
    pub category: MetricCategory,
    pub metric_key: String,
    /// Accumulated value, unclamped
    pub value: f64,
    pub context: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl UserMetric {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let category: String = row.try_get("metric_category")?;
        Ok(Self {
            user_id: row.try_get("user_id")?,
            category: parse_category(&category)?,
            metric_key: row.try_get("metric_key")?,
            value: row.try_get("metric_value")?,
            context: parse_json(row.try_get("context_data")?)?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Row of `category_rankings`
#[derive(Debug, Clone, Serialize)]
pub struct CategoryRanking {
    pub user_id: i64,
    pub category: MetricCategory,
    pub score: f64,
    pub rank_position: i64,
    /// Snapshot of the metric values the score was computed from
    pub metrics: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl CategoryRanking {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let category: String = row.try_get("category")?;
        Ok(Self {
            user_id: row.try_get("user_id")?,
            category: parse_category(&category)?,
            score: row.try_get("score")?,
            rank_position: row.try_get("rank_position")?,
            metrics: parse_json(row.try_get("metrics_data")?)?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Row of `user_rankings`
#[derive(Debug, Clone, Serialize)]
pub struct CompositeRanking {
    pub user_id: i64,
    pub composite_score: f64,
    pub rank_position: i64,
    /// Category scores the composite was computed from
    pub category_scores: serde_json::Value,
    pub last_updated: DateTime<Utc>,
}

impl CompositeRanking {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            composite_score: row.try_get("composite_score")?,
            rank_position: row.try_get("rank_position")?,
            category_scores: parse_json(row.try_get("ranking_data")?)?,
            last_updated: row.try_get("last_updated")?,
        })
    }
}

/// Row of `behavior_patterns`
#[derive(Debug, Clone, Serialize)]
pub struct BehaviorRecord {
    pub guid: String,
    pub user_id: i64,
    pub action_type: String,
    pub metric_key: String,
    pub value: f64,
    pub journey_stage: JourneyStage,
    pub insights: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl BehaviorRecord {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let stage: String = row.try_get("journey_stage")?;
        Ok(Self {
            guid: row.try_get("guid")?,
            user_id: row.try_get("user_id")?,
            action_type: row.try_get("action_type")?,
            metric_key: row.try_get("metric_key")?,
            value: row.try_get("metric_value")?,
            journey_stage: stage.parse()?,
            insights: parse_json(row.try_get("ai_insights")?)?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

/// Row of `user_profiles`
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub display_name: Option<String>,
    pub subscription_plan: Option<String>,
    pub completed_milestones: Vec<String>,
}

impl UserProfile {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let milestones: String = row.try_get("completed_milestones")?;
        Ok(Self {
            user_id: row.try_get("user_id")?,
            display_name: row.try_get("display_name")?,
            subscription_plan: row.try_get("subscription_plan")?,
            completed_milestones: serde_json::from_str(&milestones)?,
        })
    }

    pub fn journey_stage(&self) -> JourneyStage {
        JourneyStage::from_progress(
            self.subscription_plan.as_deref(),
            self.completed_milestones.len(),
        )
    }
}

/// Point of `ranking_history`
#[derive(Debug, Clone, Serialize)]
pub struct RankingHistoryPoint {
    pub composite_score: f64,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journey_stage_thresholds() {
        assert_eq!(JourneyStage::from_progress(None, 10), JourneyStage::Unregistered);
        assert_eq!(JourneyStage::from_progress(Some(""), 10), JourneyStage::Unregistered);
        assert_eq!(JourneyStage::from_progress(Some("pro"), 0), JourneyStage::Onboarding);
        assert_eq!(JourneyStage::from_progress(Some("pro"), 2), JourneyStage::Onboarding);
        assert_eq!(JourneyStage::from_progress(Some("pro"), 3), JourneyStage::Developing);
        assert_eq!(JourneyStage::from_progress(Some("pro"), 6), JourneyStage::Developing);
        assert_eq!(JourneyStage::from_progress(Some("pro"), 7), JourneyStage::Established);
    }

    #[test]
    fn test_journey_stage_parses_own_names() {
        for stage in [
            JourneyStage::Unregistered,
            JourneyStage::Onboarding,
            JourneyStage::Developing,
            JourneyStage::Established,
        ] {
            assert_eq!(stage.as_str().parse::<JourneyStage>().unwrap(), stage);
        }
        assert!("expert".parse::<JourneyStage>().is_err());
    }

    #[test]
    fn test_trend_from_change() {
        assert_eq!(Trend::from_change(0.0), Trend::Positive);
        assert_eq!(Trend::from_change(3.5), Trend::Positive);
        assert_eq!(Trend::from_change(-0.01), Trend::Negative);
    }
}
