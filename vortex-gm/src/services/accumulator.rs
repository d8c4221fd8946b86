//! Metric accumulator
//!
//! Validates observations against the catalog and adds them to the stored
//! per-user totals. Stored totals are never clamped; clamping happens only
//! when scoring.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{Row, SqliteConnection};
use std::collections::HashMap;
use thiserror::Error;
use vortex_common::db::UserMetric;
use vortex_common::{MetricCategory, Result};

/// One observation to accumulate
#[derive(Debug, Clone, Deserialize)]
pub struct MetricObservation {
    pub user_id: i64,
    pub category: String,
    pub metric_key: String,
    pub value: f64,
    /// Free-form context, stored as JSON and overwritten on every update
    #[serde(default)]
    pub context: Option<serde_json::Value>,
}

impl MetricObservation {
    pub fn new(user_id: i64, category: MetricCategory, metric_key: &str, value: f64) -> Self {
        Self {
            user_id,
            category: category.as_str().to_string(),
            metric_key: metric_key.to_string(),
            value,
            context: None,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// Why an observation was not recorded
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("Unknown metric category: {0}")]
    UnknownCategory(String),

    #[error("Unknown metric '{metric_key}' for category '{category}'")]
    UnknownMetric {
        category: MetricCategory,
        metric_key: String,
    },

    #[error("Metric value must be finite, got {0}")]
    NonFiniteValue(f64),
}

/// Observation that passed validation
#[derive(Debug, Clone)]
pub struct ValidObservation {
    pub user_id: i64,
    pub category: MetricCategory,
    pub metric_key: &'static str,
    pub value: f64,
    pub context: serde_json::Value,
}

/// Check category, metric key and value
pub fn validate(observation: &MetricObservation) -> std::result::Result<ValidObservation, Rejection> {
    let category = observation
        .category
        .parse::<MetricCategory>()
        .map_err(|_| Rejection::UnknownCategory(observation.category.clone()))?;

    let definition = category
        .metric(&observation.metric_key)
        .ok_or_else(|| Rejection::UnknownMetric {
            category,
            metric_key: observation.metric_key.clone(),
        })?;

    if !observation.value.is_finite() {
        return Err(Rejection::NonFiniteValue(observation.value));
    }

    Ok(ValidObservation {
        user_id: observation.user_id,
        category,
        metric_key: definition.key,
        value: observation.value,
        context: observation
            .context
            .clone()
            .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
    })
}

/// Add an observation to the stored total
///
/// Inserts the row on first observation; otherwise increments the value and
/// overwrites context and timestamp. Returns the new total.
pub async fn store_metric(
    conn: &mut SqliteConnection,
    observation: &ValidObservation,
    at: DateTime<Utc>,
) -> Result<f64> {
    let context = serde_json::to_string(&observation.context)?;

    let total: f64 = sqlx::query_scalar(
        r#"
        INSERT INTO user_metrics (user_id, metric_category, metric_key, metric_value, context_data, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id, metric_category, metric_key) DO UPDATE SET
            metric_value = metric_value + excluded.metric_value,
            context_data = excluded.context_data,
            updated_at = excluded.updated_at
        RETURNING metric_value
        "#,
    )
    .bind(observation.user_id)
    .bind(observation.category.as_str())
    .bind(observation.metric_key)
    .bind(observation.value)
    .bind(context)
    .bind(at)
    .fetch_one(&mut *conn)
    .await?;

    Ok(total)
}

/// Accumulated metric values of one user
#[derive(Debug, Clone, Default)]
pub struct MetricValues {
    values: HashMap<(MetricCategory, String), f64>,
}

impl MetricValues {
    /// Stored value, 0 when the metric was never observed
    pub fn value(&self, category: MetricCategory, metric_key: &str) -> f64 {
        self.values
            .get(&(category, metric_key.to_string()))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn insert(&mut self, category: MetricCategory, metric_key: &str, value: f64) {
        self.values.insert((category, metric_key.to_string()), value);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `{metric_key: value}` for every configured metric of a category
    pub fn category_snapshot(&self, category: MetricCategory) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = category
            .metrics()
            .iter()
            .map(|m| (m.key.to_string(), serde_json::json!(self.value(category, m.key))))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Load a user's accumulated values
///
/// Rows whose category or key is no longer in the catalog are skipped.
pub async fn load_metric_values(conn: &mut SqliteConnection, user_id: i64) -> Result<MetricValues> {
    let rows = sqlx::query(
        "SELECT metric_category, metric_key, metric_value FROM user_metrics WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut values = MetricValues::default();
    for row in rows {
        let category: String = row.try_get("metric_category")?;
        let key: String = row.try_get("metric_key")?;
        let value: f64 = row.try_get("metric_value")?;

        match category.parse::<MetricCategory>() {
            Ok(category) if category.metric(&key).is_some() => values.insert(category, &key, value),
            _ => tracing::debug!(user_id, category = %category, metric_key = %key, "Skipping uncatalogued metric row"),
        }
    }

    Ok(values)
}

/// Load a user's stored metric rows, ordered by category and key
pub async fn load_user_metrics(conn: &mut SqliteConnection, user_id: i64) -> Result<Vec<UserMetric>> {
    let rows = sqlx::query(
        r#"
        SELECT user_id, metric_category, metric_key, metric_value, context_data, updated_at
        FROM user_metrics
        WHERE user_id = ?
        ORDER BY metric_category, metric_key
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(UserMetric::from_row).collect()
}

/// Every user with at least one stored metric
pub async fn users_with_metrics(conn: &mut SqliteConnection) -> Result<Vec<i64>> {
    let users = sqlx::query_scalar("SELECT DISTINCT user_id FROM user_metrics ORDER BY user_id")
        .fetch_all(&mut *conn)
        .await?;
    Ok(users)
}
