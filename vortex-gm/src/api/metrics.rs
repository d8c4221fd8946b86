//! Metric and activity submission
//!
//! POST /api/metrics records one observation; POST /api/activity records
//! every observation implied by a platform event.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;
use vortex_common::db::JourneyStage;
use vortex_common::events::RankingChange;
use vortex_common::MetricCategory;

use crate::services::{ActivityEvent, MetricObservation, TrackOutcome};
use crate::{ApiResult, AppState};

/// Result of one observation
#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub recorded: bool,
    /// Rejection reason when `recorded` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<MetricCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composite_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journey_stage: Option<JourneyStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking_change: Option<RankingChange>,
}

impl From<TrackOutcome> for TrackResponse {
    fn from(outcome: TrackOutcome) -> Self {
        match outcome {
            TrackOutcome::Recorded(recorded) => {
                let recorded = *recorded;
                Self {
                    recorded: true,
                    reason: None,
                    category: Some(recorded.category),
                    metric_key: Some(recorded.metric_key),
                    total: Some(recorded.total),
                    composite_score: Some(recorded.ranking.composite_score),
                    journey_stage: Some(recorded.journey_stage),
                    insights: Some(recorded.insights),
                    ranking_change: recorded.ranking.change,
                }
            }
            TrackOutcome::Rejected(rejection) => Self {
                recorded: false,
                reason: Some(rejection.to_string()),
                category: None,
                metric_key: None,
                total: None,
                composite_score: None,
                journey_stage: None,
                insights: None,
                ranking_change: None,
            },
        }
    }
}

/// POST /api/metrics
///
/// **Request:** `{"user_id": 1, "category": "creator", "metric_key": "peer_reviews", "value": 2, "context": {...}}`
pub async fn record_metric(
    State(state): State<AppState>,
    Json(observation): Json<MetricObservation>,
) -> ApiResult<Json<TrackResponse>> {
    let outcome = state.engine.record_metric(&observation).await?;
    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    /// Acting user (sender of a transfer, mentor of a session)
    pub user_id: i64,
    pub activity: ActivityEvent,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub user_id: i64,
    pub event: &'static str,
    pub results: Vec<TrackResponse>,
}

/// POST /api/activity
///
/// **Request:** `{"user_id": 1, "activity": {"event": "artwork_uploaded", "artwork_id": 7}}`
pub async fn record_activity(
    State(state): State<AppState>,
    Json(request): Json<ActivityRequest>,
) -> ApiResult<Json<ActivityResponse>> {
    let outcomes = state
        .engine
        .record_activity(request.user_id, &request.activity)
        .await?;

    info!(
        user_id = request.user_id,
        event = request.activity.name(),
        observations = outcomes.len(),
        "Activity received"
    );

    Ok(Json(ActivityResponse {
        user_id: request.user_id,
        event: request.activity.name(),
        results: outcomes.into_iter().map(TrackResponse::from).collect(),
    }))
}

pub fn metric_routes() -> Router<AppState> {
    Router::new()
        .route("/api/metrics", post(record_metric))
        .route("/api/activity", post(record_activity))
}
