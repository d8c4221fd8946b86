//! Per-user endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use vortex_common::db::{JourneyStage, UserProfile};

use crate::services::stats::{self, CompleteMetrics, UserStats};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct UserMetricsResponse {
    pub user_id: i64,
    pub categories: CompleteMetrics,
}

/// GET /api/users/:id/metrics
pub async fn get_user_metrics(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<UserMetricsResponse>> {
    let mut conn = state.db.acquire().await?;
    let categories =
        stats::complete_metrics(&mut conn, user_id, state.settings().scoring_normalization).await?;
    Ok(Json(UserMetricsResponse { user_id, categories }))
}

/// GET /api/users/:id/stats
pub async fn get_user_stats(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<UserStats>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(stats::user_stats(&mut conn, user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    /// Empty string clears the plan
    #[serde(default)]
    pub subscription_plan: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub journey_stage: JourneyStage,
}

impl From<UserProfile> for ProfileResponse {
    fn from(profile: UserProfile) -> Self {
        let journey_stage = profile.journey_stage();
        Self {
            profile,
            journey_stage,
        }
    }
}

/// PUT /api/users/:id/profile
pub async fn put_profile(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<ProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    if let Some(name) = &request.display_name {
        if name.trim().is_empty() {
            return Err(ApiError::BadRequest("display_name cannot be empty".to_string()));
        }
    }

    let profile = state
        .engine
        .set_profile(
            user_id,
            request.display_name.as_deref(),
            request.subscription_plan.as_deref(),
        )
        .await?;

    info!(user_id, stage = %profile.journey_stage(), "Profile updated");
    Ok(Json(profile.into()))
}

#[derive(Debug, Deserialize)]
pub struct MilestoneRequest {
    pub milestone: String,
}

/// POST /api/users/:id/milestones
pub async fn post_milestone(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<MilestoneRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    let profile = state.engine.complete_milestone(user_id, &request.milestone).await?;
    Ok(Json(profile.into()))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users/:id/metrics", get(get_user_metrics))
        .route("/api/users/:id/stats", get(get_user_stats))
        .route("/api/users/:id/profile", put(put_profile))
        .route("/api/users/:id/milestones", post(post_milestone))
}
