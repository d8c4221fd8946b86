//! Leaderboard endpoints

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vortex_common::MetricCategory;

use crate::services::leaderboard::{self, LeaderboardEntry};
use crate::{ApiError, ApiResult, AppState};

/// Largest accepted `limit`
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    fn resolve(&self, default: i64) -> ApiResult<i64> {
        match self.limit {
            None => Ok(default),
            Some(limit) if (1..=MAX_LIMIT).contains(&limit) => Ok(limit),
            Some(limit) => Err(ApiError::BadRequest(format!(
                "limit must be between 1 and {}, got {}",
                MAX_LIMIT, limit
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    /// Category name, or "overall" for the composite board
    pub board: String,
    pub entries: Vec<LeaderboardEntry>,
}

/// GET /api/leaderboard?limit=N
pub async fn get_overall_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<LeaderboardResponse>> {
    let limit = query.resolve(state.settings().leaderboard_default_limit)?;
    let mut conn = state.db.acquire().await?;
    Ok(Json(LeaderboardResponse {
        board: "overall".to_string(),
        entries: leaderboard::overall_leaderboard(&mut conn, limit).await?,
    }))
}

/// GET /api/leaderboard/:category?limit=N
pub async fn get_category_leaderboard(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<LeaderboardResponse>> {
    let category: MetricCategory = category.parse()?;
    let limit = query.resolve(state.settings().leaderboard_default_limit)?;
    let mut conn = state.db.acquire().await?;
    Ok(Json(LeaderboardResponse {
        board: category.to_string(),
        entries: leaderboard::category_leaderboard(&mut conn, category, limit).await?,
    }))
}

/// GET /api/top-performers
pub async fn get_top_performers(
    State(state): State<AppState>,
) -> ApiResult<Json<BTreeMap<MetricCategory, Vec<LeaderboardEntry>>>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(leaderboard::top_performers(&mut conn).await?))
}

pub fn leaderboard_routes() -> Router<AppState> {
    Router::new()
        .route("/api/leaderboard", get(get_overall_leaderboard))
        .route("/api/leaderboard/:category", get(get_category_leaderboard))
        .route("/api/top-performers", get(get_top_performers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_resolution() {
        assert_eq!(LimitQuery { limit: None }.resolve(10).unwrap(), 10);
        assert_eq!(LimitQuery { limit: Some(3) }.resolve(10).unwrap(), 3);
        assert!(LimitQuery { limit: Some(0) }.resolve(10).is_err());
        assert!(LimitQuery { limit: Some(MAX_LIMIT + 1) }.resolve(10).is_err());
    }
}
