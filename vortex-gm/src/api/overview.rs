//! Platform overview and ranking maintenance

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use crate::services::stats::{self, Overview};
use crate::{ApiResult, AppState};

/// GET /api/overview
pub async fn get_overview(State(state): State<AppState>) -> ApiResult<Json<Overview>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(stats::overview(&mut conn).await?))
}

#[derive(Debug, Serialize)]
pub struct RecomputeResponse {
    pub users: usize,
}

/// POST /api/rankings/recompute
///
/// Rebuilds every category and composite ranking from stored metrics.
pub async fn recompute_rankings(State(state): State<AppState>) -> ApiResult<Json<RecomputeResponse>> {
    let users = state.engine.recompute_all_rankings().await?;
    info!(users, "Rankings recomputed on request");
    Ok(Json(RecomputeResponse { users }))
}

pub fn overview_routes() -> Router<AppState> {
    Router::new()
        .route("/api/overview", get(get_overview))
        .route("/api/rankings/recompute", post(recompute_rankings))
}
