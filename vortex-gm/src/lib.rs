//! vortex-gm library - gamification metrics and ranking service
//!
//! Accumulates per-user metric observations, scores them per category and
//! as a weighted composite, keeps dense leaderboard positions and serves
//! everything over HTTP + SSE.

pub mod api;
pub mod config;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use vortex_common::events::EventBus;

use crate::config::RuntimeSettings;
use crate::services::ScoringEngine;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (reads go straight to the pool)
    pub db: SqlitePool,
    /// Owner of every write
    pub engine: Arc<ScoringEngine>,
    /// Event bus for SSE broadcasting
    pub event_bus: Arc<EventBus>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, settings: RuntimeSettings) -> Self {
        let event_bus = Arc::new(EventBus::new(settings.event_bus_capacity));
        let engine = Arc::new(ScoringEngine::new(db.clone(), Arc::clone(&event_bus), settings));
        Self {
            db,
            engine,
            event_bus,
            startup_time: Utc::now(),
        }
    }

    pub fn settings(&self) -> &RuntimeSettings {
        self.engine.settings()
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::health_routes())
        .merge(api::catalog_routes())
        .merge(api::metric_routes())
        .merge(api::user_routes())
        .merge(api::leaderboard_routes())
        .merge(api::overview_routes())
        .route("/api/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
