//! Metric catalog endpoint

use axum::{routing::get, Json, Router};
use serde::Serialize;
use vortex_common::catalog::total_metric_count;
use vortex_common::{MetricCategory, MetricDefinition};

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CategoryEntry {
    pub category: MetricCategory,
    pub weight: f64,
    pub action_type: &'static str,
    pub metrics: &'static [MetricDefinition],
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub categories: Vec<CategoryEntry>,
    pub total_metrics: usize,
}

/// GET /api/catalog
pub async fn get_catalog() -> Json<CatalogResponse> {
    Json(CatalogResponse {
        categories: MetricCategory::ALL
            .iter()
            .map(|&category| CategoryEntry {
                category,
                weight: category.weight(),
                action_type: category.action_type(),
                metrics: category.metrics(),
            })
            .collect(),
        total_metrics: total_metric_count(),
    })
}

pub fn catalog_routes() -> Router<AppState> {
    Router::new().route("/api/catalog", get(get_catalog))
}
