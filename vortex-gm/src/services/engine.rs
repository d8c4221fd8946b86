//! Scoring engine
//!
//! Entry point for every write. Each operation takes the write lock, runs in
//! one SQLite transaction and publishes its events only after commit, so
//! subscribers never see state that was rolled back.

use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use vortex_common::db::{JourneyStage, UserProfile};
use vortex_common::events::{EventBus, ScoringEvent};
use vortex_common::{time, MetricCategory, Result};

use crate::config::RuntimeSettings;
use crate::services::accumulator::{self, MetricObservation, Rejection};
use crate::services::activity::ActivityEvent;
use crate::services::insights::{self, Insights};
use crate::services::journey;
use crate::services::ranking::{self, RankingUpdate};

/// Accepted observation and its effects
#[derive(Debug, Clone, Serialize)]
pub struct RecordedMetric {
    pub user_id: i64,
    pub category: MetricCategory,
    pub metric_key: String,
    pub value: f64,
    /// Accumulated value after this observation
    pub total: f64,
    pub journey_stage: JourneyStage,
    pub insights: serde_json::Value,
    pub ranking: RankingUpdate,
}

/// Outcome of one observation
#[derive(Debug, Clone)]
pub enum TrackOutcome {
    Recorded(Box<RecordedMetric>),
    Rejected(Rejection),
}

impl TrackOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, TrackOutcome::Recorded(_))
    }
}

pub struct ScoringEngine {
    db: SqlitePool,
    event_bus: Arc<EventBus>,
    settings: RuntimeSettings,
    write_lock: Mutex<()>,
}

impl ScoringEngine {
    pub fn new(db: SqlitePool, event_bus: Arc<EventBus>, settings: RuntimeSettings) -> Self {
        Self {
            db,
            event_bus,
            settings,
            write_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Accumulate one observation and re-rank
    ///
    /// Catalog rejections are returned as [`TrackOutcome::Rejected`] without
    /// touching the database; only storage failures are errors.
    pub async fn record_metric(&self, observation: &MetricObservation) -> Result<TrackOutcome> {
        let valid = match accumulator::validate(observation) {
            Ok(valid) => valid,
            Err(rejection) => {
                warn!(user_id = observation.user_id, "Metric rejected: {}", rejection);
                return Ok(TrackOutcome::Rejected(rejection));
            }
        };

        let _guard = self.write_lock.lock().await;
        let at = time::now();
        let action_type = valid.category.action_type();

        let mut tx = self.db.begin().await?;

        let total = accumulator::store_metric(&mut tx, &valid, at).await?;
        let ranking =
            ranking::update_user_rankings(&mut tx, valid.user_id, self.settings.scoring_normalization, at)
                .await?;

        let journey_stage = journey::journey_stage(&mut tx, valid.user_id).await?;
        let since = time::days_before(at, self.settings.behavior_frequency_window_days);
        let frequency = insights::action_frequency(&mut tx, valid.user_id, action_type, since).await?;
        let insights =
            Insights::build(frequency, &ranking.category_scores, valid.metric_key).to_value()?;
        insights::record_behavior(
            &mut tx,
            valid.user_id,
            action_type,
            valid.metric_key,
            valid.value,
            journey_stage,
            insights.clone(),
            at,
        )
        .await?;

        tx.commit().await?;

        debug!(
            user_id = valid.user_id,
            category = %valid.category,
            metric_key = valid.metric_key,
            value = valid.value,
            total,
            composite = ranking.composite_score,
            "Metric recorded"
        );

        self.event_bus.emit_lossy(ScoringEvent::MetricRecorded {
            user_id: valid.user_id,
            category: valid.category,
            metric_key: valid.metric_key.to_string(),
            value: valid.value,
            total,
            timestamp: at,
        });
        self.event_bus.emit_lossy(ScoringEvent::BehaviorTracked {
            user_id: valid.user_id,
            action_type: action_type.to_string(),
            metric_key: valid.metric_key.to_string(),
            value: valid.value,
            journey_stage,
            insights: insights.clone(),
            timestamp: at,
        });
        if let Some(change) = &ranking.change {
            self.event_bus.emit_lossy(ScoringEvent::RankingChanged {
                user_id: valid.user_id,
                change: change.clone(),
                timestamp: at,
            });
        }

        Ok(TrackOutcome::Recorded(Box::new(RecordedMetric {
            user_id: valid.user_id,
            category: valid.category,
            metric_key: valid.metric_key.to_string(),
            value: valid.value,
            total,
            journey_stage,
            insights,
            ranking,
        })))
    }

    /// Record every observation implied by a platform event
    ///
    /// Observations are recorded one at a time, in mapping order.
    pub async fn record_activity(&self, user_id: i64, event: &ActivityEvent) -> Result<Vec<TrackOutcome>> {
        let mut outcomes = Vec::new();
        for observation in event.observations(user_id) {
            outcomes.push(self.record_metric(&observation).await?);
        }
        debug!(user_id, event = event.name(), count = outcomes.len(), "Activity recorded");
        Ok(outcomes)
    }

    /// Rebuild every user's rankings from stored metrics
    pub async fn recompute_all_rankings(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let at = time::now();

        let mut tx = self.db.begin().await?;
        let users = ranking::recompute_all(&mut tx, self.settings.scoring_normalization, at).await?;
        tx.commit().await?;

        info!(users, "Rankings recomputed");
        self.event_bus.emit_lossy(ScoringEvent::RankingsRecomputed { users, timestamp: at });

        Ok(users)
    }

    /// Set display name and/or subscription plan
    pub async fn set_profile(
        &self,
        user_id: i64,
        display_name: Option<&str>,
        subscription_plan: Option<&str>,
    ) -> Result<UserProfile> {
        let _guard = self.write_lock.lock().await;
        let mut conn = self.db.acquire().await?;
        journey::upsert_profile(&mut conn, user_id, display_name, subscription_plan, time::now()).await
    }

    /// Mark a milestone completed
    pub async fn complete_milestone(&self, user_id: i64, milestone: &str) -> Result<UserProfile> {
        let _guard = self.write_lock.lock().await;
        let mut conn = self.db.acquire().await?;
        journey::complete_milestone(&mut conn, user_id, milestone, time::now()).await
    }
}
