//! Event types for the VORTEX event system
//!
//! Provides the shared ScoringEvent enum and the EventBus used to publish
//! scoring activity to in-process subscribers and SSE clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::catalog::MetricCategory;
use crate::db::models::{JourneyStage, Trend};

/// Analysis of a composite score change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingChange {
    pub previous_score: f64,
    pub new_score: f64,
    pub score_change: f64,
    pub trend: Trend,
    /// Absolute score change
    pub magnitude: f64,
    /// Category with the highest weighted score
    pub primary_driver: MetricCategory,
    /// One entry per category scoring below 50
    pub recommendations: Vec<String>,
}

/// Scoring event types
///
/// Events are broadcast via EventBus after the database transaction that
/// produced them has committed, and are serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScoringEvent {
    /// An observation was accumulated into a user metric
    MetricRecorded {
        user_id: i64,
        category: MetricCategory,
        metric_key: String,
        /// Observed value (the increment)
        value: f64,
        /// Accumulated value after the increment
        total: f64,
        timestamp: DateTime<Utc>,
    },

    /// A behavior record was appended
    BehaviorTracked {
        user_id: i64,
        action_type: String,
        metric_key: String,
        value: f64,
        journey_stage: JourneyStage,
        insights: serde_json::Value,
        timestamp: DateTime<Utc>,
    },

    /// A user's composite score changed relative to a previous ranking
    RankingChanged {
        user_id: i64,
        change: RankingChange,
        timestamp: DateTime<Utc>,
    },

    /// All rankings were rebuilt from stored metrics
    RankingsRecomputed {
        users: usize,
        timestamp: DateTime<Utc>,
    },
}

impl ScoringEvent {
    /// Event name used for SSE `event:` lines
    pub fn event_type(&self) -> &'static str {
        match self {
            ScoringEvent::MetricRecorded { .. } => "MetricRecorded",
            ScoringEvent::BehaviorTracked { .. } => "BehaviorTracked",
            ScoringEvent::RankingChanged { .. } => "RankingChanged",
            ScoringEvent::RankingsRecomputed { .. } => "RankingsRecomputed",
        }
    }
}

/// Broadcast bus for scoring events
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<ScoringEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before slow subscribers
    /// start losing the oldest ones.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ScoringEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ScoringEvent) {
        let _ = self.tx.send(event);
    }
}
