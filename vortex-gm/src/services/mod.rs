//! Scoring services
//!
//! `engine` owns every write; the remaining modules are building blocks that
//! operate on a caller-supplied connection.

pub mod accumulator;
pub mod activity;
pub mod engine;
pub mod insights;
pub mod journey;
pub mod leaderboard;
pub mod ranking;
pub mod refresh;
pub mod scorer;
pub mod stats;

pub use accumulator::{MetricObservation, Rejection};
pub use activity::ActivityEvent;
pub use engine::{RecordedMetric, ScoringEngine, TrackOutcome};
pub use scorer::Normalization;
