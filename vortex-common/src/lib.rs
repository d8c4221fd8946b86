//! # VORTEX Common Library
//!
//! Shared code for the VORTEX gamification services including:
//! - Metric catalog (categories, weights, metric descriptions)
//! - Database schema, migrations and row models
//! - Event types (ScoringEvent enum) and the EventBus
//! - Bootstrap configuration loading
//! - Timestamp utilities

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;

pub use catalog::{MetricCategory, MetricDefinition};
pub use error::{Error, Result};
