//! Runtime settings
//!
//! Loaded from the `settings` table at startup. A missing key falls back to
//! its built-in default, and the default is written back so the table always
//! lists every tunable.

use sqlx::SqlitePool;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};
use vortex_common::{Error, Result};

use crate::services::scorer::Normalization;

pub const DEFAULT_RANK_REFRESH_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_LEADERBOARD_LIMIT: i64 = 10;
pub const DEFAULT_FREQUENCY_WINDOW_DAYS: i64 = 7;
/// Longest accepted behavior frequency window
pub const MAX_FREQUENCY_WINDOW_DAYS: i64 = 365;
pub const DEFAULT_EVENT_BUS_CAPACITY: usize = 1000;

/// Database-backed tunables
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    pub scoring_normalization: Normalization,
    /// 0 disables the periodic refresh
    pub rank_refresh_interval_secs: u64,
    pub leaderboard_default_limit: i64,
    pub behavior_frequency_window_days: i64,
    pub event_bus_capacity: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            scoring_normalization: Normalization::default(),
            rank_refresh_interval_secs: DEFAULT_RANK_REFRESH_INTERVAL_SECS,
            leaderboard_default_limit: DEFAULT_LEADERBOARD_LIMIT,
            behavior_frequency_window_days: DEFAULT_FREQUENCY_WINDOW_DAYS,
            event_bus_capacity: DEFAULT_EVENT_BUS_CAPACITY,
        }
    }
}

impl RuntimeSettings {
    /// Load every setting, writing defaults back for missing keys
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let defaults = Self::default();

        let settings = Self {
            scoring_normalization: get_setting(
                pool,
                "scoring_normalization",
                defaults.scoring_normalization,
            )
            .await?,
            rank_refresh_interval_secs: get_setting(
                pool,
                "rank_refresh_interval_secs",
                defaults.rank_refresh_interval_secs,
            )
            .await?,
            leaderboard_default_limit: {
                let limit = get_setting(
                    pool,
                    "leaderboard_default_limit",
                    defaults.leaderboard_default_limit,
                )
                .await?;
                if limit < 1 {
                    warn!("Invalid leaderboard_default_limit {}, using {}", limit, DEFAULT_LEADERBOARD_LIMIT);
                    DEFAULT_LEADERBOARD_LIMIT
                } else {
                    limit
                }
            },
            behavior_frequency_window_days: {
                let days = get_setting(
                    pool,
                    "behavior_frequency_window_days",
                    defaults.behavior_frequency_window_days,
                )
                .await?;
                if (1..=MAX_FREQUENCY_WINDOW_DAYS).contains(&days) {
                    days
                } else {
                    warn!(
                        "behavior_frequency_window_days {} outside 1..={}, using {}",
                        days, MAX_FREQUENCY_WINDOW_DAYS, DEFAULT_FREQUENCY_WINDOW_DAYS
                    );
                    DEFAULT_FREQUENCY_WINDOW_DAYS
                }
            },
            event_bus_capacity: {
                let capacity = get_setting(pool, "event_bus_capacity", defaults.event_bus_capacity).await?;
                if capacity == 0 {
                    warn!("event_bus_capacity must be positive, using {}", DEFAULT_EVENT_BUS_CAPACITY);
                    DEFAULT_EVENT_BUS_CAPACITY
                } else {
                    capacity
                }
            },
        };

        info!(
            normalization = %settings.scoring_normalization,
            refresh_secs = settings.rank_refresh_interval_secs,
            "Loaded runtime settings from database"
        );
        Ok(settings)
    }

    /// Periodic refresh interval, `None` when disabled
    pub fn rank_refresh_interval(&self) -> Option<Duration> {
        (self.rank_refresh_interval_secs > 0).then(|| Duration::from_secs(self.rank_refresh_interval_secs))
    }
}

/// Read one setting; a missing key is written back with `default`
async fn get_setting<T>(pool: &SqlitePool, key: &str, default: T) -> Result<T>
where
    T: FromStr + Display,
{
    let value: Option<Option<String>> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    match value.flatten() {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| Error::Config(format!("Failed to parse setting '{}' value: {}", key, raw))),
        None => {
            info!("Setting '{}' not found in database, using default: {}", key, default);
            set_setting(pool, key, &default).await?;
            Ok(default)
        }
    }
}

/// Insert or update one setting
pub async fn set_setting<T: Display>(pool: &SqlitePool, key: &str, value: T) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value.to_string())
    .execute(pool)
    .await?;

    Ok(())
}
