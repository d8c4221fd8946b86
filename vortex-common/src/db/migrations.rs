//! Database schema migrations
//!
//! Versioned migrations applied after the idempotent table creation in
//! [`crate::db::init`]. Progress is tracked in the `schema_version` table.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - users upgrade from any older version
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Stay idempotent** - check before altering, so re-runs are harmless
//! 4. **Use ALTER TABLE** - prefer it over DROP/CREATE to preserve data

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        warn!("This may indicate a downgrade. Proceeding with caution.");
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    Ok(())
}

/// Migration v1: lookup indexes for leaderboards and the activity windows
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    let statements = [
        "CREATE INDEX IF NOT EXISTS idx_user_metrics_category ON user_metrics(metric_category)",
        "CREATE INDEX IF NOT EXISTS idx_user_metrics_updated_at ON user_metrics(updated_at)",
        "CREATE INDEX IF NOT EXISTS idx_category_rankings_score ON category_rankings(category, score DESC)",
        "CREATE INDEX IF NOT EXISTS idx_user_rankings_score ON user_rankings(composite_score DESC)",
        "CREATE INDEX IF NOT EXISTS idx_ranking_history_user ON ranking_history(user_id, recorded_at)",
        "CREATE INDEX IF NOT EXISTS idx_behavior_patterns_user ON behavior_patterns(user_id, recorded_at)",
        "CREATE INDEX IF NOT EXISTS idx_behavior_patterns_action ON behavior_patterns(action_type, recorded_at)",
    ];

    for sql in statements {
        sqlx::query(sql).execute(pool).await?;
    }

    info!("Migration v1: Created ranking and behavior indexes");
    Ok(())
}

/// Migration v2: persist the global rank position on user_rankings
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('user_rankings') WHERE name = 'rank_position'",
    )
    .fetch_one(pool)
    .await?;

    if has_column == 0 {
        sqlx::query(
            "ALTER TABLE user_rankings ADD COLUMN rank_position INTEGER NOT NULL DEFAULT 0",
        )
        .execute(pool)
        .await?;
        info!("Migration v2: Added rank_position to user_rankings table");
    }

    Ok(())
}
