//! Database initialization
//!
//! Creates the database on first run, applies connection pragmas and builds
//! the scoring schema. Table creation is idempotent (`CREATE TABLE IF NOT
//! EXISTS`); structural changes after the first release go through
//! [`crate::db::migrations`].

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// An in-memory SQLite database lives only as long as its connection, so
/// the pool is pinned to one connection that is never recycled.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None::<Duration>)
        .max_lifetime(None::<Duration>)
        .connect("sqlite::memory:")
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table, then run pending migrations
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_user_profiles_table(pool).await?;
    create_user_metrics_table(pool).await?;
    create_category_rankings_table(pool).await?;
    create_user_rankings_table(pool).await?;
    create_ranking_history_table(pool).await?;
    create_behavior_patterns_table(pool).await?;

    crate::db::migrations::run_migrations(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores runtime configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the user_profiles table
///
/// Subscription plan and completed milestones drive the journey stage.
pub async fn create_user_profiles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_profiles (
            user_id INTEGER PRIMARY KEY,
            display_name TEXT,
            subscription_plan TEXT,
            completed_milestones TEXT NOT NULL DEFAULT '[]',
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the user_metrics table
///
/// One row per (user, category, metric); `metric_value` accumulates and is
/// never clamped on write.
pub async fn create_user_metrics_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_metrics (
            user_id INTEGER NOT NULL,
            metric_category TEXT NOT NULL,
            metric_key TEXT NOT NULL,
            metric_value REAL NOT NULL DEFAULT 0,
            context_data TEXT,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (user_id, metric_category, metric_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_category_rankings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS category_rankings (
            user_id INTEGER NOT NULL,
            category TEXT NOT NULL,
            score REAL NOT NULL DEFAULT 0,
            rank_position INTEGER NOT NULL DEFAULT 0,
            metrics_data TEXT,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (user_id, category)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the user_rankings table (composite score per user)
///
/// `rank_position` is added by migration v2 so databases created before the
/// global rank was persisted pick it up.
pub async fn create_user_rankings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_rankings (
            user_id INTEGER PRIMARY KEY,
            composite_score REAL NOT NULL DEFAULT 0,
            ranking_data TEXT,
            last_updated TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_ranking_history_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ranking_history (
            guid TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            composite_score REAL NOT NULL,
            recorded_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the behavior_patterns table
///
/// Append-only log; read for display and analysis, never for scoring.
pub async fn create_behavior_patterns_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS behavior_patterns (
            guid TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            action_type TEXT NOT NULL,
            metric_key TEXT NOT NULL,
            metric_value REAL NOT NULL,
            journey_stage TEXT NOT NULL,
            ai_insights TEXT,
            recorded_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_names(pool: &SqlitePool) -> Vec<String> {
        sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_memory_database_has_all_tables() {
        let pool = init_memory_database().await.unwrap();
        let tables = table_names(&pool).await;

        for expected in [
            "behavior_patterns",
            "category_rankings",
            "ranking_history",
            "schema_version",
            "settings",
            "user_metrics",
            "user_profiles",
            "user_rankings",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
        }
    }

    #[tokio::test]
    async fn test_create_schema_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        create_schema(&pool).await.unwrap();
        create_schema(&pool).await.unwrap();
    }
}
