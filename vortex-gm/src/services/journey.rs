//! User profiles and journey stage
//!
//! The journey stage is contextual metadata attached to behavior records; it
//! never feeds back into scoring.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use vortex_common::db::{JourneyStage, UserProfile};
use vortex_common::{Error, Result};

/// Load a profile, `None` when the user has never been registered
pub async fn load_profile(conn: &mut SqliteConnection, user_id: i64) -> Result<Option<UserProfile>> {
    let row = sqlx::query(
        r#"
        SELECT user_id, display_name, subscription_plan, completed_milestones
        FROM user_profiles
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(UserProfile::from_row).transpose()
}

/// Journey stage of a user; users without a profile are `unregistered`
pub async fn journey_stage(conn: &mut SqliteConnection, user_id: i64) -> Result<JourneyStage> {
    Ok(load_profile(conn, user_id)
        .await?
        .map(|p| p.journey_stage())
        .unwrap_or(JourneyStage::Unregistered))
}

/// Create or update display name and subscription plan
///
/// `None` fields keep their stored value; an empty plan string clears the plan.
pub async fn upsert_profile(
    conn: &mut SqliteConnection,
    user_id: i64,
    display_name: Option<&str>,
    subscription_plan: Option<&str>,
    at: DateTime<Utc>,
) -> Result<UserProfile> {
    let plan = subscription_plan.map(|p| p.trim());

    sqlx::query(
        r#"
        INSERT INTO user_profiles (user_id, display_name, subscription_plan, completed_milestones, updated_at)
        VALUES (?, ?, NULLIF(?, ''), '[]', ?)
        ON CONFLICT(user_id) DO UPDATE SET
            display_name = COALESCE(?, display_name),
            subscription_plan = CASE WHEN ? IS NULL THEN subscription_plan ELSE NULLIF(?, '') END,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(display_name)
    .bind(plan)
    .bind(at)
    .bind(display_name)
    .bind(plan)
    .bind(plan)
    .execute(&mut *conn)
    .await?;

    load_profile(conn, user_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Profile {} vanished after upsert", user_id)))
}

/// Record a completed milestone
///
/// Milestones are distinct by name; completing one twice is a no-op.
/// Creates an (unregistered) profile when none exists.
pub async fn complete_milestone(
    conn: &mut SqliteConnection,
    user_id: i64,
    milestone: &str,
    at: DateTime<Utc>,
) -> Result<UserProfile> {
    let milestone = milestone.trim();
    if milestone.is_empty() {
        return Err(Error::InvalidInput("Milestone name must not be empty".to_string()));
    }

    let mut profile = load_profile(conn, user_id).await?.unwrap_or(UserProfile {
        user_id,
        ..UserProfile::default()
    });

    if profile.completed_milestones.iter().any(|m| m == milestone) {
        return Ok(profile);
    }
    profile.completed_milestones.push(milestone.to_string());

    let milestones = serde_json::to_string(&profile.completed_milestones)?;
    sqlx::query(
        r#"
        INSERT INTO user_profiles (user_id, completed_milestones, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            completed_milestones = excluded.completed_milestones,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(milestones)
    .bind(at)
    .execute(&mut *conn)
    .await?;

    Ok(profile)
}
