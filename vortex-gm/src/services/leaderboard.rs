//! Leaderboards
//!
//! Read-only views over the ranking tables. Display names come from
//! `user_profiles` and are absent for users without a profile.

use serde::Serialize;
use sqlx::{Row, SqliteConnection};
use std::collections::BTreeMap;
use vortex_common::{MetricCategory, Result};

/// Size of each category list in [`top_performers`]
pub const TOP_PERFORMERS_LIMIT: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub display_name: Option<String>,
    pub score: f64,
    pub rank_position: i64,
}

fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<LeaderboardEntry> {
    Ok(LeaderboardEntry {
        user_id: row.try_get("user_id")?,
        display_name: row.try_get("display_name")?,
        score: row.try_get("score")?,
        rank_position: row.try_get("rank_position")?,
    })
}

/// Top `limit` users of one category
pub async fn category_leaderboard(
    conn: &mut SqliteConnection,
    category: MetricCategory,
    limit: i64,
) -> Result<Vec<LeaderboardEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT cr.user_id, up.display_name, cr.score, cr.rank_position
        FROM category_rankings cr
        LEFT JOIN user_profiles up ON up.user_id = cr.user_id
        WHERE cr.category = ?
        ORDER BY cr.score DESC, cr.user_id ASC
        LIMIT ?
        "#,
    )
    .bind(category.as_str())
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(entry_from_row).collect()
}

/// Top `limit` users by composite score
pub async fn overall_leaderboard(conn: &mut SqliteConnection, limit: i64) -> Result<Vec<LeaderboardEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT ur.user_id, up.display_name, ur.composite_score AS score, ur.rank_position
        FROM user_rankings ur
        LEFT JOIN user_profiles up ON up.user_id = ur.user_id
        ORDER BY ur.composite_score DESC, ur.user_id ASC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(entry_from_row).collect()
}

/// Top five of every category
pub async fn top_performers(
    conn: &mut SqliteConnection,
) -> Result<BTreeMap<MetricCategory, Vec<LeaderboardEntry>>> {
    let mut performers = BTreeMap::new();
    for category in MetricCategory::ALL {
        performers.insert(
            category,
            category_leaderboard(conn, category, TOP_PERFORMERS_LIMIT).await?,
        );
    }
    Ok(performers)
}

/// 1 + number of users with a strictly greater composite score
///
/// `None` when the user has no composite ranking. Tied users share a rank
/// here, unlike the stored dense positions.
pub async fn user_rank(conn: &mut SqliteConnection, user_id: i64) -> Result<Option<i64>> {
    let rank = sqlx::query_scalar(
        r#"
        SELECT 1 + (
            SELECT COUNT(*) FROM user_rankings other
            WHERE other.composite_score > me.composite_score
        )
        FROM user_rankings me
        WHERE me.user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(rank)
}
