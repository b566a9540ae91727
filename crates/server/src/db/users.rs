use serde::Serialize;
use sqlx::PgPool;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Profile {
    pub id: i64,
    pub lichess_username: String,
    pub last_synced_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub async fn get_by_id(pool: &PgPool, id: i64) -> Result<Option<Profile>, AppError> {
    sqlx::query_as::<_, Profile>(
        "SELECT id, lichess_username, last_synced_at, created_at FROM profiles WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::Sqlx)
}

/// Case-insensitive lookup, Lichess usernames are not case sensitive.
pub async fn find_by_lichess_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<Profile>, AppError> {
    sqlx::query_as::<_, Profile>(
        r#"SELECT id, lichess_username, last_synced_at, created_at
           FROM profiles WHERE LOWER(lichess_username) = LOWER($1)
           LIMIT 1"#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await
    .map_err(AppError::Sqlx)
}

/// Create the profile on first login, return it either way.
pub async fn upsert_profile(pool: &PgPool, lichess_username: &str) -> Result<Profile, AppError> {
    if let Some(existing) = find_by_lichess_username(pool, lichess_username).await? {
        return Ok(existing);
    }

    sqlx::query_as::<_, Profile>(
        r#"INSERT INTO profiles (lichess_username)
           VALUES ($1)
           ON CONFLICT (lichess_username) DO UPDATE SET lichess_username = EXCLUDED.lichess_username
           RETURNING id, lichess_username, last_synced_at, created_at"#,
    )
    .bind(lichess_username)
    .fetch_one(pool)
    .await
    .map_err(AppError::Sqlx)
}

pub async fn touch_last_synced(pool: &PgPool, id: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE profiles SET last_synced_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(AppError::Sqlx)?;
    Ok(())
}
