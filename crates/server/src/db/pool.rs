use sqlx::postgres::{PgPool, PgPoolOptions};

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Run the full Postgres schema migration inline.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Users, identified by their Lichess account
CREATE TABLE IF NOT EXISTS profiles (
    id               BIGSERIAL PRIMARY KEY,
    lichess_username TEXT UNIQUE NOT NULL,
    last_synced_at   TIMESTAMPTZ,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_profiles_lichess_username_lower
    ON profiles (LOWER(lichess_username));

-- Repertoire studies registered by a user
CREATE TABLE IF NOT EXISTS lichess_studies (
    id          BIGSERIAL PRIMARY KEY,
    user_id     BIGINT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    study_url   TEXT NOT NULL,
    color       TEXT NOT NULL,
    is_active   BOOLEAN NOT NULL DEFAULT TRUE,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_lichess_studies_user
    ON lichess_studies (user_id, is_active);

CREATE UNIQUE INDEX IF NOT EXISTS idx_lichess_studies_user_url_color
    ON lichess_studies (user_id, study_url, color);

-- First departure from the repertoire, at most one per (user, game)
CREATE TABLE IF NOT EXISTS opening_deviations (
    id                    BIGSERIAL PRIMARY KEY,
    user_id               BIGINT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    study_id              BIGINT REFERENCES lichess_studies(id) ON DELETE SET NULL,
    game_id               TEXT NOT NULL,
    pgn                   TEXT,
    opening_name          TEXT,
    position_fen          TEXT NOT NULL,
    previous_position_fen TEXT,
    expected_move         TEXT NOT NULL,
    actual_move           TEXT NOT NULL,
    move_number           INTEGER NOT NULL,
    color                 TEXT NOT NULL,
    deviation_uci         TEXT NOT NULL,
    reference_uci         TEXT NOT NULL,
    first_deviator        TEXT NOT NULL,
    review_status         TEXT NOT NULL DEFAULT 'needs_review',
    review_result         TEXT,
    reviewed_at           TIMESTAMPTZ,
    detected_at           TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (user_id, game_id)
);

CREATE INDEX IF NOT EXISTS idx_opening_deviations_user_detected
    ON opening_deviations (user_id, detected_at DESC);
"#;
