use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chess_core::pgn::extract_header;
use chess_core::DeviationRecord;
use serde::Serialize;
use sqlx::PgPool;

use crate::error::AppError;

/// A stored deviation, as returned by the API.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DeviationRow {
    pub id: i64,
    pub user_id: i64,
    pub study_id: Option<i64>,
    pub game_id: String,
    pub pgn: Option<String>,
    pub opening_name: Option<String>,
    pub position_fen: String,
    pub previous_position_fen: Option<String>,
    pub expected_move: String,
    pub actual_move: String,
    pub move_number: i32,
    pub color: String,
    pub deviation_uci: String,
    pub reference_uci: String,
    pub first_deviator: String,
    pub review_status: String,
    pub review_result: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub detected_at: DateTime<Utc>,
}

/// Where a deviation came from, besides the record itself.
pub struct DeviationSource<'a> {
    pub user_id: i64,
    pub study_id: Option<i64>,
    pub game_id: &'a str,
    pub pgn: &'a str,
    pub opening_name: Option<&'a str>,
}

const SELECT_COLUMNS: &str = r#"id, user_id, study_id, game_id, pgn, opening_name,
       position_fen, previous_position_fen, expected_move, actual_move,
       move_number, color, deviation_uci, reference_uci, first_deviator,
       review_status, review_result, reviewed_at, detected_at"#;

/// Store `record`, replacing any earlier row for the same (user, game).
pub async fn upsert_deviation(
    pool: &PgPool,
    source: &DeviationSource<'_>,
    record: &DeviationRecord,
) -> Result<i64, AppError> {
    let (id,): (i64,) = sqlx::query_as(
        r#"INSERT INTO opening_deviations (
            user_id, study_id, game_id, pgn, opening_name,
            position_fen, previous_position_fen, expected_move, actual_move,
            move_number, color, deviation_uci, reference_uci, first_deviator
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (user_id, game_id) DO UPDATE SET
            study_id = EXCLUDED.study_id,
            pgn = EXCLUDED.pgn,
            opening_name = EXCLUDED.opening_name,
            position_fen = EXCLUDED.position_fen,
            previous_position_fen = EXCLUDED.previous_position_fen,
            expected_move = EXCLUDED.expected_move,
            actual_move = EXCLUDED.actual_move,
            move_number = EXCLUDED.move_number,
            color = EXCLUDED.color,
            deviation_uci = EXCLUDED.deviation_uci,
            reference_uci = EXCLUDED.reference_uci,
            first_deviator = EXCLUDED.first_deviator
        RETURNING id"#,
    )
    .bind(source.user_id)
    .bind(source.study_id)
    .bind(source.game_id)
    .bind(source.pgn)
    .bind(source.opening_name)
    .bind(record.board_fen())
    .bind(record.previous_position_fen())
    .bind(record.reference_san())
    .bind(record.deviation_san())
    .bind(record.move_number() as i32)
    .bind(record.player_color().as_str())
    .bind(record.deviation_uci())
    .bind(record.reference_uci())
    .bind(record.first_deviator().as_str())
    .fetch_one(pool)
    .await
    .map_err(AppError::Sqlx)?;

    Ok(id)
}

pub struct ListFilter<'a> {
    pub limit: i64,
    pub offset: i64,
    pub review_status: Option<&'a str>,
    pub active_studies_only: bool,
}

/// Page of the user's deviations, newest game first.
pub async fn list_for_user(
    pool: &PgPool,
    user_id: i64,
    filter: &ListFilter<'_>,
) -> Result<Vec<DeviationRow>, AppError> {
    let query = format!(
        r#"SELECT {SELECT_COLUMNS}
           FROM opening_deviations
           WHERE user_id = $1
             AND ($2::TEXT IS NULL OR review_status = $2)
             AND (NOT $3 OR study_id IN (
                 SELECT id FROM lichess_studies WHERE user_id = $1 AND is_active
             ))
           ORDER BY detected_at DESC
           LIMIT $4 OFFSET $5"#
    );

    let mut rows = sqlx::query_as::<_, DeviationRow>(&query)
        .bind(user_id)
        .bind(filter.review_status)
        .bind(filter.active_studies_only)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(pool)
        .await
        .map_err(AppError::Sqlx)?;

    sort_by_game_date(&mut rows);
    Ok(rows)
}

pub async fn get_by_id(pool: &PgPool, id: i64) -> Result<Option<DeviationRow>, AppError> {
    let query = format!("SELECT {SELECT_COLUMNS} FROM opening_deviations WHERE id = $1");
    sqlx::query_as::<_, DeviationRow>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Sqlx)
}

/// Order a page by when the game was played, newest first. Rows whose PGN
/// carries no usable date fall back to `detected_at`.
fn sort_by_game_date(rows: &mut [DeviationRow]) {
    rows.sort_by_cached_key(|row| {
        let played = row.pgn.as_deref().and_then(game_date);
        std::cmp::Reverse(played.unwrap_or(row.detected_at))
    });
}

/// Game date from the `UTCDate` header, then `Date`.
fn game_date(pgn: &str) -> Option<DateTime<Utc>> {
    let raw = extract_header(pgn, "UTCDate").or_else(|| extract_header(pgn, "Date"))?;
    let date = NaiveDate::parse_from_str(&raw, "%Y.%m.%d")
        .or_else(|_| NaiveDate::parse_from_str(&raw, "%Y-%m-%d"))
        .ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}
