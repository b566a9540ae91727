use axum::{extract::Path, extract::Query, Extension, Json};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::db::deviations::{self, DeviationRow, ListFilter};
use crate::error::AppError;

#[derive(Debug, Deserialize, Validate)]
pub struct DeviationsQuery {
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub offset: i64,
    pub review_status: Option<String>,
    #[serde(default = "default_true")]
    pub active_studies_only: bool,
}

fn default_limit() -> i64 {
    10
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
pub struct DeviationsResponse {
    pub deviations: Vec<DeviationRow>,
    pub limit: i64,
    pub offset: i64,
}

/// GET /api/deviations
pub async fn list_deviations(
    Extension(pool): Extension<PgPool>,
    Query(q): Query<DeviationsQuery>,
    AuthUser(user): AuthUser,
) -> Result<Json<DeviationsResponse>, AppError> {
    q.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let filter = ListFilter {
        limit: q.limit,
        offset: q.offset,
        review_status: q.review_status.as_deref(),
        active_studies_only: q.active_studies_only,
    };
    let rows = deviations::list_for_user(&pool, user.id, &filter).await?;

    Ok(Json(DeviationsResponse {
        deviations: rows,
        limit: q.limit,
        offset: q.offset,
    }))
}

/// GET /api/deviations/{id}
pub async fn get_deviation(
    Extension(pool): Extension<PgPool>,
    Path(id): Path<i64>,
    AuthUser(user): AuthUser,
) -> Result<Json<DeviationRow>, AppError> {
    // Other users' rows look the same as missing ones.
    let row = deviations::get_by_id(&pool, id)
        .await?
        .filter(|row| row.user_id == user.id)
        .ok_or_else(|| AppError::NotFound("Deviation not found".into()))?;

    Ok(Json(row))
}
