use std::sync::Arc;

use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use validator::Validate;

use crate::auth::{jwt, middleware::AuthUser};
use crate::clients::lichess::LichessClient;
use crate::config::Config;
use crate::db::users::{self, Profile};
use crate::error::AppError;

#[derive(Deserialize, Validate)]
pub struct LichessLoginRequest {
    #[validate(length(min = 1, message = "access_token must not be empty"))]
    pub access_token: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub user: Profile,
    pub token: String,
}

/// POST /api/auth/lichess
///
/// Trades a Lichess OAuth token for a session token. The Lichess token is
/// only used to learn who the caller is and is not stored.
pub async fn lichess_login(
    Extension(pool): Extension<PgPool>,
    Extension(config): Extension<Config>,
    Extension(lichess): Extension<Arc<LichessClient>>,
    Json(req): Json<LichessLoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let username = lichess.fetch_account(&req.access_token).await?;
    let profile = users::upsert_profile(&pool, &username).await?;

    let token = jwt::create_token(
        profile.id,
        &profile.lichess_username,
        &config.jwt_secret,
        config.jwt_expire_hours,
    )
    .map_err(|e| AppError::Internal(format!("Token creation error: {e}")))?;

    tracing::info!(username = %profile.lichess_username, "Lichess login");
    Ok(Json(AuthResponse { user: profile, token }))
}

/// GET /api/auth/me
pub async fn me(AuthUser(profile): AuthUser) -> Json<Profile> {
    Json(profile)
}
