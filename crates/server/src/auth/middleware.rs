use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use sqlx::PgPool;

use crate::auth::jwt;
use crate::config::Config;
use crate::db::users::{self, Profile};
use crate::error::AppError;

/// Authenticated user extracted from the Authorization header.
/// Use as an extractor in route handlers that require auth.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Profile);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let pool = parts
            .extensions
            .get::<PgPool>()
            .ok_or(AppError::Internal("Missing database pool".into()))?
            .clone();

        let config = parts
            .extensions
            .get::<Config>()
            .ok_or(AppError::Internal("Missing config".into()))?
            .clone();

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or(AppError::Unauthorized)?;

        let claims = jwt::verify_token(token, &config.jwt_secret)
            .ok_or(AppError::Unauthorized)?;

        let profile = users::get_by_id(&pool, claims.user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(AuthUser(profile))
    }
}
