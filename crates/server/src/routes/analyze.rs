use std::sync::Arc;

use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use validator::{Validate, ValidationError};

use crate::analysis::{self, AnalysisParams, StoredDeviation};
use crate::clients::lichess::{extract_study_id, LichessClient};
use crate::error::AppError;

#[derive(Debug, Deserialize, Validate)]
pub struct AnalyzeRequest {
    #[validate(length(min = 1, message = "username must not be empty"))]
    pub username: String,
    #[validate(custom(function = "validate_study_url"))]
    pub study_url_white: String,
    #[validate(custom(function = "validate_study_url"))]
    pub study_url_black: String,
    #[serde(default = "default_max_games")]
    #[validate(range(min = 1, max = 100))]
    pub max_games: u32,
    pub since: Option<DateTime<Utc>>,
    #[validate(custom(function = "validate_scope"))]
    pub scope: Option<String>,
}

fn default_max_games() -> u32 {
    10
}

fn validate_study_url(url: &str) -> Result<(), ValidationError> {
    match extract_study_id(url) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("study_url")
            .with_message("must be a lichess.org/study/{id} URL".into())),
    }
}

fn validate_scope(scope: &str) -> Result<(), ValidationError> {
    match scope {
        "recent" | "today" => Ok(()),
        _ => Err(ValidationError::new("scope").with_message("must be 'recent' or 'today'".into())),
    }
}

impl AnalyzeRequest {
    fn is_today(&self) -> bool {
        self.scope.as_deref() == Some("today")
    }

    /// `scope = "today"` overrides `since` with midnight UTC.
    fn effective_since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.is_today() {
            now.date_naive().and_hms_opt(0, 0, 0).map(|t| t.and_utc())
        } else {
            self.since
        }
    }
}

#[derive(Serialize)]
pub struct AnalyzeResponse {
    pub message: String,
    pub games_analyzed: usize,
    pub in_book: usize,
    pub failed: usize,
    pub deviations: Vec<StoredDeviation>,
}

/// POST /api/analyze_games
pub async fn analyze_games(
    Extension(pool): Extension<PgPool>,
    Extension(lichess): Extension<Arc<LichessClient>>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let since = req.effective_since(Utc::now());
    tracing::info!(username = %req.username, scope = ?req.scope, ?since, "Analysis requested");

    let params = AnalysisParams {
        username: &req.username,
        study_url_white: &req.study_url_white,
        study_url_black: &req.study_url_black,
        max_games: req.max_games as usize,
        since,
    };
    let summary = analysis::perform_game_analysis(&pool, &lichess, &params).await?;

    let found = summary.deviations.len();
    let message = if req.is_today() {
        format!("Found {found} deviations in {} games played today", summary.games_analyzed)
    } else {
        format!("Found {found} deviations in {} games", summary.games_analyzed)
    };

    Ok(Json(AnalyzeResponse {
        message,
        games_analyzed: summary.games_analyzed,
        in_book: summary.in_book,
        failed: summary.failed,
        deviations: summary.deviations,
    }))
}
