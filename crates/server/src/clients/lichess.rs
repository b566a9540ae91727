use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::config::Config;

static STUDY_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"lichess\.org/study/([a-zA-Z0-9]+)").expect("valid regex"));

#[derive(Debug, thiserror::Error)]
pub enum LichessError {
    #[error("Not found on Lichess: {0}")]
    NotFound(String),

    #[error("Lichess rate limit exceeded, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Invalid Lichess token")]
    Unauthorized,

    #[error("Lichess returned HTTP {0}")]
    Status(StatusCode),

    #[error("Lichess request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// A game from the user export, with its PGN.
#[derive(Debug, Clone)]
pub struct LichessGame {
    pub id: String,
    pub pgn: String,
    pub opening: Option<String>,
}

#[derive(Deserialize)]
struct ExportedGame {
    #[serde(default)]
    id: String,
    pgn: Option<String>,
    opening: Option<ExportedOpening>,
}

#[derive(Deserialize)]
struct ExportedOpening {
    name: String,
}

pub struct LichessClient {
    client: Client,
    base_url: String,
    throttle: Duration,
}

impl LichessClient {
    pub fn new(config: &Config) -> Result<Self, LichessError> {
        let client = Client::builder()
            .user_agent("OpeningCheck/1.0")
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            base_url: config.lichess_base_url.trim_end_matches('/').to_string(),
            throttle: Duration::from_millis(config.lichess_throttle_ms),
        })
    }

    async fn pause(&self) {
        if !self.throttle.is_zero() {
            tokio::time::sleep(self.throttle).await;
        }
    }

    /// Fetch the most recent games of `username`.
    /// `since` is an optional epoch-millisecond timestamp to only fetch games after that time.
    pub async fn fetch_user_games(
        &self,
        username: &str,
        max_games: usize,
        since: Option<i64>,
    ) -> Result<Vec<LichessGame>, LichessError> {
        let url = format!("{}/api/games/user/{}", self.base_url, username);

        let mut params = vec![
            ("pgnInJson", "true".to_string()),
            ("opening", "true".to_string()),
            ("max", max_games.to_string()),
        ];
        if let Some(since_ms) = since {
            params.push(("since", since_ms.to_string()));
        }

        self.pause().await;

        let resp = self
            .client
            .get(&url)
            .query(&params)
            .header("Accept", "application/x-ndjson")
            .send()
            .await?;
        let text = check_status(resp, username).await?.text().await?;

        Ok(parse_game_export(&text))
    }

    /// Fetch a study as multi-chapter PGN.
    pub async fn fetch_study_pgn(&self, study_id: &str) -> Result<String, LichessError> {
        let url = format!("{}/api/study/{}.pgn", self.base_url, study_id);

        self.pause().await;
        tracing::info!(study_id, "Fetching study");

        let resp = self
            .client
            .get(&url)
            .header("Accept", "text/plain")
            .send()
            .await?;
        Ok(check_status(resp, study_id).await?.text().await?)
    }

    /// Resolve an OAuth access token to its Lichess username.
    pub async fn fetch_account(&self, access_token: &str) -> Result<String, LichessError> {
        let url = format!("{}/api/account", self.base_url);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(LichessError::Unauthorized);
        }
        let account: Value = check_status(resp, "account").await?.json().await?;

        account
            .get("username")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or(LichessError::Unauthorized)
    }
}

async fn check_status(resp: reqwest::Response, what: &str) -> Result<reqwest::Response, LichessError> {
    match resp.status() {
        s if s.is_success() => Ok(resp),
        StatusCode::NOT_FOUND => Err(LichessError::NotFound(what.to_string())),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = resp
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            tracing::warn!("Rate limit hit. Retry after: {retry_after}s");
            Err(LichessError::RateLimited { retry_after })
        }
        s => {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!("Lichess API error: {s} - {}", truncate(&body, 200));
            Err(LichessError::Status(s))
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// Parse the NDJSON game export, skipping lines without a PGN.
fn parse_game_export(text: &str) -> Vec<LichessGame> {
    let mut games = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<ExportedGame>(line) {
            Ok(game) => {
                let Some(pgn) = game.pgn.filter(|p| !p.is_empty()) else {
                    continue;
                };
                games.push(LichessGame {
                    id: game.id,
                    pgn,
                    opening: game.opening.map(|o| o.name),
                });
            }
            Err(e) => {
                tracing::warn!("Failed to parse Lichess game JSON: {e}");
            }
        }
    }

    games
}

/// Study id from a `lichess.org/study/{id}` URL.
pub fn extract_study_id(url: &str) -> Option<String> {
    STUDY_URL_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
