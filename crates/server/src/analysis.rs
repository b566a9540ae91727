use chrono::{DateTime, Utc};
use chess_core::pgn::{parse_chapters, parse_game};
use chess_core::{ChessError, DeviationRecord, PlayedGame, RepertoireIndex, Side};
use serde::Serialize;
use sqlx::PgPool;

use crate::clients::lichess::{extract_study_id, LichessClient};
use crate::db::deviations::{self, DeviationSource};
use crate::db::{studies, users};
use crate::error::AppError;

/// The user's White and Black repertoires.
pub struct Repertoire {
    pub white: RepertoireIndex,
    pub black: RepertoireIndex,
}

/// What happened to one game of a batch.
#[derive(Debug)]
pub enum GameOutcome {
    /// `side` is the color the user played, i.e. which repertoire matched.
    Deviation { side: Side, record: DeviationRecord },
    InBook,
    Failed(String),
}

impl Repertoire {
    pub fn from_pgn(white_pgn: &str, black_pgn: &str) -> Result<Self, ChessError> {
        Ok(Self {
            white: index_from_pgn(white_pgn)?,
            black: index_from_pgn(black_pgn)?,
        })
    }

    pub fn index_for(&self, side: Side) -> &RepertoireIndex {
        match side {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }

    pub fn analyze_pgn(&self, pgn: &str, username: &str) -> GameOutcome {
        match parse_game(pgn) {
            Ok(game) => self.analyze_game(&game, username),
            Err(e) => GameOutcome::Failed(e.to_string()),
        }
    }

    /// Check `game` against the repertoire for the side `username` played.
    pub fn analyze_game(&self, game: &PlayedGame, username: &str) -> GameOutcome {
        let side = match game.user_side(username) {
            Ok(side) => side,
            Err(e) => return GameOutcome::Failed(e.to_string()),
        };
        match self.index_for(side).find_deviation_as(&game.start, &game.moves, side) {
            Ok(Some(record)) => GameOutcome::Deviation { side, record },
            Ok(None) => GameOutcome::InBook,
            Err(e) => GameOutcome::Failed(e.to_string()),
        }
    }
}

fn index_from_pgn(pgn: &str) -> Result<RepertoireIndex, ChessError> {
    let chapters = parse_chapters(pgn)?;
    RepertoireIndex::build(&chapters)
}

async fn build_index_blocking(pgn: String) -> Result<RepertoireIndex, AppError> {
    tokio::task::spawn_blocking(move || index_from_pgn(&pgn))
        .await
        .map_err(|e| AppError::Internal(format!("Index build task failed: {e}")))?
        .map_err(AppError::from)
}

pub struct AnalysisParams<'a> {
    pub username: &'a str,
    pub study_url_white: &'a str,
    pub study_url_black: &'a str,
    pub max_games: usize,
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct StoredDeviation {
    pub id: i64,
    pub game_id: String,
    pub opening_name: Option<String>,
    #[serde(flatten)]
    pub record: DeviationRecord,
}

#[derive(Debug, Default, Serialize)]
pub struct AnalysisSummary {
    pub games_analyzed: usize,
    pub in_book: usize,
    pub failed: usize,
    pub deviations: Vec<StoredDeviation>,
}

/// Fetch the user's recent games and both studies, then store the first
/// deviation of every game that left the repertoire.
pub async fn perform_game_analysis(
    pool: &PgPool,
    lichess: &LichessClient,
    params: &AnalysisParams<'_>,
) -> Result<AnalysisSummary, AppError> {
    let profile = users::find_by_lichess_username(pool, params.username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", params.username)))?;

    let white_id = study_id(params.study_url_white)?;
    let black_id = study_id(params.study_url_black)?;
    let study_ids = StudyIds {
        white: studies::register_study(pool, profile.id, &white_id, Side::White).await?,
        black: studies::register_study(pool, profile.id, &black_id, Side::Black).await?,
    };

    tracing::info!(username = params.username, max_games = params.max_games, "Starting analysis");

    let games = lichess
        .fetch_user_games(params.username, params.max_games, params.since.map(|t| t.timestamp_millis()))
        .await?;
    if games.is_empty() {
        tracing::info!(username = params.username, "No games to analyze");
        return Ok(AnalysisSummary::default());
    }

    let white_pgn = lichess.fetch_study_pgn(&white_id).await?;
    let black_pgn = lichess.fetch_study_pgn(&black_id).await?;
    let (white, black) = tokio::try_join!(
        build_index_blocking(white_pgn),
        build_index_blocking(black_pgn)
    )?;
    let repertoire = Repertoire { white, black };

    let mut summary = AnalysisSummary::default();
    for game in &games {
        summary.games_analyzed += 1;
        match repertoire.analyze_pgn(&game.pgn, params.username) {
            GameOutcome::Deviation { side, record } => {
                let source = DeviationSource {
                    user_id: profile.id,
                    study_id: Some(study_ids.for_side(side)),
                    game_id: &game.id,
                    pgn: &game.pgn,
                    opening_name: game.opening.as_deref(),
                };
                let id = deviations::upsert_deviation(pool, &source, &record).await?;
                summary.deviations.push(StoredDeviation {
                    id,
                    game_id: game.id.clone(),
                    opening_name: game.opening.clone(),
                    record,
                });
            }
            GameOutcome::InBook => summary.in_book += 1,
            GameOutcome::Failed(reason) => {
                tracing::warn!(game_id = %game.id, "Skipping game: {reason}");
                summary.failed += 1;
            }
        }
    }

    users::touch_last_synced(pool, profile.id).await?;

    tracing::info!(
        username = params.username,
        games = summary.games_analyzed,
        deviations = summary.deviations.len(),
        failed = summary.failed,
        "Analysis complete"
    );
    Ok(summary)
}

/// Stored study row of each repertoire.
struct StudyIds {
    white: i64,
    black: i64,
}

impl StudyIds {
    fn for_side(&self, side: Side) -> i64 {
        match side {
            Side::White => self.white,
            Side::Black => self.black,
        }
    }
}

fn study_id(url: &str) -> Result<String, AppError> {
    extract_study_id(url).ok_or_else(|| AppError::BadRequest(format!("Not a Lichess study URL: {url}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: &str = "[Event \"Italian\"]\n\n1. e4 e5 2. Nf3 Nc6 3. Bc4 *\n";
    const BLACK: &str = "[Event \"Sicilian\"]\n\n1. e4 c5 2. Nf3 d6 *\n";

    fn repertoire() -> Repertoire {
        Repertoire::from_pgn(WHITE, BLACK).unwrap()
    }

    #[test]
    fn test_picks_index_by_user_side() {
        let rep = repertoire();
        let game = "[White \"opp\"]\n[Black \"Me\"]\n\n1. e4 c5 2. Nf3 Nc6 *\n";
        match rep.analyze_pgn(game, "me") {
            GameOutcome::Deviation { side, record: d } => {
                assert_eq!(side, Side::Black);
                assert_eq!(d.deviation_san(), "Nc6");
                assert_eq!(d.reference_san(), "d6");
                assert_eq!(d.player_color(), Side::Black);
            }
            other => panic!("expected deviation, got {other:?}"),
        }
    }

    #[test]
    fn test_opponent_deviation_is_filed_under_the_users_repertoire() {
        let rep = repertoire();
        let study_ids = StudyIds { white: 11, black: 22 };

        // The user has White; Black leaves the Italian with 1...c5.
        let game = "[White \"me\"]\n[Black \"opp\"]\n\n1. e4 c5 *\n";
        match rep.analyze_pgn(game, "me") {
            GameOutcome::Deviation { side, record } => {
                assert_eq!(side, Side::White);
                assert_eq!(record.player_color(), Side::Black);
                assert_eq!(record.reference_san(), "e5");
                assert_eq!(study_ids.for_side(side), 11);
            }
            other => panic!("expected deviation, got {other:?}"),
        }

        // The user has Black; White leaves the Sicilian with 1. d4.
        let game = "[White \"opp\"]\n[Black \"me\"]\n\n1. d4 d5 *\n";
        match rep.analyze_pgn(game, "me") {
            GameOutcome::Deviation { side, record } => {
                assert_eq!(side, Side::Black);
                assert_eq!(record.player_color(), Side::White);
                assert_eq!(study_ids.for_side(side), 22);
            }
            other => panic!("expected deviation, got {other:?}"),
        }
    }

    #[test]
    fn test_game_in_book() {
        let rep = repertoire();
        let game = "[White \"me\"]\n[Black \"opp\"]\n\n1. e4 e5 2. Nf3 Nc6 3. Bc4 Bc5 *\n";
        assert!(matches!(rep.analyze_pgn(game, "me"), GameOutcome::InBook));
    }

    #[test]
    fn test_failures_are_reported() {
        let rep = repertoire();
        let stranger = "[White \"a\"]\n[Black \"b\"]\n\n1. e4 e5 *\n";
        assert!(matches!(rep.analyze_pgn(stranger, "me"), GameOutcome::Failed(_)));

        let illegal = "[White \"me\"]\n[Black \"b\"]\n\n1. e4 e5 2. Ke3 *\n";
        assert!(matches!(rep.analyze_pgn(illegal, "me"), GameOutcome::Failed(_)));
    }

    #[test]
    fn test_study_id_rejects_other_urls() {
        assert_eq!(study_id("https://lichess.org/study/abc123").unwrap(), "abc123");
        assert!(matches!(study_id("https://lichess.org/abc"), Err(AppError::BadRequest(_))));
    }
}
