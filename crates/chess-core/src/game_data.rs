use serde::{Deserialize, Serialize};
use shakmaty::Chess;

use crate::error::ChessError;
use crate::notation::{PlyMove, Side};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameMetadata {
    pub white: String,
    pub black: String,
    pub result: String, // "1-0", "0-1", "1/2-1/2", "*"
    pub date: Option<String>,
    pub utc_date: Option<String>,
    pub site: Option<String>,
    pub opening: Option<String>,
    pub eco: Option<String>,
    pub time_control: Option<String>,
    pub event: Option<String>,
    pub fen: Option<String>,
}

/// A game reduced to its mainline, every move already checked for legality.
#[derive(Debug, Clone)]
pub struct PlayedGame {
    pub metadata: GameMetadata,
    pub start: Chess,
    pub moves: Vec<PlyMove>,
}

impl PlayedGame {
    /// Which side `user_name` played, by the White/Black tags.
    pub fn user_side(&self, user_name: &str) -> Result<Side, ChessError> {
        let wanted = user_name.trim();
        if wanted.eq_ignore_ascii_case(self.metadata.white.trim()) {
            Ok(Side::White)
        } else if wanted.eq_ignore_ascii_case(self.metadata.black.trim()) {
            Ok(Side::Black)
        } else {
            Err(ChessError::UnknownPlayer(user_name.to_string()))
        }
    }
}
