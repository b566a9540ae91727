//! Single-ply move model shared by chapters, games and the index.

use serde::{Deserialize, Serialize};
use shakmaty::{san::San, CastlingMode, Chess, Color, Move, Position};
use std::fmt;

/// Color of the player making a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::White => "White",
            Side::Black => "Black",
        }
    }
}

impl From<Color> for Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which player left the repertoire first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deviator {
    User,
    Opponent,
}

impl Deviator {
    pub fn as_str(self) -> &'static str {
        match self {
            Deviator::User => "user",
            Deviator::Opponent => "opponent",
        }
    }
}

impl fmt::Display for Deviator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One half-move, in both exact (UCI) and display (SAN) notation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlyMove {
    pub uci: String,
    pub san: String,
    /// 1-based half-move count from the game start.
    pub ply: u32,
    pub move_number: u32,
    pub side: Side,
}

impl PlyMove {
    /// Describe `mv` as played from `pos`, then play it.
    /// `mv` must be legal in `pos`.
    pub fn play(pos: &mut Chess, mv: Move) -> Self {
        let side = Side::from(pos.turn());
        let move_number = pos.fullmoves().get();
        let ply = ply_of(pos);
        let uci = mv.to_uci(CastlingMode::Standard).to_string();
        let mut san = San::from_move(&*pos, mv.clone()).to_string();

        pos.play_unchecked(mv);
        if pos.is_checkmate() {
            san.push('#');
        } else if pos.is_check() {
            san.push('+');
        }

        Self {
            uci,
            san,
            ply,
            move_number,
            side,
        }
    }
}

/// Ply number of the next move to be played from `pos`.
pub fn ply_of(pos: &Chess) -> u32 {
    let fullmoves = pos.fullmoves().get();
    let black_to_move = u32::from(pos.turn() == Color::Black);
    (fullmoves - 1) * 2 + black_to_move + 1
}

/// Resolve a SAN token against `pos` into a legal move.
pub fn resolve_san(pos: &Chess, san: &San) -> Option<Move> {
    san.to_move(pos).ok()
}
