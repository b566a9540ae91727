use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChessError {
    #[error("illegal move {san} at ply {ply}")]
    IllegalMove { san: String, ply: u32 },

    #[error("invalid FEN: {fen}")]
    InvalidFen { fen: String },

    #[error("PGN read error: {0}")]
    Pgn(String),

    #[error("chapter {chapter:?} is malformed: {source}")]
    MalformedChapter {
        chapter: String,
        #[source]
        source: Box<ChessError>,
    },

    #[error("malformed game: {0}")]
    MalformedGame(String),

    #[error("player {0:?} did not play in this game")]
    UnknownPlayer(String),
}
