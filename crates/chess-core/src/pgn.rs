//! PGN reading: study chapters into variation trees, games into mainlines.

use std::ops::ControlFlow;

use pgn_reader::{RawTag, Reader, SanPlus, Skip, Visitor};
use regex::Regex;
use shakmaty::{fen::Fen, CastlingMode, Chess};

use crate::error::ChessError;
use crate::game_data::{GameMetadata, PlayedGame};
use crate::notation::{ply_of, resolve_san, PlyMove};
use crate::variation::{NodeId, VariationTree};

fn start_position(fen: Option<&str>) -> Result<Chess, ChessError> {
    let Some(fen) = fen else {
        return Ok(Chess::default());
    };
    let invalid = || ChessError::InvalidFen {
        fen: fen.to_string(),
    };
    fen.parse::<Fen>()
        .map_err(|_| invalid())?
        .into_position::<Chess>(CastlingMode::Standard)
        .map_err(|_| invalid())
}

// ---------------------------------------------------------------------------
// Chapters
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ChapterTags {
    chapter_name: Option<String>,
    event: Option<String>,
    fen: Option<String>,
}

struct ChapterState {
    tree: VariationTree,
    cursor: NodeId,
    /// Cursor to restore when the current variation closes.
    stack: Vec<NodeId>,
}

struct ChapterVisitor;

impl Visitor for ChapterVisitor {
    type Tags = ChapterTags;
    type Movetext = ChapterState;
    type Output = Result<VariationTree, ChessError>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, ChapterTags> {
        ControlFlow::Continue(ChapterTags::default())
    }

    fn tag(
        &mut self,
        tags: &mut ChapterTags,
        name: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        let value = value.decode_utf8_lossy().to_string();
        match name {
            b"ChapterName" => tags.chapter_name = Some(value),
            b"Event" => tags.event = Some(value),
            b"FEN" => tags.fen = Some(value),
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: ChapterTags) -> ControlFlow<Self::Output, ChapterState> {
        let start = match start_position(tags.fen.as_deref()) {
            Ok(pos) => pos,
            Err(e) => return ControlFlow::Break(Err(e)),
        };

        let mut tree = VariationTree::new(start);
        if let Some(name) = tags.chapter_name.or(tags.event) {
            tree = tree.with_name(name);
        }

        ControlFlow::Continue(ChapterState {
            tree,
            cursor: VariationTree::ROOT,
            stack: Vec::new(),
        })
    }

    fn san(&mut self, state: &mut ChapterState, san_plus: SanPlus) -> ControlFlow<Self::Output> {
        state.cursor = state.tree.add_move(state.cursor, san_plus.san);
        ControlFlow::Continue(())
    }

    fn begin_variation(&mut self, state: &mut ChapterState) -> ControlFlow<Self::Output, Skip> {
        // A variation replaces the last move, so it hangs off that move's parent.
        state.stack.push(state.cursor);
        state.cursor = state
            .tree
            .parent(state.cursor)
            .unwrap_or(VariationTree::ROOT);
        ControlFlow::Continue(Skip(false))
    }

    fn end_variation(&mut self, state: &mut ChapterState) -> ControlFlow<Self::Output> {
        if let Some(cursor) = state.stack.pop() {
            state.cursor = cursor;
        }
        ControlFlow::Continue(())
    }

    fn end_game(&mut self, state: ChapterState) -> Self::Output {
        Ok(state.tree)
    }
}

/// Parse every chapter of a study export.
pub fn parse_chapters(pgn: &str) -> Result<Vec<VariationTree>, ChessError> {
    let mut reader = Reader::new(pgn.as_bytes());
    let mut chapters = Vec::new();

    while let Some(chapter) = reader
        .read_game(&mut ChapterVisitor)
        .map_err(|e| ChessError::Pgn(e.to_string()))?
    {
        chapters.push(chapter?);
    }

    Ok(chapters)
}

// ---------------------------------------------------------------------------
// Games
// ---------------------------------------------------------------------------

struct GameState {
    metadata: GameMetadata,
    start: Chess,
    pos: Chess,
    moves: Vec<PlyMove>,
}

struct GameVisitor;

impl Visitor for GameVisitor {
    type Tags = GameMetadata;
    type Movetext = GameState;
    type Output = Result<PlayedGame, ChessError>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, GameMetadata> {
        ControlFlow::Continue(GameMetadata {
            white: "Unknown".to_string(),
            black: "Unknown".to_string(),
            result: "*".to_string(),
            ..Default::default()
        })
    }

    fn tag(
        &mut self,
        tags: &mut GameMetadata,
        name: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        let value = value.decode_utf8_lossy().to_string();
        match name {
            b"White" => tags.white = value,
            b"Black" => tags.black = value,
            b"Result" => tags.result = value,
            b"Date" => tags.date = Some(value),
            b"UTCDate" => tags.utc_date = Some(value),
            b"Site" => tags.site = Some(value),
            b"Opening" => tags.opening = Some(value),
            b"ECO" => tags.eco = Some(value),
            b"TimeControl" => tags.time_control = Some(value),
            b"Event" => tags.event = Some(value),
            b"FEN" => tags.fen = Some(value),
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, metadata: GameMetadata) -> ControlFlow<Self::Output, GameState> {
        let start = match start_position(metadata.fen.as_deref()) {
            Ok(pos) => pos,
            Err(e) => return ControlFlow::Break(Err(ChessError::MalformedGame(e.to_string()))),
        };

        ControlFlow::Continue(GameState {
            metadata,
            pos: start.clone(),
            start,
            moves: Vec::new(),
        })
    }

    fn san(&mut self, state: &mut GameState, san_plus: SanPlus) -> ControlFlow<Self::Output> {
        match resolve_san(&state.pos, &san_plus.san) {
            Some(mv) => {
                state.moves.push(PlyMove::play(&mut state.pos, mv));
                ControlFlow::Continue(())
            }
            None => ControlFlow::Break(Err(ChessError::MalformedGame(format!(
                "illegal move {} at ply {}",
                san_plus,
                ply_of(&state.pos)
            )))),
        }
    }

    fn begin_variation(&mut self, _state: &mut GameState) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn end_game(&mut self, state: GameState) -> Self::Output {
        Ok(PlayedGame {
            metadata: state.metadata,
            start: state.start,
            moves: state.moves,
        })
    }
}

/// Parse the first game in `pgn`, mainline only.
pub fn parse_game(pgn: &str) -> Result<PlayedGame, ChessError> {
    let mut reader = Reader::new(pgn.as_bytes());
    reader
        .read_game(&mut GameVisitor)
        .map_err(|e| ChessError::Pgn(e.to_string()))?
        .unwrap_or_else(|| Err(ChessError::MalformedGame("no game found".to_string())))
}

/// Parse every game in `pgn`. A broken game does not stop the others.
pub fn parse_games(pgn: &str) -> Vec<Result<PlayedGame, ChessError>> {
    let mut reader = Reader::new(pgn.as_bytes());
    let mut games = Vec::new();

    loop {
        match reader.read_game(&mut GameVisitor) {
            Ok(Some(game)) => games.push(game),
            Ok(None) => break,
            Err(e) => {
                games.push(Err(ChessError::Pgn(e.to_string())));
                break;
            }
        }
    }

    games
}

// ---------------------------------------------------------------------------
// Header helpers
// ---------------------------------------------------------------------------

/// Extract a string value from a PGN header (e.g. UTCDate, Site).
pub fn extract_header(pgn: &str, header_name: &str) -> Option<String> {
    let pattern = format!(r#"\[{}\s+"([^"]*)"\]"#, regex::escape(header_name));
    let re = Regex::new(&pattern).ok()?;
    let value = re.captures(pgn)?.get(1)?.as_str().to_string();
    if value.is_empty() { None } else { Some(value) }
}

/// Lichess game id from a `Site` header value or game URL.
pub fn lichess_game_id(site: &str) -> Option<String> {
    let re = Regex::new(r"lichess\.org/([a-zA-Z0-9]{8})").ok()?;
    Some(re.captures(site)?.get(1)?.as_str().to_string())
}
