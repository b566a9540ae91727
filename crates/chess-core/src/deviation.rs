//! First-departure detection: walk a played game against a repertoire index.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use shakmaty::{fen::Fen, uci::UciMove, Chess, EnPassantMode, Move, Position};

use crate::error::ChessError;
use crate::game_data::PlayedGame;
use crate::notation::{Deviator, PlyMove, Side};
use crate::repertoire::{RepertoireIndex, TrieNode};

/// One prepared continuation the player could have chosen instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedMove {
    pub uci: String,
    pub san: String,
}

/// Where and how a game left the repertoire.
///
/// Only the detector creates these, and only at a position that had at
/// least one prepared continuation, so `expected` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviationRecord {
    first_deviator: Deviator,
    move_number: u32,
    ply: u32,
    deviation_uci: String,
    deviation_san: String,
    expected: Vec<ExpectedMove>,
    player_color: Side,
    board_fen: String,
    previous_position_fen: Option<String>,
}

impl DeviationRecord {
    pub fn first_deviator(&self) -> Deviator {
        self.first_deviator
    }

    pub fn move_number(&self) -> u32 {
        self.move_number
    }

    /// 1-based half-move index of the deviating move.
    pub fn ply(&self) -> u32 {
        self.ply
    }

    pub fn deviation_uci(&self) -> &str {
        &self.deviation_uci
    }

    pub fn deviation_san(&self) -> &str {
        &self.deviation_san
    }

    /// Prepared moves, sorted by SAN.
    pub fn expected(&self) -> &[ExpectedMove] {
        &self.expected
    }

    /// Prepared moves in SAN, e.g. `"Nc6 or d6"`.
    pub fn reference_san(&self) -> String {
        self.expected
            .iter()
            .map(|m| m.san.as_str())
            .collect::<Vec<_>>()
            .join(" or ")
    }

    /// Prepared moves in UCI, in the same order as [`Self::reference_san`].
    pub fn reference_uci(&self) -> String {
        self.expected
            .iter()
            .map(|m| m.uci.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn player_color(&self) -> Side {
        self.player_color
    }

    /// Position just before the deviating move.
    pub fn board_fen(&self) -> &str {
        &self.board_fen
    }

    /// Position one ply before `board_fen`; `None` when the deviation is the
    /// first move of the game.
    pub fn previous_position_fen(&self) -> Option<&str> {
        self.previous_position_fen.as_deref()
    }
}

impl Serialize for DeviationRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("DeviationRecord", 10)?;
        s.serialize_field("first_deviator", &self.first_deviator)?;
        s.serialize_field("move_number", &self.move_number)?;
        s.serialize_field("ply", &self.ply)?;
        s.serialize_field("deviation_san", &self.deviation_san)?;
        s.serialize_field("deviation_uci", &self.deviation_uci)?;
        s.serialize_field("reference_san", &self.reference_san())?;
        s.serialize_field("reference_uci", &self.reference_uci())?;
        s.serialize_field("player_color", &self.player_color)?;
        s.serialize_field("board_fen", &self.board_fen)?;
        s.serialize_field("previous_position_fen", &self.previous_position_fen)?;
        s.end()
    }
}

impl RepertoireIndex {
    /// Find where `game` first leaves this repertoire, attributing the
    /// departure relative to `user_name`.
    ///
    /// `Ok(None)` covers both a game that stayed in book and one that ran
    /// past the end of preparation.
    pub fn find_deviation(
        &self,
        game: &PlayedGame,
        user_name: &str,
    ) -> Result<Option<DeviationRecord>, ChessError> {
        let user_side = game.user_side(user_name)?;
        self.find_deviation_as(&game.start, &game.moves, user_side)
    }

    /// Walk `moves` from `start` in lock-step with the trie. A start
    /// position no chapter was prepared from is treated as end of book.
    pub fn find_deviation_as(
        &self,
        start: &Chess,
        moves: &[PlyMove],
        user_side: Side,
    ) -> Result<Option<DeviationRecord>, ChessError> {
        let Some(mut node) = self.root_for(start) else {
            return Ok(None);
        };
        let mut pos = start.clone();
        let mut previous_fen: Option<String> = None;

        for played in moves {
            let mover = Side::from(pos.turn());
            let move_number = pos.fullmoves().get();
            let mv = replay(&pos, played)?;

            if let Some(child) = node.child(&played.uci) {
                previous_fen = Some(fen_of(&pos));
                pos.play_unchecked(mv);
                node = child;
                continue;
            }

            // Nothing prepared here: end of book, not a deviation.
            if node.is_leaf() {
                return Ok(None);
            }

            let first_deviator = if mover == user_side {
                Deviator::User
            } else {
                Deviator::Opponent
            };

            return Ok(Some(DeviationRecord {
                first_deviator,
                move_number,
                ply: played.ply,
                deviation_uci: played.uci.clone(),
                deviation_san: played.san.clone(),
                expected: expected_moves(node),
                player_color: mover,
                board_fen: fen_of(&pos),
                previous_position_fen: previous_fen,
            }));
        }

        Ok(None)
    }
}

fn expected_moves(node: &TrieNode) -> Vec<ExpectedMove> {
    let mut expected: Vec<ExpectedMove> = node
        .children()
        .map(|(uci, child)| ExpectedMove {
            uci: uci.to_string(),
            san: child.san().unwrap_or(uci).to_string(),
        })
        .collect();
    expected.sort_by(|a, b| a.san.cmp(&b.san).then_with(|| a.uci.cmp(&b.uci)));
    expected
}

fn replay(pos: &Chess, played: &PlyMove) -> Result<Move, ChessError> {
    played
        .uci
        .parse::<UciMove>()
        .ok()
        .and_then(|uci| uci.to_move(pos).ok())
        .ok_or_else(|| {
            ChessError::MalformedGame(format!(
                "move {} ({}) is not legal at ply {}",
                played.san, played.uci, played.ply
            ))
        })
}

fn fen_of(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variation::VariationTree;
    use crate::STANDARD_START_FEN;

    fn index(lines: &[&[&str]]) -> RepertoireIndex {
        let chapters: Vec<VariationTree> = lines
            .iter()
            .map(|l| VariationTree::from_line(l).unwrap())
            .collect();
        RepertoireIndex::build(&chapters).unwrap()
    }

    fn moves(sans: &[&str]) -> Vec<PlyMove> {
        let mut pos = Chess::default();
        sans.iter()
            .map(|s| {
                let san: shakmaty::san::San = s.parse().unwrap();
                let mv = san.to_move(&pos).unwrap();
                PlyMove::play(&mut pos, mv)
            })
            .collect()
    }

    fn detect(index: &RepertoireIndex, sans: &[&str], user: Side) -> Option<DeviationRecord> {
        index
            .find_deviation_as(&Chess::default(), &moves(sans), user)
            .unwrap()
    }

    #[test]
    fn test_end_of_book_is_not_a_deviation() {
        let idx = index(&[&["e4", "e5", "Nf3"]]);
        assert!(detect(&idx, &["e4", "e5", "Nf3", "Nc6", "d4"], Side::White).is_none());
    }

    #[test]
    fn test_game_ending_inside_book() {
        let idx = index(&[&["e4", "e5", "Nf3", "Nc6"]]);
        assert!(detect(&idx, &["e4", "e5"], Side::White).is_none());
        assert!(detect(&idx, &["e4", "e5", "Nf3", "Nc6"], Side::White).is_none());
        assert!(detect(&idx, &[], Side::White).is_none());
    }

    #[test]
    fn test_opponent_deviation() {
        let idx = index(&[&["e4", "e5"]]);
        let dev = detect(&idx, &["e4", "c5"], Side::White).unwrap();

        assert_eq!(dev.ply(), 2);
        assert_eq!(dev.move_number(), 1);
        assert_eq!(dev.deviation_san(), "c5");
        assert_eq!(dev.deviation_uci(), "c7c5");
        assert_eq!(dev.reference_san(), "e5");
        assert_eq!(dev.reference_uci(), "e7e5");
        assert_eq!(dev.player_color(), Side::Black);
        assert_eq!(dev.first_deviator(), Deviator::Opponent);
        assert_eq!(
            dev.board_fen(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
        );
        assert_eq!(dev.previous_position_fen(), Some(STANDARD_START_FEN));
    }

    #[test]
    fn test_same_deviation_attributed_to_user_when_playing_black() {
        let idx = index(&[&["e4", "e5"]]);
        let dev = detect(&idx, &["e4", "c5"], Side::Black).unwrap();
        assert_eq!(dev.first_deviator(), Deviator::User);
    }

    #[test]
    fn test_first_move_deviation_has_no_previous_position() {
        let idx = index(&[&["e4"]]);
        let dev = detect(&idx, &["d4"], Side::White).unwrap();
        assert_eq!(dev.first_deviator(), Deviator::User);
        assert_eq!(dev.board_fen(), STANDARD_START_FEN);
        assert_eq!(dev.previous_position_fen(), None);
    }

    #[test]
    fn test_multiple_expected_moves_sorted_by_san() {
        let idx = index(&[
            &["e4", "e5", "Nf3", "Nc6"],
            &["e4", "e5", "Nf3", "d6"],
            &["e4", "e5", "Nf3", "Bc5"],
        ]);
        let dev = detect(&idx, &["e4", "e5", "Nf3", "Nf6"], Side::White).unwrap();
        assert_eq!(dev.ply(), 4);
        assert_eq!(dev.move_number(), 2);
        assert_eq!(dev.reference_san(), "Bc5 or Nc6 or d6");
        assert_eq!(dev.reference_uci(), "f8c5, b8c6, d7d6");
        assert_eq!(dev.expected().len(), 3);
    }

    #[test]
    fn test_empty_index_never_deviates() {
        let idx = index(&[]);
        assert!(detect(&idx, &["e4", "e5"], Side::White).is_none());
        assert!(detect(&idx, &["d4"], Side::Black).is_none());
    }

    #[test]
    fn test_set_up_chapter_does_not_leak_into_standard_games() {
        let fen = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3";
        let start: Chess = fen
            .parse::<Fen>()
            .unwrap()
            .into_position(shakmaty::CastlingMode::Standard)
            .unwrap();
        let mut italian = VariationTree::new(start.clone());
        let bc4 = italian.add_move(VariationTree::ROOT, "Bc4".parse().unwrap());
        italian.add_move(bc4, "Bc5".parse().unwrap());

        let queens = VariationTree::from_line(&["d4", "d5"]).unwrap();
        let mixed = RepertoireIndex::build([&queens, &italian]).unwrap();
        let dev = detect(&mixed, &["e4", "e5"], Side::White).unwrap();
        assert_eq!(dev.deviation_san(), "e4");
        assert_eq!(dev.reference_san(), "d4");

        let only_italian = RepertoireIndex::build([&italian]).unwrap();
        assert!(detect(&only_italian, &["e4"], Side::White).is_none());

        // Games from the set-up position still use that chapter.
        let mut pos = start.clone();
        let played: Vec<PlyMove> = ["Bc4", "Nf6"]
            .iter()
            .map(|s| {
                let san: shakmaty::san::San = s.parse().unwrap();
                let mv = san.to_move(&pos).unwrap();
                PlyMove::play(&mut pos, mv)
            })
            .collect();
        let dev = only_italian
            .find_deviation_as(&start, &played, Side::White)
            .unwrap()
            .unwrap();
        assert_eq!(dev.reference_san(), "Bc5");
        assert_eq!(dev.first_deviator(), Deviator::Opponent);
    }

    #[test]
    fn test_unreplayable_move_is_an_error() {
        let idx = index(&[&["e4", "e5"]]);
        let mut bogus = moves(&["e4", "e5"]);
        bogus[1].uci = "e7e4".into();
        let err = idx
            .find_deviation_as(&Chess::default(), &bogus, Side::White)
            .unwrap_err();
        assert!(matches!(err, ChessError::MalformedGame(_)));
    }

    #[test]
    fn test_serialized_shape() {
        let idx = index(&[&["e4", "e5"]]);
        let dev = detect(&idx, &["e4", "c5"], Side::White).unwrap();
        let json = serde_json::to_value(&dev).unwrap();
        assert_eq!(json["first_deviator"], "opponent");
        assert_eq!(json["reference_san"], "e5");
        assert_eq!(json["player_color"], "Black");
        assert_eq!(json["previous_position_fen"], STANDARD_START_FEN);
    }
}
