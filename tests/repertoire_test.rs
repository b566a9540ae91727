//! End-to-end deviation detection: study PGN in, game PGN in, record out.

use chess_core::pgn::{parse_chapters, parse_game};
use chess_core::{Deviator, RepertoireIndex, Side, VariationTree, STANDARD_START_FEN};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn index_from(study: &str) -> RepertoireIndex {
    let chapters = parse_chapters(study).expect("study should parse");
    RepertoireIndex::build(&chapters).expect("study should index")
}

fn game(white: &str, black: &str, moves: &str) -> String {
    format!("[Event \"Rated blitz game\"]\n[White \"{white}\"]\n[Black \"{black}\"]\n[Result \"*\"]\n\n{moves} *\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_continuing_past_the_book_is_not_a_deviation() {
    let index = index_from("[Event \"Open game\"]\n\n1. e4 e5 2. Nf3 *\n");
    let played = parse_game(&game("me", "them", "1. e4 e5 2. Nf3 Nc6 3. d4")).unwrap();
    assert_eq!(index.find_deviation(&played, "me").unwrap(), None);
}

#[test]
fn test_opponent_leaves_the_repertoire() {
    let index = index_from("[Event \"Open game\"]\n\n1. e4 e5 *\n");
    let played = parse_game(&game("me", "them", "1. e4 c5")).unwrap();
    let dev = index.find_deviation(&played, "me").unwrap().expect("deviation");

    assert_eq!(dev.ply(), 2);
    assert_eq!(dev.move_number(), 1);
    assert_eq!(dev.deviation_san(), "c5");
    assert_eq!(dev.reference_san(), "e5");
    assert_eq!(dev.player_color(), Side::Black);
    assert_eq!(dev.first_deviator(), Deviator::Opponent);
    assert_eq!(dev.previous_position_fen(), Some(STANDARD_START_FEN));
}

#[test]
fn test_sideline_alternatives_are_listed_together() {
    let index = index_from("[Event \"Open game\"]\n\n1. e4 e5 2. Nf3 Nc6 (2... d6) *\n");
    let played = parse_game(&game("me", "them", "1. e4 e5 2. Nf3 Nf6")).unwrap();
    let dev = index.find_deviation(&played, "me").unwrap().expect("deviation");

    assert_eq!(dev.ply(), 4);
    assert_eq!(dev.move_number(), 2);
    assert_eq!(dev.deviation_san(), "Nf6");
    assert_eq!(dev.reference_san(), "Nc6 or d6");
    assert_eq!(dev.player_color(), Side::Black);
    assert_eq!(dev.first_deviator(), Deviator::Opponent);
    assert_eq!(
        dev.board_fen(),
        "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2"
    );
    assert_eq!(
        dev.previous_position_fen(),
        Some("rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2")
    );
}

#[test]
fn test_same_game_from_the_other_chair() {
    let index = index_from("[Event \"Open game\"]\n\n1. e4 e5 2. Nf3 Nc6 (2... d6) *\n");
    let played = parse_game(&game("them", "me", "1. e4 e5 2. Nf3 Nf6")).unwrap();
    let dev = index.find_deviation(&played, "ME").unwrap().expect("deviation");
    assert_eq!(dev.first_deviator(), Deviator::User);
}

#[test]
fn test_empty_repertoire_never_reports() {
    let index = RepertoireIndex::build(&Vec::<VariationTree>::new()).unwrap();
    let played = parse_game(&game("me", "them", "1. d4 d5 2. c4 e6")).unwrap();
    assert_eq!(index.find_deviation(&played, "me").unwrap(), None);
}

#[test]
fn test_chapters_share_their_common_prefix() {
    let study = concat!(
        "[Event \"Italian\"]\n\n1. e4 e5 2. Nf3 Nc6 3. Bc4 *\n\n",
        "[Event \"Petrov\"]\n\n1. e4 e5 2. Nf3 Nf6 3. Nxe5 *\n\n",
        "[Event \"Sicilian\"]\n\n1. e4 c5 2. Nf3 *\n",
    );
    let index = index_from(study);

    assert_eq!(index.chapter_count(), 3);
    assert_eq!(index.root().child_count(), 1);
    assert_eq!(index.node_at(&["e2e4"]).unwrap().child_count(), 2);
    assert_eq!(index.node_at(&["e2e4", "e7e5", "g1f3"]).unwrap().child_count(), 2);

    // Inside the Petrov chapter: stays in book.
    let played = parse_game(&game("me", "them", "1. e4 e5 2. Nf3 Nf6 3. Nxe5 d6")).unwrap();
    assert_eq!(index.find_deviation(&played, "me").unwrap(), None);

    // The user's own 3rd move departs from the Petrov line.
    let played = parse_game(&game("me", "them", "1. e4 e5 2. Nf3 Nf6 3. d4")).unwrap();
    let dev = index.find_deviation(&played, "me").unwrap().expect("deviation");
    assert_eq!(dev.first_deviator(), Deviator::User);
    assert_eq!(dev.reference_san(), "Nxe5");
    assert_eq!(dev.deviation_uci(), "d2d4");
}

#[test]
fn test_game_from_a_custom_position() {
    let fen = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3";
    let study = format!("[Event \"Italian\"]\n[FEN \"{fen}\"]\n[SetUp \"1\"]\n\n3. Bc4 Bc5 *\n");
    let index = index_from(&study);

    let pgn = format!(
        "[White \"me\"]\n[Black \"them\"]\n[FEN \"{fen}\"]\n[SetUp \"1\"]\n\n3. Bc4 Nf6 *\n"
    );
    let played = parse_game(&pgn).unwrap();
    let dev = index.find_deviation(&played, "me").unwrap().expect("deviation");
    assert_eq!(dev.move_number(), 3);
    assert_eq!(dev.first_deviator(), Deviator::Opponent);
    assert_eq!(dev.reference_san(), "Bc5");
}

#[test]
fn test_set_up_chapter_is_ignored_by_standard_games() {
    let fen = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3";
    let study = format!(
        "[Event \"Queen's pawn\"]\n\n1. d4 d5 *\n\n[Event \"Italian\"]\n[FEN \"{fen}\"]\n[SetUp \"1\"]\n\n3. Bc4 Bc5 *\n"
    );
    let index = index_from(&study);
    assert_eq!(index.root().child_count(), 1);

    let played = parse_game(&game("me", "them", "1. e4 e5")).unwrap();
    let dev = index.find_deviation(&played, "me").unwrap().expect("deviation");
    assert_eq!(dev.deviation_san(), "e4");
    assert_eq!(dev.reference_san(), "d4");

    let italian_only = index_from(&format!("[Event \"Italian\"]\n[FEN \"{fen}\"]\n[SetUp \"1\"]\n\n3. Bc4 Bc5 *\n"));
    let played = parse_game(&game("me", "them", "1. e4 e5")).unwrap();
    assert_eq!(italian_only.find_deviation(&played, "me").unwrap(), None);
}

#[test]
fn test_unknown_player_is_an_error() {
    let index = index_from("[Event \"Open game\"]\n\n1. e4 e5 *\n");
    let played = parse_game(&game("alice", "bob", "1. e4 c5")).unwrap();
    assert!(index.find_deviation(&played, "carol").is_err());
}
