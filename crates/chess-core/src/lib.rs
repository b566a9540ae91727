//! Opening repertoire indexing and deviation detection.
//!
//! Chapters are parsed into [`VariationTree`]s, merged into a
//! [`RepertoireIndex`], and played games are walked against that index to
//! find the first move that leaves preparation.

pub mod deviation;
pub mod error;
pub mod game_data;
pub mod notation;
pub mod pgn;
pub mod repertoire;
pub mod variation;

pub use deviation::{DeviationRecord, ExpectedMove};
pub use error::ChessError;
pub use game_data::{GameMetadata, PlayedGame};
pub use notation::{Deviator, PlyMove, Side};
pub use repertoire::{RepertoireIndex, TrieNode};
pub use variation::{Lines, NodeId, VariationTree};

/// FEN of the standard starting position.
pub const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
