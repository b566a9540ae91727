//! Repertoire index: all chapter lines of one color merged into a trie
//! keyed by UCI move.

use std::collections::HashMap;

use shakmaty::{fen::Fen, Chess, EnPassantMode};

use crate::error::ChessError;
use crate::notation::PlyMove;
use crate::variation::VariationTree;

/// One position in the repertoire, reached by the move stored in `san`.
#[derive(Debug, Default)]
pub struct TrieNode {
    ply: u32,
    san: Option<String>,
    children: HashMap<String, TrieNode>,
}

impl TrieNode {
    fn new(ply: u32, san: &str) -> Self {
        Self {
            ply,
            san: Some(san.to_string()),
            children: HashMap::new(),
        }
    }

    /// Depth from the repertoire root; 0 for the root itself.
    pub fn ply(&self) -> u32 {
        self.ply
    }

    /// SAN of the move leading into this node. `None` only at the root.
    pub fn san(&self) -> Option<&str> {
        self.san.as_deref()
    }

    pub fn child(&self, uci: &str) -> Option<&TrieNode> {
        self.children.get(uci)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &TrieNode)> {
        self.children.iter().map(|(uci, node)| (uci.as_str(), node))
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn count(&self) -> usize {
        1 + self.children.values().map(TrieNode::count).sum::<usize>()
    }
}

/// Every prepared line of one repertoire (White or Black).
///
/// Chapters set up from a `FEN` get a root of their own per start position,
/// so every node's children are moves from one and the same position.
/// Built once, then queried read-only; safe to share across threads.
#[derive(Debug, Default)]
pub struct RepertoireIndex {
    root: TrieNode,
    /// Roots of chapters that do not start from the initial position,
    /// keyed by [`start_key`].
    setup_roots: HashMap<String, TrieNode>,
    chapters: usize,
    lines: usize,
}

/// FEN without the move counters.
fn start_key(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal)
        .to_string()
        .split_whitespace()
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
}

impl RepertoireIndex {
    /// Merge the lines of every chapter. A chapter with an illegal move fails
    /// the build before any of its lines are merged.
    pub fn build<'a, I>(chapters: I) -> Result<Self, ChessError>
    where
        I: IntoIterator<Item = &'a VariationTree>,
    {
        let mut index = Self::default();
        let standard = start_key(&Chess::default());

        for (i, chapter) in chapters.into_iter().enumerate() {
            let label = chapter
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", i + 1));

            let lines = chapter
                .lines()
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ChessError::MalformedChapter {
                    chapter: label.clone(),
                    source: Box::new(e),
                })?;

            let key = start_key(chapter.start());
            let root = if key == standard {
                &mut index.root
            } else {
                tracing::debug!(chapter = %label, start = %key, "Chapter starts from a set-up position");
                index.setup_roots.entry(key).or_default()
            };

            tracing::debug!(chapter = %label, lines = lines.len(), "Indexing chapter");
            for line in &lines {
                Self::insert_line(root, line);
            }

            index.chapters += 1;
            index.lines += lines.len();
        }

        tracing::info!(
            chapters = index.chapters,
            lines = index.lines,
            nodes = index.node_count(),
            root_moves = index.root.child_count(),
            setup_roots = index.setup_roots.len(),
            "Repertoire index built"
        );

        Ok(index)
    }

    fn insert_line(root: &mut TrieNode, line: &[PlyMove]) {
        let mut current = root;

        for (depth, mv) in line.iter().enumerate() {
            let child = current
                .children
                .entry(mv.uci.clone())
                .or_insert_with(|| TrieNode::new(depth as u32 + 1, &mv.san));

            if child.san.as_deref() != Some(mv.san.as_str()) {
                tracing::debug!(
                    uci = %mv.uci,
                    kept = ?child.san,
                    seen = %mv.san,
                    "Conflicting SAN for the same move, keeping the first"
                );
            }

            current = child;
        }
    }

    /// Root for games from the standard initial position.
    pub fn root(&self) -> &TrieNode {
        &self.root
    }

    /// Root for games that start from `start`; `None` when no chapter was
    /// prepared from that position.
    pub fn root_for(&self, start: &Chess) -> Option<&TrieNode> {
        let key = start_key(start);
        if key == start_key(&Chess::default()) {
            Some(&self.root)
        } else {
            self.setup_roots.get(&key)
        }
    }

    /// Follow `ucis` from the standard root.
    pub fn node_at(&self, ucis: &[&str]) -> Option<&TrieNode> {
        ucis.iter().try_fold(&self.root, |node, uci| node.child(uci))
    }

    /// Number of trie nodes, roots included.
    pub fn node_count(&self) -> usize {
        self.root.count() + self.setup_roots.values().map(TrieNode::count).sum::<usize>()
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters
    }

    pub fn line_count(&self) -> usize {
        self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_leaf() && self.setup_roots.values().all(TrieNode::is_leaf)
    }
}
