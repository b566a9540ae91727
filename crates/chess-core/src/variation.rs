//! Branching move trees (study chapters) and the walk that flattens them
//! into root-to-leaf lines.

use shakmaty::{san::San, Chess};

use crate::error::ChessError;
use crate::notation::{ply_of, resolve_san, PlyMove};

pub type NodeId = usize;

#[derive(Debug, Clone)]
struct VariationNode {
    san: Option<San>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A chapter as parsed from movetext. Node moves are syntactic SAN; they are
/// checked for legality only when the tree is flattened.
#[derive(Debug, Clone)]
pub struct VariationTree {
    name: Option<String>,
    start: Chess,
    nodes: Vec<VariationNode>,
}

impl VariationTree {
    pub const ROOT: NodeId = 0;

    pub fn new(start: Chess) -> Self {
        Self {
            name: None,
            start,
            nodes: vec![VariationNode {
                san: None,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Build a branch-free chapter from the standard start.
    pub fn from_line(sans: &[&str]) -> Result<Self, ChessError> {
        let mut tree = Self::new(Chess::default());
        let mut cursor = Self::ROOT;
        for (i, s) in sans.iter().enumerate() {
            let san: San = s.parse().map_err(|_| ChessError::IllegalMove {
                san: s.to_string(),
                ply: i as u32 + 1,
            })?;
            cursor = tree.add_move(cursor, san);
        }
        Ok(tree)
    }

    /// Append `san` as the last alternative after `parent`.
    pub fn add_move(&mut self, parent: NodeId, san: San) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(VariationNode {
            san: Some(san),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn start(&self) -> &Chess {
        &self.start
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn san(&self, id: NodeId) -> Option<&San> {
        self.nodes.get(id).and_then(|n| n.san.as_ref())
    }

    /// Number of moves in the tree (the root carries none).
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[Self::ROOT].children.is_empty()
    }

    /// Every root-to-leaf line, depth first, siblings in source order.
    pub fn lines(&self) -> Lines<'_> {
        Lines {
            tree: self,
            stack: vec![Frame {
                node: Self::ROOT,
                pos: self.start.clone(),
                path: Vec::new(),
            }],
        }
    }
}

struct Frame {
    node: NodeId,
    pos: Chess,
    path: Vec<PlyMove>,
}

/// Iterator returned by [`VariationTree::lines`].
///
/// Yields one `Ok(line)` per leaf. A move that is illegal in the position
/// reached by its ancestors yields a single `Err` and ends the walk.
pub struct Lines<'a> {
    tree: &'a VariationTree,
    stack: Vec<Frame>,
}

impl Iterator for Lines<'_> {
    type Item = Result<Vec<PlyMove>, ChessError>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(frame) = self.stack.pop() {
            let children = self.tree.children(frame.node);
            if children.is_empty() {
                if frame.node == VariationTree::ROOT {
                    continue;
                }
                return Some(Ok(frame.path));
            }

            // Reverse so the first variation is popped first.
            for &child in children.iter().rev() {
                let Some(san) = self.tree.san(child) else {
                    continue;
                };
                let Some(mv) = resolve_san(&frame.pos, san) else {
                    self.stack.clear();
                    return Some(Err(ChessError::IllegalMove {
                        san: san.to_string(),
                        ply: ply_of(&frame.pos),
                    }));
                };

                let mut pos = frame.pos.clone();
                let mut path = frame.path.clone();
                path.push(PlyMove::play(&mut pos, mv));
                self.stack.push(Frame {
                    node: child,
                    pos,
                    path,
                });
            }
        }
        None
    }
}
