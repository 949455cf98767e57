//! Node heights and child structure, as seen by the operators.
//!
//! Operators never walk a whole tree. They ask a [`BranchTopologyView`] for one
//! node's height, its children and parent, and the rate slot owned by each
//! branch. [`Tree`] is an arena-backed implementation: nodes live in a flat
//! `Vec<Node>` and are referenced by [`NodeId`].

use crate::error::{OperatorError, Result};

/// Index into the tree's node arena. Doubles as the node's number in the
/// rate-slot addressing scheme.
pub type NodeId = usize;

/// The slice of tree structure operators need.
pub trait BranchTopologyView {
    fn node_count(&self) -> usize;

    fn root(&self) -> NodeId;

    fn height(&self, node: NodeId) -> f64;

    fn set_height(&mut self, node: NodeId, height: f64);

    fn children(&self, node: NodeId) -> &[NodeId];

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Number of branches, one per non-root node.
    fn branch_count(&self) -> usize {
        self.node_count() - 1
    }

    /// Index into the rates parameter for the branch above `node`.
    ///
    /// The rates vector has one slot per branch, so node number
    /// `branch_count()` has no slot of its own. When that number belongs to a
    /// non-root node it borrows the slot of the current root's number, which
    /// the root never uses.
    fn rate_slot(&self, node: NodeId) -> usize {
        if node == self.branch_count() {
            self.root()
        } else {
            node
        }
    }
}

/// A single node in the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub height: f64,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// A rooted tree with node heights, stored as an arena of nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
    stored_heights: Vec<f64>,
}

impl Tree {
    /// Builds a tree from parent pointers and heights.
    ///
    /// `parents[i]` is the parent of node `i` (`None` for exactly one root).
    /// Every parent must be strictly higher than each of its children.
    pub fn from_parents(parents: &[Option<NodeId>], heights: &[f64]) -> Result<Self> {
        if parents.is_empty() || parents.len() != heights.len() {
            return Err(OperatorError::MalformedTree(format!(
                "{} parent entries for {} heights",
                parents.len(),
                heights.len()
            )));
        }

        let mut nodes: Vec<Node> = heights
            .iter()
            .enumerate()
            .map(|(id, &height)| Node {
                id,
                height,
                parent: None,
                children: Vec::new(),
            })
            .collect();

        let mut root = None;
        for (id, parent) in parents.iter().enumerate() {
            match *parent {
                None if root.is_none() => root = Some(id),
                None => {
                    return Err(OperatorError::MalformedTree(format!(
                        "nodes {} and {id} are both roots",
                        root.unwrap_or_default()
                    )))
                }
                Some(p) if p >= nodes.len() || p == id => {
                    return Err(OperatorError::UnknownNode(p))
                }
                Some(p) => {
                    if heights[p] <= heights[id] {
                        return Err(OperatorError::MalformedTree(format!(
                            "node {id} at height {} is not below its parent {p} at {}",
                            heights[id], heights[p]
                        )));
                    }
                    nodes[id].parent = Some(p);
                    nodes[p].children.push(id);
                }
            }
        }
        let root = root.ok_or_else(|| OperatorError::MalformedTree("no root".into()))?;

        Ok(Self {
            nodes,
            root,
            stored_heights: heights.to_vec(),
        })
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn heights(&self) -> Vec<f64> {
        self.nodes.iter().map(|n| n.height).collect()
    }

    /// Remembers node heights so a rejected proposal can be undone.
    pub fn store(&mut self) {
        for (slot, node) in self.stored_heights.iter_mut().zip(&self.nodes) {
            *slot = node.height;
        }
    }

    pub fn restore(&mut self) {
        for (node, &h) in self.nodes.iter_mut().zip(&self.stored_heights) {
            node.height = h;
        }
    }
}

impl BranchTopologyView for Tree {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn root(&self) -> NodeId {
        self.root
    }

    fn height(&self, node: NodeId) -> f64 {
        self.nodes[node].height
    }

    fn set_height(&mut self, node: NodeId, height: f64) {
        self.nodes[node].height = height;
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node].children
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].parent
    }
}
