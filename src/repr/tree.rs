//! Arena-backed decision tree.
//!
//! Nodes live in a flat `Vec` addressed by [`NodeId`] (0 = root). Children are
//! appended when a leaf is split, so level-wise growth stores nodes in
//! breadth-first order.
//!
//! The tree carries a `generation` counter that is bumped every time a level
//! is applied. Accumulators record the generation they were built against, so
//! rows routed through an out-of-date tree are rejected instead of being
//! silently attributed to the wrong leaf.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::node::{LeafStatus, Node, NodeId, NodeKind, SplitRule};
use super::stats::{count_width, NodeStats, Prediction};
use crate::data::{FeatureRow, TargetType};

// ============================================================================
// TreeValidationError
// ============================================================================

/// Structural validation errors for [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeValidationError {
    #[error("tree has no nodes")]
    EmptyTree,

    #[error("node {node}: {side} child {child} is out of bounds ({n_nodes} nodes)")]
    ChildOutOfBounds {
        node: NodeId,
        side: &'static str,
        child: NodeId,
        n_nodes: usize,
    },

    #[error("node {node} references itself as a child")]
    SelfLoop { node: NodeId },

    #[error("node {node} is reachable by more than one path")]
    DuplicateVisit { node: NodeId },

    #[error("cycle detected at node {node}")]
    CycleDetected { node: NodeId },

    #[error("node {node} is unreachable from the root")]
    UnreachableNode { node: NodeId },

    #[error("node {node}: stored parent or depth does not match its position")]
    InconsistentLink { node: NodeId },

    #[error("node {node}: split feature {feature} is out of bounds ({n_features} features)")]
    FeatureOutOfBounds {
        node: NodeId,
        feature: usize,
        n_features: usize,
    },

    #[error("node {node}: statistics do not match the tree's target type")]
    TargetMismatch { node: NodeId },

    #[error("node {node}: {what} has width {got}, expected {expected}")]
    WidthMismatch {
        node: NodeId,
        what: &'static str,
        got: usize,
        expected: usize,
    },

    #[error("node {node}: child {child} does not come after its parent")]
    ChildBeforeParent { node: NodeId, child: NodeId },

    #[error("node {node}: a category is routed to both sides")]
    OverlappingCategories { node: NodeId },
}

// ============================================================================
// Tree
// ============================================================================

/// A (possibly partially grown) classification or regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    target: TargetType,
    n_features: usize,
    generation: u64,
    nodes: Vec<Node>,
}

impl Tree {
    /// A tree consisting of a single open root leaf.
    pub fn new_root(target: TargetType, n_features: usize) -> Self {
        let root = Node::new(
            None,
            0,
            NodeStats::zeros(target),
            Prediction::fallback(target),
            NodeKind::Leaf {
                status: LeafStatus::Open,
            },
        );
        Self {
            target,
            n_features,
            generation: 0,
            nodes: vec![root],
        }
    }

    /// Rebuild a tree from nodes in arena order and validate it.
    pub fn from_nodes(
        target: TargetType,
        n_features: usize,
        generation: u64,
        nodes: Vec<Node>,
    ) -> Result<Self, TreeValidationError> {
        let tree = Self {
            target,
            n_features,
            generation,
            nodes,
        };
        tree.validate()?;
        Ok(tree)
    }

    #[inline]
    pub fn target(&self) -> TargetType {
        self.target
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of levels applied so far.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[inline]
    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    /// Number of leaves (open or terminal).
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Deepest node depth (root = 0).
    pub fn depth(&self) -> u32 {
        self.nodes.iter().map(Node::depth).max().unwrap_or(0)
    }

    /// Ids of leaves that may still be split, in ascending order.
    pub fn open_leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_open())
            .map(|(i, _)| i as NodeId)
    }

    /// Returns true once no leaf is open.
    pub fn is_finished(&self) -> bool {
        self.nodes.iter().all(|n| !n.is_open())
    }

    /// Route a row from the root to its leaf.
    pub fn find_leaf<R: FeatureRow + ?Sized>(&self, row: &R) -> NodeId {
        let mut id: NodeId = 0;
        while let NodeKind::Internal {
            split, left, right, ..
        } = &self.nodes[id as usize].kind
        {
            id = if split.goes_left(row.value(split.feature())) {
                *left
            } else {
                *right
            };
        }
        id
    }

    /// Node ids in pre-order (node, left subtree, right subtree).
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![0 as NodeId];
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some((left, right)) = self.node(id).children() {
                stack.push(right);
                stack.push(left);
            }
        }
        order
    }

    /// Ids of the leaves in the subtree rooted at `id`.
    pub fn subtree_leaves(&self, id: NodeId) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            match self.node(id).children() {
                Some((left, right)) => {
                    stack.push(right);
                    stack.push(left);
                }
                None => leaves.push(id),
            }
        }
        leaves
    }

    // ------------------------------------------------------------------------
    // Mutation (used by the grower and the pruner)
    // ------------------------------------------------------------------------

    /// Replace a leaf's statistics and recompute its prediction.
    ///
    /// An empty leaf keeps the prediction of its parent.
    pub(crate) fn set_leaf_stats(&mut self, id: NodeId, stats: NodeStats) {
        let prediction = self.prediction_for(self.node(id).parent, &stats);
        let node = &mut self.nodes[id as usize];
        debug_assert!(node.is_leaf());
        node.stats = stats;
        node.prediction = prediction;
    }

    /// Mark a leaf as never to be split.
    pub(crate) fn mark_terminal(&mut self, id: NodeId) {
        let node = &mut self.nodes[id as usize];
        if let NodeKind::Leaf { status } = &mut node.kind {
            *status = LeafStatus::Terminal;
        }
    }

    /// Turn leaf `id` into an internal node with two new open children.
    pub(crate) fn split_leaf(
        &mut self,
        id: NodeId,
        split: SplitRule,
        gain: f64,
        left_stats: NodeStats,
        right_stats: NodeStats,
    ) -> (NodeId, NodeId) {
        debug_assert!(self.node(id).is_leaf());
        let depth = self.node(id).depth + 1;
        let left = self.push_child(id, depth, left_stats);
        let right = self.push_child(id, depth, right_stats);
        self.nodes[id as usize].kind = NodeKind::Internal {
            split,
            gain,
            left,
            right,
        };
        (left, right)
    }

    pub(crate) fn bump_generation(&mut self) {
        self.generation += 1;
    }

    /// Copy of the tree where every node flagged in `collapse` becomes a
    /// terminal leaf. Dropped descendants are removed and the remaining
    /// nodes are re-indexed in breadth-first order.
    pub(crate) fn collapsed(&self, collapse: &[bool]) -> Tree {
        let mut nodes: Vec<Node> = Vec::with_capacity(self.nodes.len());
        // (old id, new parent id)
        let mut queue: VecDeque<(NodeId, Option<NodeId>)> = VecDeque::from([(0, None)]);
        // Reserve child slots as we go: children are enqueued in order, so the
        // new id of an enqueued node is `nodes.len() + queue position`.
        while let Some((old, parent)) = queue.pop_front() {
            let src = self.node(old);
            let new_id = nodes.len() as NodeId;
            let kind = match &src.kind {
                NodeKind::Internal {
                    split,
                    gain,
                    left,
                    right,
                } if !collapse[old as usize] => {
                    let new_left = new_id + queue.len() as NodeId + 1;
                    queue.push_back((*left, Some(new_id)));
                    queue.push_back((*right, Some(new_id)));
                    NodeKind::Internal {
                        split: split.clone(),
                        gain: *gain,
                        left: new_left,
                        right: new_left + 1,
                    }
                }
                NodeKind::Internal { .. } => NodeKind::Leaf {
                    status: LeafStatus::Terminal,
                },
                NodeKind::Leaf { status } => NodeKind::Leaf { status: *status },
            };
            nodes.push(Node::new(
                parent,
                src.depth,
                src.stats.clone(),
                src.prediction.clone(),
                kind,
            ));
        }
        Tree {
            target: self.target,
            n_features: self.n_features,
            generation: self.generation,
            nodes,
        }
    }

    fn push_child(&mut self, parent: NodeId, depth: u32, stats: NodeStats) -> NodeId {
        let prediction = self.prediction_for(Some(parent), &stats);
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Node::new(
            Some(parent),
            depth,
            stats,
            prediction,
            NodeKind::Leaf {
                status: LeafStatus::Open,
            },
        ));
        id
    }

    fn prediction_for(&self, parent: Option<NodeId>, stats: &NodeStats) -> Prediction {
        stats.prediction().unwrap_or_else(|| match parent {
            Some(p) => self.node(p).prediction.clone(),
            None => Prediction::fallback(self.target),
        })
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Validate structural invariants: every node reachable exactly once
    /// from the root, children in bounds and stored after their parent,
    /// parent/depth links consistent, split features in range, disjoint
    /// category sets, and statistics and predictions of the tree's target
    /// type and width.
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        let n_nodes = self.nodes.len();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }
        if self.nodes[0].parent.is_some() || self.nodes[0].depth != 0 {
            return Err(TreeValidationError::InconsistentLink { node: 0 });
        }

        // Iterative DFS with color marking.
        // 0 = unvisited, 1 = visiting, 2 = done
        let mut color = vec![0u8; n_nodes];
        let mut stack: Vec<(NodeId, u8)> = vec![(0, 0)];

        while let Some((node, phase)) = stack.pop() {
            let idx = node as usize;
            if phase == 1 {
                color[idx] = 2;
                continue;
            }
            match color[idx] {
                0 => {}
                1 => return Err(TreeValidationError::CycleDetected { node }),
                _ => return Err(TreeValidationError::DuplicateVisit { node }),
            }
            color[idx] = 1;
            stack.push((node, 1));

            let current = &self.nodes[idx];
            self.validate_payload(node, current)?;

            if let NodeKind::Internal {
                split, left, right, ..
            } = &current.kind
            {
                if split.feature() >= self.n_features {
                    return Err(TreeValidationError::FeatureOutOfBounds {
                        node,
                        feature: split.feature(),
                        n_features: self.n_features,
                    });
                }
                if *left == node || *right == node {
                    return Err(TreeValidationError::SelfLoop { node });
                }
                if let SplitRule::Categorical {
                    left: left_set,
                    right: right_set,
                    ..
                } = split
                {
                    if left_set.intersects(right_set) {
                        return Err(TreeValidationError::OverlappingCategories { node });
                    }
                }
                for (side, child) in [("left", *left), ("right", *right)] {
                    if child < node {
                        return Err(TreeValidationError::ChildBeforeParent { node, child });
                    }
                    let Some(child_node) = self.nodes.get(child as usize) else {
                        return Err(TreeValidationError::ChildOutOfBounds {
                            node,
                            side,
                            child,
                            n_nodes,
                        });
                    };
                    if child_node.parent != Some(node) || child_node.depth != current.depth + 1 {
                        return Err(TreeValidationError::InconsistentLink { node: child });
                    }
                }
                // Visit children
                stack.push((*right, 0));
                stack.push((*left, 0));
            }
        }

        if let Some(i) = color.iter().position(|&c| c == 0) {
            return Err(TreeValidationError::UnreachableNode { node: i as NodeId });
        }
        Ok(())
    }

    /// Statistics and prediction must match the target type and class count.
    fn validate_payload(&self, node: NodeId, current: &Node) -> Result<(), TreeValidationError> {
        if current.stats.target() != self.target {
            return Err(TreeValidationError::TargetMismatch { node });
        }
        let expected = count_width(self.target);
        let got = current.stats.raw_counts().len();
        if got != expected {
            return Err(TreeValidationError::WidthMismatch {
                node,
                what: "class counts",
                got,
                expected,
            });
        }
        let expected = match self.target {
            TargetType::Classification { n_classes } => n_classes as usize,
            TargetType::Regression => 0,
        };
        let got = current.prediction.probabilities().map_or(0, <[f64]>::len);
        if got != expected {
            return Err(TreeValidationError::WidthMismatch {
                node,
                what: "prediction probabilities",
                got,
                expected,
            });
        }
        Ok(())
    }
}
