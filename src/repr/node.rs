//! Node-level types: split rules, leaf status and the node record itself.

use serde::{Deserialize, Serialize};

use super::categories::CatBitset;
use super::stats::{NodeStats, Prediction};
use crate::data::category_code;

/// Node index into a tree's node arena (0 = root).
pub type NodeId = u32;

// =============================================================================
// SplitRule
// =============================================================================

/// Routing predicate of an internal node.
///
/// Missing values (`NaN`) follow `default_left`. For categorical splits a
/// category that appears in neither set (never seen at this node during
/// training) also follows `default_left`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SplitRule {
    /// `value <= threshold` goes left.
    Numeric {
        feature: u32,
        threshold: f64,
        default_left: bool,
    },
    /// Categories in `left` go left, categories in `right` go right.
    Categorical {
        feature: u32,
        left: CatBitset,
        right: CatBitset,
        default_left: bool,
    },
}

impl SplitRule {
    /// Feature index tested by this rule.
    #[inline]
    pub fn feature(&self) -> usize {
        match self {
            SplitRule::Numeric { feature, .. } | SplitRule::Categorical { feature, .. } => {
                *feature as usize
            }
        }
    }

    /// Direction for missing and unrecognized values.
    #[inline]
    pub fn default_left(&self) -> bool {
        match self {
            SplitRule::Numeric { default_left, .. }
            | SplitRule::Categorical { default_left, .. } => *default_left,
        }
    }

    /// Returns true if `value` is routed to the left child.
    #[inline]
    pub fn goes_left(&self, value: f64) -> bool {
        if value.is_nan() {
            return self.default_left();
        }
        match self {
            SplitRule::Numeric { threshold, .. } => value <= *threshold,
            SplitRule::Categorical {
                left,
                right,
                default_left,
                ..
            } => match category_code(value) {
                Some(code) if left.contains(code) => true,
                Some(code) if right.contains(code) => false,
                _ => *default_left,
            },
        }
    }
}

// =============================================================================
// Node
// =============================================================================

/// Growth status of a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeafStatus {
    /// Candidate for splitting at the next level.
    Open,
    /// Will never be split.
    Terminal,
}

/// Leaf or internal node payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Leaf {
        status: LeafStatus,
    },
    Internal {
        split: SplitRule,
        gain: f64,
        left: NodeId,
        right: NodeId,
    },
}

/// A tree node: position, label statistics, prediction and payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) depth: u32,
    pub(crate) stats: NodeStats,
    pub(crate) prediction: Prediction,
    pub(crate) kind: NodeKind,
}

impl Node {
    /// Create a node. Used when rebuilding trees from flat records.
    pub fn new(
        parent: Option<NodeId>,
        depth: u32,
        stats: NodeStats,
        prediction: Prediction,
        kind: NodeKind,
    ) -> Self {
        Self {
            parent,
            depth,
            stats,
            prediction,
            kind,
        }
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Statistics of the training rows that reached this node.
    #[inline]
    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    #[inline]
    pub fn prediction(&self) -> &Prediction {
        &self.prediction
    }

    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// Returns true for leaves that may still be split.
    #[inline]
    pub fn is_open(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Leaf {
                status: LeafStatus::Open
            }
        )
    }

    /// Split rule of an internal node.
    #[inline]
    pub fn split(&self) -> Option<&SplitRule> {
        match &self.kind {
            NodeKind::Internal { split, .. } => Some(split),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// Impurity decrease of an internal node's split.
    #[inline]
    pub fn gain(&self) -> Option<f64> {
        match self.kind {
            NodeKind::Internal { gain, .. } => Some(gain),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// `(left, right)` children of an internal node.
    #[inline]
    pub fn children(&self) -> Option<(NodeId, NodeId)> {
        match self.kind {
            NodeKind::Internal { left, right, .. } => Some((left, right)),
            NodeKind::Leaf { .. } => None,
        }
    }
}
