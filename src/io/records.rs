//! Flat node-record layout for persisting trees.
//!
//! A tree is stored as a list of [`NodeRecord`]s in arena order (record `i`
//! has id `i`), together with the target type and feature count. Each record
//! carries enough to rebuild its node without re-running training: links,
//! depth, split rule or leaf status, label statistics and prediction.
//!
//! The layout doubles as the structured, graph-ready rendering of a tree:
//! nodes are vertices, `left`/`right` are edges.
//!
//! Reconstruction validates the records ([`TreeRecords::into_tree`]), so a
//! corrupted file is reported as a [`ReadError`] instead of producing a tree
//! that misroutes rows.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::data::TargetType;
use crate::repr::{
    LeafStatus, Node, NodeId, NodeKind, NodeStats, Prediction, SplitRule, Tree, TreeValidationError,
};

/// Version written to, and required from, persisted records.
pub const FORMAT_VERSION: u32 = 1;

// =============================================================================
// Errors
// =============================================================================

/// Errors while reading persisted records.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported format version {found}")]
    UnsupportedVersion { found: u32 },

    #[error("record {index}: {reason}")]
    Record { index: usize, reason: &'static str },

    #[error("invalid tree: {0}")]
    Validation(#[from] TreeValidationError),
}

// =============================================================================
// Schema
// =============================================================================

/// One node of the flat layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub depth: u32,
    pub is_leaf: bool,
    /// Leaf growth status. Absent for internal nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LeafStatus>,
    /// Split rule. Absent for leaves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<SplitRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<NodeId>,
    pub stats: NodeStats,
    pub prediction: Prediction,
}

/// A whole tree in flat form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeRecords {
    pub format_version: u32,
    pub target: TargetType,
    pub n_features: usize,
    pub generation: u64,
    pub nodes: Vec<NodeRecord>,
}

impl TreeRecords {
    /// Flatten a tree.
    pub fn from_tree(tree: &Tree) -> Self {
        let nodes = tree
            .nodes()
            .iter()
            .enumerate()
            .map(|(id, node)| NodeRecord::from_node(id as NodeId, node))
            .collect();
        Self {
            format_version: FORMAT_VERSION,
            target: tree.target(),
            n_features: tree.n_features(),
            generation: tree.generation(),
            nodes,
        }
    }

    /// Rebuild and validate the tree.
    pub fn into_tree(self) -> Result<Tree, ReadError> {
        if self.format_version != FORMAT_VERSION {
            return Err(ReadError::UnsupportedVersion {
                found: self.format_version,
            });
        }
        let nodes = self
            .nodes
            .into_iter()
            .enumerate()
            .map(|(index, record)| record.into_node(index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Tree::from_nodes(
            self.target,
            self.n_features,
            self.generation,
            nodes,
        )?)
    }

    // =========================================================================
    // JSON
    // =========================================================================

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, ReadError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn write_json<W: Write>(&self, writer: W) -> Result<(), serde_json::Error> {
        serde_json::to_writer_pretty(writer, self)
    }

    pub fn read_json<R: Read>(reader: R) -> Result<Self, ReadError> {
        Ok(serde_json::from_reader(reader)?)
    }
}

impl From<&Tree> for TreeRecords {
    fn from(tree: &Tree) -> Self {
        Self::from_tree(tree)
    }
}

impl TryFrom<TreeRecords> for Tree {
    type Error = ReadError;

    fn try_from(records: TreeRecords) -> Result<Self, Self::Error> {
        records.into_tree()
    }
}

impl NodeRecord {
    fn from_node(id: NodeId, node: &Node) -> Self {
        let (status, split, gain, left, right) = match node.kind() {
            NodeKind::Leaf { status } => (Some(*status), None, None, None, None),
            NodeKind::Internal {
                split,
                gain,
                left,
                right,
            } => (None, Some(split.clone()), Some(*gain), Some(*left), Some(*right)),
        };
        Self {
            id,
            parent: node.parent(),
            depth: node.depth(),
            is_leaf: node.is_leaf(),
            status,
            split,
            gain,
            left,
            right,
            stats: node.stats().clone(),
            prediction: node.prediction().clone(),
        }
    }

    fn into_node(self, index: usize) -> Result<Node, ReadError> {
        let invalid = |reason| ReadError::Record { index, reason };
        if self.id as usize != index {
            return Err(invalid("id does not match position"));
        }
        let kind = if self.is_leaf {
            if self.split.is_some() || self.left.is_some() || self.right.is_some() {
                return Err(invalid("leaf carries a split"));
            }
            NodeKind::Leaf {
                status: self.status.unwrap_or(LeafStatus::Terminal),
            }
        } else {
            match (self.split, self.left, self.right) {
                (Some(split), Some(left), Some(right)) => NodeKind::Internal {
                    split,
                    gain: self.gain.unwrap_or(0.0),
                    left,
                    right,
                },
                _ => return Err(invalid("internal node needs a split and two children")),
            }
        };
        Ok(Node::new(
            self.parent,
            self.depth,
            self.stats,
            self.prediction,
            kind,
        ))
    }
}

impl Tree {
    /// Flat record form of this tree.
    pub fn to_records(&self) -> TreeRecords {
        TreeRecords::from_tree(self)
    }

    /// Rebuild a tree from flat records, validating its structure.
    pub fn from_records(records: TreeRecords) -> Result<Self, ReadError> {
        records.into_tree()
    }
}
