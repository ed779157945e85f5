//! Human-readable text rendering.
//!
//! Nodes are written in pre-order (node, left subtree, right subtree), one
//! line per node, indented two spaces per depth level:
//!
//! ```text
//! [0] depth 0: x0 <= 2 (missing left), gain 0.5000, n=4
//!   [1] depth 1: leaf -> 0 [1.0000, 0.0000], n=2
//!   [2] depth 1: leaf -> 1 [0.0000, 1.0000], n=2
//! ```
//!
//! Categorical conditions list both sides, then where missing and unseen
//! categories go: `x1 in {0, 2} vs {1} (missing and unseen right)`.
//! Thresholds print in shortest round-trip form.
//!
//! Output depends only on the tree and the options, so it is stable across
//! runs and diffable. The structured form of a tree is its
//! [`TreeRecords`](super::TreeRecords).

use std::fmt::Write;

use bon::Builder;

use crate::repr::{CatBitset, Node, NodeKind, SplitRule, Tree};

/// Rendering options.
#[derive(Debug, Clone, Builder)]
pub struct RenderOptions {
    /// Feature names by index. Missing entries render as `x{index}`.
    #[builder(default, into)]
    pub feature_names: Vec<String>,
    /// Class names by index. Missing entries render as the class index.
    #[builder(default, into)]
    pub class_names: Vec<String>,
    /// Digits after the decimal point for gains and predictions.
    #[builder(default = 4)]
    pub precision: usize,
    /// Append per-class row counts to classification nodes.
    #[builder(default)]
    pub show_class_counts: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RenderOptions {
    fn feature_name(&self, feature: usize) -> String {
        self.feature_names
            .get(feature)
            .cloned()
            .unwrap_or_else(|| format!("x{feature}"))
    }

    fn class_name(&self, class: u32) -> String {
        self.class_names
            .get(class as usize)
            .cloned()
            .unwrap_or_else(|| class.to_string())
    }
}

/// Render `tree` as indented text, one line per node.
pub fn render_text(tree: &Tree, options: &RenderOptions) -> String {
    let mut out = String::new();
    for id in tree.preorder() {
        let node = tree.node(id);
        let indent = "  ".repeat(node.depth() as usize);
        let body = match node.kind() {
            NodeKind::Internal { split, gain, .. } => format!(
                "{}, gain {:.*}",
                condition(split, options),
                options.precision,
                gain
            ),
            NodeKind::Leaf { .. } => leaf_body(node, options),
        };
        // Writing to a String cannot fail.
        let _ = write!(
            out,
            "{indent}[{id}] depth {}: {body}, n={}",
            node.depth(),
            node.stats().n_rows()
        );
        if options.show_class_counts {
            if let Some(counts) = node.stats().class_counts() {
                let _ = write!(out, ", counts {counts:?}");
            }
        }
        out.push('\n');
    }
    out
}

/// Condition under which a row goes to the left child.
fn condition(split: &SplitRule, options: &RenderOptions) -> String {
    let missing = if split.default_left() { "left" } else { "right" };
    let name = options.feature_name(split.feature());
    match split {
        SplitRule::Numeric { threshold, .. } => {
            format!("{name} <= {threshold} (missing {missing})")
        }
        SplitRule::Categorical { left, right, .. } => format!(
            "{name} in {{{}}} vs {{{}}} (missing and unseen {missing})",
            codes(left),
            codes(right)
        ),
    }
}

fn codes(set: &CatBitset) -> String {
    set.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ")
}

fn leaf_body(node: &Node, options: &RenderOptions) -> String {
    let status = if node.is_open() { "leaf (open)" } else { "leaf" };
    let prediction = node.prediction();
    match (prediction.class(), prediction.probabilities()) {
        (Some(class), Some(probs)) => {
            let probs: Vec<String> = probs
                .iter()
                .map(|p| format!("{:.*}", options.precision, p))
                .collect();
            format!("{status} -> {} [{}]", options.class_name(class), probs.join(", "))
        }
        _ => format!("{status} -> {:.*}", options.precision, prediction.response()),
    }
}
