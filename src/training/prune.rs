//! Cost-complexity pruning.
//!
//! An internal node `t` is collapsed into a leaf when its per-leaf risk
//! reduction
//!
//! ```text
//! α(t) = (R(t) - R(T_t)) / (|leaves(T_t)| - 1)
//! ```
//!
//! is below `cp · R(root)`, where `R` is the resubstitution risk
//! (misclassified rows, or sum of squared errors) and `T_t` is the subtree
//! rooted at `t`. Nodes are visited bottom-up, so a collapsed subtree counts
//! as a single leaf when its ancestors are evaluated.

use crate::repr::Tree;

/// Prune `tree` with complexity parameter `cp`. `cp <= 0` returns an
/// unchanged copy.
pub fn prune(tree: &Tree, cp: f64) -> Tree {
    if cp <= 0.0 || tree.n_nodes() == 1 {
        return tree.clone();
    }
    let threshold = cp * tree.root().stats().risk();
    let n_nodes = tree.n_nodes();

    // (subtree risk, subtree leaf count) per node.
    let mut risk = vec![0.0; n_nodes];
    let mut leaves = vec![1usize; n_nodes];
    let mut collapse = vec![false; n_nodes];

    // Children always have larger ids than their parent (`Tree::validate`).
    for id in (0..n_nodes).rev() {
        let node = tree.node(id as u32);
        let own_risk = node.stats().risk();
        let Some((left, right)) = node.children() else {
            risk[id] = own_risk;
            continue;
        };
        let (left, right) = (left as usize, right as usize);
        let subtree_risk = risk[left] + risk[right];
        let subtree_leaves = leaves[left] + leaves[right];
        let alpha = (own_risk - subtree_risk) / (subtree_leaves - 1) as f64;
        if alpha < threshold {
            collapse[id] = true;
            risk[id] = own_risk;
            leaves[id] = 1;
        } else {
            risk[id] = subtree_risk;
            leaves[id] = subtree_leaves;
        }
    }

    let n_collapsed = collapse.iter().filter(|&&c| c).count();
    if n_collapsed == 0 {
        return tree.clone();
    }
    let pruned = tree.collapsed(&collapse);
    tracing::debug!(
        cp,
        n_collapsed,
        n_nodes_before = n_nodes,
        n_nodes_after = pruned.n_nodes(),
        "pruned tree"
    );
    pruned
}
