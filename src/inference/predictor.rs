//! Prediction from a grown tree.
//!
//! A row is routed from the root by evaluating each split rule. Missing
//! values, out-of-range feature indices and categories unseen at a node all
//! follow that node's default direction, so prediction is total: every row
//! reaches exactly one leaf.

use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::data::FeatureRow;
use crate::repr::{NodeId, Prediction, Tree};
use crate::utils::Parallelism;

/// Row-level and batch prediction over a borrowed tree.
///
/// Prediction never mutates the tree, so repeated calls on the same row return
/// identical results. A partially grown tree (some leaves still open) can be
/// queried as well; its leaves predict from the statistics gathered so far.
#[derive(Debug, Clone, Copy)]
pub struct Predictor<'t> {
    tree: &'t Tree,
}

impl<'t> Predictor<'t> {
    #[inline]
    pub fn new(tree: &'t Tree) -> Self {
        Self { tree }
    }

    #[inline]
    pub fn tree(&self) -> &'t Tree {
        self.tree
    }

    /// Number of output columns of [`Predictor::predict_proba_batch`].
    #[inline]
    pub fn n_classes(&self) -> Option<usize> {
        let target = self.tree.target();
        target.is_classification().then(|| target.n_classes())
    }

    // =========================================================================
    // Single Row
    // =========================================================================

    /// Id of the leaf the row is routed to.
    #[inline]
    pub fn predict_leaf<R: FeatureRow + ?Sized>(&self, row: &R) -> NodeId {
        self.tree.find_leaf(row)
    }

    /// Full prediction of the leaf the row reaches.
    #[inline]
    pub fn predict<R: FeatureRow + ?Sized>(&self, row: &R) -> &'t Prediction {
        self.tree.node(self.predict_leaf(row)).prediction()
    }

    /// Predicted class index (as `f64`) or mean response.
    #[inline]
    pub fn predict_response<R: FeatureRow + ?Sized>(&self, row: &R) -> f64 {
        self.predict(row).response()
    }

    /// Predicted class, `None` for regression trees.
    #[inline]
    pub fn predict_class<R: FeatureRow + ?Sized>(&self, row: &R) -> Option<u32> {
        self.predict(row).class()
    }

    /// Class distribution at the leaf, `None` for regression trees.
    #[inline]
    pub fn predict_proba<R: FeatureRow + ?Sized>(&self, row: &R) -> Option<&'t [f64]> {
        self.predict(row).probabilities()
    }

    // =========================================================================
    // Batch
    // =========================================================================

    /// Leaf ids for every row of `features` (`n_rows x n_features`).
    pub fn predict_leaf_batch(
        &self,
        features: ArrayView2<f64>,
        parallelism: Parallelism,
    ) -> Array1<NodeId> {
        let rows: Vec<_> = features.axis_iter(Axis(0)).collect();
        Array1::from(parallelism.maybe_par_map(rows, |row| self.predict_leaf(&row)))
    }

    /// Responses for every row of `features`.
    pub fn predict_batch(&self, features: ArrayView2<f64>, parallelism: Parallelism) -> Array1<f64> {
        self.predict_leaf_batch(features, parallelism)
            .mapv(|leaf| self.tree.node(leaf).prediction().response())
    }

    /// Class probabilities (`n_rows x n_classes`), `None` for regression trees.
    pub fn predict_proba_batch(
        &self,
        features: ArrayView2<f64>,
        parallelism: Parallelism,
    ) -> Option<Array2<f64>> {
        let n_classes = self.n_classes()?;
        let leaves = self.predict_leaf_batch(features, parallelism);
        let mut output = Array2::zeros((leaves.len(), n_classes));
        for (mut out, &leaf) in output.axis_iter_mut(Axis(0)).zip(leaves.iter()) {
            if let Some(probs) = self.tree.node(leaf).prediction().probabilities() {
                out.assign(&ndarray::aview1(probs));
            }
        }
        Some(output)
    }
}
