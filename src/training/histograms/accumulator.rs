//! Per-leaf histograms and the mergeable per-level accumulator.
//!
//! One [`Accumulator`] is built per shard per level. Rows are fed to it one
//! at a time with [`Accumulator::accumulate`]; shard accumulators are then
//! combined with [`Accumulator::merge`]. Merging is pointwise addition over
//! `(leaf, feature, bin)`. Counts are integers and regression moments are
//! [`ExactSum`]s, so any merge order or grouping gives bit-identical bins.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::layout::HistogramLayout;
use crate::data::{FeatureRow, RowError};
use crate::repr::{ExactSum, NodeId, NodeStats, Tree};

/// Errors from combining accumulators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccumulatorError {
    #[error("accumulators were built with different histogram layouts")]
    LayoutMismatch,

    #[error("accumulator was built for tree generation {got}, expected {expected}")]
    SnapshotMismatch { expected: u64, got: u64 },
}

// =============================================================================
// LeafHistogram
// =============================================================================

/// Histograms of every feature for one leaf, plus the leaf's label totals.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafHistogram {
    totals: NodeStats,
    /// `total_bins * count_width` counts.
    counts: Box<[u64]>,
    /// `total_bins * moment_width` moments, `(sum, sum_sq)` per bin.
    moments: Box<[ExactSum]>,
}

impl LeafHistogram {
    /// Empty histogram for `layout`.
    pub fn zeros(layout: &HistogramLayout) -> Self {
        Self {
            totals: NodeStats::zeros(layout.target()),
            counts: vec![0; layout.total_bins() * layout.count_width()].into_boxed_slice(),
            moments: vec![ExactSum::ZERO; layout.total_bins() * layout.moment_width()]
                .into_boxed_slice(),
        }
    }

    /// Label statistics of every row that reached the leaf.
    #[inline]
    pub fn totals(&self) -> &NodeStats {
        &self.totals
    }

    /// Add one validated row.
    fn add_row<R: FeatureRow + ?Sized>(&mut self, layout: &HistogramLayout, row: &R, target: f64) {
        self.totals.add_row(target);
        let cw = layout.count_width();
        let class_slot = if layout.target().is_classification() {
            target as usize
        } else {
            0
        };
        let regression = layout.moment_width() > 0;
        for feature in 0..layout.n_features() {
            let bin = layout.meta(feature).offset as usize + layout.bin_for(feature, row.value(feature));
            self.counts[bin * cw + class_slot] += 1;
            if regression {
                self.moments[2 * bin].add(target);
                self.moments[2 * bin + 1].add_square(target);
            }
        }
    }

    /// Pointwise `self += other`.
    pub fn merge(&mut self, other: &LeafHistogram) {
        debug_assert_eq!(self.counts.len(), other.counts.len());
        self.totals.merge(&other.totals);
        for (d, s) in self.counts.iter_mut().zip(other.counts.iter()) {
            *d += s;
        }
        for (d, s) in self.moments.iter_mut().zip(other.moments.iter()) {
            d.merge(s);
        }
    }

    /// Add local bin `bin` of `feature` into `stats`.
    #[inline]
    pub(crate) fn add_bin_to(
        &self,
        layout: &HistogramLayout,
        feature: usize,
        bin: usize,
        stats: &mut NodeStats,
    ) {
        let global = layout.meta(feature).offset as usize + bin;
        let cw = layout.count_width();
        stats.add_counts(&self.counts[global * cw..(global + 1) * cw]);
        if layout.moment_width() > 0 {
            stats.add_moments(&self.moments[2 * global], &self.moments[2 * global + 1]);
        }
    }

    /// Statistics of local bin `bin` of `feature`.
    pub fn bin_stats(&self, layout: &HistogramLayout, feature: usize, bin: usize) -> NodeStats {
        let mut stats = NodeStats::zeros(layout.target());
        self.add_bin_to(layout, feature, bin, &mut stats);
        stats
    }
}

// =============================================================================
// Accumulator
// =============================================================================

/// Per-leaf histograms gathered during one data pass.
///
/// Leaf histograms are allocated on the first row that reaches a leaf; an
/// absent leaf is equivalent to an all-zero histogram.
#[derive(Debug, Clone)]
pub struct Accumulator {
    layout: Arc<HistogramLayout>,
    generation: u64,
    leaves: BTreeMap<NodeId, LeafHistogram>,
    n_rows: u64,
    n_rows_terminal: u64,
}

impl Accumulator {
    /// Empty accumulator for a tree snapshot of the given generation.
    ///
    /// This is the identity of [`merge`](Self::merge).
    pub fn new(layout: Arc<HistogramLayout>, generation: u64) -> Self {
        Self {
            layout,
            generation,
            leaves: BTreeMap::new(),
            n_rows: 0,
            n_rows_terminal: 0,
        }
    }

    #[inline]
    pub fn layout(&self) -> &HistogramLayout {
        &self.layout
    }

    /// Tree generation this accumulator routes against.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Rows accepted so far (including rows that reached terminal leaves).
    #[inline]
    pub fn n_rows(&self) -> u64 {
        self.n_rows
    }

    /// Rows that reached an already-terminal leaf and were not binned.
    #[inline]
    pub fn n_rows_terminal(&self) -> u64 {
        self.n_rows_terminal
    }

    /// Histogram of a leaf, `None` if no row reached it.
    #[inline]
    pub fn leaf(&self, id: NodeId) -> Option<&LeafHistogram> {
        self.leaves.get(&id)
    }

    /// Leaf histograms in ascending leaf order.
    pub fn leaves(&self) -> impl Iterator<Item = (NodeId, &LeafHistogram)> {
        self.leaves.iter().map(|(&id, h)| (id, h))
    }

    /// Per-row transition: route `row` through `tree` and add it to the bins
    /// of its leaf.
    ///
    /// Rows that reach a terminal leaf are counted but not binned. A rejected
    /// row leaves the accumulator unchanged.
    pub fn accumulate<R: FeatureRow + ?Sized>(
        &mut self,
        tree: &Tree,
        row: &R,
        target: f64,
    ) -> Result<(), RowError> {
        if tree.generation() != self.generation {
            return Err(RowError::StaleSnapshot {
                expected: self.generation,
                got: tree.generation(),
            });
        }
        self.layout.schema().validate_row(row)?;
        self.layout.target().validate_target(target)?;

        let leaf = tree.find_leaf(row);
        self.n_rows += 1;
        if !tree.node(leaf).is_open() {
            self.n_rows_terminal += 1;
            return Ok(());
        }
        let layout = &self.layout;
        self.leaves
            .entry(leaf)
            .or_insert_with(|| LeafHistogram::zeros(layout))
            .add_row(layout, row, target);
        Ok(())
    }

    /// Combine two accumulators built against the same layout and snapshot.
    pub fn merge(mut self, other: Accumulator) -> Result<Accumulator, AccumulatorError> {
        self.merge_from(&other)?;
        Ok(self)
    }

    /// In-place `self += other`.
    pub fn merge_from(&mut self, other: &Accumulator) -> Result<(), AccumulatorError> {
        if !Arc::ptr_eq(&self.layout, &other.layout) && *self.layout != *other.layout {
            return Err(AccumulatorError::LayoutMismatch);
        }
        if self.generation != other.generation {
            return Err(AccumulatorError::SnapshotMismatch {
                expected: self.generation,
                got: other.generation,
            });
        }
        for (&leaf, hist) in &other.leaves {
            match self.leaves.get_mut(&leaf) {
                Some(existing) => existing.merge(hist),
                None => {
                    self.leaves.insert(leaf, hist.clone());
                }
            }
        }
        self.n_rows += other.n_rows;
        self.n_rows_terminal += other.n_rows_terminal;
        Ok(())
    }
}

impl PartialEq for Accumulator {
    fn eq(&self, other: &Self) -> bool {
        *self.layout == *other.layout
            && self.generation == other.generation
            && self.leaves == other.leaves
            && self.n_rows == other.n_rows
            && self.n_rows_terminal == other.n_rows_terminal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{BinCuts, FeatureSchema, FeatureSpec, TargetType};
    use crate::training::histograms::FeatureBinning;

    fn layout(target: TargetType) -> Arc<HistogramLayout> {
        let schema = FeatureSchema::new(vec![
            FeatureSpec::continuous("x"),
            FeatureSpec::categorical("c", 2),
        ]);
        Arc::new(
            HistogramLayout::new(
                schema,
                target,
                vec![
                    FeatureBinning::Continuous(BinCuts::from_upper_bounds(vec![2.0])),
                    FeatureBinning::Categorical { n_levels: 2 },
                ],
            )
            .unwrap(),
        )
    }

    const BINARY: TargetType = TargetType::Classification { n_classes: 2 };

    #[test]
    fn accumulate_bins_every_feature() {
        let layout = layout(BINARY);
        let tree = Tree::new_root(BINARY, 2);
        let mut acc = Accumulator::new(layout.clone(), 0);
        acc.accumulate(&tree, &[1.0, 0.0][..], 0.0).unwrap();
        acc.accumulate(&tree, &[3.0, f64::NAN][..], 1.0).unwrap();

        let leaf = acc.leaf(0).unwrap();
        assert_eq!(leaf.totals().class_counts(), Some(&[1, 1][..]));
        assert_eq!(leaf.bin_stats(&layout, 0, 0).class_counts(), Some(&[1, 0][..]));
        assert_eq!(leaf.bin_stats(&layout, 0, 1).class_counts(), Some(&[0, 1][..]));
        assert_eq!(leaf.bin_stats(&layout, 1, 0).class_counts(), Some(&[1, 0][..]));
        assert_eq!(leaf.bin_stats(&layout, 1, 2).class_counts(), Some(&[0, 1][..]));
        assert_eq!(acc.n_rows(), 2);
    }

    #[test]
    fn regression_moments_per_bin() {
        let layout = layout(TargetType::Regression);
        let tree = Tree::new_root(TargetType::Regression, 2);
        let mut acc = Accumulator::new(layout.clone(), 0);
        acc.accumulate(&tree, &[1.0, 1.0][..], 2.0).unwrap();
        acc.accumulate(&tree, &[1.5, 1.0][..], 4.0).unwrap();

        let bin = acc.leaf(0).unwrap().bin_stats(&layout, 0, 0);
        assert_eq!(bin.n_rows(), 2);
        assert_eq!(bin.sum(), 6.0);
        assert_eq!(bin.sum_sq(), 20.0);
    }

    #[test]
    fn rejected_rows_leave_accumulator_untouched() {
        let layout = layout(BINARY);
        let tree = Tree::new_root(BINARY, 2);
        let mut acc = Accumulator::new(layout, 0);
        let before = acc.clone();

        assert!(matches!(
            acc.accumulate(&tree, &[1.0][..], 0.0),
            Err(RowError::Arity { .. })
        ));
        assert!(matches!(
            acc.accumulate(&tree, &[1.0, 5.0][..], 0.0),
            Err(RowError::UnknownCategory { .. })
        ));
        assert!(matches!(
            acc.accumulate(&tree, &[1.0, 0.0][..], 2.0),
            Err(RowError::InvalidClass { .. })
        ));
        assert_eq!(acc, before);
    }

    #[test]
    fn stale_snapshot_is_rejected() {
        let layout = layout(BINARY);
        let mut tree = Tree::new_root(BINARY, 2);
        let mut acc = Accumulator::new(layout, tree.generation());
        tree.bump_generation();
        assert_eq!(
            acc.accumulate(&tree, &[1.0, 0.0][..], 0.0),
            Err(RowError::StaleSnapshot { expected: 0, got: 1 })
        );
    }

    #[test]
    fn merge_is_pointwise_and_order_free() {
        let layout = layout(BINARY);
        let tree = Tree::new_root(BINARY, 2);
        let rows = [
            ([1.0, 0.0], 0.0),
            ([3.0, 1.0], 1.0),
            ([f64::NAN, 1.0], 1.0),
            ([2.0, 0.0], 0.0),
        ];
        let shard = |range: std::ops::Range<usize>| {
            let mut acc = Accumulator::new(layout.clone(), 0);
            for (row, y) in &rows[range] {
                acc.accumulate(&tree, &row[..], *y).unwrap();
            }
            acc
        };

        let whole = shard(0..4);
        let ab = shard(0..1).merge(shard(1..3)).unwrap().merge(shard(3..4)).unwrap();
        let ba = shard(3..4).merge(shard(1..3).merge(shard(0..1)).unwrap()).unwrap();
        let with_empty = whole.clone().merge(Accumulator::new(layout.clone(), 0)).unwrap();
        assert_eq!(ab, whole);
        assert_eq!(ba, whole);
        assert_eq!(with_empty, whole);
    }

    #[test]
    fn regression_merge_is_bit_identical_in_any_grouping() {
        let layout = layout(TargetType::Regression);
        let tree = Tree::new_root(TargetType::Regression, 2);
        let shard = |y: f64| {
            let mut acc = Accumulator::new(layout.clone(), 0);
            acc.accumulate(&tree, &[1.0, 0.0][..], y).unwrap();
            acc
        };

        let left = shard(0.1).merge(shard(0.2)).unwrap().merge(shard(0.3)).unwrap();
        let right = shard(0.1).merge(shard(0.2).merge(shard(0.3)).unwrap()).unwrap();
        let reversed = shard(0.3).merge(shard(0.2)).unwrap().merge(shard(0.1)).unwrap();
        assert_eq!(left, right);
        assert_eq!(left, reversed);
        assert_eq!(left.leaf(0).unwrap().totals().sum(), 0.6);
    }

    #[test]
    fn merge_rejects_mismatched_accumulators() {
        let a = Accumulator::new(layout(BINARY), 0);
        let b = Accumulator::new(layout(TargetType::Regression), 0);
        assert_eq!(a.clone().merge(b).unwrap_err(), AccumulatorError::LayoutMismatch);

        let c = Accumulator::new(layout(BINARY), 3);
        assert_eq!(
            a.merge(c).unwrap_err(),
            AccumulatorError::SnapshotMismatch { expected: 0, got: 3 }
        );
    }
}
