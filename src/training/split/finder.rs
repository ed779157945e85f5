//! Best-split search over a leaf's histograms.
//!
//! For each feature:
//! 1. Separate the missing bin from the value bins
//! 2. Scan value bins in order, accumulating the left side
//! 3. Send missing rows to the side holding more non-missing rows (ties left)
//! 4. Score the cut and keep it if it beats the best so far
//!
//! Categorical features are scanned the same way over categories sorted by a
//! per-category label key, which keeps the search linear in the number of
//! categories instead of enumerating subsets.
//!
//! Ties keep the first candidate found: features are scanned in ascending
//! index and cuts in ascending threshold (or sorted-category prefix) order.

use super::gain::GainParams;
use crate::data::TargetType;
use crate::repr::{CatBitset, NodeStats, SplitRule};
use crate::training::histograms::{FeatureBinning, HistogramLayout, LeafHistogram};

/// A proposed partition of a leaf's rows.
///
/// `left` and `right` include the missing rows routed by the rule, so
/// `left + right` equals the leaf's statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitCandidate {
    pub rule: SplitRule,
    pub gain: f64,
    pub left: NodeStats,
    pub right: NodeStats,
}

impl SplitCandidate {
    /// Feature index the candidate splits on.
    #[inline]
    pub fn feature(&self) -> usize {
        self.rule.feature()
    }
}

/// Greedy exhaustive search over bin boundaries.
#[derive(Debug, Clone)]
pub struct SplitFinder {
    params: GainParams,
}

impl SplitFinder {
    pub fn new(params: GainParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &GainParams {
        &self.params
    }

    /// Best valid split of a leaf, or `None` if no cut satisfies the
    /// minimum child size and minimum gain.
    pub fn best_split(
        &self,
        layout: &HistogramLayout,
        hist: &LeafHistogram,
    ) -> Option<SplitCandidate> {
        let parent = hist.totals();
        if parent.n_rows() < 2 * self.params.min_bucket {
            return None;
        }
        let parent_impurity = self.params.criterion.evaluate(parent);

        let mut best: Option<SplitCandidate> = None;
        for feature in 0..layout.n_features() {
            let candidate = match layout.binning(feature) {
                FeatureBinning::Continuous(cuts) => self.best_numeric_split(
                    layout,
                    hist,
                    feature,
                    cuts.upper_bounds(),
                    parent_impurity,
                ),
                FeatureBinning::Categorical { n_levels } => self.best_categorical_split(
                    layout,
                    hist,
                    feature,
                    *n_levels,
                    parent_impurity,
                ),
            };
            if let Some(candidate) = candidate {
                if best.as_ref().map_or(true, |b| candidate.gain > b.gain) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    /// Scan the value bins of a continuous feature left to right.
    fn best_numeric_split(
        &self,
        layout: &HistogramLayout,
        hist: &LeafHistogram,
        feature: usize,
        upper_bounds: &[f64],
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let meta = layout.meta(feature);
        let missing = hist.bin_stats(layout, feature, meta.missing_bin());
        let non_missing = hist.totals().difference(&missing);

        let mut best: Option<SplitCandidate> = None;
        let mut left = NodeStats::zeros(layout.target());
        // Cutting after the last value bin leaves the right side empty.
        for bin in 0..upper_bounds.len().saturating_sub(1) {
            hist.add_bin_to(layout, feature, bin, &mut left);
            let Some((left_full, right_full, default_left)) =
                self.route_missing(&left, &non_missing, &missing)
            else {
                continue;
            };
            let gain = self
                .params
                .compute_gain(parent_impurity, &left_full, &right_full);
            if !self.params.is_valid_split(&left_full, &right_full, gain) {
                continue;
            }
            if best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    rule: SplitRule::Numeric {
                        feature: feature as u32,
                        threshold: upper_bounds[bin],
                        default_left,
                    },
                    gain,
                    left: left_full,
                    right: right_full,
                });
            }
        }
        best
    }

    /// Scan categories sorted by their label key.
    fn best_categorical_split(
        &self,
        layout: &HistogramLayout,
        hist: &LeafHistogram,
        feature: usize,
        n_levels: u32,
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let meta = layout.meta(feature);
        let missing = hist.bin_stats(layout, feature, meta.missing_bin());
        let non_missing = hist.totals().difference(&missing);
        let order_key = CategoryOrder::for_leaf(hist.totals());

        // Observed categories with their statistics and sort key.
        let mut categories: Vec<(u32, NodeStats, f64)> = (0..n_levels)
            .filter_map(|code| {
                let stats = hist.bin_stats(layout, feature, code as usize);
                (!stats.is_empty()).then(|| {
                    let key = order_key.key(&stats);
                    (code, stats, key)
                })
            })
            .collect();
        if categories.len() < 2 {
            return None;
        }
        categories.sort_by(|a, b| a.2.total_cmp(&b.2).then(a.0.cmp(&b.0)));

        let mut best: Option<(usize, SplitCandidate)> = None;
        let mut left = NodeStats::zeros(layout.target());
        for i in 0..categories.len() - 1 {
            left.merge(&categories[i].1);
            let Some((left_full, right_full, default_left)) =
                self.route_missing(&left, &non_missing, &missing)
            else {
                continue;
            };
            let gain = self
                .params
                .compute_gain(parent_impurity, &left_full, &right_full);
            if !self.params.is_valid_split(&left_full, &right_full, gain) {
                continue;
            }
            if best.as_ref().map_or(true, |(_, b)| gain > b.gain) {
                let candidate = SplitCandidate {
                    // Placeholder sets, filled in once the winning prefix is known.
                    rule: SplitRule::Categorical {
                        feature: feature as u32,
                        left: CatBitset::empty(),
                        right: CatBitset::empty(),
                        default_left,
                    },
                    gain,
                    left: left_full,
                    right: right_full,
                };
                best = Some((i, candidate));
            }
        }

        best.map(|(prefix, mut candidate)| {
            if let SplitRule::Categorical { left, right, .. } = &mut candidate.rule {
                *left = categories[..=prefix].iter().map(|c| c.0).collect();
                *right = categories[prefix + 1..].iter().map(|c| c.0).collect();
            }
            candidate
        })
    }

    /// Complete a partition of the non-missing rows with the missing rows.
    ///
    /// Returns `(left, right, default_left)`, or `None` when every
    /// non-missing row falls on one side.
    fn route_missing(
        &self,
        left_non_missing: &NodeStats,
        non_missing: &NodeStats,
        missing: &NodeStats,
    ) -> Option<(NodeStats, NodeStats, bool)> {
        let right_non_missing = non_missing.difference(left_non_missing);
        let n_left = left_non_missing.n_rows();
        let n_right = right_non_missing.n_rows();
        if n_left == 0 || n_right == 0 {
            return None;
        }
        let default_left = n_left >= n_right;
        Some(if default_left {
            (left_non_missing.combined(missing), right_non_missing, true)
        } else {
            (left_non_missing.clone(), right_non_missing.combined(missing), false)
        })
    }
}

// =============================================================================
// Category ordering
// =============================================================================

/// Per-category sort key for the linear categorical scan.
#[derive(Debug, Clone, Copy)]
enum CategoryOrder {
    /// Proportion of the given class.
    ClassProportion(usize),
    /// Mean label.
    Mean,
}

impl CategoryOrder {
    /// Binary classification orders by the proportion of class 1, multiclass
    /// by the proportion of the leaf's majority class, regression by mean.
    fn for_leaf(totals: &NodeStats) -> Self {
        match totals.target() {
            TargetType::Classification { n_classes: 2 } => CategoryOrder::ClassProportion(1),
            TargetType::Classification { .. } => {
                CategoryOrder::ClassProportion(totals.majority_class().unwrap_or(0) as usize)
            }
            TargetType::Regression => CategoryOrder::Mean,
        }
    }

    fn key(self, stats: &NodeStats) -> f64 {
        match self {
            CategoryOrder::ClassProportion(class) => stats.class_proportion(class),
            CategoryOrder::Mean => stats.mean().unwrap_or(0.0),
        }
    }
}
