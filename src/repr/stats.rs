//! Label statistics held by tree nodes and histogram bins.
//!
//! [`NodeStats`] is the sufficient statistic for both split evaluation and
//! leaf prediction:
//!
//! - classification: one row count per class
//! - regression: row count, label sum and label sum of squares
//!
//! Combining two statistics is pointwise addition. Counts are integers and
//! regression moments are [`ExactSum`]s, so merging and subtraction never
//! round and the result does not depend on the order rows were added in.

use serde::{Deserialize, Serialize};

use super::exact::ExactSum;
use crate::data::TargetType;

// =============================================================================
// NodeStats
// =============================================================================

/// Label sufficient statistics of a set of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStats {
    target: TargetType,
    /// Per-class counts (classification) or a single row count (regression).
    counts: Box<[u64]>,
    sum: ExactSum,
    sum_sq: ExactSum,
}

impl NodeStats {
    /// Empty statistics for a target type.
    pub fn zeros(target: TargetType) -> Self {
        Self {
            target,
            counts: vec![0; count_width(target)].into_boxed_slice(),
            sum: ExactSum::ZERO,
            sum_sq: ExactSum::ZERO,
        }
    }

    /// Classification statistics from per-class counts.
    pub fn from_class_counts(counts: Vec<u64>) -> Self {
        let n_classes = counts.len() as u32;
        Self {
            target: TargetType::Classification { n_classes },
            counts: counts.into_boxed_slice(),
            sum: ExactSum::ZERO,
            sum_sq: ExactSum::ZERO,
        }
    }

    /// Regression statistics from count, label sum and label sum of squares.
    pub fn from_moments(n_rows: u64, sum: f64, sum_sq: f64) -> Self {
        Self {
            target: TargetType::Regression,
            counts: vec![n_rows].into_boxed_slice(),
            sum: ExactSum::from_f64(sum),
            sum_sq: ExactSum::from_f64(sum_sq),
        }
    }

    /// Target type these statistics describe.
    #[inline]
    pub fn target(&self) -> TargetType {
        self.target
    }

    /// Add one row with label `target`. The label must already be validated.
    #[inline]
    pub fn add_row(&mut self, target: f64) {
        match self.target {
            TargetType::Classification { .. } => self.counts[target as usize] += 1,
            TargetType::Regression => {
                self.counts[0] += 1;
                self.sum.add(target);
                self.sum_sq.add_square(target);
            }
        }
    }

    /// Add raw bin counts of the same width.
    #[inline]
    pub(crate) fn add_counts(&mut self, counts: &[u64]) {
        debug_assert_eq!(counts.len(), self.counts.len());
        for (d, s) in self.counts.iter_mut().zip(counts) {
            *d += s;
        }
    }

    /// Add raw bin moments.
    #[inline]
    pub(crate) fn add_moments(&mut self, sum: &ExactSum, sum_sq: &ExactSum) {
        self.sum.merge(sum);
        self.sum_sq.merge(sum_sq);
    }

    /// Pointwise addition of `other` into `self`.
    #[inline]
    pub fn merge(&mut self, other: &NodeStats) {
        debug_assert_eq!(self.target, other.target);
        self.add_counts(&other.counts);
        self.add_moments(&other.sum, &other.sum_sq);
    }

    /// `self + other` as a new value.
    pub fn combined(&self, other: &NodeStats) -> NodeStats {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    /// `self - other`, where `other` describes a subset of the rows of `self`.
    ///
    /// Exact: `other.combined(&self.difference(other)) == *self`.
    pub fn difference(&self, other: &NodeStats) -> NodeStats {
        debug_assert_eq!(self.target, other.target);
        let counts = self
            .counts
            .iter()
            .zip(other.counts.iter())
            .map(|(&a, &b)| {
                debug_assert!(a >= b, "subtracting a superset");
                a.saturating_sub(b)
            })
            .collect();
        let mut sum = self.sum.clone();
        sum.subtract(&other.sum);
        let mut sum_sq = self.sum_sq.clone();
        sum_sq.subtract(&other.sum_sq);
        NodeStats {
            target: self.target,
            counts,
            sum,
            sum_sq,
        }
    }

    /// Number of rows.
    #[inline]
    pub fn n_rows(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Returns true if no rows were seen.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    /// Per-class counts (classification only).
    #[inline]
    pub fn class_counts(&self) -> Option<&[u64]> {
        self.target.is_classification().then_some(&self.counts[..])
    }

    /// Raw count slice (per class, or the single row count).
    #[inline]
    pub(crate) fn raw_counts(&self) -> &[u64] {
        &self.counts
    }

    /// Label sum (regression; 0 for classification), rounded once.
    #[inline]
    pub fn sum(&self) -> f64 {
        self.sum.to_f64()
    }

    /// Label sum of squares (regression; 0 for classification), rounded once.
    #[inline]
    pub fn sum_sq(&self) -> f64 {
        self.sum_sq.to_f64()
    }

    /// Mean label (regression), `None` when empty or for classification.
    pub fn mean(&self) -> Option<f64> {
        match self.target {
            TargetType::Regression if self.counts[0] > 0 => Some(self.sum() / self.counts[0] as f64),
            _ => None,
        }
    }

    /// Most frequent class, lowest class index on ties. `None` when empty.
    pub fn majority_class(&self) -> Option<u32> {
        if !self.target.is_classification() || self.is_empty() {
            return None;
        }
        let mut best = 0;
        for (class, &count) in self.counts.iter().enumerate() {
            if count > self.counts[best] {
                best = class;
            }
        }
        Some(best as u32)
    }

    /// Fraction of rows with label `class` (0 when empty).
    pub fn class_proportion(&self, class: usize) -> f64 {
        let n = self.n_rows();
        if n == 0 {
            0.0
        } else {
            self.counts.get(class).copied().unwrap_or(0) as f64 / n as f64
        }
    }

    /// Resubstitution risk: misclassified rows (classification) or the sum of
    /// squared errors around the mean (regression).
    pub fn risk(&self) -> f64 {
        match self.target {
            TargetType::Classification { .. } => {
                let max = self.counts.iter().copied().max().unwrap_or(0);
                (self.n_rows() - max) as f64
            }
            TargetType::Regression => {
                let n = self.counts[0];
                if n == 0 {
                    0.0
                } else {
                    let sum = self.sum();
                    (self.sum_sq() - sum * sum / n as f64).max(0.0)
                }
            }
        }
    }

    /// Prediction implied by these statistics, `None` when empty.
    pub fn prediction(&self) -> Option<Prediction> {
        if self.is_empty() {
            return None;
        }
        Some(match self.target {
            TargetType::Classification { .. } => {
                let n = self.n_rows() as f64;
                let probabilities = self.counts.iter().map(|&c| c as f64 / n).collect();
                Prediction {
                    response: self.majority_class().unwrap_or(0) as f64,
                    probabilities,
                }
            }
            TargetType::Regression => Prediction {
                response: self.sum() / self.counts[0] as f64,
                probabilities: Box::new([]),
            },
        })
    }
}

/// Number of count slots per statistic for a target type.
#[inline]
pub(crate) fn count_width(target: TargetType) -> usize {
    match target {
        TargetType::Classification { n_classes } => n_classes as usize,
        TargetType::Regression => 1,
    }
}

// =============================================================================
// Prediction
// =============================================================================

/// Value a node predicts.
///
/// `response` is the majority class index (classification) or the mean label
/// (regression). `probabilities` holds the class distribution and is empty
/// for regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    response: f64,
    probabilities: Box<[f64]>,
}

impl Prediction {
    /// Prediction of a node that never saw a row: class 0 with a uniform
    /// distribution, or 0.0 for regression.
    pub fn fallback(target: TargetType) -> Self {
        match target {
            TargetType::Classification { n_classes } => {
                let k = n_classes.max(1) as usize;
                Prediction {
                    response: 0.0,
                    probabilities: vec![1.0 / k as f64; k].into_boxed_slice(),
                }
            }
            TargetType::Regression => Prediction {
                response: 0.0,
                probabilities: Box::new([]),
            },
        }
    }

    /// Predicted label (class index as `f64`) or mean response.
    #[inline]
    pub fn response(&self) -> f64 {
        self.response
    }

    /// Class distribution, `None` for regression.
    #[inline]
    pub fn probabilities(&self) -> Option<&[f64]> {
        (!self.probabilities.is_empty()).then_some(&self.probabilities[..])
    }

    /// Predicted class, `None` for regression.
    #[inline]
    pub fn class(&self) -> Option<u32> {
        self.probabilities().map(|_| self.response as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BINARY: TargetType = TargetType::Classification { n_classes: 2 };

    #[test]
    fn classification_counts_and_prediction() {
        let mut stats = NodeStats::zeros(BINARY);
        for y in [0.0, 1.0, 1.0, 1.0] {
            stats.add_row(y);
        }
        assert_eq!(stats.n_rows(), 4);
        assert_eq!(stats.class_counts(), Some(&[1, 3][..]));
        assert_eq!(stats.majority_class(), Some(1));
        assert_eq!(stats.risk(), 1.0);

        let pred = stats.prediction().unwrap();
        assert_eq!(pred.class(), Some(1));
        assert_eq!(pred.probabilities(), Some(&[0.25, 0.75][..]));
    }

    #[test]
    fn majority_ties_pick_lowest_class() {
        let stats = NodeStats::from_class_counts(vec![0, 2, 2]);
        assert_eq!(stats.majority_class(), Some(1));
    }

    #[test]
    fn regression_moments() {
        let mut stats = NodeStats::zeros(TargetType::Regression);
        for y in [1.0, 2.0, 3.0] {
            stats.add_row(y);
        }
        assert_eq!(stats.n_rows(), 3);
        assert_eq!(stats.mean(), Some(2.0));
        assert_eq!(stats.risk(), 2.0);
        assert_eq!(stats.prediction().unwrap().response(), 2.0);
        assert_eq!(stats.prediction().unwrap().probabilities(), None);
    }

    #[test]
    fn merge_and_difference_are_inverse() {
        let a = NodeStats::from_class_counts(vec![3, 4]);
        let b = NodeStats::from_class_counts(vec![1, 2]);
        let sum = a.combined(&b);
        assert_eq!(sum, NodeStats::from_class_counts(vec![4, 6]));
        assert_eq!(sum.difference(&b), a);
    }

    #[test]
    fn regression_merge_is_exact_in_any_order() {
        let labels = [0.1, 0.2, 0.3, -1e-7, 1e5];
        let single = |y: f64| {
            let mut stats = NodeStats::zeros(TargetType::Regression);
            stats.add_row(y);
            stats
        };
        let forward = labels.iter().fold(NodeStats::zeros(TargetType::Regression), |acc, &y| {
            acc.combined(&single(y))
        });
        let backward = labels.iter().rev().fold(NodeStats::zeros(TargetType::Regression), |acc, &y| {
            acc.combined(&single(y))
        });
        assert_eq!(forward, backward);

        let part = single(0.1).combined(&single(0.3));
        let rest = forward.difference(&part);
        assert_eq!(part.combined(&rest), forward);
        assert_eq!(rest, single(0.2).combined(&single(-1e-7)).combined(&single(1e5)));
    }

    #[test]
    fn empty_stats_have_no_prediction() {
        assert!(NodeStats::zeros(BINARY).prediction().is_none());
        assert_eq!(NodeStats::zeros(TargetType::Regression).risk(), 0.0);
        let fallback = Prediction::fallback(BINARY);
        assert_eq!(fallback.probabilities(), Some(&[0.5, 0.5][..]));
    }
}
