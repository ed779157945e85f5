//! Impurity criteria and split gain.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::TargetType;
use crate::repr::NodeStats;

/// Gains at or below this value are treated as "no improvement".
///
/// Rounding in the impurity of a pure child can leave a tiny positive gain on
/// splits that do not separate anything.
pub const GAIN_EPSILON: f64 = 1e-12;

// =============================================================================
// Impurity
// =============================================================================

/// Node impurity criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impurity {
    /// `1 - Σ p_k²` (classification).
    Gini,
    /// `-Σ p_k log2 p_k` (classification).
    Entropy,
    /// `1 - max_k p_k` (classification).
    Misclassification,
    /// Label variance (regression).
    Mse,
}

impl Impurity {
    /// Default criterion: Gini for classification, MSE for regression.
    pub fn default_for(target: TargetType) -> Self {
        match target {
            TargetType::Classification { .. } => Impurity::Gini,
            TargetType::Regression => Impurity::Mse,
        }
    }

    /// Returns true if the criterion applies to `target`.
    pub fn supports(self, target: TargetType) -> bool {
        match self {
            Impurity::Gini | Impurity::Entropy | Impurity::Misclassification => {
                target.is_classification()
            }
            Impurity::Mse => !target.is_classification(),
        }
    }

    /// Impurity of a node with the given statistics (0 for an empty node).
    pub fn evaluate(self, stats: &NodeStats) -> f64 {
        let n = stats.n_rows();
        if n == 0 {
            return 0.0;
        }
        let n = n as f64;
        match self {
            Impurity::Mse => (stats.sum_sq() / n - (stats.sum() / n).powi(2)).max(0.0),
            _ => {
                let counts = stats.raw_counts();
                let proportions = counts.iter().map(|&c| c as f64 / n);
                match self {
                    Impurity::Gini => 1.0 - proportions.map(|p| p * p).sum::<f64>(),
                    Impurity::Entropy => -proportions
                        .filter(|&p| p > 0.0)
                        .map(|p| p * p.log2())
                        .sum::<f64>(),
                    _ => 1.0 - proportions.fold(0.0, f64::max),
                }
            }
        }
    }
}

impl fmt::Display for Impurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Impurity::Gini => "gini",
            Impurity::Entropy => "entropy",
            Impurity::Misclassification => "misclassification",
            Impurity::Mse => "mse",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Gain Parameters
// =============================================================================

/// Criterion and per-split constraints used while scanning candidates.
#[derive(Clone, Debug)]
pub struct GainParams {
    /// Impurity criterion.
    pub criterion: Impurity,
    /// Minimum impurity decrease for a split to be accepted.
    pub min_gain: f64,
    /// Minimum rows per child.
    pub min_bucket: u64,
}

impl GainParams {
    /// Impurity decrease of splitting a node with impurity `parent_impurity`
    /// into `left` and `right`:
    ///
    /// ```text
    /// gain = I(P) - n_L/n · I(L) - n_R/n · I(R)
    /// ```
    #[inline]
    pub fn compute_gain(&self, parent_impurity: f64, left: &NodeStats, right: &NodeStats) -> f64 {
        let n_left = left.n_rows() as f64;
        let n_right = right.n_rows() as f64;
        let n = n_left + n_right;
        if n == 0.0 {
            return 0.0;
        }
        parent_impurity
            - (n_left / n) * self.criterion.evaluate(left)
            - (n_right / n) * self.criterion.evaluate(right)
    }

    /// Check child sizes and the gain threshold.
    #[inline]
    pub fn is_valid_split(&self, left: &NodeStats, right: &NodeStats, gain: f64) -> bool {
        left.n_rows() >= self.min_bucket
            && right.n_rows() >= self.min_bucket
            && gain > GAIN_EPSILON
            && gain >= self.min_gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx_eq;

    fn counts(c: &[u64]) -> NodeStats {
        NodeStats::from_class_counts(c.to_vec())
    }

    #[test]
    fn classification_impurities() {
        let stats = counts(&[2, 2]);
        assert_approx_eq!(Impurity::Gini.evaluate(&stats), 0.5);
        assert_approx_eq!(Impurity::Entropy.evaluate(&stats), 1.0);
        assert_approx_eq!(Impurity::Misclassification.evaluate(&stats), 0.5);

        let pure = counts(&[0, 5]);
        assert_eq!(Impurity::Gini.evaluate(&pure), 0.0);
        assert_eq!(Impurity::Entropy.evaluate(&pure), 0.0);
        assert_eq!(Impurity::Misclassification.evaluate(&pure), 0.0);
    }

    #[test]
    fn mse_is_variance() {
        let stats = NodeStats::from_moments(4, 10.0, 30.0); // labels 1,2,3,4
        assert_approx_eq!(Impurity::Mse.evaluate(&stats), 1.25);
        assert_eq!(Impurity::Mse.evaluate(&NodeStats::from_moments(0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn perfect_split_recovers_parent_impurity() {
        let params = GainParams {
            criterion: Impurity::Gini,
            min_gain: 0.0,
            min_bucket: 1,
        };
        let parent = counts(&[2, 2]);
        let gain = params.compute_gain(
            Impurity::Gini.evaluate(&parent),
            &counts(&[2, 0]),
            &counts(&[0, 2]),
        );
        assert_approx_eq!(gain, 0.5);
        assert!(params.is_valid_split(&counts(&[2, 0]), &counts(&[0, 2]), gain));
    }

    #[test]
    fn valid_split_checks() {
        let params = GainParams {
            criterion: Impurity::Gini,
            min_gain: 0.1,
            min_bucket: 2,
        };
        assert!(!params.is_valid_split(&counts(&[1, 0]), &counts(&[0, 3]), 0.3));
        assert!(!params.is_valid_split(&counts(&[2, 0]), &counts(&[0, 3]), 0.05));
        assert!(!params.is_valid_split(&counts(&[2, 0]), &counts(&[0, 3]), 0.0));
        assert!(params.is_valid_split(&counts(&[2, 0]), &counts(&[0, 3]), 0.3));
    }

    #[test]
    fn criterion_target_compatibility() {
        let clf = TargetType::Classification { n_classes: 3 };
        assert!(Impurity::Entropy.supports(clf));
        assert!(!Impurity::Mse.supports(clf));
        assert!(Impurity::Mse.supports(TargetType::Regression));
        assert_eq!(Impurity::default_for(TargetType::Regression), Impurity::Mse);
        assert_eq!(Impurity::Gini.to_string(), "gini");
    }
}
