//! Fixed bin boundaries for continuous features.
//!
//! Boundaries are computed once, before the first data pass, and never change
//! during training. Every shard bins rows against the same boundaries, which
//! is what makes per-shard histograms addable.

use serde::{Deserialize, Serialize};

/// Upper bounds of the value bins of one continuous feature.
///
/// A value `v` maps to the first bin `b` with `v <= upper_bounds[b]`. The last
/// bound is always `+inf`, so every non-missing value has a bin. Splitting
/// after bin `b` is therefore exactly the predicate `v <= upper_bounds[b]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinCuts {
    upper_bounds: Box<[f64]>,
}

impl BinCuts {
    /// Compute boundaries from a sample of values.
    ///
    /// - `NaN` values are ignored.
    /// - If the sample has at most `max_bins` distinct values, each distinct
    ///   value gets its own bin.
    /// - Otherwise boundaries are equi-depth quantiles of the sample, with
    ///   duplicate boundaries collapsed, giving at most `max_bins` bins.
    pub fn from_values(values: &[f64], max_bins: usize) -> Self {
        let max_bins = max_bins.max(1);
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        sorted.sort_unstable_by(|a, b| a.total_cmp(b));

        let mut distinct = sorted.clone();
        distinct.dedup();

        let mut bounds: Vec<f64> = if distinct.len() <= max_bins {
            distinct
        } else {
            let n = sorted.len();
            let mut raw: Vec<f64> = (1..max_bins)
                .map(|k| k * n / max_bins)
                .filter(|&pos| pos > 0)
                .map(|pos| sorted[pos - 1])
                .collect();
            raw.dedup();
            raw
        };

        // The top bin is open-ended: a bound at the sample maximum is replaced by +inf.
        if let (Some(&last), Some(&max)) = (bounds.last(), sorted.last()) {
            if last >= max {
                bounds.pop();
            }
        }
        bounds.retain(|&b| b < f64::INFINITY);
        bounds.push(f64::INFINITY);

        Self {
            upper_bounds: bounds.into_boxed_slice(),
        }
    }

    /// Create from explicit upper bounds (sorted and deduplicated here).
    ///
    /// `+inf` is appended unless already present.
    pub fn from_upper_bounds(mut upper_bounds: Vec<f64>) -> Self {
        upper_bounds.retain(|b| !b.is_nan());
        upper_bounds.sort_unstable_by(|a, b| a.total_cmp(b));
        upper_bounds.dedup();
        if upper_bounds.last().map_or(true, |&b| b < f64::INFINITY) {
            upper_bounds.push(f64::INFINITY);
        }
        Self {
            upper_bounds: upper_bounds.into_boxed_slice(),
        }
    }

    /// Number of value bins (the missing bin is not counted).
    #[inline]
    pub fn n_bins(&self) -> usize {
        self.upper_bounds.len()
    }

    /// Bin index of a non-missing value.
    #[inline]
    pub fn bin(&self, value: f64) -> usize {
        debug_assert!(!value.is_nan());
        self.upper_bounds.partition_point(|&ub| ub < value)
    }

    /// Upper bound of `bin`; the split threshold for a cut after `bin`.
    #[inline]
    pub fn upper_bound(&self, bin: usize) -> f64 {
        self.upper_bounds[bin]
    }

    /// All upper bounds, ending with `+inf`.
    #[inline]
    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper_bounds
    }
}
