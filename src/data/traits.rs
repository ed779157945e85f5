//! Row access used by tree routing.

use ndarray::{Array1, ArrayView1};

/// View of a single feature row.
///
/// Routing only needs random access by feature index. Missing values are
/// represented as `f64::NAN`; an index past the end of the row also reads as
/// missing, so routing never panics on short rows.
pub trait FeatureRow {
    /// Number of values stored in this row.
    fn n_values(&self) -> usize;

    /// Value at `feature`, or `NaN` if the row has no such feature.
    fn value(&self, feature: usize) -> f64;
}

impl FeatureRow for [f64] {
    #[inline]
    fn n_values(&self) -> usize {
        self.len()
    }

    #[inline]
    fn value(&self, feature: usize) -> f64 {
        self.get(feature).copied().unwrap_or(f64::NAN)
    }
}

impl FeatureRow for Vec<f64> {
    #[inline]
    fn n_values(&self) -> usize {
        self.len()
    }

    #[inline]
    fn value(&self, feature: usize) -> f64 {
        self.as_slice().value(feature)
    }
}

impl<const N: usize> FeatureRow for [f64; N] {
    #[inline]
    fn n_values(&self) -> usize {
        N
    }

    #[inline]
    fn value(&self, feature: usize) -> f64 {
        self.as_slice().value(feature)
    }
}

impl FeatureRow for ArrayView1<'_, f64> {
    #[inline]
    fn n_values(&self) -> usize {
        self.len()
    }

    #[inline]
    fn value(&self, feature: usize) -> f64 {
        self.get(feature).copied().unwrap_or(f64::NAN)
    }
}

impl FeatureRow for Array1<f64> {
    #[inline]
    fn n_values(&self) -> usize {
        self.len()
    }

    #[inline]
    fn value(&self, feature: usize) -> f64 {
        self.get(feature).copied().unwrap_or(f64::NAN)
    }
}
