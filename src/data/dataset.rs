//! In-memory dataset and shard views.
//!
//! The core algorithm only needs a stream of `(row, target)` pairs per shard.
//! [`Dataset`] is the convenience container used by the reference training
//! host, tests and benchmarks: a row-major feature matrix plus a target vector
//! that can be cut into contiguous row-range shards.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Dataset conversion/validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatasetError {
    #[error("number of targets ({targets}) does not match number of rows ({rows})")]
    TargetLenMismatch { rows: usize, targets: usize },

    #[error("row {row} has {got} values, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        got: usize,
    },
}

// =============================================================================
// Dataset
// =============================================================================

/// Row-major feature matrix with one target per row.
///
/// Missing feature values are `NaN`. Categorical features hold integer codes.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Array2<f64>,
    targets: Array1<f64>,
}

impl Dataset {
    /// Create a dataset from a feature matrix (`n_rows x n_features`) and targets.
    pub fn new(features: Array2<f64>, targets: Array1<f64>) -> Result<Self, DatasetError> {
        if features.nrows() != targets.len() {
            return Err(DatasetError::TargetLenMismatch {
                rows: features.nrows(),
                targets: targets.len(),
            });
        }
        let features = if features.is_standard_layout() {
            features
        } else {
            features.as_standard_layout().into_owned()
        };
        Ok(Self { features, targets })
    }

    /// Create a dataset from row vectors.
    pub fn from_rows(rows: &[Vec<f64>], targets: Vec<f64>) -> Result<Self, DatasetError> {
        let n_features = rows.first().map_or(0, Vec::len);
        let mut flat = Vec::with_capacity(rows.len() * n_features);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != n_features {
                return Err(DatasetError::RaggedRows {
                    row,
                    expected: n_features,
                    got: values.len(),
                });
            }
            flat.extend_from_slice(values);
        }
        let features = Array2::from_shape_vec((rows.len(), n_features), flat).map_err(|_| {
            DatasetError::RaggedRows {
                row: 0,
                expected: n_features,
                got: 0,
            }
        })?;
        Self::new(features, Array1::from(targets))
    }

    /// Number of rows.
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    /// Number of features.
    #[inline]
    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Feature matrix view.
    #[inline]
    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    /// Target vector view.
    #[inline]
    pub fn targets(&self) -> ArrayView1<'_, f64> {
        self.targets.view()
    }

    /// View of the whole dataset as a single shard.
    pub fn view(&self) -> DatasetView<'_> {
        DatasetView {
            features: self.features.view(),
            targets: self.targets.view(),
            start: 0,
        }
    }

    /// Split rows into `n_shards` contiguous, near-equal shards.
    ///
    /// `n_shards` is clamped to at least 1. With more shards than rows, the
    /// trailing shards are empty.
    pub fn shards(&self, n_shards: usize) -> Vec<DatasetView<'_>> {
        let n_shards = n_shards.max(1);
        let n = self.n_rows();
        (0..n_shards)
            .map(|i| {
                let start = i * n / n_shards;
                let end = (i + 1) * n / n_shards;
                self.range(start, end)
            })
            .collect()
    }

    /// Split rows at explicit boundaries (each boundary is clamped to `n_rows`).
    pub fn shards_at(&self, boundaries: &[usize]) -> Vec<DatasetView<'_>> {
        let n = self.n_rows();
        let mut cuts: Vec<usize> = boundaries.iter().map(|&b| b.min(n)).collect();
        cuts.sort_unstable();
        let mut shards = Vec::with_capacity(cuts.len() + 1);
        let mut start = 0;
        for end in cuts.into_iter().chain(std::iter::once(n)) {
            shards.push(self.range(start, end));
            start = end;
        }
        shards
    }

    fn range(&self, start: usize, end: usize) -> DatasetView<'_> {
        DatasetView {
            features: self.features.slice(s![start..end, ..]),
            targets: self.targets.slice(s![start..end]),
            start,
        }
    }
}

// =============================================================================
// DatasetView
// =============================================================================

/// A contiguous range of rows of a [`Dataset`].
#[derive(Debug, Clone, Copy)]
pub struct DatasetView<'a> {
    features: ArrayView2<'a, f64>,
    targets: ArrayView1<'a, f64>,
    start: usize,
}

impl<'a> DatasetView<'a> {
    /// Create a view from raw parts. `start` is the global index of the first row.
    pub fn from_parts(
        features: ArrayView2<'a, f64>,
        targets: ArrayView1<'a, f64>,
        start: usize,
    ) -> Result<Self, DatasetError> {
        if features.nrows() != targets.len() {
            return Err(DatasetError::TargetLenMismatch {
                rows: features.nrows(),
                targets: targets.len(),
            });
        }
        Ok(Self {
            features,
            targets,
            start,
        })
    }

    /// Number of rows in this view.
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    /// Number of features.
    #[inline]
    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Global index of the first row.
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Feature matrix view.
    #[inline]
    pub fn features(&self) -> ArrayView2<'a, f64> {
        self.features
    }

    /// Target vector view.
    #[inline]
    pub fn targets(&self) -> ArrayView1<'a, f64> {
        self.targets
    }

    /// Values of feature `col` for every row in the view.
    #[inline]
    pub fn column(&self, col: usize) -> ArrayView1<'a, f64> {
        self.features.index_axis_move(Axis(1), col)
    }

    /// Iterate over `(row, target)` pairs.
    pub fn rows(&self) -> impl Iterator<Item = (ArrayView1<'a, f64>, f64)> + 'a {
        let features = self.features;
        let targets = self.targets;
        (0..self.n_rows()).map(move |i| (features.index_axis_move(Axis(0), i), targets[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rejects_target_length_mismatch() {
        let err = Dataset::new(array![[1.0], [2.0]], array![1.0]).unwrap_err();
        assert_eq!(err, DatasetError::TargetLenMismatch { rows: 2, targets: 1 });
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = Dataset::from_rows(&[vec![1.0, 2.0], vec![3.0]], vec![0.0, 1.0]).unwrap_err();
        assert!(matches!(err, DatasetError::RaggedRows { row: 1, .. }));
    }

    #[test]
    fn shards_cover_all_rows_in_order() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let ds = Dataset::from_rows(&rows, targets).unwrap();

        let shards = ds.shards(3);
        assert_eq!(shards.len(), 3);
        assert_eq!(shards.iter().map(DatasetView::n_rows).sum::<usize>(), 10);
        assert_eq!(shards[1].start(), shards[0].n_rows());

        let flattened: Vec<f64> = shards
            .iter()
            .flat_map(|s| s.rows().map(|(_, y)| y).collect::<Vec<_>>())
            .collect();
        assert_eq!(flattened, (0..10).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn more_shards_than_rows_yields_empty_shards() {
        let ds = Dataset::from_rows(&[vec![1.0], vec![2.0]], vec![0.0, 1.0]).unwrap();
        let shards = ds.shards(5);
        assert_eq!(shards.len(), 5);
        assert_eq!(shards.iter().filter(|s| s.n_rows() == 0).count(), 3);
    }

    #[test]
    fn explicit_boundaries() {
        let rows: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let ds = Dataset::from_rows(&rows, vec![0.0; 6]).unwrap();
        let shards = ds.shards_at(&[4, 1, 99]);
        let sizes: Vec<usize> = shards.iter().map(DatasetView::n_rows).collect();
        assert_eq!(sizes, vec![1, 3, 2, 0]);
    }
}
