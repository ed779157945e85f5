//! Testing utilities for treewise.
//!
//! This module provides assertion helpers and small synthetic datasets that
//! can be used in both unit tests and integration tests.
//!
//! ```ignore
//! use treewise::testing::{assert_predictions_eq, two_clusters};
//! ```

use approx::AbsDiffEq;
use ndarray::{Array1, Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::data::Dataset;

// =============================================================================
// Constants
// =============================================================================

/// Default tolerance for floating point comparisons.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

// =============================================================================
// Floating Point Assertions
// =============================================================================

/// Assert that two f64 values are approximately equal.
///
/// Uses absolute difference with [`DEFAULT_TOLERANCE`] unless a tolerance is
/// given.
///
/// # Examples
///
/// ```
/// # use treewise::assert_approx_eq;
/// assert_approx_eq!(0.1 + 0.2, 0.3);
/// assert_approx_eq!(1.0, 1.0001, 0.001);
/// ```
///
/// # Panics
///
/// Panics if the absolute difference exceeds tolerance.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr $(,)?) => {
        $crate::assert_approx_eq!($left, $right, $crate::testing::DEFAULT_TOLERANCE)
    };
    ($left:expr, $right:expr, $tolerance:expr) => {{
        let left_val: f64 = $left;
        let right_val: f64 = $right;
        let tol: f64 = $tolerance;
        let diff = (left_val - right_val).abs();
        if !(diff <= tol) {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`\n right: `{:?}`\n  diff: `{:?}` > tolerance `{:?}`",
                left_val, right_val, diff, tol
            );
        }
    }};
    ($left:expr, $right:expr, $tolerance:expr, $($arg:tt)+) => {{
        let left_val: f64 = $left;
        let right_val: f64 = $right;
        let tol: f64 = $tolerance;
        let diff = (left_val - right_val).abs();
        if !(diff <= tol) {
            panic!(
                "assertion failed: `(left ≈ right)` - {}\n  left: `{:?}`\n right: `{:?}`\n  diff: `{:?}` > tolerance `{:?}`",
                format_args!($($arg)+), left_val, right_val, diff, tol
            );
        }
    }};
}

/// Assert that two slices are approximately equal element-wise.
///
/// # Panics
///
/// Panics if lengths differ or any element differs by more than tolerance.
pub fn assert_slice_approx_eq(actual: &[f64], expected: &[f64], tolerance: f64, context: &str) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "{context}: length mismatch - got {}, expected {}",
        actual.len(),
        expected.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert!(
            a.abs_diff_eq(e, tolerance),
            "{context}[{i}]: {a} ≠ {e} (diff={}, tolerance={tolerance})",
            (a - e).abs()
        );
    }
}

// =============================================================================
// Prediction Assertions
// =============================================================================

/// Git-style diff of the rows that differ.
fn diff_predictions(actual: ArrayView2<f64>, expected: ArrayView2<f64>, epsilon: f64) -> String {
    let mut result = String::new();
    let (rows, cols) = actual.dim();
    result.push_str(&format!("Shape: ({rows}, {cols})\n"));
    result.push_str(&format!("Epsilon: {epsilon:.0e}\n\n"));

    for (i, (act_row, exp_row)) in actual.rows().into_iter().zip(expected.rows()).enumerate() {
        let row_differs = act_row
            .iter()
            .zip(exp_row.iter())
            .any(|(a, e)| !a.abs_diff_eq(e, epsilon));
        if !row_differs {
            continue;
        }

        result.push_str(&format!("[{i:3}] -"));
        for val in exp_row {
            result.push_str(&format!(" {val:>12.6}"));
        }
        result.push_str("  (expected)\n");

        result.push_str("      +");
        for val in act_row {
            result.push_str(&format!(" {val:>12.6}"));
        }
        result.push_str("  (actual)\n");
    }

    result
}

/// Assert that two prediction matrices are approximately equal.
///
/// On failure, shows a diff of the differing rows.
///
/// # Panics
///
/// Panics if shapes differ or if any value differs by more than epsilon.
pub fn assert_predictions_eq(
    actual: ArrayView2<f64>,
    expected: ArrayView2<f64>,
    epsilon: f64,
    context: &str,
) {
    if actual.dim() != expected.dim() {
        panic!(
            "\n{context}: shape mismatch\n- {:?}  (expected)\n+ {:?}  (actual)\n",
            expected.dim(),
            actual.dim()
        );
    }

    let diff_count = actual
        .iter()
        .zip(expected.iter())
        .filter(|(a, e)| !a.abs_diff_eq(e, epsilon))
        .count();
    if diff_count > 0 {
        let total = actual.len();
        let diff_output = diff_predictions(actual, expected, epsilon);
        panic!("\n{context}: {diff_count}/{total} values differ\n\n{diff_output}");
    }
}

// =============================================================================
// Synthetic Data
// =============================================================================

/// Binary classification with two overlapping clusters on feature 0.
///
/// Feature 1 is noise. About 5% of feature values are missing. Values are
/// rounded to one decimal so that ties occur.
pub fn two_clusters(n_rows: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut features = Array2::zeros((n_rows, 2));
    let mut targets = Array1::zeros(n_rows);

    for i in 0..n_rows {
        let label = rng.gen_bool(0.5);
        let center = if label { 6.0 } else { 3.0 };
        features[[i, 0]] = round1(center + rng.gen_range(-2.5..2.5));
        features[[i, 1]] = round1(rng.gen_range(0.0..10.0));
        for j in 0..2 {
            if rng.gen_bool(0.05) {
                features[[i, j]] = f64::NAN;
            }
        }
        targets[i] = label as u8 as f64;
    }

    dataset(features, targets)
}

/// Regression with a step response on feature 0.
///
/// `y = 2` below 5, `y = 10` above, plus uniform noise in `[-1, 1)`. Feature 1
/// is noise.
pub fn step_regression(n_rows: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut features = Array2::zeros((n_rows, 2));
    let mut targets = Array1::zeros(n_rows);

    for i in 0..n_rows {
        let x = round1(rng.gen_range(0.0..10.0));
        features[[i, 0]] = x;
        features[[i, 1]] = round1(rng.gen_range(0.0..10.0));
        let base = if x < 5.0 { 2.0 } else { 10.0 };
        targets[i] = base + rng.gen_range(-1.0..1.0);
    }

    dataset(features, targets)
}

/// Classification over a categorical feature 0 with `n_levels` codes.
///
/// The label is the code modulo `n_classes`, flipped to a random class with
/// probability 0.1. Feature 1 is continuous noise.
pub fn categorical_labels(n_rows: usize, n_levels: u32, n_classes: u32, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut features = Array2::zeros((n_rows, 2));
    let mut targets = Array1::zeros(n_rows);

    for i in 0..n_rows {
        let code = rng.gen_range(0..n_levels);
        features[[i, 0]] = code as f64;
        features[[i, 1]] = round1(rng.gen_range(0.0..1.0));
        let label = if rng.gen_bool(0.1) {
            rng.gen_range(0..n_classes)
        } else {
            code % n_classes
        };
        targets[i] = label as f64;
    }

    dataset(features, targets)
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn dataset(features: Array2<f64>, targets: Array1<f64>) -> Dataset {
    match Dataset::new(features, targets) {
        Ok(data) => data,
        Err(e) => panic!("synthetic dataset is inconsistent: {e}"),
    }
}
