//! Feature and target schema.
//!
//! The schema is fixed when training starts. It decides how every feature is
//! binned and which rows the per-row transition accepts.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::traits::FeatureRow;

// =============================================================================
// FeatureKind / FeatureSpec
// =============================================================================

/// Whether a feature is continuous or categorical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    /// Ordered numeric feature, split by `value <= threshold`.
    Continuous,
    /// Unordered feature with integer codes `0..n_levels`.
    Categorical { n_levels: u32 },
}

/// Description of a single feature column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    /// Optional display name.
    pub name: Option<String>,
    /// Feature kind.
    pub kind: FeatureKind,
}

impl FeatureSpec {
    /// A named continuous feature.
    pub fn continuous(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            kind: FeatureKind::Continuous,
        }
    }

    /// A named categorical feature with `n_levels` category codes.
    pub fn categorical(name: impl Into<String>, n_levels: u32) -> Self {
        Self {
            name: Some(name.into()),
            kind: FeatureKind::Categorical { n_levels },
        }
    }

    /// Returns true for categorical features.
    #[inline]
    pub fn is_categorical(&self) -> bool {
        matches!(self.kind, FeatureKind::Categorical { .. })
    }
}

// =============================================================================
// FeatureSchema
// =============================================================================

/// Ordered list of feature descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureSchema {
    features: Vec<FeatureSpec>,
}

impl FeatureSchema {
    /// Create a schema from feature specs.
    pub fn new(features: Vec<FeatureSpec>) -> Self {
        Self { features }
    }

    /// Schema of `n` unnamed continuous features.
    pub fn all_continuous(n: usize) -> Self {
        let features = (0..n)
            .map(|_| FeatureSpec {
                name: None,
                kind: FeatureKind::Continuous,
            })
            .collect();
        Self { features }
    }

    /// Number of features.
    #[inline]
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Returns true if the schema has no features.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Spec for feature `idx`.
    #[inline]
    pub fn feature(&self, idx: usize) -> &FeatureSpec {
        &self.features[idx]
    }

    /// Iterate over feature specs.
    pub fn iter(&self) -> impl Iterator<Item = &FeatureSpec> {
        self.features.iter()
    }

    /// Display names, falling back to `x{idx}` for unnamed features.
    pub fn names(&self) -> Vec<String> {
        self.features
            .iter()
            .enumerate()
            .map(|(i, f)| f.name.clone().unwrap_or_else(|| format!("x{i}")))
            .collect()
    }

    /// Check that a row matches the schema.
    ///
    /// Rejects rows with the wrong number of values and categorical values that
    /// are not a known category code. `NaN` is accepted everywhere as missing.
    pub fn validate_row<R: FeatureRow + ?Sized>(&self, row: &R) -> Result<(), RowError> {
        if row.n_values() != self.features.len() {
            return Err(RowError::Arity {
                expected: self.features.len(),
                got: row.n_values(),
            });
        }
        for (feature, spec) in self.features.iter().enumerate() {
            if let FeatureKind::Categorical { n_levels } = spec.kind {
                let value = row.value(feature);
                if value.is_nan() {
                    continue;
                }
                match category_code(value) {
                    Some(code) if code < n_levels => {}
                    _ => {
                        return Err(RowError::UnknownCategory {
                            feature,
                            value,
                            n_levels,
                        })
                    }
                }
            }
        }
        Ok(())
    }
}

/// Convert a feature value to a category code.
///
/// Returns `None` for negative, fractional, non-finite or too-large values.
#[inline]
pub fn category_code(value: f64) -> Option<u32> {
    if value >= 0.0 && value <= u32::MAX as f64 && value.fract() == 0.0 {
        Some(value as u32)
    } else {
        None
    }
}

// =============================================================================
// TargetType
// =============================================================================

/// Kind of response being modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetType {
    /// Class labels `0..n_classes`.
    Classification { n_classes: u32 },
    /// Real-valued response.
    Regression,
}

impl TargetType {
    /// Returns true for classification targets.
    #[inline]
    pub fn is_classification(self) -> bool {
        matches!(self, TargetType::Classification { .. })
    }

    /// Number of classes (0 for regression).
    #[inline]
    pub fn n_classes(self) -> usize {
        match self {
            TargetType::Classification { n_classes } => n_classes as usize,
            TargetType::Regression => 0,
        }
    }

    /// Check that a target value is acceptable for this target type.
    pub fn validate_target(self, target: f64) -> Result<(), RowError> {
        if !target.is_finite() {
            return Err(RowError::NonFiniteTarget(target));
        }
        if let TargetType::Classification { n_classes } = self {
            match category_code(target) {
                Some(class) if class < n_classes => {}
                _ => {
                    return Err(RowError::InvalidClass {
                        value: target,
                        n_classes,
                    })
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetType::Classification { n_classes } => {
                write!(f, "classification ({n_classes} classes)")
            }
            TargetType::Regression => write!(f, "regression"),
        }
    }
}

// =============================================================================
// RowError
// =============================================================================

/// A row rejected at the per-row transition boundary.
///
/// The accumulator is left untouched when a row is rejected; the host decides
/// whether to skip the row or abort the pass.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowError {
    #[error("row has {got} feature values, schema expects {expected}")]
    Arity { expected: usize, got: usize },

    #[error("feature {feature}: value {value} is not a category code in 0..{n_levels}")]
    UnknownCategory {
        feature: usize,
        value: f64,
        n_levels: u32,
    },

    #[error("target {value} is not a class label in 0..{n_classes}")]
    InvalidClass { value: f64, n_classes: u32 },

    #[error("target {0} is not finite")]
    NonFiniteTarget(f64),

    #[error("accumulator was built for tree generation {expected}, got generation {got}")]
    StaleSnapshot { expected: u64, got: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(vec![
            FeatureSpec::continuous("age"),
            FeatureSpec::categorical("color", 3),
        ])
    }

    #[test]
    fn accepts_valid_rows_and_missing_values() {
        let schema = schema();
        assert!(schema.validate_row(&[1.5, 2.0][..]).is_ok());
        assert!(schema.validate_row(&[f64::NAN, f64::NAN][..]).is_ok());
    }

    #[test]
    fn rejects_wrong_arity() {
        let err = schema().validate_row(&[1.0][..]).unwrap_err();
        assert_eq!(err, RowError::Arity { expected: 2, got: 1 });
    }

    #[test]
    fn rejects_out_of_domain_category() {
        let schema = schema();
        assert!(matches!(
            schema.validate_row(&[1.0, 3.0][..]),
            Err(RowError::UnknownCategory { feature: 1, .. })
        ));
        assert!(matches!(
            schema.validate_row(&[1.0, 0.5][..]),
            Err(RowError::UnknownCategory { feature: 1, .. })
        ));
        assert!(matches!(
            schema.validate_row(&[1.0, -1.0][..]),
            Err(RowError::UnknownCategory { feature: 1, .. })
        ));
    }

    #[test]
    fn validates_targets() {
        let clf = TargetType::Classification { n_classes: 2 };
        assert!(clf.validate_target(1.0).is_ok());
        assert!(clf.validate_target(2.0).is_err());
        assert!(clf.validate_target(0.5).is_err());
        assert!(TargetType::Regression.validate_target(-3.25).is_ok());
        assert_eq!(
            TargetType::Regression.validate_target(f64::NAN).map_err(|e| matches!(e, RowError::NonFiniteTarget(_))),
            Err(true)
        );
    }

    #[test]
    fn names_fall_back_to_index() {
        let schema = FeatureSchema::all_continuous(2);
        assert_eq!(schema.names(), vec!["x0".to_string(), "x1".to_string()]);
    }
}
