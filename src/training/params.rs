//! Tree growth hyperparameters with builder pattern.
//!
//! [`TreeParams`] is validated when built, and again against the target type
//! when a learner is initialized, so every configuration error surfaces
//! before the first data pass.
//!
//! # Example
//!
//! ```
//! use treewise::training::{Impurity, TreeParams};
//!
//! // All defaults
//! let params = TreeParams::builder().build().unwrap();
//! assert_eq!(params.max_depth, 10);
//!
//! let params = TreeParams::builder()
//!     .criterion(Impurity::Entropy)
//!     .max_depth(4)
//!     .min_split(2)
//!     .min_bucket(1)
//!     .build()
//!     .unwrap();
//! ```

use bon::Builder;
use serde::{Deserialize, Serialize};

use super::split::Impurity;
use crate::data::TargetType;
use crate::utils::Parallelism;

/// Largest accepted `max_depth`.
pub const MAX_DEPTH_LIMIT: u32 = 100;

// =============================================================================
// ConfigError
// =============================================================================

/// Errors detected at initialization, before any data pass.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_depth must be at most {MAX_DEPTH_LIMIT}, got {0}")]
    InvalidMaxDepth(u32),

    #[error("min_split must be at least 1")]
    InvalidMinSplit,

    #[error("min_bucket must be at least 1")]
    InvalidMinBucket,

    #[error("max_bins must be at least 2, got {0}")]
    InvalidMaxBins(usize),

    #[error("max_nodes must be at least 1")]
    InvalidMaxNodes,

    #[error("{field} must be finite and non-negative, got {value}")]
    InvalidThreshold { field: &'static str, value: f64 },

    #[error("criterion {criterion} cannot be used for {target}")]
    CriterionMismatch {
        criterion: Impurity,
        target: TargetType,
    },

    #[error("classification needs at least 2 classes, got {0}")]
    TooFewClasses(u32),

    #[error("feature schema is empty")]
    EmptySchema,

    #[error("categorical feature {feature} has no levels")]
    NoCategoryLevels { feature: usize },

    #[error("sample has {got} columns, schema has {expected} features")]
    SampleArity { expected: usize, got: usize },

    #[error("bin cuts for feature {feature} do not match its kind")]
    CutsMismatch { feature: usize },
}

// =============================================================================
// RowErrorPolicy
// =============================================================================

/// What the reference trainer does with rows rejected at the transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowErrorPolicy {
    /// Stop training and return the error.
    #[default]
    Abort,
    /// Skip the row and keep going.
    Skip,
}

// =============================================================================
// TreeParams
// =============================================================================

/// Hyperparameters for level-wise tree growth.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct TreeParams {
    /// Impurity criterion. `None` picks Gini (classification) or MSE (regression).
    pub criterion: Option<Impurity>,

    /// Maximum depth of any node (root = 0). Default: 10.
    #[builder(default = 10)]
    pub max_depth: u32,

    /// Minimum rows in a node for it to be split. Default: 20.
    #[builder(default = 20)]
    pub min_split: u64,

    /// Minimum rows in any child. `None` uses `round(min_split / 3)`, at least 1.
    pub min_bucket: Option<u64>,

    /// Maximum bins per continuous feature. Default: 100.
    #[builder(default = 100)]
    pub max_bins: usize,

    /// Minimum impurity decrease for a split. Default: 0.
    #[builder(default = 0.0)]
    pub min_gain: f64,

    /// Maximum number of nodes in the tree. `None` is unbounded.
    pub max_nodes: Option<usize>,

    /// Complexity parameter for cost-complexity pruning. Default: 0 (off).
    #[builder(default = 0.0)]
    pub cp: f64,

    /// Handling of invalid rows by the reference trainer. Default: `Abort`.
    #[builder(default)]
    pub row_error_policy: RowErrorPolicy,

    /// Shard-level parallelism of the reference trainer. Default: `Sequential`.
    #[builder(default)]
    pub parallelism: Parallelism,
}

/// Custom finishing function that validates the parameters.
impl<S: tree_params_builder::IsComplete> TreeParamsBuilder<S> {
    /// Build and validate the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for out-of-range values.
    pub fn build(self) -> Result<TreeParams, ConfigError> {
        let params = self.__build_internal();
        params.validate()?;
        Ok(params)
    }
}

impl TreeParams {
    /// Validate target-independent ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth > MAX_DEPTH_LIMIT {
            return Err(ConfigError::InvalidMaxDepth(self.max_depth));
        }
        if self.min_split == 0 {
            return Err(ConfigError::InvalidMinSplit);
        }
        if self.min_bucket == Some(0) {
            return Err(ConfigError::InvalidMinBucket);
        }
        if self.max_bins < 2 {
            return Err(ConfigError::InvalidMaxBins(self.max_bins));
        }
        if self.max_nodes == Some(0) {
            return Err(ConfigError::InvalidMaxNodes);
        }
        for (field, value) in [("min_gain", self.min_gain), ("cp", self.cp)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidThreshold { field, value });
            }
        }
        Ok(())
    }

    /// Validate against a target type.
    pub fn validate_for(&self, target: TargetType) -> Result<(), ConfigError> {
        self.validate()?;
        if let TargetType::Classification { n_classes } = target {
            if n_classes < 2 {
                return Err(ConfigError::TooFewClasses(n_classes));
            }
        }
        let criterion = self.criterion_for(target);
        if !criterion.supports(target) {
            return Err(ConfigError::CriterionMismatch { criterion, target });
        }
        Ok(())
    }

    /// Criterion used for `target`.
    pub fn criterion_for(&self, target: TargetType) -> Impurity {
        self.criterion.unwrap_or_else(|| Impurity::default_for(target))
    }

    /// Minimum rows per child after applying the default rule.
    pub fn effective_min_bucket(&self) -> u64 {
        self.min_bucket
            .unwrap_or_else(|| ((self.min_split as f64 / 3.0).round() as u64).max(1))
    }
}

impl Default for TreeParams {
    fn default() -> Self {
        Self::builder().build().expect("default params are valid")
    }
}
