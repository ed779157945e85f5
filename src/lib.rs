//! treewise: level-wise CART decision trees from mergeable statistics.
//!
//! A tree is grown one breadth-first level per pass over the data. Each pass
//! feeds rows into per-shard histogram accumulators, merges them with an
//! associative, commutative reduction, and applies the best split to every
//! open leaf. Any partitioning of the rows into shards yields the same tree.
//!
//! # Key Types
//!
//! - [`TreeLearner`] - initialize and apply one growth level
//! - [`Accumulator`] - per-row transition and pairwise merge
//! - [`DecisionTreeTrainer`] - reference host over in-memory shards
//! - [`Tree`] / [`Predictor`] - grown tree and prediction
//! - [`TreeRecords`] / [`render_text`] - persistence and rendering
//!
//! # Training
//!
//! ```
//! use treewise::{DecisionTreeTrainer, FeatureSchema, Predictor, TargetType, TreeParams};
//! use treewise::data::Dataset;
//!
//! let data = Dataset::from_rows(
//!     &[vec![1.0], vec![2.0], vec![8.0], vec![9.0]],
//!     vec![0.0, 0.0, 1.0, 1.0],
//! )
//! .unwrap();
//! let params = TreeParams::builder().min_split(2).min_bucket(1).build().unwrap();
//! let trainer = DecisionTreeTrainer::new(
//!     FeatureSchema::all_continuous(1),
//!     TargetType::Classification { n_classes: 2 },
//!     params,
//! );
//! let tree = trainer.fit(&data).unwrap();
//! assert_eq!(Predictor::new(&tree).predict_class(&[8.5]), Some(1));
//! ```

// Re-export approx traits for users who want to compare predictions
pub use approx;

pub mod data;
pub mod explainability;
pub mod inference;
pub mod io;
pub mod repr;
pub mod testing;
pub mod training;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use data::{Dataset, FeatureKind, FeatureSchema, FeatureSpec, RowError, TargetType};
pub use explainability::{compute_importance, FeatureImportance, ImportanceType};
pub use inference::Predictor;
pub use io::{render_text, ReadError, RenderOptions, TreeRecords};
pub use repr::{NodeId, Prediction, SplitRule, Tree};
pub use training::{
    Accumulator, ConfigError, DecisionTreeTrainer, GrowthStatus, Impurity, LevelOutcome,
    TrainError, TreeLearner, TreeParams,
};
pub use utils::Parallelism;
