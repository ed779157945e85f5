//! Level-wise tree training.
//!
//! The core is a reduction interface that any parallel harness can drive:
//!
//! - [`TreeLearner::initialize`]: validate configuration, fix binning and
//!   create the single-leaf tree
//! - [`Accumulator::accumulate`]: per-row transition against a tree snapshot
//! - [`Accumulator::merge`]: associative, commutative combination of shard
//!   accumulators
//! - [`TreeLearner::apply`]: grow one level from the merged statistics
//!
//! [`DecisionTreeTrainer`] is a reference host that drives this cycle over
//! in-memory shards, and [`prune`] applies cost-complexity pruning to the
//! finished tree.
//!
//! # Example
//!
//! ```
//! use ndarray::array;
//! use treewise::data::{FeatureSchema, TargetType};
//! use treewise::training::{TreeLearner, TreeParams};
//!
//! let x = array![[1.0], [2.0], [8.0], [9.0]];
//! let y = [0.0, 0.0, 1.0, 1.0];
//! let params = TreeParams::builder().min_split(2).min_bucket(1).build().unwrap();
//! let target = TargetType::Classification { n_classes: 2 };
//! let (learner, mut tree) =
//!     TreeLearner::initialize(FeatureSchema::all_continuous(1), target, params, x.view()).unwrap();
//!
//! loop {
//!     let mut acc = learner.accumulator(&tree);
//!     for (row, &label) in x.rows().into_iter().zip(&y) {
//!         acc.accumulate(&tree, &row, label).unwrap();
//!     }
//!     if learner.apply(&mut tree, &acc).unwrap().is_finished() {
//!         break;
//!     }
//! }
//! assert_eq!(tree.n_leaves(), 2);
//! ```

mod grower;
pub mod histograms;
mod params;
mod prune;
pub mod split;
mod trainer;

pub use grower::{GrowthStatus, LevelOutcome, TreeLearner};
pub use histograms::{Accumulator, AccumulatorError, HistogramLayout, LeafHistogram};
pub use params::{ConfigError, RowErrorPolicy, TreeParams, MAX_DEPTH_LIMIT};
pub use prune::prune;
pub use split::{GainParams, Impurity, SplitCandidate, SplitFinder};
pub use trainer::{DecisionTreeTrainer, TrainError, TrainingReport};
