//! Histogram accumulation for level-wise growth.
//!
//! - [`HistogramLayout`]: fixed binning of every feature, shared by all
//!   shards of a training run
//! - [`LeafHistogram`]: flat per-feature bin statistics of one leaf
//! - [`Accumulator`]: per-leaf histograms of one data pass, with the
//!   per-row transition and the associative merge

mod accumulator;
mod layout;

pub use accumulator::{Accumulator, AccumulatorError, LeafHistogram};
pub use layout::{FeatureBinning, FeatureMeta, HistogramLayout};
