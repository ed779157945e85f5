//! Binning of continuous features.
//!
//! - [`BinCuts`] - Fixed per-feature bin boundaries computed once per training run

mod cuts;

pub use cuts::BinCuts;
