//! Data input abstractions.
//!
//! - [`FeatureSchema`] / [`TargetType`]: what a row looks like, and the per-row
//!   validation performed at the transition boundary
//! - [`BinCuts`]: fixed bin boundaries for continuous features
//! - [`Dataset`] / [`DatasetView`]: in-memory rows and contiguous shards
//! - [`FeatureRow`]: random access to a row's feature values during routing
//!
//! # Missing Values
//!
//! Missing values are represented as `f64::NAN`, for continuous and
//! categorical features alike.

pub mod binned;
mod dataset;
mod schema;
mod traits;

pub use binned::BinCuts;
pub use dataset::{Dataset, DatasetError, DatasetView};
pub use schema::{category_code, FeatureKind, FeatureSchema, FeatureSpec, RowError, TargetType};
pub use traits::FeatureRow;
