//! Tree representation.
//!
//! - [`Tree`]: node arena with growth status and a generation counter
//! - [`Node`] / [`NodeKind`] / [`SplitRule`]: per-node payload and routing
//! - [`NodeStats`] / [`Prediction`]: label statistics and node predictions
//! - [`ExactSum`]: order-independent sums of regression label moments
//! - [`CatBitset`]: category sets for categorical splits

mod categories;
mod exact;
mod node;
mod stats;
mod tree;

pub use categories::CatBitset;
pub use exact::{ExactSum, ParseExactSumError};
pub use node::{LeafStatus, Node, NodeId, NodeKind, SplitRule};
pub use stats::{NodeStats, Prediction};
pub use tree::{Tree, TreeValidationError};

pub(crate) use stats::count_width;
