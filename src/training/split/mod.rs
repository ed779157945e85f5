//! Split evaluation: impurity criteria, gain and the best-split search.

mod finder;
mod gain;

pub use finder::{SplitCandidate, SplitFinder};
pub use gain::{GainParams, Impurity, GAIN_EPSILON};
