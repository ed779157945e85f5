//! Explainability module.
//!
//! # Feature Importance
//!
//! Importance types supported:
//! - **Split**: number of internal nodes testing each feature
//! - **Gain**: impurity decrease of those nodes, weighted by the fraction of
//!   rows reaching them (`gain · n_node / n_root`)
//! - **AverageGain**: Gain divided by split count
//! - **Cover**: rows reaching the nodes testing each feature
//!
//! # Example
//!
//! ```ignore
//! use treewise::explainability::{compute_importance, ImportanceType};
//!
//! let importance = compute_importance(&tree, ImportanceType::Gain);
//! let top = importance.top_k(3);
//! ```

mod importance;

pub use importance::{compute_importance, FeatureImportance, ImportanceType};
