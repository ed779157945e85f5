//! Inference for grown trees.
//!
//! # Quick Start
//!
//! ```ignore
//! use treewise::inference::Predictor;
//!
//! let predictor = Predictor::new(&tree);
//! let class = predictor.predict_class(&[1.5, 0.2]);
//! let responses = predictor.predict_batch(features.view(), Parallelism::Parallel);
//! ```

mod predictor;

pub use predictor::Predictor;
