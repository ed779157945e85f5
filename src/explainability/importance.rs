//! Split-based feature importance.

use serde::{Deserialize, Serialize};

use crate::repr::Tree;

/// What to aggregate per feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceType {
    Split,
    #[default]
    Gain,
    AverageGain,
    Cover,
}

/// Per-feature importance values, indexed by feature.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureImportance {
    kind: ImportanceType,
    values: Vec<f64>,
}

impl FeatureImportance {
    #[inline]
    pub fn kind(&self) -> ImportanceType {
        self.kind
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn get(&self, feature: usize) -> f64 {
        self.values.get(feature).copied().unwrap_or(0.0)
    }

    /// Values scaled to sum to 1. All zeros when nothing was split.
    pub fn normalized(&self) -> Vec<f64> {
        let total: f64 = self.values.iter().sum();
        if total <= 0.0 {
            return vec![0.0; self.values.len()];
        }
        self.values.iter().map(|v| v / total).collect()
    }

    /// The `k` most important features as `(feature, value)`, highest first.
    /// Ties are ordered by feature index; zero-importance features are
    /// skipped.
    pub fn top_k(&self, k: usize) -> Vec<(usize, f64)> {
        let mut ranked: Vec<(usize, f64)> = self
            .values
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, v)| v > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(k);
        ranked
    }
}

/// Aggregate importance over the internal nodes of `tree`.
pub fn compute_importance(tree: &Tree, kind: ImportanceType) -> FeatureImportance {
    let n_features = tree.n_features();
    let n_root = tree.root().stats().n_rows() as f64;
    let mut values = vec![0.0; n_features];
    let mut splits = vec![0u32; n_features];

    for node in tree.nodes() {
        let (Some(split), Some(gain)) = (node.split(), node.gain()) else {
            continue;
        };
        let feature = split.feature();
        let n_node = node.stats().n_rows() as f64;
        splits[feature] += 1;
        values[feature] += match kind {
            ImportanceType::Split => 1.0,
            ImportanceType::Gain | ImportanceType::AverageGain if n_root > 0.0 => {
                gain * n_node / n_root
            }
            ImportanceType::Gain | ImportanceType::AverageGain => 0.0,
            ImportanceType::Cover => n_node,
        };
    }

    if kind == ImportanceType::AverageGain {
        for (value, &count) in values.iter_mut().zip(&splits) {
            if count > 0 {
                *value /= count as f64;
            }
        }
    }

    FeatureImportance { kind, values }
}
