//! Flat histogram layout shared by every accumulator of one training run.
//!
//! All feature histograms of a leaf live in one flat array. Feature `f`
//! owns bins `offset..offset + n_bins`, where the last bin always collects
//! missing values:
//!
//! ```text
//! | f0 value bins | f0 missing | f1 value bins | f1 missing | ...
//! ```
//!
//! Each bin stores `count_width` counts (one per class, or a single row
//! count for regression) and, for regression, `(sum, sum_sq)`.

use serde::{Deserialize, Serialize};

use crate::data::{category_code, BinCuts, FeatureKind, FeatureSchema, TargetType};
use crate::repr::count_width;
use crate::training::params::ConfigError;

/// How one feature's values map to histogram bins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureBinning {
    /// Fixed upper-bound bins.
    Continuous(BinCuts),
    /// One bin per category code.
    Categorical { n_levels: u32 },
}

impl FeatureBinning {
    /// Number of value bins (the missing bin is not counted).
    #[inline]
    pub fn n_value_bins(&self) -> usize {
        match self {
            FeatureBinning::Continuous(cuts) => cuts.n_bins(),
            FeatureBinning::Categorical { n_levels } => *n_levels as usize,
        }
    }
}

/// Location of a feature's bins in the flat histogram.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureMeta {
    /// First bin of the feature.
    pub offset: u32,
    /// Number of bins, including the trailing missing bin.
    pub n_bins: u32,
}

impl FeatureMeta {
    /// Local index of the missing bin.
    #[inline]
    pub fn missing_bin(&self) -> usize {
        self.n_bins as usize - 1
    }
}

/// Schema, target type and fixed binning of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramLayout {
    schema: FeatureSchema,
    target: TargetType,
    binning: Vec<FeatureBinning>,
    metas: Vec<FeatureMeta>,
    total_bins: usize,
}

impl HistogramLayout {
    /// Build a layout. `binning` must have one entry per schema feature, with
    /// `Continuous` cuts for continuous features and the schema's level count
    /// for categorical ones.
    pub fn new(
        schema: FeatureSchema,
        target: TargetType,
        binning: Vec<FeatureBinning>,
    ) -> Result<Self, ConfigError> {
        if binning.len() != schema.n_features() {
            return Err(ConfigError::SampleArity {
                expected: schema.n_features(),
                got: binning.len(),
            });
        }
        let mut metas = Vec::with_capacity(binning.len());
        let mut offset = 0usize;
        for (feature, (spec, bins)) in schema.iter().zip(&binning).enumerate() {
            let consistent = match (spec.kind, bins) {
                (FeatureKind::Continuous, FeatureBinning::Continuous(_)) => true,
                (FeatureKind::Categorical { n_levels }, FeatureBinning::Categorical { n_levels: b }) => {
                    n_levels == *b
                }
                _ => false,
            };
            if !consistent {
                return Err(ConfigError::CutsMismatch { feature });
            }
            let n_bins = bins.n_value_bins() + 1;
            metas.push(FeatureMeta {
                offset: offset as u32,
                n_bins: n_bins as u32,
            });
            offset += n_bins;
        }
        Ok(Self {
            schema,
            target,
            binning,
            metas,
            total_bins: offset,
        })
    }

    #[inline]
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    #[inline]
    pub fn target(&self) -> TargetType {
        self.target
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.metas.len()
    }

    #[inline]
    pub fn binning(&self, feature: usize) -> &FeatureBinning {
        &self.binning[feature]
    }

    #[inline]
    pub fn meta(&self, feature: usize) -> FeatureMeta {
        self.metas[feature]
    }

    /// Total bins across all features.
    #[inline]
    pub fn total_bins(&self) -> usize {
        self.total_bins
    }

    /// Counts stored per bin.
    #[inline]
    pub fn count_width(&self) -> usize {
        count_width(self.target)
    }

    /// Moments (`sum`, `sum_sq`) stored per bin.
    #[inline]
    pub fn moment_width(&self) -> usize {
        match self.target {
            TargetType::Classification { .. } => 0,
            TargetType::Regression => 2,
        }
    }

    /// Local bin of `value` for `feature`. `NaN` maps to the missing bin.
    ///
    /// The value must already have passed schema validation.
    #[inline]
    pub fn bin_for(&self, feature: usize, value: f64) -> usize {
        let meta = self.metas[feature];
        if value.is_nan() {
            return meta.missing_bin();
        }
        match &self.binning[feature] {
            FeatureBinning::Continuous(cuts) => cuts.bin(value),
            FeatureBinning::Categorical { .. } => category_code(value)
                .map_or(meta.missing_bin(), |code| (code as usize).min(meta.missing_bin())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeatureSpec;

    fn layout() -> HistogramLayout {
        let schema = FeatureSchema::new(vec![
            FeatureSpec::continuous("x"),
            FeatureSpec::categorical("c", 3),
        ]);
        HistogramLayout::new(
            schema,
            TargetType::Classification { n_classes: 2 },
            vec![
                FeatureBinning::Continuous(BinCuts::from_upper_bounds(vec![1.0, 2.0])),
                FeatureBinning::Categorical { n_levels: 3 },
            ],
        )
        .unwrap()
    }

    #[test]
    fn offsets_include_missing_bins() {
        let layout = layout();
        assert_eq!(layout.meta(0), FeatureMeta { offset: 0, n_bins: 4 });
        assert_eq!(layout.meta(1), FeatureMeta { offset: 4, n_bins: 4 });
        assert_eq!(layout.total_bins(), 8);
        assert_eq!(layout.count_width(), 2);
        assert_eq!(layout.moment_width(), 0);
    }

    #[test]
    fn bins_for_values() {
        let layout = layout();
        assert_eq!(layout.bin_for(0, 0.5), 0);
        assert_eq!(layout.bin_for(0, 2.0), 1);
        assert_eq!(layout.bin_for(0, 7.0), 2);
        assert_eq!(layout.bin_for(0, f64::NAN), 3);
        assert_eq!(layout.bin_for(1, 2.0), 2);
        assert_eq!(layout.bin_for(1, f64::NAN), 3);
    }

    #[test]
    fn rejects_binning_of_wrong_kind() {
        let schema = FeatureSchema::new(vec![FeatureSpec::categorical("c", 3)]);
        let err = HistogramLayout::new(
            schema,
            TargetType::Regression,
            vec![FeatureBinning::Categorical { n_levels: 4 }],
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::CutsMismatch { feature: 0 });
    }
}
