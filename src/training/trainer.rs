//! Reference host runtime.
//!
//! [`DecisionTreeTrainer`] drives the transition → merge → apply cycle over
//! in-memory shards. Each pass builds one accumulator per shard (in parallel
//! when allowed), merges them into one and applies a level. It stops when a
//! level finishes growth, and never runs more than `max_depth + 1` passes.

use ndarray::Array2;

use super::grower::{LevelOutcome, TreeLearner};
use super::histograms::{Accumulator, AccumulatorError};
use super::params::{ConfigError, RowErrorPolicy, TreeParams};
use super::prune::prune;
use crate::data::{Dataset, DatasetView, FeatureSchema, RowError, TargetType};
use crate::repr::Tree;

// =============================================================================
// TrainError
// =============================================================================

/// Errors from the reference trainer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrainError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("row {row} rejected: {source}")]
    Row {
        row: usize,
        #[source]
        source: RowError,
    },

    #[error(transparent)]
    Accumulator(#[from] AccumulatorError),
}

// =============================================================================
// TrainingReport
// =============================================================================

/// What happened during training.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    /// Outcome of every applied level, in order.
    pub levels: Vec<LevelOutcome>,
    /// Rows skipped under [`RowErrorPolicy::Skip`], summed over passes.
    pub n_rows_skipped: u64,
    /// Node count before pruning.
    pub n_nodes_unpruned: usize,
}

// =============================================================================
// DecisionTreeTrainer
// =============================================================================

/// Trains a tree over in-memory shards.
#[derive(Debug, Clone)]
pub struct DecisionTreeTrainer {
    schema: FeatureSchema,
    target: TargetType,
    params: TreeParams,
}

impl DecisionTreeTrainer {
    pub fn new(schema: FeatureSchema, target: TargetType, params: TreeParams) -> Self {
        Self {
            schema,
            target,
            params,
        }
    }

    #[inline]
    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    /// Train on a single-shard dataset.
    pub fn fit(&self, data: &Dataset) -> Result<Tree, TrainError> {
        self.fit_shards(&[data.view()])
    }

    /// Train on row shards.
    pub fn fit_shards(&self, shards: &[DatasetView<'_>]) -> Result<Tree, TrainError> {
        self.fit_shards_with_report(shards).map(|(tree, _)| tree)
    }

    /// Train on row shards and report per-level outcomes.
    pub fn fit_shards_with_report(
        &self,
        shards: &[DatasetView<'_>],
    ) -> Result<(Tree, TrainingReport), TrainError> {
        let sample = stack_features(shards, self.schema.n_features())?;
        let (learner, mut tree) = TreeLearner::initialize(
            self.schema.clone(),
            self.target,
            self.params.clone(),
            sample.view(),
        )?;

        let mut levels = Vec::new();
        let mut n_rows_skipped = 0;
        for _ in 0..=self.params.max_depth {
            let (acc, skipped) = self.run_pass(&learner, &tree, shards)?;
            n_rows_skipped += skipped;
            let outcome = learner.apply(&mut tree, &acc)?;
            levels.push(outcome);
            if outcome.is_finished() {
                break;
            }
        }

        let n_nodes_unpruned = tree.n_nodes();
        if self.params.cp > 0.0 {
            tree = prune(&tree, self.params.cp);
        }

        tracing::info!(
            levels = levels.len(),
            n_nodes = tree.n_nodes(),
            n_leaves = tree.n_leaves(),
            depth = tree.depth(),
            status = ?levels.last().map(|l| l.status),
            n_rows_skipped,
            "training finished"
        );
        let report = TrainingReport {
            levels,
            n_rows_skipped,
            n_nodes_unpruned,
        };
        Ok((tree, report))
    }

    /// One data pass: per-shard accumulation, then merge.
    fn run_pass(
        &self,
        learner: &TreeLearner,
        tree: &Tree,
        shards: &[DatasetView<'_>],
    ) -> Result<(Accumulator, u64), TrainError> {
        let partials = self
            .params
            .parallelism
            .maybe_par_map(shards, |shard| self.accumulate_shard(learner, tree, shard));

        let mut merged = learner.accumulator(tree);
        let mut skipped = 0;
        for partial in partials {
            let (acc, n) = partial?;
            merged.merge_from(&acc)?;
            skipped += n;
        }
        Ok((merged, skipped))
    }

    /// Feed every row of one shard to a fresh accumulator.
    fn accumulate_shard(
        &self,
        learner: &TreeLearner,
        tree: &Tree,
        shard: &DatasetView<'_>,
    ) -> Result<(Accumulator, u64), TrainError> {
        let mut acc = learner.accumulator(tree);
        let mut skipped = 0;
        for (i, (row, target)) in shard.rows().enumerate() {
            if let Err(source) = acc.accumulate(tree, &row, target) {
                let row = shard.start() + i;
                match self.params.row_error_policy {
                    RowErrorPolicy::Abort => return Err(TrainError::Row { row, source }),
                    RowErrorPolicy::Skip => {
                        tracing::warn!(row, error = %source, "skipping invalid row");
                        skipped += 1;
                    }
                }
            }
        }
        Ok((acc, skipped))
    }
}

/// Stack the feature rows of all shards into one bin-boundary sample.
fn stack_features(shards: &[DatasetView<'_>], n_features: usize) -> Result<Array2<f64>, TrainError> {
    let n_rows: usize = shards.iter().map(DatasetView::n_rows).sum();
    let mut sample = Array2::zeros((n_rows, n_features));
    let mut offset = 0;
    for shard in shards {
        if shard.n_features() != n_features {
            return Err(ConfigError::SampleArity {
                expected: n_features,
                got: shard.n_features(),
            }
            .into());
        }
        sample
            .slice_mut(ndarray::s![offset..offset + shard.n_rows(), ..])
            .assign(&shard.features());
        offset += shard.n_rows();
    }
    Ok(sample)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::GrowthStatus;
    use crate::utils::Parallelism;

    const BINARY: TargetType = TargetType::Classification { n_classes: 2 };

    fn params() -> TreeParams {
        TreeParams::builder().min_split(2).min_bucket(1).build().unwrap()
    }

    #[test]
    fn four_point_example() {
        let data = Dataset::from_rows(
            &[vec![1.0], vec![2.0], vec![8.0], vec![9.0]],
            vec![0.0, 0.0, 1.0, 1.0],
        )
        .unwrap();
        let trainer = DecisionTreeTrainer::new(FeatureSchema::all_continuous(1), BINARY, params());
        let (tree, report) = trainer.fit_shards_with_report(&[data.view()]).unwrap();

        assert_eq!(tree.n_nodes(), 3);
        let (left, right) = tree.root().children().unwrap();
        assert_eq!(tree.node(left).prediction().class(), Some(0));
        assert_eq!(tree.node(right).prediction().class(), Some(1));
        assert_eq!(tree.node(left).stats().risk(), 0.0);
        assert_eq!(tree.node(right).stats().risk(), 0.0);
        assert_eq!(report.levels.len(), 1);
        assert_eq!(report.levels[0].status, GrowthStatus::Converged);
    }

    #[test]
    fn aborts_on_invalid_row_with_global_index() {
        let data = Dataset::from_rows(
            &[vec![1.0], vec![2.0], vec![3.0], vec![4.0]],
            vec![0.0, 1.0, 7.0, 1.0],
        )
        .unwrap();
        let trainer = DecisionTreeTrainer::new(FeatureSchema::all_continuous(1), BINARY, params());
        let err = trainer.fit_shards(&data.shards(2)).unwrap_err();
        assert!(matches!(
            err,
            TrainError::Row {
                row: 2,
                source: RowError::InvalidClass { .. }
            }
        ));
    }

    #[test]
    fn skip_policy_counts_rows() {
        let data = Dataset::from_rows(
            &[vec![1.0], vec![2.0], vec![3.0], vec![4.0]],
            vec![0.0, 0.0, f64::NAN, 1.0],
        )
        .unwrap();
        let params = TreeParams::builder()
            .min_split(2)
            .min_bucket(1)
            .row_error_policy(RowErrorPolicy::Skip)
            .build()
            .unwrap();
        let trainer = DecisionTreeTrainer::new(FeatureSchema::all_continuous(1), BINARY, params);
        let (tree, report) = trainer.fit_shards_with_report(&[data.view()]).unwrap();
        assert!(report.n_rows_skipped >= 1);
        assert_eq!(tree.root().stats().n_rows(), 3);
    }

    #[test]
    fn parallel_shards_match_sequential() {
        let rows: Vec<Vec<f64>> = (0..200).map(|i| vec![(i % 17) as f64, (i % 5) as f64]).collect();
        let targets: Vec<f64> = (0..200).map(|i| ((i % 17) > 8) as u8 as f64).collect();
        let data = Dataset::from_rows(&rows, targets).unwrap();
        let schema = FeatureSchema::all_continuous(2);

        let sequential = DecisionTreeTrainer::new(schema.clone(), BINARY, params())
            .fit(&data)
            .unwrap();
        let parallel_params = TreeParams::builder()
            .min_split(2)
            .min_bucket(1)
            .parallelism(Parallelism::Parallel)
            .build()
            .unwrap();
        let parallel = DecisionTreeTrainer::new(schema, BINARY, parallel_params)
            .fit_shards(&data.shards(7))
            .unwrap();
        assert_eq!(parallel, sequential);
    }
}
