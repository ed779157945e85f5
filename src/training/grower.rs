//! Level-wise tree growth.
//!
//! [`TreeLearner`] owns the fixed histogram layout and split parameters of a
//! training run. Growth proceeds one level per data pass:
//!
//! 1. the host builds one [`Accumulator`] per shard with
//!    [`TreeLearner::accumulator`] and feeds every row to it
//! 2. shard accumulators are merged in any order
//! 3. [`TreeLearner::apply`] turns the merged statistics into the next level
//!
//! `apply` only mutates the tree between passes. Leaves that can never be
//! split are marked terminal as soon as that is known, so later passes skip
//! them during accumulation.

use std::sync::Arc;

use ndarray::ArrayView2;

use super::histograms::{
    Accumulator, AccumulatorError, FeatureBinning, HistogramLayout, LeafHistogram,
};
use super::params::{ConfigError, TreeParams};
use super::split::{GainParams, Impurity, SplitCandidate, SplitFinder, GAIN_EPSILON};
use crate::data::{BinCuts, FeatureKind, FeatureSchema, TargetType};
use crate::repr::{NodeId, NodeStats, Tree};

// =============================================================================
// LevelOutcome
// =============================================================================

/// Growth state after applying a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthStatus {
    /// At least one leaf is still open.
    Growing,
    /// Every remaining leaf stopped on its own (no valid split, too few
    /// rows, pure or empty).
    Converged,
    /// Growth stopped because leaves reached `max_depth`.
    DepthLimit,
    /// Growth stopped because the node budget was exhausted.
    NodeLimit,
}

/// Summary of one applied level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelOutcome {
    /// Depth of the leaves that were open at the start of the level.
    pub depth: u32,
    /// Leaves open at the start of the level.
    pub n_open: usize,
    /// Leaves replaced by internal nodes.
    pub n_split: usize,
    /// Leaves marked terminal (including new children closed immediately).
    pub n_terminal: usize,
    /// Tree size after the level.
    pub n_nodes: usize,
    pub status: GrowthStatus,
}

impl LevelOutcome {
    /// Returns true if any leaf was split.
    #[inline]
    pub fn did_split(&self) -> bool {
        self.n_split > 0
    }

    /// Returns true once no further pass is needed.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.status != GrowthStatus::Growing
    }
}

/// Why a leaf stops growing, if it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Empty,
    Depth,
    TooFewRows,
    Pure,
}

// =============================================================================
// TreeLearner
// =============================================================================

/// Split evaluation and tree mutation for one training run.
#[derive(Debug, Clone)]
pub struct TreeLearner {
    layout: Arc<HistogramLayout>,
    params: TreeParams,
    criterion: Impurity,
    finder: SplitFinder,
}

impl TreeLearner {
    /// Validate the configuration, fix continuous bin boundaries from
    /// `sample` (one row per sample row, one column per feature) and return
    /// the learner with an initial single-leaf tree.
    pub fn initialize(
        schema: FeatureSchema,
        target: TargetType,
        params: TreeParams,
        sample: ArrayView2<'_, f64>,
    ) -> Result<(Self, Tree), ConfigError> {
        if sample.ncols() != schema.n_features() {
            return Err(ConfigError::SampleArity {
                expected: schema.n_features(),
                got: sample.ncols(),
            });
        }
        let binning = schema
            .iter()
            .enumerate()
            .map(|(feature, spec)| match spec.kind {
                FeatureKind::Continuous => {
                    let values: Vec<f64> = sample.column(feature).iter().copied().collect();
                    FeatureBinning::Continuous(BinCuts::from_values(&values, params.max_bins))
                }
                FeatureKind::Categorical { n_levels } => FeatureBinning::Categorical { n_levels },
            })
            .collect();
        Self::with_binning(schema, target, params, binning)
    }

    /// Like [`initialize`](Self::initialize), with explicit binning.
    pub fn with_binning(
        schema: FeatureSchema,
        target: TargetType,
        params: TreeParams,
        binning: Vec<FeatureBinning>,
    ) -> Result<(Self, Tree), ConfigError> {
        params.validate_for(target)?;
        if schema.is_empty() {
            return Err(ConfigError::EmptySchema);
        }
        for (feature, spec) in schema.iter().enumerate() {
            if spec.kind == (FeatureKind::Categorical { n_levels: 0 }) {
                return Err(ConfigError::NoCategoryLevels { feature });
            }
        }
        let n_features = schema.n_features();
        let layout = Arc::new(HistogramLayout::new(schema, target, binning)?);
        let criterion = params.criterion_for(target);
        let finder = SplitFinder::new(GainParams {
            criterion,
            min_gain: params.min_gain,
            min_bucket: params.effective_min_bucket(),
        });
        let learner = Self {
            layout,
            params,
            criterion,
            finder,
        };
        Ok((learner, Tree::new_root(target, n_features)))
    }

    #[inline]
    pub fn layout(&self) -> &Arc<HistogramLayout> {
        &self.layout
    }

    #[inline]
    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    #[inline]
    pub fn criterion(&self) -> Impurity {
        self.criterion
    }

    /// Empty accumulator for the current tree snapshot.
    pub fn accumulator(&self, tree: &Tree) -> Accumulator {
        Accumulator::new(Arc::clone(&self.layout), tree.generation())
    }

    /// Best split of a leaf histogram.
    pub fn best_split(&self, hist: &LeafHistogram) -> Option<SplitCandidate> {
        self.finder.best_split(&self.layout, hist)
    }

    /// Grow one level from the merged statistics of the current pass.
    ///
    /// Every open leaf first takes its statistics from `acc`. Leaves that
    /// meet a stopping rule, or have no valid split, become terminal; the
    /// others are split in ascending id order while the node budget allows.
    pub fn apply(&self, tree: &mut Tree, acc: &Accumulator) -> Result<LevelOutcome, AccumulatorError> {
        if acc.generation() != tree.generation() {
            return Err(AccumulatorError::SnapshotMismatch {
                expected: tree.generation(),
                got: acc.generation(),
            });
        }
        if *acc.layout() != *self.layout {
            return Err(AccumulatorError::LayoutMismatch);
        }

        let open: Vec<NodeId> = tree.open_leaves().collect();
        let depth = open.iter().map(|&id| tree.node(id).depth()).max().unwrap_or(0);
        if open.is_empty() {
            return Ok(LevelOutcome {
                depth,
                n_open: 0,
                n_split: 0,
                n_terminal: 0,
                n_nodes: tree.n_nodes(),
                status: GrowthStatus::Converged,
            });
        }

        let empty = LeafHistogram::zeros(&self.layout);
        let mut depth_limited = false;
        let mut searchable: Vec<(NodeId, &LeafHistogram)> = Vec::with_capacity(open.len());
        let mut n_terminal = 0;
        for &id in &open {
            let hist = acc.leaf(id).unwrap_or(&empty);
            tree.set_leaf_stats(id, hist.totals().clone());
            match self.stop_reason(hist.totals(), tree.node(id).depth()) {
                Some(reason) => {
                    depth_limited |= reason == StopReason::Depth;
                    tree.mark_terminal(id);
                    n_terminal += 1;
                }
                None => searchable.push((id, hist)),
            }
        }

        let candidates: Vec<(NodeId, Option<SplitCandidate>)> = self
            .params
            .parallelism
            .maybe_par_map(searchable, |(id, hist)| (id, self.best_split(hist)));

        let mut n_split = 0;
        let mut node_limited = false;
        for (id, candidate) in candidates {
            let Some(candidate) = candidate else {
                tree.mark_terminal(id);
                n_terminal += 1;
                continue;
            };
            if !self.has_node_budget(tree.n_nodes()) {
                node_limited = true;
                tree.mark_terminal(id);
                n_terminal += 1;
                continue;
            }

            tracing::trace!(
                leaf = id,
                feature = candidate.feature(),
                gain = candidate.gain,
                n_left = candidate.left.n_rows(),
                n_right = candidate.right.n_rows(),
                "split leaf"
            );
            let child_depth = tree.node(id).depth() + 1;
            let SplitCandidate {
                rule,
                gain,
                left,
                right,
            } = candidate;
            let left_reason = self.stop_reason(&left, child_depth);
            let right_reason = self.stop_reason(&right, child_depth);
            let (left_id, right_id) = tree.split_leaf(id, rule, gain, left, right);
            n_split += 1;
            for (child, reason) in [(left_id, left_reason), (right_id, right_reason)] {
                if let Some(reason) = reason {
                    depth_limited |= reason == StopReason::Depth;
                    tree.mark_terminal(child);
                    n_terminal += 1;
                }
            }
        }

        // Children that can never be split under the budget stop now.
        if !self.has_node_budget(tree.n_nodes()) {
            let still_open: Vec<NodeId> = tree.open_leaves().collect();
            node_limited |= !still_open.is_empty();
            for id in still_open {
                tree.mark_terminal(id);
                n_terminal += 1;
            }
        }

        tree.bump_generation();

        let status = if !tree.is_finished() {
            GrowthStatus::Growing
        } else if node_limited {
            GrowthStatus::NodeLimit
        } else if depth_limited {
            GrowthStatus::DepthLimit
        } else {
            GrowthStatus::Converged
        };
        let outcome = LevelOutcome {
            depth,
            n_open: open.len(),
            n_split,
            n_terminal,
            n_nodes: tree.n_nodes(),
            status,
        };
        tracing::debug!(
            depth,
            n_open = outcome.n_open,
            n_split,
            n_terminal,
            n_nodes = outcome.n_nodes,
            status = ?status,
            "applied level"
        );
        Ok(outcome)
    }

    fn stop_reason(&self, stats: &NodeStats, depth: u32) -> Option<StopReason> {
        if stats.is_empty() {
            Some(StopReason::Empty)
        } else if depth >= self.params.max_depth {
            Some(StopReason::Depth)
        } else if stats.n_rows() < self.params.min_split {
            Some(StopReason::TooFewRows)
        } else if self.criterion.evaluate(stats) <= GAIN_EPSILON {
            Some(StopReason::Pure)
        } else {
            None
        }
    }

    #[inline]
    fn has_node_budget(&self, n_nodes: usize) -> bool {
        self.params.max_nodes.map_or(true, |max| n_nodes + 2 <= max)
    }
}
