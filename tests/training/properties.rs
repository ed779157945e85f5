//! Property tests for the reduction interface.
//!
//! Regression labels are arbitrary finite reals at mixed scales; every
//! comparison below is still bit-for-bit.

use ndarray::Array2;
use proptest::prelude::*;
use treewise::data::{Dataset, DatasetView, FeatureSchema, FeatureSpec, TargetType};
use treewise::repr::Tree;
use treewise::training::{Accumulator, DecisionTreeTrainer, TreeLearner, TreeParams};
use treewise::{Parallelism, Predictor};

const N_CLASSES: u32 = 3;

fn schema() -> FeatureSchema {
    FeatureSchema::new(vec![
        FeatureSpec::continuous("x"),
        FeatureSpec::categorical("c", 4),
    ])
}

/// (continuous value or missing, category code or missing, class, real label)
type Row = (Option<u8>, Option<u8>, u8, f64);

/// Real labels mixing magnitudes, so partial sums round in plain `f64`.
fn arb_label() -> impl Strategy<Value = f64> {
    prop_oneof![
        -1.0e3..1.0e3f64,
        -1.0e-6..1.0e-6f64,
        (-1.0e9..1.0e9f64).prop_map(|x| x + 0.1),
    ]
}

fn arb_rows() -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec(
        (
            prop::option::weighted(0.9, 0u8..20),
            prop::option::weighted(0.9, 0u8..4),
            0u8..N_CLASSES as u8,
            arb_label(),
        ),
        1..120,
    )
}

fn target_type(regression: bool) -> TargetType {
    if regression {
        TargetType::Regression
    } else {
        TargetType::Classification { n_classes: N_CLASSES }
    }
}

/// Classes become the labels for classification, real labels for regression.
fn dataset(rows: &[Row], target: TargetType) -> Dataset {
    let features = Array2::from_shape_fn((rows.len(), 2), |(i, j)| {
        let value = if j == 0 { rows[i].0 } else { rows[i].1 };
        value.map_or(f64::NAN, f64::from)
    });
    let targets = rows
        .iter()
        .map(|r| {
            if target.is_classification() {
                f64::from(r.2)
            } else {
                r.3
            }
        })
        .collect();
    Dataset::new(features, targets).unwrap()
}

fn params(max_depth: u32) -> TreeParams {
    TreeParams::builder()
        .max_depth(max_depth)
        .min_split(2)
        .min_bucket(1)
        .max_bins(8)
        .build()
        .unwrap()
}

fn accumulate(learner: &TreeLearner, tree: &Tree, shard: &DatasetView<'_>) -> Accumulator {
    let mut acc = learner.accumulator(tree);
    for (row, target) in shard.rows() {
        acc.accumulate(tree, &row, target).unwrap();
    }
    acc
}

/// A learner plus a tree grown one level, so accumulation spans several
/// leaves.
fn one_level(data: &Dataset, target: TargetType) -> (TreeLearner, Tree) {
    let (learner, mut tree) =
        TreeLearner::initialize(schema(), target, params(4), data.features()).unwrap();
    let acc = accumulate(&learner, &tree, &data.view());
    learner.apply(&mut tree, &acc).unwrap();
    (learner, tree)
}

proptest! {
    #[test]
    fn merge_is_associative_and_commutative(
        rows in arb_rows(),
        a in 0usize..120,
        b in 0usize..120,
        regression in any::<bool>(),
    ) {
        let target = target_type(regression);
        let data = dataset(&rows, target);
        let (learner, tree) = one_level(&data, target);
        let shards = data.shards_at(&[a, b]);
        let [x, y, z] = [0, 1, 2].map(|i| accumulate(&learner, &tree, &shards[i]));
        let whole = accumulate(&learner, &tree, &data.view());

        let left_assoc = x.clone().merge(y.clone()).unwrap().merge(z.clone()).unwrap();
        let right_assoc = x.clone().merge(y.clone().merge(z.clone()).unwrap()).unwrap();
        let reversed = z.merge(y).unwrap().merge(x).unwrap();

        prop_assert_eq!(&left_assoc, &right_assoc);
        prop_assert_eq!(&left_assoc, &reversed);
        prop_assert_eq!(&left_assoc, &whole);
        prop_assert_eq!(whole.n_rows(), rows.len() as u64);
    }

    #[test]
    fn sharding_does_not_change_the_tree(
        rows in arb_rows(),
        cuts in prop::collection::vec(0usize..120, 0..6),
        regression in any::<bool>(),
    ) {
        let target = target_type(regression);
        let data = dataset(&rows, target);
        let single = DecisionTreeTrainer::new(schema(), target, params(4)).fit(&data).unwrap();

        let parallel = TreeParams { parallelism: Parallelism::Parallel, ..params(4) };
        let sharded = DecisionTreeTrainer::new(schema(), target, parallel)
            .fit_shards(&data.shards_at(&cuts))
            .unwrap();

        prop_assert_eq!(sharded, single);
    }

    #[test]
    fn splits_conserve_rows_and_growth_terminates(
        rows in arb_rows(),
        max_depth in 0u32..6,
        regression in any::<bool>(),
    ) {
        let target = target_type(regression);
        let data = dataset(&rows, target);
        let trainer = DecisionTreeTrainer::new(schema(), target, params(max_depth));
        let (tree, report) = trainer.fit_shards_with_report(&[data.view()]).unwrap();

        prop_assert!(report.levels.len() <= max_depth as usize + 1);
        prop_assert!(tree.depth() <= max_depth);
        prop_assert!(tree.is_finished());
        prop_assert_eq!(tree.root().stats().n_rows(), rows.len() as u64);
        for node in tree.nodes() {
            if let Some((left, right)) = node.children() {
                let combined = tree.node(left).stats().combined(tree.node(right).stats());
                prop_assert_eq!(&combined, node.stats());
            }
        }
        tree.validate().unwrap();
    }

    #[test]
    fn prediction_is_pure(rows in arb_rows(), unseen in arb_rows()) {
        let target = target_type(false);
        let data = dataset(&rows, target);
        let tree = DecisionTreeTrainer::new(schema(), target, params(4)).fit(&data).unwrap();
        let snapshot = tree.clone();
        let predictor = Predictor::new(&tree);

        let unseen = dataset(&unseen, target);
        for (row, _) in unseen.view().rows() {
            let first = predictor.predict(&row).clone();
            prop_assert_eq!(predictor.predict(&row), &first);
            let total: f64 = first.probabilities().unwrap().iter().sum();
            prop_assert!((total - 1.0).abs() < 1e-9);
        }
        prop_assert_eq!(tree, snapshot);
    }
}
