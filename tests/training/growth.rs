//! End-to-end growth scenarios driven through the reduction interface.

use ndarray::{array, Array2};
use rstest::rstest;
use treewise::data::{Dataset, FeatureSchema, FeatureSpec, TargetType};
use treewise::repr::{SplitRule, Tree};
use treewise::testing::{categorical_labels, step_regression, two_clusters};
use treewise::training::{
    DecisionTreeTrainer, GrowthStatus, Impurity, LevelOutcome, TreeLearner, TreeParams,
};
use treewise::{assert_approx_eq, Predictor, RowError};

const BINARY: TargetType = TargetType::Classification { n_classes: 2 };

/// Run transition → apply until growth finishes, one accumulator per level.
fn grow(learner: &TreeLearner, tree: &mut Tree, data: &Dataset) -> Vec<LevelOutcome> {
    let mut levels = Vec::new();
    loop {
        let mut acc = learner.accumulator(tree);
        for (row, target) in data.view().rows() {
            acc.accumulate(tree, &row, target).unwrap();
        }
        let outcome = learner.apply(tree, &acc).unwrap();
        levels.push(outcome);
        if outcome.is_finished() {
            return levels;
        }
        assert!(levels.len() <= 101, "growth did not terminate");
    }
}

/// Every internal node's children partition its rows exactly.
fn assert_conserved(tree: &Tree) {
    for (id, node) in tree.nodes().iter().enumerate() {
        if let Some((left, right)) = node.children() {
            let combined = tree.node(left).stats().combined(tree.node(right).stats());
            assert_eq!(&combined, node.stats(), "node {id} does not conserve its rows");
        }
    }
}

#[test]
fn four_points_split_between_clusters() {
    let x = array![[1.0], [2.0], [8.0], [9.0]];
    let data = Dataset::new(x.clone(), array![0.0, 0.0, 1.0, 1.0]).unwrap();
    let params = TreeParams::builder().min_split(2).min_bucket(1).build().unwrap();
    let (learner, mut tree) =
        TreeLearner::initialize(FeatureSchema::all_continuous(1), BINARY, params, x.view()).unwrap();

    let levels = grow(&learner, &mut tree, &data);

    assert_eq!(levels.len(), 1);
    assert!(levels[0].did_split());
    assert_eq!(tree.n_nodes(), 3);
    match tree.root().split() {
        Some(SplitRule::Numeric { feature, threshold, .. }) => {
            assert_eq!(*feature, 0);
            assert!(*threshold >= 2.0 && *threshold < 8.0);
        }
        other => panic!("expected a numeric root split, got {other:?}"),
    }
    let (left, right) = tree.root().children().unwrap();
    assert_eq!(tree.node(left).prediction().class(), Some(0));
    assert_eq!(tree.node(right).prediction().class(), Some(1));
    assert_eq!(tree.node(left).stats().risk(), 0.0);
    assert_eq!(tree.node(right).stats().risk(), 0.0);
}

#[test]
fn single_label_never_splits() {
    let x = Array2::from_shape_fn((30, 2), |(i, j)| (i * (j + 1)) as f64);
    let data = Dataset::new(x.clone(), ndarray::Array1::from_elem(30, 1.0)).unwrap();
    let params = TreeParams::builder().min_split(2).build().unwrap();
    let (learner, mut tree) =
        TreeLearner::initialize(FeatureSchema::all_continuous(2), BINARY, params, x.view()).unwrap();

    let levels = grow(&learner, &mut tree, &data);

    assert_eq!(levels.len(), 1);
    assert!(!levels[0].did_split());
    assert_eq!(levels[0].status, GrowthStatus::Converged);
    assert_eq!(tree.n_nodes(), 1);
    assert_eq!(tree.root().prediction().class(), Some(1));
    assert_eq!(tree.root().stats().n_rows(), 30);
}

#[test]
fn depth_limit_bounds_levels() {
    let data = two_clusters(400, 7);
    let params = TreeParams::builder()
        .max_depth(2)
        .min_split(2)
        .min_bucket(1)
        .build()
        .unwrap();
    let (learner, mut tree) = TreeLearner::initialize(
        FeatureSchema::all_continuous(2),
        BINARY,
        params,
        data.features(),
    )
    .unwrap();

    let levels = grow(&learner, &mut tree, &data);

    assert!(levels.len() <= 3);
    assert!(tree.depth() <= 2);
    assert!(tree.is_finished());
    assert_conserved(&tree);
    tree.validate().unwrap();
}

#[test]
fn node_budget_stops_growth() {
    let data = two_clusters(400, 11);
    let params = TreeParams::builder()
        .min_split(2)
        .min_bucket(1)
        .max_nodes(5)
        .build()
        .unwrap();
    let trainer = DecisionTreeTrainer::new(FeatureSchema::all_continuous(2), BINARY, params);
    let (tree, report) = trainer.fit_shards_with_report(&[data.view()]).unwrap();

    assert!(tree.n_nodes() <= 5);
    assert_eq!(report.levels.last().unwrap().status, GrowthStatus::NodeLimit);
}

#[test]
fn regression_finds_step() {
    let data = step_regression(500, 3);
    let params = TreeParams::builder().max_depth(1).max_bins(256).build().unwrap();
    let trainer =
        DecisionTreeTrainer::new(FeatureSchema::all_continuous(2), TargetType::Regression, params);
    let tree = trainer.fit(&data).unwrap();

    match tree.root().split() {
        Some(SplitRule::Numeric { feature, threshold, .. }) => {
            assert_eq!(*feature, 0);
            assert!(*threshold >= 4.5 && *threshold < 5.0, "threshold {threshold}");
        }
        other => panic!("expected a numeric root split, got {other:?}"),
    }
    let predictor = Predictor::new(&tree);
    assert_approx_eq!(predictor.predict_response(&[1.0, 0.0]), 2.0, 0.3);
    assert_approx_eq!(predictor.predict_response(&[9.0, 0.0]), 10.0, 0.3);
    assert_conserved(&tree);
}

#[rstest]
#[case::gini(Impurity::Gini)]
#[case::entropy(Impurity::Entropy)]
#[case::misclassification(Impurity::Misclassification)]
fn every_classification_criterion_separates_clusters(#[case] criterion: Impurity) {
    let data = two_clusters(400, 13);
    let params = TreeParams::builder()
        .criterion(criterion)
        .max_depth(3)
        .min_split(10)
        .build()
        .unwrap();
    let trainer = DecisionTreeTrainer::new(FeatureSchema::all_continuous(2), BINARY, params);
    let (tree, report) = trainer.fit_shards_with_report(&data.shards(3)).unwrap();

    assert!(report.levels[0].did_split(), "{criterion}: root did not split");
    match tree.root().split() {
        Some(SplitRule::Numeric { feature, threshold, .. }) => {
            assert_eq!(*feature, 0, "{criterion}");
            assert!(*threshold > 3.0 && *threshold < 6.0, "{criterion}: threshold {threshold}");
        }
        other => panic!("{criterion}: expected a numeric root split, got {other:?}"),
    }
    assert!(tree.depth() <= 3);
    assert_conserved(&tree);
    tree.validate().unwrap();

    let predictor = Predictor::new(&tree);
    assert_eq!(predictor.predict_class(&[1.0, 5.0]), Some(0), "{criterion}");
    assert_eq!(predictor.predict_class(&[8.0, 5.0]), Some(1), "{criterion}");
}

#[test]
fn categorical_split_groups_levels_by_label() {
    let data = categorical_labels(600, 6, 2, 5);
    let schema = FeatureSchema::new(vec![
        FeatureSpec::categorical("code", 6),
        FeatureSpec::continuous("noise"),
    ]);
    let params = TreeParams::builder().max_depth(1).build().unwrap();
    let tree = DecisionTreeTrainer::new(schema, BINARY, params).fit(&data).unwrap();

    let split = tree.root().split().expect("root should split");
    let SplitRule::Categorical { feature, left, right, .. } = split else {
        panic!("expected a categorical root split, got {split:?}");
    };
    assert_eq!(*feature, 0);
    let mut codes: Vec<u32> = left.iter().chain(right.iter()).collect();
    codes.sort_unstable();
    assert_eq!(codes, vec![0, 1, 2, 3, 4, 5]);
    let left_parity: Vec<u32> = left.iter().map(|c| c % 2).collect();
    let right_parity: Vec<u32> = right.iter().map(|c| c % 2).collect();
    assert!(left_parity.windows(2).all(|w| w[0] == w[1]));
    assert!(right_parity.windows(2).all(|w| w[0] == w[1]));
    assert_ne!(left_parity[0], right_parity[0]);

    // A code outside the schema routes by default instead of failing.
    let predictor = Predictor::new(&tree);
    assert!(predictor.predict_class(&[42.0, 0.5]).is_some());
}

#[test]
fn missing_values_route_consistently() {
    let data = two_clusters(500, 21);
    let params = TreeParams::builder().min_split(10).build().unwrap();
    let trainer = DecisionTreeTrainer::new(FeatureSchema::all_continuous(2), BINARY, params);
    let tree = trainer.fit(&data).unwrap();
    assert_conserved(&tree);

    // Every training row lands in a leaf whose counts include it.
    let predictor = Predictor::new(&tree);
    let mut per_leaf = vec![0u64; tree.n_nodes()];
    for (row, _) in data.view().rows() {
        per_leaf[predictor.predict_leaf(&row) as usize] += 1;
    }
    for (id, node) in tree.nodes().iter().enumerate() {
        if node.is_leaf() {
            assert_eq!(per_leaf[id], node.stats().n_rows(), "leaf {id}");
        }
    }
}

#[test]
fn stale_accumulator_is_rejected() {
    let x = array![[1.0], [2.0], [8.0], [9.0]];
    let params = TreeParams::builder().min_split(2).min_bucket(1).build().unwrap();
    let (learner, mut tree) =
        TreeLearner::initialize(FeatureSchema::all_continuous(1), BINARY, params, x.view()).unwrap();
    let mut stale = learner.accumulator(&tree);
    let mut acc = learner.accumulator(&tree);
    for (row, y) in x.rows().into_iter().zip([0.0, 0.0, 1.0, 1.0]) {
        acc.accumulate(&tree, &row, y).unwrap();
    }
    learner.apply(&mut tree, &acc).unwrap();

    let err = stale.accumulate(&tree, &[1.0], 0.0).unwrap_err();
    assert_eq!(err, RowError::StaleSnapshot { expected: 0, got: 1 });
    assert!(learner.apply(&mut tree, &stale).is_err());
}
