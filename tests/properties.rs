use depscore::entropy::{joint_entropy, mutual_information};
use depscore::{
    BinAlgorithm, BinPlan, Config, DependencyTest, Histogram2D, Sample2D, Scorer, Slice2D,
    Variable, P_VALUE_FLOOR,
};
use proptest::prelude::*;

fn unit() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), Just(1.0), 0.0..=1.0f64]
}

fn samples(max: usize) -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
    prop::collection::vec((unit(), unit(), 0.0..5.0f64), 0..max)
}

fn slice(values: &[(f64, f64, f64)], categorical: bool) -> Slice2D {
    let variable = |id| {
        if categorical {
            Variable::categorical(id)
        } else {
            Variable::numerical(id)
        }
    };
    let samples = values
        .iter()
        .map(|&(x, y, w)| Sample2D::weighted(x, y, w).unwrap())
        .collect();
    Slice2D::from_samples(variable(0), variable(1), samples)
}

fn algorithm() -> impl Strategy<Value = BinAlgorithm> {
    prop_oneof![
        Just(BinAlgorithm::Rice),
        Just(BinAlgorithm::Scott),
        Just(BinAlgorithm::Poisson),
        Just(BinAlgorithm::CrossVal),
    ]
}

fn fast_test() -> impl Strategy<Value = DependencyTest> {
    prop_oneof![
        Just(DependencyTest::NoTest),
        Just(DependencyTest::GammaTest),
        Just(DependencyTest::PearsonTest),
        Just(DependencyTest::SpearmanTest),
        Just(DependencyTest::FisherTest),
        Just(DependencyTest::ChisquareTest),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Histograms keep every bit of sample weight, in the cells and in both marginals.
    #[test]
    fn histogram_conserves_weight(values in samples(200), bx in 1usize..12, by in 1usize..12) {
        let slice = slice(&values, false);
        let hist = Histogram2D::build(&slice, BinPlan::new(bx, by));
        let total = slice.total_weight();
        prop_assert!((hist.total() - total).abs() < 1e-9);
        prop_assert!((hist.marginal_x().iter().sum::<f64>() - total).abs() < 1e-9);
        prop_assert!((hist.marginal_y().iter().sum::<f64>() - total).abs() < 1e-9);
    }

    /// Bin plans are never empty, and categorical axes get one bin per category present.
    #[test]
    fn bin_plans_are_valid(values in samples(150), algorithm in algorithm(), categorical: bool) {
        let slice = slice(&values, categorical);
        let plan = algorithm.bins_2d(&slice);
        prop_assert!(plan.x >= 1 && plan.y >= 1);
        if categorical && !values.is_empty() {
            prop_assert_eq!(plan.x as u64, slice.count_x());
            prop_assert_eq!(plan.y as u64, slice.count_y());
        }
        prop_assert!(algorithm.bins_1d(&slice.slice_x()) >= 1);
    }

    /// Estimates are finite and non-negative for any input.
    #[test]
    fn estimates_are_bounded(values in samples(200), bx in 1usize..10, by in 1usize..10) {
        let hist = Histogram2D::build(&slice(&values, false), BinPlan::new(bx, by));
        let mi = mutual_information(&hist);
        let h = joint_entropy(&hist);
        prop_assert!(mi.is_finite() && mi >= 0.0);
        prop_assert!(h.is_finite() && h >= 0.0);
    }

    /// A variable that never leaves one bin shares no information with anything.
    #[test]
    fn no_variation_means_no_information(
        x in 0.0..=1.0f64,
        ys in prop::collection::vec((unit(), 0.1..5.0f64), 1..100),
        algorithm in algorithm(),
    ) {
        let values: Vec<_> = ys.into_iter().map(|(y, w)| (x, y, w)).collect();
        let slice = slice(&values, false);
        let plan = algorithm.bins_2d(&slice);
        prop_assert_eq!(mutual_information(&Histogram2D::build(&slice, plan)), 0.0);
    }

    /// Scores stay in range whatever the test or the data.
    #[test]
    fn results_are_bounded(
        values in samples(120),
        algorithm in algorithm(),
        dependency_test in fast_test(),
        tail_count in 1u8..=2,
    ) {
        let scorer = Scorer::new(Config {
            bin_algorithm: algorithm,
            dependency_test,
            tail_count,
            ..Config::default()
        })
        .unwrap();
        let result = scorer.evaluate(&slice(&values, false));
        prop_assert!(result.mutual_information >= 0.0);
        prop_assert!(result.similarity >= 0.0 && result.similarity <= 1.0);
        prop_assert!(result.p_value >= P_VALUE_FLOOR && result.p_value <= 1.0);
        prop_assert!(scorer.sort_score(&slice(&values, false)) >= 0.0);
    }
}
