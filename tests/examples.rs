use depscore::entropy::{joint_entropy, mutual_information};
use depscore::independence::decide;
use depscore::{
    BinAlgorithm, BinPlan, Config, CriticalValues, DependencyTest, Histogram2D, Scorer, Slice2D,
    TestContext, Variable,
};
use std::sync::Arc;
use std::thread;

fn categorical(pairs: &[(f64, f64)]) -> Slice2D {
    let mut slice = Slice2D::new(Variable::categorical(0), Variable::categorical(1));
    for (x, y) in pairs.iter().copied() {
        slice.add(x, y, 1.0);
    }
    slice
}

fn no_test() -> Config {
    Config {
        dependency_test: DependencyTest::NoTest,
        threshold: 0.0,
        ..Config::default()
    }
}

#[test]
fn diagonal_pair_is_fully_dependent() {
    let slice = categorical(&[(0.0, 0.0), (0.0, 0.0), (1.0, 1.0), (1.0, 1.0)]);
    let plan = BinAlgorithm::Poisson.bins_2d(&slice);
    assert_eq!(plan, BinPlan::new(2, 2));

    let hist = Histogram2D::build(&slice, plan);
    assert_eq!(hist.column(0), &[2.0, 0.0]);
    assert_eq!(hist.column(1), &[0.0, 2.0]);
    assert_eq!(hist.marginal_x(), &[2.0, 2.0]);
    assert_eq!(hist.marginal_y(), &[2.0, 2.0]);

    let mi = mutual_information(&hist);
    assert!(mi > 2f64.ln());
    assert!((mi - joint_entropy(&hist)).abs() < 1e-12);

    let config = no_test();
    let test = config
        .dependency_test
        .build(&config, Arc::new(CriticalValues::new()));
    let ctx = TestContext {
        slice: &slice,
        mutual_information: mi,
        plan,
        p_value: config.p_value,
    };
    assert!(!decide(test.as_ref(), &ctx, config.threshold).independent);

    let similarity = Scorer::new(config).unwrap().similarity(&slice);
    assert!((similarity - 1.0).abs() < 1e-9);
}

#[test]
fn balanced_pair_is_independent() {
    let slice = categorical(&[(0.0, 0.0), (0.0, 1.0), (1.0, 0.0), (1.0, 1.0)]);
    let hist = Histogram2D::build(&slice, BinPlan::new(2, 2));
    assert_eq!(hist.column(0), &[1.0, 1.0]);
    assert_eq!(hist.column(1), &[1.0, 1.0]);
    assert_eq!(mutual_information(&hist), 0.0);
    assert_eq!(Scorer::new(no_test()).unwrap().similarity(&slice), 0.0);
}

#[test]
fn filtered_category_is_not_counted() {
    // Categories 0, 0.5 and 1, with everything at 0.5 filtered out before the query.
    let slice = categorical(&[(0.0, 0.0), (1.0, 0.5), (0.0, 1.0), (1.0, 0.0)]);
    assert_eq!(BinAlgorithm::Rice.bins_2d(&slice), BinPlan::new(2, 3));
    assert_eq!(BinAlgorithm::Scott.bins_1d(&slice.slice_x()), 2);
}

#[test]
fn scorers_share_critical_values_across_threads() {
    let critical = Arc::new(CriticalValues::new());
    let config = Config {
        dependency_test: DependencyTest::SurrogateGauss,
        surrogate_count: 20,
        ..Config::default()
    };
    let scorer = Arc::new(Scorer::with_critical_values(config, Arc::clone(&critical)).unwrap());

    let mut slice = Slice2D::new(Variable::numerical(0), Variable::numerical(1));
    for i in 0..120 {
        let x = i as f64 / 119.0;
        slice.add(x, 1.0 - x * x, 1.0);
    }
    let slice = Arc::new(slice);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let scorer = Arc::clone(&scorer);
            let slice = Arc::clone(&slice);
            thread::spawn(move || scorer.evaluate(&slice))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert!(results[0].similarity > 0.0);
    assert_eq!(critical.len(), 1);
}
