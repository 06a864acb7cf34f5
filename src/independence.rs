//! Deciding whether an observed dependency could be chance.
//!
//! Each [`DependencyTest`] names one strategy. [`DependencyTest::build`] turns it into a boxed
//! [`IndependenceTest`] once per configuration, and [`decide`] applies the rules every strategy
//! shares before handing over to it.

use crate::bins::{BinAlgorithm, BinPlan};
use crate::config::Config;
use crate::entropy;
use crate::error::Error;
use crate::histogram::{ContingencyTable, Histogram2D};
use crate::slice::Slice2D;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, Gamma, Normal, StudentsT};
use statrs::function::factorial::ln_factorial;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, trace};

/// The strategy used to test a pair of variables for independence.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyTest {
    /// Compare the mutual information against a fixed threshold.
    NoTest,
    /// Z-test against a Gaussian fitted to the mutual information of shuffled surrogates.
    SurrogateGauss,
    /// Distribution-free permutation test against the largest surrogate mutual information.
    SurrogateGeneral,
    /// Asymptotic gamma distribution of the mutual information under independence.
    GammaTest,
    /// Student's t-test on Pearson's correlation coefficient.
    PearsonTest,
    /// Student's t-test on Spearman's rank correlation coefficient.
    SpearmanTest,
    /// Hypergeometric probability of the binned contingency table.
    FisherTest,
    /// Pearson's chi-square test on the binned contingency table.
    ChisquareTest,
}

const TEST_NAMES: [(DependencyTest, &str); 8] = [
    (DependencyTest::NoTest, "NO_TEST"),
    (DependencyTest::SurrogateGauss, "SURROGATE_GAUSS"),
    (DependencyTest::SurrogateGeneral, "SURROGATE_GENERAL"),
    (DependencyTest::GammaTest, "GAMMA_TEST"),
    (DependencyTest::PearsonTest, "PEARSON_TEST"),
    (DependencyTest::SpearmanTest, "SPEARMAN_TEST"),
    (DependencyTest::FisherTest, "FISHER_TEST"),
    (DependencyTest::ChisquareTest, "CHISQUARE_TEST"),
];

impl fmt::Display for DependencyTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = TEST_NAMES
            .iter()
            .find(|(test, _)| test == self)
            .map_or("", |(_, name)| name);
        f.write_str(name)
    }
}

impl FromStr for DependencyTest {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        TEST_NAMES
            .iter()
            .find(|(_, known)| known.eq_ignore_ascii_case(name))
            .map(|(test, _)| *test)
            .ok_or_else(|| {
                error!(name, "unsupported dependency test");
                Error::UnsupportedDependencyTest(name.to_string())
            })
    }
}

impl DependencyTest {
    /// Returns `true` for the tests that can report a continuous p-value.
    pub fn has_p_value(self) -> bool {
        match self {
            DependencyTest::SurrogateGauss
            | DependencyTest::SurrogateGeneral
            | DependencyTest::GammaTest
            | DependencyTest::ChisquareTest => true,
            DependencyTest::NoTest
            | DependencyTest::PearsonTest
            | DependencyTest::SpearmanTest
            | DependencyTest::FisherTest => false,
        }
    }

    /// Resolves this strategy into a test configured from `config`.
    ///
    /// Surrogate z-tests look their critical values up in `critical`, so callers that build many
    /// tests can share one cache.
    pub fn build(self, config: &Config, critical: Arc<CriticalValues>) -> Box<dyn IndependenceTest> {
        match self {
            DependencyTest::NoTest => Box::new(ThresholdTest {
                threshold: config.threshold,
            }),
            DependencyTest::SurrogateGauss => Box::new(SurrogateGaussTest {
                algorithm: config.bin_algorithm,
                surrogates: config.surrogate_count,
                seed: config.seed,
                critical,
            }),
            DependencyTest::SurrogateGeneral => Box::new(SurrogateGeneralTest {
                algorithm: config.bin_algorithm,
                seed: config.seed,
            }),
            DependencyTest::GammaTest => Box::new(GammaTest),
            DependencyTest::PearsonTest => Box::new(CorrelationTest {
                method: Correlation::Pearson,
                tails: config.tail_count,
            }),
            DependencyTest::SpearmanTest => Box::new(CorrelationTest {
                method: Correlation::Spearman,
                tails: config.tail_count,
            }),
            DependencyTest::FisherTest => Box::new(FisherTest {
                tails: config.tail_count,
            }),
            DependencyTest::ChisquareTest => Box::new(ChiSquareTest),
        }
    }
}

/// Everything a test needs to know about one pair of variables.
#[derive(Clone, Copy, Debug)]
pub struct TestContext<'a> {
    /// The paired samples.
    pub slice: &'a Slice2D,
    /// The mutual information observed in `slice` under `plan`.
    pub mutual_information: f64,
    /// The bins `mutual_information` was computed with.
    pub plan: BinPlan,
    /// The significance level, in (0, 1].
    pub p_value: f64,
}

/// The outcome of an independence test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Verdict {
    /// The dependency is indistinguishable from chance.
    pub independent: bool,
    /// A continuous p-value for the observed dependency, when the test can produce one.
    pub p_value: Option<f64>,
}

impl Verdict {
    fn new(independent: bool) -> Self {
        Verdict {
            independent,
            p_value: None,
        }
    }

    fn with_p_value(independent: bool, p_value: f64) -> Self {
        Verdict {
            independent,
            p_value: Some(p_value),
        }
    }
}

/// One way of deciding whether a pair of variables is independent.
///
/// Implementations must be conservative: when the statistics can't be computed they should
/// report independence rather than a dependency.
pub trait IndependenceTest: fmt::Debug + Send + Sync {
    /// Runs the test.
    fn evaluate(&self, ctx: &TestContext<'_>) -> Verdict;

    /// Runs the test and keeps only the decision.
    fn is_independent(&self, ctx: &TestContext<'_>) -> bool {
        self.evaluate(ctx).independent
    }
}

/// Runs `test` after the checks shared by every strategy.
///
/// Mutual information that isn't finite is independent without further ado. A significance level
/// of exactly 1 means "ignore significance": the decision falls back to comparing the mutual
/// information with `threshold`, though the test still runs to report its p-value.
pub fn decide(test: &dyn IndependenceTest, ctx: &TestContext<'_>, threshold: f64) -> Verdict {
    if !ctx.mutual_information.is_finite() {
        return Verdict::new(true);
    }
    let mut verdict = test.evaluate(ctx);
    if ctx.p_value == 1.0 {
        verdict.independent = ctx.mutual_information <= threshold;
    }
    debug!(
        mutual_information = ctx.mutual_information,
        independent = verdict.independent,
        p_value = ?verdict.p_value,
        "independence test"
    );
    verdict
}

/// Memoized two-sided critical values of the standard normal distribution.
///
/// Keyed by the cumulative probability `1 - p / 2`. Concurrent callers may compute the same value
/// twice; the first one stored is kept.
#[derive(Debug, Default)]
pub struct CriticalValues {
    values: RwLock<HashMap<u64, f64>>,
}

impl CriticalValues {
    /// Creates an empty cache.
    pub fn new() -> Self {
        CriticalValues::default()
    }

    /// The critical value `c` such that `|z| <= c` with probability `1 - p_value`.
    ///
    /// ```
    /// use depscore::independence::CriticalValues;
    ///
    /// let cache = CriticalValues::new();
    /// let c = cache.get(0.05).unwrap();
    /// assert!((c - 1.959964).abs() < 1e-6);
    /// assert_eq!(cache.len(), 1);
    /// ```
    pub fn get(&self, p_value: f64) -> Option<f64> {
        let area = 1.0 - p_value / 2.0;
        if !(0.0..=1.0).contains(&area) {
            return None;
        }
        let key = area.to_bits();
        if let Some(&c) = self
            .values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return Some(c);
        }

        let c = Normal::new(0.0, 1.0).ok()?.inverse_cdf(area);
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        Some(*values.entry(key).or_insert(c))
    }

    /// Number of cached critical values.
    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns `true` if nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Independent iff the mutual information is at most a fixed threshold.
#[derive(Clone, Copy, Debug)]
struct ThresholdTest {
    threshold: f64,
}

impl IndependenceTest for ThresholdTest {
    fn evaluate(&self, ctx: &TestContext<'_>) -> Verdict {
        Verdict::new(ctx.mutual_information <= self.threshold)
    }
}

/// Mutual information of `count` shuffled copies of the slice.
///
/// All surrogates are binned with the plan chosen for the first one.
fn surrogate_information(
    slice: &Slice2D,
    algorithm: BinAlgorithm,
    count: usize,
    seed: u64,
) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut plan = None;
    (0..count)
        .map(|_| {
            let surrogate = slice.shuffled(&mut rng);
            let plan = *plan.get_or_insert_with(|| algorithm.bins_2d(&surrogate));
            entropy::mutual_information(&Histogram2D::build(&surrogate, plan))
        })
        .collect()
}

#[derive(Debug)]
struct SurrogateGaussTest {
    algorithm: BinAlgorithm,
    surrogates: usize,
    seed: u64,
    critical: Arc<CriticalValues>,
}

impl SurrogateGaussTest {
    fn z_score(&self, ctx: &TestContext<'_>) -> f64 {
        let values = surrogate_information(ctx.slice, self.algorithm, self.surrogates, self.seed);
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let mean_sq = values.iter().map(|v| v * v).sum::<f64>() / n;
        let std = (mean_sq - mean * mean).max(0.0).sqrt();
        trace!(mean, std, "surrogate distribution");
        (ctx.mutual_information - mean) / std
    }
}

impl IndependenceTest for SurrogateGaussTest {
    fn evaluate(&self, ctx: &TestContext<'_>) -> Verdict {
        let z = self.z_score(ctx);
        // Surrogates that all agree carry no evidence either way.
        if !z.is_finite() {
            return Verdict::with_p_value(true, 1.0);
        }
        let independent = match self.critical.get(ctx.p_value) {
            Some(c) => -c <= z && z <= c,
            None => true,
        };
        let p_value = Normal::new(0.0, 1.0).map_or(1.0, |normal| normal.sf(z));
        Verdict::with_p_value(independent, p_value)
    }
}

#[derive(Clone, Copy, Debug)]
struct SurrogateGeneralTest {
    algorithm: BinAlgorithm,
    seed: u64,
}

impl IndependenceTest for SurrogateGeneralTest {
    fn evaluate(&self, ctx: &TestContext<'_>) -> Verdict {
        let count = ((1.0 / ctx.p_value).round() as usize).saturating_sub(1);
        let values = surrogate_information(ctx.slice, self.algorithm, count, self.seed);
        let max = values.iter().copied().fold(0.0, f64::max);
        let extreme = values
            .iter()
            .filter(|&&v| v >= ctx.mutual_information)
            .count();
        trace!(count, max, extreme, "surrogate maximum");
        let p_value = (1 + extreme) as f64 / (1 + count) as f64;
        Verdict::with_p_value(ctx.mutual_information < max, p_value)
    }
}

/// Under independence, mutual information is approximately gamma distributed with shape
/// `(bins_x - 1)(bins_y - 1) / 2` and scale `1 / N`.
#[derive(Clone, Copy, Debug)]
struct GammaTest;

impl IndependenceTest for GammaTest {
    fn evaluate(&self, ctx: &TestContext<'_>) -> Verdict {
        let shape = ((ctx.plan.x as f64 - 1.0) * (ctx.plan.y as f64 - 1.0)) / 2.0;
        let rate = ctx.slice.len() as f64;
        match Gamma::new(shape, rate) {
            Ok(gamma) => {
                // Comparing probabilities avoids inverting the CDF numerically.
                let cdf = gamma.cdf(ctx.mutual_information);
                if cdf.is_nan() {
                    return Verdict::with_p_value(true, 1.0);
                }
                Verdict::with_p_value(cdf <= 1.0 - ctx.p_value, 1.0 - cdf)
            }
            Err(e) => {
                debug!(shape, rate, error = %e, "gamma distribution unavailable");
                Verdict::with_p_value(true, 1.0)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Correlation {
    Pearson,
    Spearman,
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    cov / (var_x * var_y).sqrt()
}

/// Ranks starting at 1, with tied values sharing the average of their ranks.
fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }
    ranks
}

/// Student's t-test on a correlation coefficient of the raw values. Weights are not used.
#[derive(Clone, Copy, Debug)]
struct CorrelationTest {
    method: Correlation,
    tails: u8,
}

impl IndependenceTest for CorrelationTest {
    fn evaluate(&self, ctx: &TestContext<'_>) -> Verdict {
        let samples = ctx.slice.samples();
        let n = samples.len();
        if n < 3 {
            return Verdict::new(true);
        }
        let x: Vec<f64> = samples.iter().map(|s| s.x()).collect();
        let y: Vec<f64> = samples.iter().map(|s| s.y()).collect();
        let r = match self.method {
            Correlation::Pearson => pearson(&x, &y),
            Correlation::Spearman => pearson(&ranks(&x), &ranks(&y)),
        };
        if r.is_nan() {
            return Verdict::new(true);
        }
        // Rounding can push a perfect correlation just past 1.
        let r = r.max(-1.0).min(1.0);
        let t = r * ((n as f64 - 2.0) / (1.0 - r * r)).sqrt();
        if t.is_nan() {
            return Verdict::new(true);
        }

        let dist = match StudentsT::new(0.0, 1.0, n as f64 - 1.0) {
            Ok(dist) => dist,
            Err(_) => return Verdict::new(true),
        };
        let p = if self.tails == 1 {
            dist.sf(t)
        } else {
            2.0 * dist.sf(t.abs())
        };
        trace!(method = ?self.method, r, t, p, "correlation");
        Verdict::new(p.is_nan() || ctx.p_value < p)
    }
}

/// Hypergeometric probability of the contingency table, read as a symmetric matrix.
///
/// Only cells strictly above the diagonal enter the computation.
fn fisher_probability(table: &ContingencyTable) -> f64 {
    let mut rows = vec![0u64; table.column_count()];
    let mut columns = vec![0u64; table.row_count()];
    let mut ln_cells = 0.0;
    let mut n = 0u64;
    for i in 0..table.column_count().saturating_sub(1) {
        for j in (i + 1)..table.row_count() {
            let a = table.get(i, j);
            rows[i] += a;
            columns[j] += a;
            n += a;
            ln_cells += ln_factorial(a);
        }
    }
    let ln_margins: f64 = rows
        .iter()
        .chain(columns.iter())
        .map(|&m| ln_factorial(m))
        .sum();
    (ln_margins - ln_factorial(n) - ln_cells).exp()
}

#[derive(Clone, Copy, Debug)]
struct FisherTest {
    tails: u8,
}

impl IndependenceTest for FisherTest {
    fn evaluate(&self, ctx: &TestContext<'_>) -> Verdict {
        if !ctx.plan.is_informative() {
            return Verdict::new(true);
        }
        let p = fisher_probability(&ContingencyTable::build(ctx.slice, ctx.plan));
        let p = if self.tails == 1 { p } else { 2.0 * p };
        trace!(p, "fisher");
        Verdict::new(p.is_nan() || ctx.p_value < p)
    }
}

/// Pearson's chi-square statistic over the weighted joint histogram.
fn chi_square(hist: &Histogram2D) -> f64 {
    let total = hist.total();
    let mut statistic = 0.0;
    for (bx, &cx) in hist.marginal_x().iter().enumerate() {
        for (by, &cy) in hist.marginal_y().iter().enumerate() {
            let expected = cx * cy / total;
            if expected > 0.0 {
                let diff = hist.get(bx, by) - expected;
                statistic += diff * diff / expected;
            }
        }
    }
    statistic
}

#[derive(Clone, Copy, Debug)]
struct ChiSquareTest;

impl IndependenceTest for ChiSquareTest {
    fn evaluate(&self, ctx: &TestContext<'_>) -> Verdict {
        let df = ((ctx.plan.x as f64 - 1.0) * (ctx.plan.y as f64 - 1.0)).max(0.0);
        let dist = match ChiSquared::new(df) {
            Ok(dist) => dist,
            Err(_) => return Verdict::with_p_value(true, 1.0),
        };
        let statistic = chi_square(&Histogram2D::build(ctx.slice, ctx.plan));
        let p = dist.sf(statistic);
        trace!(statistic, df, p, "chi-square");
        if p.is_nan() {
            return Verdict::with_p_value(true, 1.0);
        }
        Verdict::with_p_value(p >= ctx.p_value, p)
    }
}
