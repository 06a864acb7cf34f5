//! Turning a pair of variables into the scores that rank them.

use crate::config::{Config, SortMethod};
use crate::entropy;
use crate::error::Result;
use crate::histogram::Histogram2D;
use crate::independence::{self, CriticalValues, IndependenceTest, TestContext, Verdict};
use crate::slice::Slice2D;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Smallest reported p-value: the smallest positive single-precision float. Keeps `-log10(p)`
/// finite.
pub const P_VALUE_FLOOR: f64 = 1.401298464324817e-45;

/// Score of a variable compared with itself, `-2 log10(P_VALUE_FLOOR)`.
pub const SELF_SCORE: f64 = 89.7069387078664;

/// Largest score worth displaying; see [`capped_score`].
pub const MAX_SCORE: f64 = 9.0;

/// P-values below this are all equally significant for display purposes.
pub const MIN_P_VALUE: f64 = 1e-8;

/// Everything known about the dependency between two variables.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DependencyResult {
    /// Bias-corrected mutual information, in nats. Never negative.
    pub mutual_information: f64,
    /// Significance of the dependency, in (0, 1].
    pub p_value: f64,
    /// Strength of the dependency in [0, 1]; exactly 1 only for a variable with itself.
    pub similarity: f64,
}

impl DependencyResult {
    fn unrelated() -> Self {
        DependencyResult {
            mutual_information: 0.0,
            p_value: 1.0,
            similarity: 0.0,
        }
    }
}

/// The significance score `-log10(p)`. Anything that isn't a positive p-value scores 0.
///
/// ```
/// assert!((depscore::score(0.01) - 2.0).abs() < 1e-12);
/// assert_eq!(depscore::score(0.0), 0.0);
/// assert_eq!(depscore::score(f64::NAN), 0.0);
/// ```
pub fn score(p_value: f64) -> f64 {
    if p_value > 0.0 {
        let s = -p_value.log10();
        if s.is_nan() {
            0.0
        } else {
            s
        }
    } else {
        0.0
    }
}

/// Clamps a significance score for display: every p-value below [`MIN_P_VALUE`] shows as
/// [`MAX_SCORE`].
pub fn capped_score(score: f64) -> f64 {
    if 10f64.powf(-score) < MIN_P_VALUE {
        MAX_SCORE
    } else {
        score
    }
}

/// `mi / joint`, clamped to [0, 1], treating `0 / 0` and NaN as 0.
fn normalized(mutual_information: f64, joint_entropy: f64) -> f64 {
    if joint_entropy.abs() < f64::EPSILON {
        return 0.0;
    }
    let w = (mutual_information / joint_entropy).clamp(0.0, 1.0);
    if w.is_nan() {
        0.0
    } else {
        w
    }
}

/// Scores pairs of variables under one configuration.
///
/// The configured strategies are resolved once, when the scorer is built, and the scorer can
/// then be shared between threads.
///
/// ```
/// use depscore::{Config, DependencyTest, Scorer, Slice2D, Variable};
///
/// let scorer = Scorer::new(Config {
///     dependency_test: DependencyTest::NoTest,
///     threshold: 0.0,
///     ..Config::default()
/// })
/// .unwrap();
///
/// let mut slice = Slice2D::new(Variable::categorical(0), Variable::categorical(1));
/// slice.add(0.0, 0.0, 1.0).add(0.0, 0.0, 1.0).add(1.0, 1.0, 1.0).add(1.0, 1.0, 1.0);
///
/// let result = scorer.evaluate(&slice);
/// assert!((result.similarity - 1.0).abs() < 1e-9);
/// ```
#[derive(Debug)]
pub struct Scorer {
    config: Config,
    test: Box<dyn IndependenceTest>,
}

impl Scorer {
    /// Validates `config` and resolves its strategies.
    pub fn new(config: Config) -> Result<Self> {
        Scorer::with_critical_values(config, Arc::new(CriticalValues::new()))
    }

    /// Like [`Scorer::new`], but looks critical values up in a cache shared with other scorers.
    pub fn with_critical_values(config: Config, critical: Arc<CriticalValues>) -> Result<Self> {
        config.validate()?;
        let test = config.dependency_test.build(&config, critical);
        debug!(
            bin_algorithm = %config.bin_algorithm,
            dependency_test = %config.dependency_test,
            p_value = config.p_value,
            "scorer ready"
        );
        Ok(Scorer { config, test })
    }

    /// The configuration this scorer was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Computes mutual information, p-value and similarity in one pass.
    pub fn evaluate(&self, slice: &Slice2D) -> DependencyResult {
        if slice.is_self_pair() {
            let plan = self.config.bin_algorithm.bins_2d(slice);
            return DependencyResult {
                mutual_information: entropy::mutual_information(&Histogram2D::build(slice, plan)),
                p_value: P_VALUE_FLOOR,
                similarity: 1.0,
            };
        }
        if !slice.is_comparable() {
            return DependencyResult::unrelated();
        }

        let plan = self.config.bin_algorithm.bins_2d(slice);
        let hist = Histogram2D::build(slice, plan);
        let mutual_information = entropy::mutual_information(&hist);
        let ctx = TestContext {
            slice,
            mutual_information,
            plan,
            p_value: self.config.p_value,
        };
        let verdict = independence::decide(self.test.as_ref(), &ctx, self.config.threshold);

        let similarity = if verdict.independent {
            0.0
        } else {
            normalized(mutual_information, entropy::joint_entropy(&hist))
        };
        let p_value = if plan.is_informative() {
            self.continuous_p_value(mutual_information, verdict)
        } else {
            1.0
        };
        DependencyResult {
            mutual_information,
            p_value,
            similarity,
        }
    }

    fn continuous_p_value(&self, mutual_information: f64, verdict: Verdict) -> f64 {
        if !mutual_information.is_finite() {
            return 1.0;
        }
        let p = if self.config.dependency_test.has_p_value() {
            verdict.p_value.unwrap_or(1.0)
        } else {
            0.0
        };
        if p.is_nan() {
            1.0
        } else {
            p.max(P_VALUE_FLOOR).min(1.0)
        }
    }

    /// The similarity of the pair in [0, 1], or 0 when it looks independent.
    pub fn similarity(&self, slice: &Slice2D) -> f64 {
        self.evaluate(slice).similarity
    }

    /// The mutual information of the pair and its p-value.
    ///
    /// Only the surrogate, gamma and chi-square tests produce a continuous p-value; every other
    /// test reports the floor. Pairs that can't be compared, or whose bins can't discriminate
    /// anything, report `(0, 1)`.
    pub fn p_value(&self, slice: &Slice2D) -> (f64, f64) {
        let result = self.evaluate(slice);
        (result.mutual_information, result.p_value)
    }

    /// The significance score of the pair, [`SELF_SCORE`] for a variable with itself.
    pub fn score(&self, slice: &Slice2D) -> f64 {
        if slice.is_self_pair() {
            SELF_SCORE
        } else {
            score(self.evaluate(slice).p_value)
        }
    }

    /// The value variables are ranked by, as chosen by the configured [`SortMethod`].
    ///
    /// Pairs missing too many values score 0.
    pub fn sort_score(&self, slice: &Slice2D) -> f64 {
        if slice.missing() >= self.config.missing_threshold {
            return 0.0;
        }
        match self.config.sort_method {
            SortMethod::Similarity => self.similarity(slice),
            SortMethod::Pvalue => self.score(slice),
        }
    }

    /// Orders candidate pairs from most to least dependent.
    ///
    /// Returns the index of each slice with its sort score. Ties keep their input order.
    pub fn rank(&self, slices: &[Slice2D]) -> Vec<(usize, f64)> {
        let mut ranked: Vec<(usize, f64)> = slices
            .iter()
            .enumerate()
            .map(|(i, slice)| (i, self.sort_score(slice)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}
