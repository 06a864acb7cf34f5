//! Settings that select and tune the scoring strategies.

use crate::bins::BinAlgorithm;
use crate::error::{Error, Result};
use crate::independence::DependencyTest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::error;

/// What [`Scorer::sort_score`](crate::Scorer::sort_score) ranks variables by.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortMethod {
    /// The similarity in [0, 1].
    Similarity,
    /// The significance score `-log10(p)`.
    Pvalue,
}

impl fmt::Display for SortMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortMethod::Similarity => "SIMILARITY",
            SortMethod::Pvalue => "PVALUE",
        })
    }
}

impl FromStr for SortMethod {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "SIMILARITY" => Ok(SortMethod::Similarity),
            "PVALUE" => Ok(SortMethod::Pvalue),
            _ => {
                error!(name, "unsupported sort method");
                Err(Error::UnsupportedSortMethod(name.to_string()))
            }
        }
    }
}

/// Everything that controls how a pair of variables is scored.
///
/// Missing fields take their defaults when deserializing, so a partial settings document is
/// enough:
///
/// ```
/// use depscore::{BinAlgorithm, Config, DependencyTest};
///
/// let config: Config = serde_json::from_str(
///     r#"{ "bin_algorithm": "SCOTT", "dependency_test": "SURROGATE_GAUSS" }"#,
/// )
/// .unwrap();
/// assert_eq!(config.bin_algorithm, BinAlgorithm::Scott);
/// assert_eq!(config.dependency_test, DependencyTest::SurrogateGauss);
/// assert_eq!(config.p_value, 0.05);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How bin counts are chosen.
    pub bin_algorithm: BinAlgorithm,
    /// How independence is decided.
    pub dependency_test: DependencyTest,
    /// Significance level, in (0, 1]. Exactly 1 disables significance testing in favor of
    /// `threshold`.
    pub p_value: f64,
    /// Number of shuffled surrogates drawn by `SURROGATE_GAUSS`.
    pub surrogate_count: usize,
    /// Mutual information at or below which `NO_TEST` declares independence.
    pub threshold: f64,
    /// One- or two-tailed correlation and exact tests.
    pub tail_count: u8,
    /// What variables are ranked by.
    pub sort_method: SortMethod,
    /// Variables missing at least this fraction of their values score 0.
    pub missing_threshold: f64,
    /// Seed for the surrogate shuffles, so that results are reproducible.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bin_algorithm: BinAlgorithm::Poisson,
            dependency_test: DependencyTest::GammaTest,
            p_value: 0.05,
            surrogate_count: 100,
            threshold: 1e-3,
            tail_count: 2,
            sort_method: SortMethod::Pvalue,
            missing_threshold: 0.8,
            seed: 0,
        }
    }
}

impl Config {
    /// Checks that every numeric setting is in range.
    ///
    /// ```
    /// use depscore::{Config, Error};
    ///
    /// let config = Config {
    ///     p_value: 0.0,
    ///     ..Config::default()
    /// };
    /// assert_eq!(config.validate(), Err(Error::InvalidPValue(0.0)));
    /// ```
    pub fn validate(&self) -> Result<()> {
        let result = if !(self.p_value > 0.0 && self.p_value <= 1.0) {
            Err(Error::InvalidPValue(self.p_value))
        } else if self.surrogate_count == 0 {
            Err(Error::InvalidSurrogateCount(self.surrogate_count))
        } else if !(self.threshold.is_finite() && self.threshold >= 0.0) {
            Err(Error::InvalidThreshold(self.threshold))
        } else if self.tail_count != 1 && self.tail_count != 2 {
            Err(Error::InvalidTailCount(self.tail_count))
        } else if !(0.0..=1.0).contains(&self.missing_threshold) {
            Err(Error::InvalidMissingThreshold(self.missing_threshold))
        } else {
            Ok(())
        };
        if let Err(e) = &result {
            error!(error = %e, "invalid configuration");
        }
        result
    }
}
