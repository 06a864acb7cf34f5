//! Choosing how many histogram bins to use for a slice.
//!
//! Four rules are available:
//!
//! 1. Rice's rule, a closed form in the sample size.
//! 2. Scott's normal reference rule, a closed form in the sample standard deviation.
//! 3. The Poisson point process cost of Shimazaki and Shinomoto,
//!    <http://toyoizumilab.brain.riken.jp/hideaki/res/histogram.html>
//! 4. A leave-one-out cross-validation cost,
//!    <https://maikolsolis.wordpress.com/2014/04/26/optimizing-histogram-cross-validation/>
//!
//! The last two search every feasible bin count and keep the cheapest. Both the search and the
//! resolution probe that bounds it subsample large slices, so the result is a reasonable bin
//! count rather than the exact optimum.

use crate::error::Error;
use crate::histogram::{Histogram1D, Histogram2D};
use crate::slice::{Slice1D, Slice2D};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, error, trace};

/// The search never evaluates more than this many candidate bin counts.
pub const MAX_SEARCH_SAMPLE_SIZE: usize = 1000;

/// No axis is ever split into more than this many bins on account of its resolution.
pub const MAX_HIST_BINS: usize = 100;

/// Number of values sampled when looking for the smallest gap between values.
pub const MAX_RES_SAMPLE_SIZE: usize = 10;

/// Number of samples used to estimate each candidate histogram during the search.
pub const MAX_HIST_SAMPLE_SIZE: usize = 10000;

/// How many equal-width bins partition the unit interval along each axis of a 2D slice.
///
/// Both counts are at least 1. A count of 1 means the axis can't discriminate anything.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct BinPlan {
    /// Bins along the first variable.
    pub x: usize,
    /// Bins along the second variable.
    pub y: usize,
}

impl BinPlan {
    /// Creates a plan with the given bin counts.
    pub fn new(x: usize, y: usize) -> Self {
        BinPlan { x, y }
    }

    /// Returns `true` if both axes have at least two bins, which every estimator needs in order to
    /// say anything.
    pub fn is_informative(&self) -> bool {
        self.x >= 2 && self.y >= 2
    }
}

/// The rule used to choose bin counts.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BinAlgorithm {
    /// `2 * N^(1/3)` bins.
    Rice,
    /// `N^(1/3) / (3.5 * std)` bins.
    Scott,
    /// Minimizes the Poisson point process cost `(2k - v) / (N h)²`.
    Poisson,
    /// Minimizes the leave-one-out cross-validation cost.
    #[serde(rename = "CROSSVAL")]
    CrossVal,
}

impl fmt::Display for BinAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinAlgorithm::Rice => "RICE",
            BinAlgorithm::Scott => "SCOTT",
            BinAlgorithm::Poisson => "POISSON",
            BinAlgorithm::CrossVal => "CROSSVAL",
        })
    }
}

impl FromStr for BinAlgorithm {
    type Err = Error;

    /// Parses an algorithm name, ignoring case.
    ///
    /// ```
    /// use depscore::BinAlgorithm;
    ///
    /// assert_eq!("crossval".parse::<BinAlgorithm>(), Ok(BinAlgorithm::CrossVal));
    /// assert!("sturges".parse::<BinAlgorithm>().is_err());
    /// ```
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_uppercase().as_str() {
            "RICE" => Ok(BinAlgorithm::Rice),
            "SCOTT" => Ok(BinAlgorithm::Scott),
            "POISSON" => Ok(BinAlgorithm::Poisson),
            "CROSSVAL" => Ok(BinAlgorithm::CrossVal),
            _ => {
                error!(name, "unsupported bin algorithm");
                Err(Error::UnsupportedBinAlgorithm(name.to_string()))
            }
        }
    }
}

/// Inclusive range of bin counts considered for one axis. Signed so that degenerate ranges can be
/// detected rather than wrapping.
#[derive(Clone, Copy, Debug, PartialEq)]
struct SearchRange {
    min: i64,
    max: i64,
}

impl SearchRange {
    fn pinned(count: u64) -> Self {
        let n = capped(count);
        SearchRange { min: n, max: n }
    }

    fn len(&self) -> i64 {
        self.max - self.min + 1
    }

    fn is_degenerate(&self) -> bool {
        self.min <= 0 || self.max <= 0 || self.len() <= 0
    }

    fn clamp(&self, n: f64) -> usize {
        if n.is_nan() {
            return self.min as usize;
        }
        n.max(self.min as f64).min(self.max as f64) as usize
    }
}

fn capped(count: u64) -> i64 {
    count.min(i32::MAX as u64) as i64
}

/// Works out which bin counts are worth considering for one axis.
///
/// `cap` is the sample-size bound: half the samples in 1D, `sqrt(N / 2)` per axis in 2D.
fn axis_range(categorical: bool, count: u64, cap: usize, values: &[f64]) -> SearchRange {
    if categorical || count < 5 {
        return SearchRange::pinned(count);
    }
    let by_resolution = (1.0 / resolution(values)) as i64 + 1;
    SearchRange {
        min: 2,
        max: by_resolution.min(capped(count)).min(cap as i64),
    }
}

/// The smallest positive gap between values, probing only a few reference values, and never finer
/// than `1 / MAX_HIST_BINS`.
fn resolution(values: &[f64]) -> f64 {
    let stride = (values.len() / MAX_RES_SAMPLE_SIZE).max(1);
    let mut res = f64::INFINITY;
    for vi in values.iter().step_by(stride) {
        for vj in values {
            let diff = (vj - vi).abs();
            if diff > 0.0 && diff < res {
                res = diff;
            }
        }
    }
    res.max(1.0 / MAX_HIST_BINS as f64)
}

/// Mean and biased variance of the cell counts. The cost functions need the biased estimator.
fn counts_mean_var(counts: &[f64]) -> (f64, f64) {
    let n = counts.len() as f64;
    let sum: f64 = counts.iter().sum();
    let sum_sq: f64 = counts.iter().map(|c| c * c).sum();
    let mean = sum / n;
    (mean, (sum_sq / n - mean * mean).max(0.0))
}

impl BinAlgorithm {
    /// Chooses the number of bins for a single variable.
    ///
    /// Categorical variables always get exactly one bin per category present under the active
    /// filters.
    ///
    /// ```
    /// use depscore::{BinAlgorithm, Slice1D, Variable};
    ///
    /// let mut slice = Slice1D::new(Variable::categorical(0));
    /// for i in 0..30 {
    ///     slice.add((i % 3) as f64 / 2.0, 1.0);
    /// }
    /// assert_eq!(BinAlgorithm::Poisson.bins_1d(&slice), 3);
    /// ```
    pub fn bins_1d(self, slice: &Slice1D) -> usize {
        let count = slice.count();
        if slice.variable().is_categorical() {
            return count.max(1) as usize;
        }

        let size = slice.len();
        let values: Vec<f64> = slice.samples().iter().map(|s| s.x()).collect();
        let range = axis_range(false, count, size / 2, &values);
        if range.is_degenerate() {
            error!(
                min = range.min,
                max = range.max,
                "bin search range is empty; falling back to a single bin"
            );
            return 1;
        }

        let cube_root = (size as f64).cbrt();
        let bins = match self {
            BinAlgorithm::Rice => range.clamp((2.0 * cube_root).round()),
            BinAlgorithm::Scott => {
                let (_, std) = slice.mean_std();
                range.clamp((cube_root / (3.5 * std)).round())
            }
            BinAlgorithm::Poisson => search_1d(slice, range, Objective::Poisson),
            BinAlgorithm::CrossVal => search_1d(slice, range, Objective::CrossVal),
        };
        debug!(algorithm = %self, bins, "chose 1D bins");
        bins
    }

    /// Chooses the number of bins along each axis of a pair of variables.
    ///
    /// ```
    /// use depscore::{BinAlgorithm, BinPlan, Slice2D, Variable};
    ///
    /// let mut slice = Slice2D::new(Variable::categorical(0), Variable::categorical(1));
    /// slice.add(0.0, 0.0, 1.0).add(1.0, 0.5, 1.0).add(1.0, 1.0, 1.0);
    /// assert_eq!(BinAlgorithm::Rice.bins_2d(&slice), BinPlan::new(2, 3));
    /// ```
    pub fn bins_2d(self, slice: &Slice2D) -> BinPlan {
        let size = slice.len();
        let cap = ((size / 2) as f64).sqrt() as usize;

        let range_x = {
            let values: Vec<f64> = if slice.x().is_categorical() {
                Vec::new()
            } else {
                slice.samples().iter().map(|s| s.x()).collect()
            };
            axis_range(slice.x().is_categorical(), slice.count_x(), cap, &values)
        };
        let range_y = {
            let values: Vec<f64> = if slice.y().is_categorical() {
                Vec::new()
            } else {
                slice.samples().iter().map(|s| s.y()).collect()
            };
            axis_range(slice.y().is_categorical(), slice.count_y(), cap, &values)
        };

        if range_x.is_degenerate() || range_y.is_degenerate() {
            error!(
                min_x = range_x.min,
                max_x = range_x.max,
                min_y = range_y.min,
                max_y = range_y.max,
                "bin search range is empty; falling back to a single bin"
            );
            return BinPlan::new(1, 1);
        }

        let cube_root = (size as f64).cbrt();
        let plan = match self {
            BinAlgorithm::Rice => {
                let per_axis = (2.0 * cube_root).sqrt().round();
                BinPlan::new(range_x.clamp(per_axis), range_y.clamp(per_axis))
            }
            BinAlgorithm::Scott => {
                let (_, std_x) = slice.mean_std_x();
                let (_, std_y) = slice.mean_std_y();
                BinPlan::new(
                    range_x.clamp((cube_root / (3.5 * std_x)).round()),
                    range_y.clamp((cube_root / (3.5 * std_y)).round()),
                )
            }
            BinAlgorithm::Poisson => search_2d(slice, range_x, range_y, Objective::Poisson),
            BinAlgorithm::CrossVal => search_2d(slice, range_x, range_y, Objective::CrossVal),
        };
        debug!(algorithm = %self, bins_x = plan.x, bins_y = plan.y, "chose 2D bins");
        plan
    }

}

/// The cost minimized by the search-based rules.
#[derive(Clone, Copy, Debug)]
enum Objective {
    Poisson,
    CrossVal,
}

impl Objective {
    /// Cost of a candidate histogram with `counts` cells of width (or area) `h` built from `size`
    /// samples.
    fn cost(self, size: usize, h: f64, counts: &[f64]) -> f64 {
        let n = size as f64;
        match self {
            Objective::Poisson => {
                let (k, v) = counts_mean_var(counts);
                (2.0 * k - v) / (n * n * h * h)
            }
            Objective::CrossVal => {
                let sum_sq: f64 = counts.iter().map(|c| c * c).sum();
                2.0 / ((n - 1.0) * h) - ((n + 1.0) / (n * n * (n - 1.0) * h)) * sum_sq
            }
        }
    }
}

fn search_1d(slice: &Slice1D, range: SearchRange, objective: Objective) -> usize {
    let size = slice.len();
    let hist_stride = (size / MAX_HIST_SAMPLE_SIZE).max(1);
    let len = range.len() as usize;
    let stride = (len / MAX_SEARCH_SAMPLE_SIZE).max(1);

    let mut best = ((range.min + range.max) / 2) as usize;
    let mut best_cost = f64::MAX;
    for i in (0..len).step_by(stride) {
        let n = range.min as usize + i;
        let hist = Histogram1D::strided(slice, n, hist_stride);
        let cost = objective.cost(size, 1.0 / n as f64, hist.counts());
        trace!(bins = n, cost, "bin candidate");
        if cost < best_cost {
            best_cost = cost;
            best = n;
        }
    }
    best
}

fn search_2d(
    slice: &Slice2D,
    range_x: SearchRange,
    range_y: SearchRange,
    objective: Objective,
) -> BinPlan {
    let size = slice.len();
    let hist_stride = (size / MAX_HIST_SAMPLE_SIZE).max(1);
    let len_x = range_x.len() as usize;
    let len_y = range_y.len() as usize;
    let candidates = len_x * len_y;
    let stride = (candidates / MAX_SEARCH_SAMPLE_SIZE).max(1);

    let mut best = BinPlan::new(
        ((range_x.min + range_x.max) / 2) as usize,
        ((range_y.min + range_y.max) / 2) as usize,
    );
    let mut best_cost = f64::MAX;
    for i in (0..candidates).step_by(stride) {
        let candidate = BinPlan::new(
            i / len_y + range_x.min as usize,
            i % len_y + range_y.min as usize,
        );
        let area = 1.0 / (candidate.x * candidate.y) as f64;
        let hist = Histogram2D::strided(slice, candidate, hist_stride);
        let cost = objective.cost(size, area, hist.cells());
        trace!(bins_x = candidate.x, bins_y = candidate.y, cost, "bin candidate");
        if cost < best_cost {
            best_cost = cost;
            best = candidate;
        }
    }
    best
}
