//! Information-theoretic quantities estimated from histograms, in nats.
//!
//! Plug-in estimators are biased on finite samples, so each one adds the first-order
//! Miller-Madow style correction described in "The Mutual Information: Detecting and evaluating
//! dependencies between variables" (Steuer et al., Bioinformatics 18, 2002, S231-S240).
//!
//! Every estimator returns a finite, non-negative number. Anything that would come out negative,
//! NaN, or infinite is reported as 0.

use crate::bins::BinAlgorithm;
use crate::histogram::{Histogram1D, Histogram2D};
use crate::slice::{Slice1D, Slice2D};

fn valid_or_zero(value: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        0.0
    }
}

/// Entropy of a single variable, with the `(bins - 1) / 2N` correction.
///
/// A histogram with fewer than two bins carries no information and has entropy 0.
///
/// ```
/// use depscore::entropy::marginal_entropy;
/// use depscore::{Histogram1D, Slice1D, Variable};
///
/// let mut slice = Slice1D::new(Variable::categorical(0));
/// slice.add(0.0, 1.0).add(1.0, 1.0);
///
/// let h = marginal_entropy(&Histogram1D::build(&slice, 2));
/// assert!((h - (2f64.ln() + 0.25)).abs() < 1e-12);
/// ```
pub fn marginal_entropy(hist: &Histogram1D) -> f64 {
    if hist.bins() < 2 {
        return 0.0;
    }
    let summary = hist.summary();
    let correction = (hist.bins() as f64 - 1.0) / (2.0 * summary.total);
    valid_or_zero(summary.entropy + correction)
}

/// Entropy of the joint distribution of a pair of variables.
///
/// The correction counts only the cells that actually hold weight: `(nonzero - 1) / 2N`.
pub fn joint_entropy(hist: &Histogram2D) -> f64 {
    if !hist.plan().is_informative() {
        return 0.0;
    }
    let summary = hist.summary();
    let correction = (summary.nonzero as f64 - 1.0) / (2.0 * summary.total);
    valid_or_zero(summary.entropy + correction)
}

/// Mutual information between the two variables of a joint histogram.
///
/// The raw estimate `Σ p(x,y) ln(p(x,y) / p(x)p(y))` is reduced by
/// `(nonzero - bins_x - bins_y + 1) / 2N` and floored at 0. When the samples occupy only one bin
/// along either axis there is no variation to explain, so the result is 0 outright.
///
/// ```
/// use depscore::entropy::mutual_information;
/// use depscore::{BinPlan, Histogram2D, Slice2D, Variable};
///
/// let mut slice = Slice2D::new(Variable::categorical(0), Variable::categorical(1));
/// slice.add(0.0, 0.0, 1.0).add(0.0, 1.0, 1.0).add(1.0, 0.0, 1.0).add(1.0, 1.0, 1.0);
///
/// let hist = Histogram2D::build(&slice, BinPlan::new(2, 2));
/// assert_eq!(mutual_information(&hist), 0.0);
/// ```
pub fn mutual_information(hist: &Histogram2D) -> f64 {
    let plan = hist.plan();
    if !plan.is_informative() {
        return 0.0;
    }

    let occupied = |marginal: &[f64]| marginal.iter().filter(|&&c| c > 0.0).count();
    if occupied(hist.marginal_x()) <= 1 || occupied(hist.marginal_y()) <= 1 {
        return 0.0;
    }

    let total = hist.total();
    let mut information = 0.0;
    let mut nonzero = 0usize;
    for (bx, &cx) in hist.marginal_x().iter().enumerate() {
        let px = cx / total;
        for (by, &cy) in hist.marginal_y().iter().enumerate() {
            let pxy = hist.get(bx, by) / total;
            let py = cy / total;
            if pxy > 0.0 && px > 0.0 && py > 0.0 {
                nonzero += 1;
                information += pxy * (pxy / (px * py)).ln();
            }
        }
    }
    if information.is_nan() || information < 0.0 {
        return 0.0;
    }

    let correction = (nonzero as f64 - plan.x as f64 - plan.y as f64 + 1.0) / (2.0 * total);
    valid_or_zero((information - correction).max(0.0))
}

/// Variation of information: how much of the joint entropy the mutual information doesn't
/// account for.
pub fn distance(hist: &Histogram2D) -> f64 {
    valid_or_zero(joint_entropy(hist) - mutual_information(hist))
}

/// Chooses bins with `algorithm`, then computes [`marginal_entropy`].
pub fn marginal_entropy_of(slice: &Slice1D, algorithm: BinAlgorithm) -> f64 {
    let bins = algorithm.bins_1d(slice);
    marginal_entropy(&Histogram1D::build(slice, bins))
}

/// Chooses bins with `algorithm`, then computes [`joint_entropy`].
pub fn joint_entropy_of(slice: &Slice2D, algorithm: BinAlgorithm) -> f64 {
    let plan = algorithm.bins_2d(slice);
    joint_entropy(&Histogram2D::build(slice, plan))
}

/// Chooses bins with `algorithm`, then computes [`mutual_information`].
///
/// ```
/// use depscore::entropy::{mutual_information, mutual_information_of};
/// use depscore::{BinAlgorithm, Histogram2D, Slice2D, Variable};
///
/// let mut slice = Slice2D::new(Variable::numerical(0), Variable::numerical(1));
/// for i in 0..200 {
///     let x = i as f64 / 199.0;
///     slice.add(x, x * x, 1.0);
/// }
///
/// let plan = BinAlgorithm::Poisson.bins_2d(&slice);
/// let hist = Histogram2D::build(&slice, plan);
/// assert_eq!(
///     mutual_information(&hist),
///     mutual_information_of(&slice, BinAlgorithm::Poisson),
/// );
/// ```
pub fn mutual_information_of(slice: &Slice2D, algorithm: BinAlgorithm) -> f64 {
    let plan = algorithm.bins_2d(slice);
    mutual_information(&Histogram2D::build(slice, plan))
}

/// Chooses bins with `algorithm`, then computes [`distance`].
pub fn distance_of(slice: &Slice2D, algorithm: BinAlgorithm) -> f64 {
    let plan = algorithm.bins_2d(slice);
    distance(&Histogram2D::build(slice, plan))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bins::BinPlan;
    use crate::slice::Variable;

    fn categorical(pairs: &[(f64, f64)]) -> Slice2D {
        let mut slice = Slice2D::new(Variable::categorical(0), Variable::categorical(1));
        for (x, y) in pairs.iter().copied() {
            slice.add(x, y, 1.0);
        }
        slice
    }

    fn diagonal() -> Histogram2D {
        let slice = categorical(&[(0.0, 0.0), (0.0, 0.0), (1.0, 1.0), (1.0, 1.0)]);
        Histogram2D::build(&slice, BinPlan::new(2, 2))
    }

    #[test]
    fn perfectly_dependent_pair() {
        let hist = diagonal();
        // Two nonzero cells out of 2x2: the correction is (2 - 2 - 2 + 1) / 8, which adds 1/8.
        let expected = 2f64.ln() + 0.125;
        assert!((mutual_information(&hist) - expected).abs() < 1e-12);
        assert!((joint_entropy(&hist) - expected).abs() < 1e-12);
        assert!(distance(&hist) < 1e-12);
    }

    #[test]
    fn single_bin_means_no_information() {
        let slice = categorical(&[(0.0, 0.0), (0.0, 1.0), (0.0, 0.5)]);
        let hist = Histogram2D::build(&slice, BinPlan::new(2, 3));
        assert_eq!(mutual_information(&hist), 0.0);

        let hist = Histogram2D::build(&slice, BinPlan::new(1, 3));
        assert_eq!(mutual_information(&hist), 0.0);
        assert_eq!(joint_entropy(&hist), 0.0);
    }

    #[test]
    fn empty_histograms_are_zero() {
        let slice = categorical(&[]);
        let hist = Histogram2D::build(&slice, BinPlan::new(2, 2));
        assert_eq!(mutual_information(&hist), 0.0);
        assert_eq!(joint_entropy(&hist), 0.0);
        assert_eq!(distance(&hist), 0.0);
        assert_eq!(marginal_entropy(&Histogram1D::build(&slice.slice_x(), 2)), 0.0);
    }

    #[test]
    fn marginal_correction_counts_all_bins() {
        let mut slice = Slice1D::new(Variable::numerical(0));
        slice.add(0.0, 1.0).add(0.1, 1.0).add(1.0, 2.0);
        let hist = Histogram1D::build(&slice, 4);
        // Cells [2, 0, 0, 2]: ln 2 plus a correction of 3 / 8.
        assert!((marginal_entropy(&hist) - (2f64.ln() + 0.375)).abs() < 1e-12);
        assert_eq!(marginal_entropy(&Histogram1D::build(&slice, 1)), 0.0);
    }

    #[test]
    fn weights_shift_the_estimate() {
        let mut slice = Slice2D::new(Variable::categorical(0), Variable::categorical(1));
        slice
            .add(0.0, 0.0, 3.0)
            .add(1.0, 1.0, 1.0)
            .add(0.0, 1.0, 0.0);
        let hist = Histogram2D::build(&slice, BinPlan::new(2, 2));
        let plug_in = -(0.75f64 * 0.75f64.ln() + 0.25 * 0.25f64.ln());
        let expected = plug_in + 1.0 / 8.0;
        assert!((mutual_information(&hist) - expected).abs() < 1e-12);
    }
}
