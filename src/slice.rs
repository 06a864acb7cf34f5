//! Weighted samples and the slices that carry them into a dependency query.
//!
//! A slice holds every normalized observation of one variable (or pair of variables) that passed
//! the caller's range filters, together with the metadata the estimators need: whether each
//! variable is categorical, how many distinct values it takes, and how its weights combine with
//! the other variable's.

use crate::error::{Error, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

/// Whether a variable takes a known, exact set of categories or continuous values.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum VariableKind {
    /// Discrete values whose cardinality is known exactly.
    Categorical,
    /// Continuous values whose resolution is limited only by the data.
    Numerical,
}

/// Metadata about one variable in a dependency query.
///
/// Two slices refer to the same variable when their `id`s are equal, which is how self-pairs are
/// recognized.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Variable {
    /// Identifier assigned by the caller.
    pub id: usize,
    /// Categorical or numerical.
    pub kind: VariableKind,
    /// This variable holds sampling weights for other variables.
    pub weight: bool,
    /// This variable's observations carry a sampling weight.
    pub weighted: bool,
    /// The weights involved describe a subsample rather than a survey weighting. For a weight
    /// variable this is its own flag; otherwise it's the flag of the variable that weights it.
    pub subsample: bool,
}

impl Variable {
    /// An unweighted numerical variable.
    pub fn numerical(id: usize) -> Self {
        Variable {
            id,
            kind: VariableKind::Numerical,
            weight: false,
            weighted: false,
            subsample: false,
        }
    }

    /// An unweighted categorical variable.
    pub fn categorical(id: usize) -> Self {
        Variable {
            kind: VariableKind::Categorical,
            ..Variable::numerical(id)
        }
    }

    /// Marks this variable as being weighted by another variable.
    pub fn weighted_by(mut self, subsample: bool) -> Self {
        self.weighted = true;
        self.subsample = subsample;
        self
    }

    /// Marks this variable as itself holding weights.
    pub fn as_weight(mut self, subsample: bool) -> Self {
        self.weight = true;
        self.subsample = subsample;
        self
    }

    /// Returns `true` for categorical variables.
    pub fn is_categorical(&self) -> bool {
        self.kind == VariableKind::Categorical
    }

    /// Returns `false` when a dependency between these two variables is meaningless: weight
    /// variables can't be compared with anything, and two subsamples never co-occur.
    ///
    /// ```
    /// use depscore::Variable;
    ///
    /// let a = Variable::numerical(0).weighted_by(true);
    /// let b = Variable::numerical(1).weighted_by(true);
    /// let c = Variable::numerical(2);
    /// let w = Variable::numerical(3).as_weight(false);
    ///
    /// assert!(!a.is_comparable(&b));
    /// assert!(a.is_comparable(&c));
    /// assert!(!c.is_comparable(&w));
    /// ```
    pub fn is_comparable(&self, other: &Variable) -> bool {
        !(self.weight || other.weight || (self.subsample && other.subsample))
    }

    /// Combines the weights that `self` and `other` assign to the same record into the weight of
    /// the paired sample.
    ///
    /// `own` and `theirs` are the weights read for each variable; they are ignored for a variable
    /// that isn't weighted.
    ///
    /// ```
    /// use depscore::Variable;
    ///
    /// let survey = Variable::numerical(0).weighted_by(false);
    /// let other_survey = Variable::numerical(1).weighted_by(false);
    /// let subsample = Variable::numerical(2).weighted_by(true);
    /// let plain = Variable::numerical(3);
    ///
    /// assert_eq!(survey.combined_weight(&other_survey, 0.5, 2.0), 0.5);
    /// assert_eq!(survey.combined_weight(&subsample, 0.5, 2.0), 2.0);
    /// assert_eq!(subsample.combined_weight(&subsample, 1.0, 1.0), 0.0);
    /// assert_eq!(plain.combined_weight(&survey, 7.0, 3.0), 3.0);
    /// ```
    pub fn combined_weight(&self, other: &Variable, own: f64, theirs: f64) -> f64 {
        if self.weight || other.weight {
            1.0
        } else if !self.weighted || !other.weighted {
            if self.weighted {
                own
            } else if other.weighted {
                theirs
            } else {
                1.0
            }
        } else if self.subsample && other.subsample {
            0.0
        } else if !self.subsample && !other.subsample {
            own.min(theirs)
        } else if self.subsample {
            own
        } else {
            theirs
        }
    }
}

fn unit_value(axis: char, value: f64) -> Result<f64> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        // -0.0 is stored as 0.0 so that both count as one distinct value.
        Ok(value + 0.0)
    } else {
        Err(Error::SampleOutOfRange { axis, value })
    }
}

fn sample_weight(w: f64) -> Result<f64> {
    if w.is_finite() && w >= 0.0 {
        Ok(w)
    } else {
        Err(Error::InvalidWeight(w))
    }
}

/// One observation of one variable, normalized into the unit interval.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample1D {
    x: f64,
    w: f64,
}

impl Sample1D {
    /// Creates a sample with weight 1.
    pub fn new(x: f64) -> Result<Self> {
        Sample1D::weighted(x, 1.0)
    }

    /// Creates a sample with the given sampling weight.
    pub fn weighted(x: f64, w: f64) -> Result<Self> {
        Ok(Sample1D {
            x: unit_value('x', x)?,
            w: sample_weight(w)?,
        })
    }

    /// The normalized value.
    pub fn x(&self) -> f64 {
        self.x
    }

    /// The sampling weight.
    pub fn w(&self) -> f64 {
        self.w
    }
}

/// One record pairing the normalized values of two variables.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample2D {
    x: f64,
    y: f64,
    w: f64,
    label: Option<Arc<str>>,
}

impl Sample2D {
    /// Creates a sample with weight 1.
    pub fn new(x: f64, y: f64) -> Result<Self> {
        Sample2D::weighted(x, y, 1.0)
    }

    /// Creates a sample with the given combined weight.
    pub fn weighted(x: f64, y: f64, w: f64) -> Result<Self> {
        Ok(Sample2D {
            x: unit_value('x', x)?,
            y: unit_value('y', y)?,
            w: sample_weight(w)?,
            label: None,
        })
    }

    /// Attaches a label identifying the record this sample came from.
    pub fn with_label(mut self, label: impl Into<Arc<str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The normalized value of the first variable.
    pub fn x(&self) -> f64 {
        self.x
    }

    /// The normalized value of the second variable.
    pub fn y(&self) -> f64 {
        self.y
    }

    /// The combined sampling weight.
    pub fn w(&self) -> f64 {
        self.w
    }

    /// The record label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

fn distinct(values: impl Iterator<Item = f64>) -> u64 {
    let mut values: Vec<u64> = values.map(f64::to_bits).collect();
    values.sort_unstable();
    values.dedup();
    values.len() as u64
}

// Weighted mean and biased standard deviation of `value * weight`, as the Scott rule expects.
fn mean_std(values: impl Iterator<Item = (f64, f64)>) -> (f64, f64) {
    let mut n = 0usize;
    let mut mean = 0.0;
    let mut mean_sq = 0.0;
    for (x, w) in values {
        let xw = x * w;
        mean += xw;
        mean_sq += xw * xw;
        n += 1;
    }
    if n == 0 {
        return (0.0, 0.0);
    }
    mean /= n as f64;
    mean_sq /= n as f64;
    (mean, (mean_sq - mean * mean).max(0.0).sqrt())
}

// Rescales weights so they sum to the number of kept samples.
fn normalization_factor(kept: usize, weight_sum: f64) -> Option<f64> {
    let factor = kept as f64 / weight_sum;
    if factor.is_finite() && (factor - 1.0).abs() >= f64::EPSILON {
        Some(factor)
    } else {
        None
    }
}

/// All the observations of a single variable that passed the caller's filters.
#[derive(Clone, Debug)]
pub struct Slice1D {
    variable: Variable,
    count: Option<u64>,
    samples: Vec<Sample1D>,
    missing: f64,
}

impl Slice1D {
    /// Creates an empty slice for the given variable.
    pub fn new(variable: Variable) -> Self {
        Slice1D {
            variable,
            count: None,
            samples: Vec::new(),
            missing: 0.0,
        }
    }

    /// Creates a slice from samples that have already been validated.
    pub fn from_samples(variable: Variable, samples: Vec<Sample1D>) -> Self {
        Slice1D {
            samples,
            ..Slice1D::new(variable)
        }
    }

    /// Creates a slice from raw observations, the way a data-access layer would after applying
    /// its range filters.
    ///
    /// An observation whose value is `None`, or whose weight is negative, counts as missing.
    /// Kept weights are rescaled so that they sum to the number of kept observations.
    ///
    /// ```
    /// use depscore::{Slice1D, Variable};
    ///
    /// let slice = Slice1D::from_observations(
    ///     Variable::numerical(0),
    ///     vec![(Some(0.0), 2.0), (None, 1.0), (Some(1.0), 2.0), (Some(0.5), -1.0)],
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(slice.len(), 2);
    /// assert_eq!(slice.missing(), 0.5);
    /// assert_eq!(slice.total_weight(), 2.0);
    /// ```
    pub fn from_observations<I>(variable: Variable, observations: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Option<f64>, f64)>,
    {
        let mut total = 0usize;
        let mut missing = 0usize;
        let mut weight_sum = 0.0;
        let mut samples = Vec::new();
        for (x, w) in observations {
            total += 1;
            if w.is_nan() {
                return Err(Error::InvalidWeight(w));
            }
            match x {
                Some(x) if w >= 0.0 => {
                    let sample = Sample1D::weighted(x, w)?;
                    weight_sum += sample.w;
                    samples.push(sample);
                }
                _ => missing += 1,
            }
        }

        if let Some(factor) = normalization_factor(samples.len(), weight_sum) {
            for sample in samples.iter_mut() {
                sample.w *= factor;
            }
        }

        Ok(Slice1D {
            variable,
            count: None,
            samples,
            missing: if total > 0 {
                missing as f64 / total as f64
            } else {
                0.0
            },
        })
    }

    /// Overrides the number of distinct values of this variable under the active filters.
    ///
    /// Without this, the count is taken from the distinct values present in the slice.
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    /// Appends a sample.
    ///
    /// # Panics
    ///
    /// Panics if `x` is outside [0, 1] or `w` is negative or not finite.
    pub fn add(&mut self, x: f64, w: f64) -> &mut Self {
        let sample = Sample1D::weighted(x, w).unwrap_or_else(|e| panic!("{}", e));
        self.samples.push(sample);
        self
    }

    /// The variable this slice observes.
    pub fn variable(&self) -> &Variable {
        &self.variable
    }

    /// The samples, in insertion order.
    pub fn samples(&self) -> &[Sample1D] {
        &self.samples
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of distinct values of the variable under the active filters.
    pub fn count(&self) -> u64 {
        self.count
            .unwrap_or_else(|| distinct(self.samples.iter().map(|s| s.x)))
    }

    /// Fraction of filtered records that had no usable value.
    pub fn missing(&self) -> f64 {
        self.missing
    }

    /// Sum of all sample weights.
    pub fn total_weight(&self) -> f64 {
        self.samples.iter().map(|s| s.w).sum()
    }

    /// Mean and standard deviation of the weighted values.
    pub fn mean_std(&self) -> (f64, f64) {
        mean_std(self.samples.iter().map(|s| (s.x, s.w)))
    }
}

/// All the paired observations of two variables that passed the caller's filters.
#[derive(Clone, Debug)]
pub struct Slice2D {
    x: Variable,
    y: Variable,
    count_x: Option<u64>,
    count_y: Option<u64>,
    samples: Vec<Sample2D>,
    missing: f64,
}

impl Slice2D {
    /// Creates an empty slice pairing `x` with `y`.
    pub fn new(x: Variable, y: Variable) -> Self {
        Slice2D {
            x,
            y,
            count_x: None,
            count_y: None,
            samples: Vec::new(),
            missing: 0.0,
        }
    }

    /// Creates a slice from samples that have already been validated.
    pub fn from_samples(x: Variable, y: Variable, samples: Vec<Sample2D>) -> Self {
        Slice2D {
            samples,
            ..Slice2D::new(x, y)
        }
    }

    /// Creates a slice from raw paired observations.
    ///
    /// An observation is missing if either value is `None` or the weight is negative. The weight
    /// of each observation should already be the [combined weight](Variable::combined_weight) of
    /// the pair. Kept weights are rescaled so they sum to the number of kept observations.
    pub fn from_observations<I>(x: Variable, y: Variable, observations: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Option<f64>, Option<f64>, f64)>,
    {
        let mut total = 0usize;
        let mut missing = 0usize;
        let mut weight_sum = 0.0;
        let mut samples = Vec::new();
        for (vx, vy, w) in observations {
            total += 1;
            if w.is_nan() {
                return Err(Error::InvalidWeight(w));
            }
            match (vx, vy) {
                (Some(vx), Some(vy)) if w >= 0.0 => {
                    let sample = Sample2D::weighted(vx, vy, w)?;
                    weight_sum += sample.w;
                    samples.push(sample);
                }
                _ => missing += 1,
            }
        }

        if let Some(factor) = normalization_factor(samples.len(), weight_sum) {
            for sample in samples.iter_mut() {
                sample.w *= factor;
            }
        }

        Ok(Slice2D {
            samples,
            missing: if total > 0 {
                missing as f64 / total as f64
            } else {
                0.0
            },
            ..Slice2D::new(x, y)
        })
    }

    /// Overrides the number of distinct values of each variable under the active filters.
    pub fn with_counts(mut self, count_x: u64, count_y: u64) -> Self {
        self.count_x = Some(count_x);
        self.count_y = Some(count_y);
        self
    }

    /// Appends a sample.
    ///
    /// # Panics
    ///
    /// Panics if either value is outside [0, 1] or `w` is negative or not finite.
    pub fn add(&mut self, x: f64, y: f64, w: f64) -> &mut Self {
        let sample = Sample2D::weighted(x, y, w).unwrap_or_else(|e| panic!("{}", e));
        self.samples.push(sample);
        self
    }

    /// Appends a sample that was built separately, for instance to carry a label.
    pub fn add_sample(&mut self, sample: Sample2D) -> &mut Self {
        self.samples.push(sample);
        self
    }

    /// The first variable.
    pub fn x(&self) -> &Variable {
        &self.x
    }

    /// The second variable.
    pub fn y(&self) -> &Variable {
        &self.y
    }

    /// The samples, in insertion order.
    pub fn samples(&self) -> &[Sample2D] {
        &self.samples
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of distinct values of the first variable under the active filters.
    pub fn count_x(&self) -> u64 {
        self.count_x
            .unwrap_or_else(|| distinct(self.samples.iter().map(|s| s.x)))
    }

    /// Number of distinct values of the second variable under the active filters.
    pub fn count_y(&self) -> u64 {
        self.count_y
            .unwrap_or_else(|| distinct(self.samples.iter().map(|s| s.y)))
    }

    /// Fraction of filtered records that had no usable pair of values.
    pub fn missing(&self) -> f64 {
        self.missing
    }

    /// Sum of all sample weights.
    pub fn total_weight(&self) -> f64 {
        self.samples.iter().map(|s| s.w).sum()
    }

    /// Returns `true` if both axes observe the same variable.
    pub fn is_self_pair(&self) -> bool {
        self.x.id == self.y.id
    }

    /// See [`Variable::is_comparable`].
    pub fn is_comparable(&self) -> bool {
        self.x.is_comparable(&self.y)
    }

    /// Mean and standard deviation of the weighted first values.
    pub fn mean_std_x(&self) -> (f64, f64) {
        mean_std(self.samples.iter().map(|s| (s.x, s.w)))
    }

    /// Mean and standard deviation of the weighted second values.
    pub fn mean_std_y(&self) -> (f64, f64) {
        mean_std(self.samples.iter().map(|s| (s.y, s.w)))
    }

    /// Returns a surrogate of this slice: the second values are randomly reassigned across
    /// records, while each record keeps its first value, weight and label.
    ///
    /// The surrogate has the same marginal distributions as this slice but no dependency between
    /// the two variables beyond chance.
    pub fn shuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> Slice2D {
        let mut ys: Vec<f64> = self.samples.iter().map(|s| s.y).collect();
        ys.shuffle(rng);
        let samples = self
            .samples
            .iter()
            .zip(ys)
            .map(|(sample, y)| Sample2D {
                y,
                ..sample.clone()
            })
            .collect();
        Slice2D {
            x: self.x,
            y: self.y,
            count_x: Some(self.count_x()),
            count_y: Some(self.count_y()),
            samples,
            missing: self.missing,
        }
    }

    /// Projects this slice onto its first variable.
    pub fn slice_x(&self) -> Slice1D {
        Slice1D {
            variable: self.x,
            count: self.count_x,
            samples: self
                .samples
                .iter()
                .map(|s| Sample1D { x: s.x, w: s.w })
                .collect(),
            missing: self.missing,
        }
    }

    /// Projects this slice onto its second variable.
    pub fn slice_y(&self) -> Slice1D {
        Slice1D {
            variable: self.y,
            count: self.count_y,
            samples: self
                .samples
                .iter()
                .map(|s| Sample1D { x: s.y, w: s.w })
                .collect(),
            missing: self.missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pairs(values: &[(f64, f64)]) -> Slice2D {
        let mut slice = Slice2D::new(Variable::numerical(0), Variable::numerical(1));
        for (x, y) in values.iter().copied() {
            slice.add(x, y, 1.0);
        }
        slice
    }

    #[test]
    fn rejects_unnormalized_samples() {
        assert_eq!(
            Sample2D::new(0.5, 1.5),
            Err(Error::SampleOutOfRange {
                axis: 'y',
                value: 1.5
            })
        );
        assert_eq!(Sample1D::weighted(0.5, -1.0), Err(Error::InvalidWeight(-1.0)));
        assert!(Sample1D::new(f64::NAN).is_err());
    }

    #[test]
    #[should_panic]
    fn add_panics_on_bad_value() {
        Slice1D::new(Variable::numerical(0)).add(2.0, 1.0);
    }

    #[test]
    fn signed_zeros_are_one_value() {
        let slice = pairs(&[(-0.0, 0.0), (0.0, -0.0), (1.0, 1.0)]);
        assert_eq!(slice.count_x(), 2);
        assert_eq!(slice.count_y(), 2);
        assert!(slice.samples()[0].x().is_sign_positive());
        assert_eq!(Slice1D::new(Variable::numerical(0)).add(-0.0, 1.0).count(), 1);
    }

    #[test]
    fn counts_distinct_values_when_not_given() {
        let slice = pairs(&[(0.0, 0.0), (0.5, 0.0), (1.0, 1.0), (0.5, 1.0)]);
        assert_eq!(slice.count_x(), 3);
        assert_eq!(slice.count_y(), 2);

        let slice = slice.with_counts(7, 9);
        assert_eq!(slice.count_x(), 7);
        assert_eq!(slice.count_y(), 9);
    }

    #[test]
    fn shuffle_keeps_x_and_weights() {
        let mut slice = Slice2D::new(Variable::numerical(0), Variable::numerical(1));
        for i in 0..50 {
            let v = i as f64 / 49.0;
            slice.add(v, v, 1.0 + i as f64);
        }
        let mut rng = StdRng::seed_from_u64(7);
        let surrogate = slice.shuffled(&mut rng);

        assert_eq!(surrogate.len(), slice.len());
        for (a, b) in slice.samples().iter().zip(surrogate.samples()) {
            assert_eq!(a.x(), b.x());
            assert_eq!(a.w(), b.w());
        }

        let mut original: Vec<u64> = slice.samples().iter().map(|s| s.y().to_bits()).collect();
        let mut permuted: Vec<u64> = surrogate.samples().iter().map(|s| s.y().to_bits()).collect();
        assert_ne!(original, permuted);
        original.sort_unstable();
        permuted.sort_unstable();
        assert_eq!(original, permuted);

        // The source slice is untouched.
        assert!(slice.samples().iter().all(|s| s.x() == s.y()));
    }

    #[test]
    fn observations_track_missing_and_normalize() {
        let slice = Slice2D::from_observations(
            Variable::numerical(0),
            Variable::numerical(1),
            vec![
                (Some(0.0), Some(1.0), 3.0),
                (Some(1.0), None, 1.0),
                (Some(1.0), Some(0.0), 1.0),
                (None, None, 1.0),
            ],
        )
        .unwrap();
        assert_eq!(slice.len(), 2);
        assert_eq!(slice.missing(), 0.5);
        assert!((slice.total_weight() - 2.0).abs() < 1e-12);
        assert!((slice.samples()[0].w() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn projections_keep_weights() {
        let mut slice = pairs(&[(0.25, 0.75)]);
        slice.add(1.0, 0.0, 3.0);
        let x = slice.slice_x();
        let y = slice.slice_y();
        assert_eq!(x.samples()[1].x(), 1.0);
        assert_eq!(y.samples()[0].x(), 0.75);
        assert_eq!(y.total_weight(), 4.0);
    }

    #[test]
    fn labels_survive_shuffling() {
        let mut slice = Slice2D::new(Variable::numerical(0), Variable::numerical(1));
        slice.add_sample(Sample2D::new(0.0, 1.0).unwrap().with_label("first"));
        slice.add_sample(Sample2D::new(1.0, 0.0).unwrap().with_label("second"));
        let surrogate = slice.shuffled(&mut StdRng::seed_from_u64(1));
        assert_eq!(surrogate.samples()[0].label(), Some("first"));
        assert_eq!(surrogate.samples()[1].label(), Some("second"));
    }
}
