//! Weighted histograms over equal-width bins of the unit interval.

use crate::bins::BinPlan;
use crate::slice::{Slice1D, Slice2D};
use std::iter;

/// Maps a normalized value to one of `bins` equal-width bins.
///
/// Values on the right edge of the unit interval land in the last bin.
pub(crate) fn bin_index(value: f64, bins: usize) -> usize {
    let bin = (value / (1.0 / bins as f64)).floor();
    if bin > 0.0 {
        (bin as usize).min(bins - 1)
    } else {
        0
    }
}

/// Summary statistics over the cells of a histogram.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub struct CellSummary {
    /// The plug-in [Shannon entropy][] of the cells, in nats, without any finite-size correction.
    ///
    /// [Shannon entropy]: https://en.wikipedia.org/wiki/Entropy_(information_theory)
    pub entropy: f64,

    /// The total weight across all cells.
    pub total: f64,

    /// How many cells have positive weight.
    pub nonzero: usize,
}

impl iter::FromIterator<f64> for CellSummary {
    /// Creates a summary for a histogram whose cells are provided by the given iterator.
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut summary = CellSummary {
            entropy: 0.0,
            total: 0.0,
            nonzero: 0,
        };
        for count in iter {
            if count > 0.0 {
                summary.entropy -= count * count.ln();
                summary.total += count;
                summary.nonzero += 1;
            }
        }
        if summary.total > 0.0 {
            summary.entropy /= summary.total;
            summary.entropy += summary.total.ln();
        }
        summary
    }
}

/// Weighted counts of a single variable.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram1D {
    counts: Vec<f64>,
}

impl Histogram1D {
    /// Bins every sample of the slice.
    ///
    /// # Panics
    ///
    /// Panics if `bins` is zero.
    ///
    /// ```
    /// use depscore::{Histogram1D, Slice1D, Variable};
    ///
    /// let mut slice = Slice1D::new(Variable::numerical(0));
    /// slice.add(0.0, 1.0).add(0.3, 2.0).add(1.0, 0.5);
    ///
    /// let hist = Histogram1D::build(&slice, 2);
    /// assert_eq!(hist.counts(), &[3.0, 0.5]);
    /// ```
    pub fn build(slice: &Slice1D, bins: usize) -> Self {
        Histogram1D::strided(slice, bins, 1)
    }

    // Bins every `stride`-th sample; the bin search uses this to bound its cost.
    pub(crate) fn strided(slice: &Slice1D, bins: usize, stride: usize) -> Self {
        assert!(bins > 0, "a histogram needs at least one bin");
        let mut counts = vec![0.0; bins];
        for sample in slice.samples().iter().step_by(stride.max(1)) {
            counts[bin_index(sample.x(), bins)] += sample.w();
        }
        Histogram1D { counts }
    }

    /// Number of bins.
    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    /// The weighted count of each bin.
    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    /// Sum of all bin weights.
    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }

    /// Compute a [`CellSummary`] over the bins.
    pub fn summary(&self) -> CellSummary {
        self.counts.iter().copied().collect()
    }
}

/// Weighted joint counts of a pair of variables, with their marginals.
///
/// Cells are indexed by `(x bin, y bin)`. A "column" holds every y bin for one x bin, and a "row"
/// every x bin for one y bin.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram2D {
    plan: BinPlan,
    cells: Vec<f64>,
    marginal_x: Vec<f64>,
    marginal_y: Vec<f64>,
}

impl Histogram2D {
    /// Bins every sample of the slice.
    ///
    /// # Panics
    ///
    /// Panics if either bin count is zero.
    ///
    /// ```
    /// use depscore::{BinPlan, Histogram2D, Slice2D, Variable};
    ///
    /// let mut slice = Slice2D::new(Variable::categorical(0), Variable::categorical(1));
    /// slice.add(0.0, 0.0, 1.0).add(0.0, 0.0, 1.0).add(1.0, 1.0, 1.0).add(1.0, 1.0, 1.0);
    ///
    /// let hist = Histogram2D::build(&slice, BinPlan::new(2, 2));
    /// assert_eq!(hist.column(0), &[2.0, 0.0]);
    /// assert_eq!(hist.column(1), &[0.0, 2.0]);
    /// assert_eq!(hist.marginal_x(), &[2.0, 2.0]);
    /// assert_eq!(hist.marginal_y(), &[2.0, 2.0]);
    /// ```
    pub fn build(slice: &Slice2D, plan: BinPlan) -> Self {
        Histogram2D::strided(slice, plan, 1)
    }

    pub(crate) fn strided(slice: &Slice2D, plan: BinPlan, stride: usize) -> Self {
        assert!(
            plan.x > 0 && plan.y > 0,
            "a histogram needs at least one bin per axis"
        );
        let mut hist = Histogram2D {
            plan,
            cells: vec![0.0; plan.x * plan.y],
            marginal_x: vec![0.0; plan.x],
            marginal_y: vec![0.0; plan.y],
        };
        for sample in slice.samples().iter().step_by(stride.max(1)) {
            let bx = bin_index(sample.x(), plan.x);
            let by = bin_index(sample.y(), plan.y);
            hist.cells[bx * plan.y + by] += sample.w();
            hist.marginal_x[bx] += sample.w();
            hist.marginal_y[by] += sample.w();
        }
        hist
    }

    /// The bin counts this histogram was built with.
    pub fn plan(&self) -> BinPlan {
        self.plan
    }

    /// The weight in one cell.
    pub fn get(&self, bx: usize, by: usize) -> f64 {
        self.cells[bx * self.plan.y + by]
    }

    /// Every cell, ordered by x bin and then by y bin.
    pub fn cells(&self) -> &[f64] {
        &self.cells
    }

    /// The cells for one x bin, ordered by y bin.
    pub fn column(&self, bx: usize) -> &[f64] {
        &self.cells[bx * self.plan.y..(bx + 1) * self.plan.y]
    }

    /// The cells for one y bin, ordered by x bin.
    pub fn row(&self, by: usize) -> Vec<f64> {
        (0..self.plan.x).map(|bx| self.get(bx, by)).collect()
    }

    /// Total weight per x bin.
    pub fn marginal_x(&self) -> &[f64] {
        &self.marginal_x
    }

    /// Total weight per y bin.
    pub fn marginal_y(&self) -> &[f64] {
        &self.marginal_y
    }

    /// Sum of all cell weights.
    pub fn total(&self) -> f64 {
        self.cells.iter().sum()
    }

    /// Compute a [`CellSummary`] over the joint cells.
    pub fn summary(&self) -> CellSummary {
        self.cells.iter().copied().collect()
    }
}

/// An integer R×C contingency table, as needed by exact combinatorial tests.
///
/// Cells hold the weighted counts of a [`Histogram2D`], truncated to integers.
#[derive(Clone, Debug, PartialEq)]
pub struct ContingencyTable {
    plan: BinPlan,
    cells: Vec<u64>,
}

impl ContingencyTable {
    /// Bins the slice and truncates every cell to an integer count.
    pub fn build(slice: &Slice2D, plan: BinPlan) -> Self {
        ContingencyTable::from(&Histogram2D::build(slice, plan))
    }

    /// Number of x bins.
    pub fn column_count(&self) -> usize {
        self.plan.x
    }

    /// Number of y bins.
    pub fn row_count(&self) -> usize {
        self.plan.y
    }

    /// Returns `true` if the table has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The count in one cell.
    pub fn get(&self, bx: usize, by: usize) -> u64 {
        self.cells[bx * self.plan.y + by]
    }

    /// The counts for one x bin, ordered by y bin.
    pub fn column(&self, bx: usize) -> &[u64] {
        &self.cells[bx * self.plan.y..(bx + 1) * self.plan.y]
    }

    /// The counts for one y bin, ordered by x bin.
    pub fn row(&self, by: usize) -> Vec<u64> {
        (0..self.plan.x).map(|bx| self.get(bx, by)).collect()
    }

    /// Total count per x bin.
    pub fn column_totals(&self) -> Vec<u64> {
        (0..self.plan.x)
            .map(|bx| self.column(bx).iter().sum())
            .collect()
    }

    /// Total count per y bin.
    pub fn row_totals(&self) -> Vec<u64> {
        (0..self.plan.y)
            .map(|by| (0..self.plan.x).map(|bx| self.get(bx, by)).sum())
            .collect()
    }
}

impl From<&Histogram2D> for ContingencyTable {
    fn from(hist: &Histogram2D) -> Self {
        ContingencyTable {
            plan: hist.plan,
            cells: hist.cells.iter().map(|&count| count.round() as u64).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice::Variable;

    #[test]
    fn bin_index_clamps_edges() {
        assert_eq!(bin_index(0.0, 4), 0);
        assert_eq!(bin_index(0.24, 4), 0);
        assert_eq!(bin_index(0.25, 4), 1);
        assert_eq!(bin_index(1.0, 4), 3);
        assert_eq!(bin_index(1.0, 1), 0);
    }

    #[test]
    fn summary_entropy_in_nats() {
        let uniform: CellSummary = vec![1.0, 1.0, 0.0, 1.0, 1.0].into_iter().collect();
        assert!((uniform.entropy - 4f64.ln()).abs() < 1e-12);
        assert_eq!(uniform.total, 4.0);
        assert_eq!(uniform.nonzero, 4);

        let empty: CellSummary = iter::empty::<f64>().collect();
        assert_eq!(empty.entropy, 0.0);
        assert_eq!(empty.nonzero, 0);
    }

    #[test]
    fn weights_are_conserved() {
        let mut slice = Slice2D::new(Variable::numerical(0), Variable::numerical(1));
        for i in 0..97 {
            let x = (i as f64 * 0.37) % 1.0;
            let y = (i as f64 * 0.61) % 1.0;
            slice.add(x, y, 0.5 + (i % 3) as f64);
        }
        let hist = Histogram2D::build(&slice, BinPlan::new(5, 3));
        assert!((hist.total() - slice.total_weight()).abs() < 1e-9);
        assert!((hist.marginal_x().iter().sum::<f64>() - slice.total_weight()).abs() < 1e-9);
        assert!((hist.marginal_y().iter().sum::<f64>() - slice.total_weight()).abs() < 1e-9);
        for by in 0..3 {
            let row: f64 = hist.row(by).iter().sum();
            assert!((row - hist.marginal_y()[by]).abs() < 1e-9);
        }
    }

    #[test]
    fn contingency_rows_and_columns() {
        let mut slice = Slice2D::new(Variable::categorical(0), Variable::categorical(1));
        slice
            .add(0.0, 0.0, 1.0)
            .add(0.0, 1.0, 1.0)
            .add(0.0, 1.0, 1.0)
            .add(1.0, 1.0, 1.0)
            .add(0.5, 0.0, 1.0);
        let table = ContingencyTable::build(&slice, BinPlan::new(3, 2));
        assert_eq!(table.column(0), &[1, 2]);
        assert_eq!(table.row(1), vec![2, 0, 1]);
        assert_eq!(table.column_totals(), vec![3, 1, 1]);
        assert_eq!(table.row_totals(), vec![2, 3]);
        assert!(!table.is_empty());
    }

    #[test]
    fn fractional_weights_round_to_counts() {
        // Ten weights of 0.1 sum to 0.9999999999999999.
        let mut slice = Slice2D::new(Variable::categorical(0), Variable::categorical(1));
        for _ in 0..10 {
            slice.add(0.0, 0.0, 0.1);
        }
        slice.add(1.0, 1.0, 1.0);
        let hist = Histogram2D::build(&slice, BinPlan::new(2, 2));
        assert!(hist.column(0)[0] < 1.0);
        let table = ContingencyTable::from(&hist);
        assert_eq!(table.column(0), &[1, 0]);
        assert_eq!(table.column_totals(), vec![1, 1]);
    }
}
