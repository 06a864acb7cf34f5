#![warn(missing_docs)]
#![doc(test(no_crate_inject))]
#![doc(test(attr(deny(unused, future_incompatible))))]

//! This crate measures how strongly two variables depend on each other, so that every variable in
//! a dataset can be ranked against a variable of interest.
//!
//! A query starts from a [`Slice2D`]: the paired, normalized and possibly weighted observations of
//! two variables. From there:
//!
//! 1. a [`BinAlgorithm`] chooses how finely to bin each axis,
//! 2. a [`Histogram2D`] counts the weight falling into each cell,
//! 3. the [`entropy`] estimators turn those counts into bias-corrected mutual information,
//! 4. a [`DependencyTest`] decides whether that much information could be chance,
//! 5. and a [`Scorer`] combines it all into a [`DependencyResult`].
//!
//! The estimators follow Steuer et al., [The mutual information: Detecting and evaluating
//! dependencies between variables][steuer], 2002, and the bin searches follow Shimazaki and
//! Shinomoto, [A method for selecting the bin size of a time histogram][shimazaki], 2007.
//!
//! [steuer]: https://doi.org/10.1093/bioinformatics/18.suppl_2.S231
//! [shimazaki]: https://doi.org/10.1162/neco.2007.19.6.1503
//!
//! ```
//! use depscore::{Config, Scorer, Slice2D, Variable};
//!
//! let mut slice = Slice2D::new(Variable::numerical(0), Variable::numerical(1));
//! for i in 0..200 {
//!     let x = i as f64 / 199.0;
//!     slice.add(x, x * x, 1.0);
//! }
//!
//! let scorer = Scorer::new(Config::default()).unwrap();
//! let result = scorer.evaluate(&slice);
//! assert!(result.similarity > 0.0);
//! assert!(result.p_value < 0.05);
//! ```
//!
//! Every computation is a pure function of its inputs. The only shared state is the
//! [`CriticalValues`] cache, which is safe to use from many threads at once.

pub mod bins;
pub mod config;
pub mod entropy;
pub mod error;
pub mod histogram;
pub mod independence;
pub mod score;
pub mod slice;

pub use crate::bins::{BinAlgorithm, BinPlan};
pub use crate::config::{Config, SortMethod};
pub use crate::error::{Error, Result};
pub use crate::histogram::{CellSummary, ContingencyTable, Histogram1D, Histogram2D};
pub use crate::independence::{
    CriticalValues, DependencyTest, IndependenceTest, TestContext, Verdict,
};
pub use crate::score::{
    capped_score, score, DependencyResult, Scorer, MAX_SCORE, P_VALUE_FLOOR, SELF_SCORE,
};
pub use crate::slice::{Sample1D, Sample2D, Slice1D, Slice2D, Variable, VariableKind};
