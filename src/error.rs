//! Errors reported while configuring the engine or building slices.
//!
//! Numerical trouble during scoring is never an error: it resolves to "independent".

use thiserror::Error;

/// All errors produced by this crate.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    /// A binning algorithm name didn't match any known algorithm.
    #[error("unsupported bin algorithm: {0}")]
    UnsupportedBinAlgorithm(String),

    /// A dependency test name didn't match any known test.
    #[error("unsupported dependency test: {0}")]
    UnsupportedDependencyTest(String),

    /// A sort method name didn't match any known method.
    #[error("unsupported sort method: {0}")]
    UnsupportedSortMethod(String),

    /// The p-value threshold must be in (0, 1].
    #[error("p-value threshold {0} is outside (0, 1]")]
    InvalidPValue(f64),

    /// Surrogate tests need at least one surrogate.
    #[error("surrogate count must be positive, got {0}")]
    InvalidSurrogateCount(usize),

    /// The mutual information floor for `NO_TEST` must be finite and non-negative.
    #[error("mutual information threshold {0} must be finite and non-negative")]
    InvalidThreshold(f64),

    /// Correlation and exact tests are either one- or two-tailed.
    #[error("tail count must be 1 or 2, got {0}")]
    InvalidTailCount(u8),

    /// The missing-value threshold must be in [0, 1].
    #[error("missing threshold {0} is outside [0, 1]")]
    InvalidMissingThreshold(f64),

    /// Sample values must already be normalized into the unit interval.
    #[error("{axis} value {value} is outside [0, 1]")]
    SampleOutOfRange {
        /// Which axis the value belongs to.
        axis: char,
        /// The offending value.
        value: f64,
    },

    /// Sample weights must be finite and non-negative.
    #[error("weight {0} must be finite and non-negative")]
    InvalidWeight(f64),
}

/// Shorthand for results carrying this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
