//! Error taxonomy shared by the weighting, forecasting, scoring, budget and
//! sensitivity engines.
//!
//! Shape and history errors are structural preconditions and surface
//! immediately. Convergence failures are recovered locally by the forecast
//! fallback, and the budget optimizer reports them as `Ok(None)` instead.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum McdaError {
    /// Shape contract violated between weights, indicators and mapping.
    #[error("dimension mismatch in {context}: expected {expected}, got {got}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },

    /// Forecast requested on a series too short for the chosen model.
    #[error("insufficient history: need at least {required} points, got {got}")]
    InsufficientHistory { required: usize, got: usize },

    /// Nonlinear fit or optimizer did not converge.
    #[error("{stage} did not converge after {iterations} iterations")]
    ConvergenceFailure {
        stage: &'static str,
        iterations: usize,
    },

    #[error("{context} must not be empty")]
    Empty { context: &'static str },

    #[error("non-finite value in {context}: {value}")]
    NonFinite { context: &'static str, value: f64 },

    #[error("negative value in {context}: {value}")]
    NegativeValue { context: &'static str, value: f64 },

    #[error("{context} must be strictly positive, got {value}")]
    NonPositiveValue { context: &'static str, value: f64 },

    #[error("{context} must be square, got {rows}x{cols}")]
    NotSquare {
        context: &'static str,
        rows: usize,
        cols: usize,
    },

    #[error("invalid pairwise entry at ({row}, {col}): {value}")]
    InvalidPairwiseEntry { row: usize, col: usize, value: f64 },

    #[error("pairwise matrix is not reciprocal at ({row}, {col}): {forward} * {backward} != 1")]
    NonReciprocal {
        row: usize,
        col: usize,
        forward: f64,
        backward: f64,
    },

    #[error("indicator {indicator} maps to category {category}, only {categories} exist")]
    CategoryOutOfRange {
        indicator: usize,
        category: usize,
        categories: usize,
    },

    #[error("category {category} has no mapped indicators")]
    EmptyCategory { category: usize },

    #[error("entropy weighting needs at least {required} entities, got {got}")]
    TooFewEntities { required: usize, got: usize },

    #[error("invalid perturbation range [{low}, {high}]")]
    InvalidPerturbationRange { low: f64, high: f64 },

    #[error("invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("no random index configured for matrix order {order}")]
    MissingRandomIndex { order: usize },

    #[error("singular linear system in {context}")]
    SingularSystem { context: &'static str },

    /// Logistic fit converged to a curve that does not describe growth.
    #[error("logistic fit is not a growth curve (capacity {capacity}, rate {rate})")]
    NonGrowthCurve { capacity: f64, rate: f64 },
}

impl McdaError {
    pub(crate) fn dimension(context: &'static str, expected: usize, got: usize) -> Self {
        Self::DimensionMismatch {
            context,
            expected,
            got,
        }
    }
}

/// Reject NaN / infinity in a slice, naming the offending input.
pub(crate) fn ensure_finite(context: &'static str, values: &[f64]) -> Result<(), McdaError> {
    match values.iter().copied().find(|v| !v.is_finite()) {
        Some(value) => Err(McdaError::NonFinite { context, value }),
        None => Ok(()),
    }
}

pub(crate) fn ensure_positive(context: &'static str, values: &[f64]) -> Result<(), McdaError> {
    match values.iter().copied().find(|v| *v <= 0.0) {
        Some(value) => Err(McdaError::NonPositiveValue { context, value }),
        None => Ok(()),
    }
}
