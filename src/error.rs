use std::convert::Infallible;

use thiserror::Error;

/// Errors surfaced by the inference engine.
///
/// Only structural problems end up here. Numerically degenerate covariance
/// matrices are absorbed by the likelihood, and parameters outside of a
/// uniform prior show up as a log-posterior of negative infinity.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("shape mismatch in {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("unknown prior kind {0:?}")]
    UnknownPriorKind(String),
    #[error("invalid prior: {0}")]
    InvalidPrior(&'static str),
    #[error("chain contains no draws")]
    EmptyChain,
    #[error("quantile level {0} is not in [0, 1]")]
    InvalidQuantile(f64),
    #[error("{0} is not positive definite")]
    NotPositiveDefinite(&'static str),
    #[error("could not start thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("could not build arrow trace")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl InferenceError {
    pub(crate) fn check_len(context: &'static str, expected: usize, found: usize) -> Result<()> {
        if expected == found {
            Ok(())
        } else {
            Err(InferenceError::ShapeMismatch {
                context,
                expected,
                found,
            })
        }
    }
}

impl From<Infallible> for InferenceError {
    fn from(value: Infallible) -> Self {
        match value {}
    }
}

pub type Result<T> = std::result::Result<T, InferenceError>;
