//! Core abstractions for the inference engine.
//!
//! Provides the [`LogDensity`] trait, the interface every sampler and
//! estimator in this crate evaluates, and the [`ForwardModel`] trait that
//! maps parameters and covariates to predicted observation means.

use std::convert::Infallible;
use std::fmt::Debug;

use crate::InferenceError;

/// An unnormalized log density over a parameter vector.
///
/// Implementations must not mutate shared state, so a single density can be
/// evaluated from several threads at once (the parallel MAP search relies on
/// this).
///
/// Returning `f64::NEG_INFINITY` marks a point with zero density. Errors are
/// reserved for structural problems like shape mismatches; samplers stop and
/// propagate them.
pub trait LogDensity {
    type Err: Debug + Into<InferenceError>;

    fn logp(&self, position: &[f64]) -> Result<f64, Self::Err>;
}

impl<F> LogDensity for F
where
    F: Fn(&[f64]) -> f64,
{
    type Err = Infallible;

    fn logp(&self, position: &[f64]) -> Result<f64, Infallible> {
        Ok(self(position))
    }
}

/// Evaluate `density` and convert its error into the crate error.
pub(crate) fn eval_logp<L: LogDensity + ?Sized>(
    density: &L,
    position: &[f64],
) -> crate::Result<f64> {
    density.logp(position).map_err(Into::into)
}

/// A deterministic map from parameters and covariates to the predicted mean
/// of every observation.
///
/// Plain closures `Fn(&[f64], &[f64]) -> Vec<f64>` implement this with
/// `Vec<f64>` covariates. Models that need structured covariates implement
/// it directly.
pub trait ForwardModel {
    type Input;

    fn predict(&self, theta: &[f64], x: &Self::Input) -> Vec<f64>;
}

impl<F> ForwardModel for F
where
    F: Fn(&[f64], &[f64]) -> Vec<f64>,
{
    type Input = Vec<f64>;

    fn predict(&self, theta: &[f64], x: &Vec<f64>) -> Vec<f64> {
        self(theta, x.as_slice())
    }
}
