use faer::{Mat, MatRef};

use crate::likelihood::{marginal_log_likelihood, NoiseModel, NuisanceSystem};
use crate::model::{ForwardModel, LogDensity};
use crate::prior::PriorSet;
use crate::{InferenceError, Result};

/// A dataset, a forward model, nuisance parameters and priors, bound into
/// one log-posterior.
///
/// The problem is immutable after construction and evaluating it never
/// mutates anything, so it can be shared by reference between threads
/// whenever the forward model can.
pub struct InferenceProblem<M: ForwardModel> {
    x: M::Input,
    y: Vec<f64>,
    noise: NoiseModel,
    observation_cov: Mat<f64>,
    model: M,
    parameter_names: Vec<String>,
    priors: PriorSet,
    nuisance: Option<NuisanceSystem>,
}

impl<M: ForwardModel> InferenceProblem<M> {
    /// Problem with flat priors and no nuisance parameters.
    ///
    /// Fails if a per-observation `sigma` does not match the length of `y`.
    pub fn new(x: M::Input, y: Vec<f64>, sigma: impl Into<NoiseModel>, model: M) -> Result<Self> {
        let noise = sigma.into();
        let observation_cov = noise.covariance(y.len())?;
        Ok(Self {
            x,
            y,
            noise,
            observation_cov,
            model,
            parameter_names: Vec::new(),
            priors: PriorSet::new(),
            nuisance: None,
        })
    }

    /// Names used to look up priors. Without names, parameters are called
    /// `p0, p1, ...`.
    pub fn with_parameter_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameter_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priors(mut self, priors: PriorSet) -> Self {
        self.priors = priors;
        self
    }

    pub fn with_nuisance(mut self, nuisance: NuisanceSystem) -> Result<Self> {
        InferenceError::check_len(
            "nuisance design rows",
            self.y.len(),
            nuisance.num_observations(),
        )?;
        self.nuisance = Some(nuisance);
        Ok(self)
    }

    pub fn x(&self) -> &M::Input {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn noise(&self) -> &NoiseModel {
        &self.noise
    }

    pub fn observation_covariance(&self) -> MatRef<'_, f64> {
        self.observation_cov.as_ref()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    pub fn priors(&self) -> &PriorSet {
        &self.priors
    }

    pub fn nuisance(&self) -> Option<&NuisanceSystem> {
        self.nuisance.as_ref()
    }

    pub fn num_observations(&self) -> usize {
        self.y.len()
    }

    fn names(&self) -> Option<&[String]> {
        if self.parameter_names.is_empty() {
            None
        } else {
            Some(&self.parameter_names)
        }
    }

    pub fn log_prior(&self, theta: &[f64]) -> Result<f64> {
        self.priors.log_prior(theta, self.names())
    }

    /// Marginal log-likelihood of the data at `theta`.
    pub fn log_likelihood(&self, theta: &[f64]) -> Result<f64> {
        let mu = self.model.predict(theta, &self.x);
        marginal_log_likelihood(
            &self.y,
            &mu,
            self.observation_cov.as_ref(),
            self.nuisance.as_ref(),
        )
    }

    /// Unnormalized log-posterior. The forward model is not evaluated where
    /// the prior vanishes.
    pub fn log_posterior(&self, theta: &[f64]) -> Result<f64> {
        let log_prior = self.log_prior(theta)?;
        if !log_prior.is_finite() {
            return Ok(f64::NEG_INFINITY);
        }
        Ok(log_prior + self.log_likelihood(theta)?)
    }

    /// View of the likelihood alone as a density, ignoring the priors.
    pub fn likelihood(&self) -> Likelihood<'_, M> {
        Likelihood { problem: self }
    }
}

impl<M: ForwardModel> LogDensity for InferenceProblem<M> {
    type Err = InferenceError;

    fn logp(&self, position: &[f64]) -> Result<f64> {
        self.log_posterior(position)
    }
}

/// See [`InferenceProblem::likelihood`].
pub struct Likelihood<'a, M: ForwardModel> {
    problem: &'a InferenceProblem<M>,
}

impl<M: ForwardModel> LogDensity for Likelihood<'_, M> {
    type Err = InferenceError;

    fn logp(&self, position: &[f64]) -> Result<f64> {
        self.problem.log_likelihood(position)
    }
}
