//! Bayesian parameter inference for forward models with Gaussian noise.
//!
//! An [`InferenceProblem`] binds observations, a [`ForwardModel`], priors
//! and optional linear nuisance parameters into one log-posterior. It can be
//! sampled with [`sample_metropolis`], maximized crudely with
//! [`random_search`] or [`random_search_parallel`], and the resulting
//! [`Chain`] summarized with [`Chain::summarize`].
//!
//! ```
//! use mhfit::{sample_metropolis, InferenceProblem, MetropolisSettings, Prior, PriorSet};
//! use rand::SeedableRng;
//!
//! let line = |theta: &[f64], x: &[f64]| -> Vec<f64> {
//!     x.iter().map(|x| theta[0] + theta[1] * x).collect()
//! };
//! let priors = PriorSet::new()
//!     .with("offset", Prior::uniform(-10., 10.))
//!     .with("slope", Prior::uniform(-10., 10.));
//! let problem = InferenceProblem::new(vec![0., 1., 2.], vec![1., 2., 3.], 0.1, line)?
//!     .with_parameter_names(["offset", "slope"])
//!     .with_priors(priors);
//!
//! let settings = MetropolisSettings {
//!     num_steps: 100,
//!     proposal_scale: 0.05.into(),
//! };
//! let mut rng = rand::rngs::StdRng::seed_from_u64(42);
//! let chain = sample_metropolis(&problem, &[0., 0.], &settings, &mut rng)?;
//! assert_eq!(chain.len(), 100);
//! # Ok::<(), mhfit::InferenceError>(())
//! ```

pub(crate) mod chain;
pub(crate) mod error;
pub(crate) mod evidence;
pub(crate) mod likelihood;
pub(crate) mod map_search;
pub(crate) mod math;
pub(crate) mod model;
pub(crate) mod prior;
pub(crate) mod problem;
pub(crate) mod sampler;
pub(crate) mod storage;
pub(crate) mod summary;

pub use chain::Chain;
pub use error::{InferenceError, Result};
pub use evidence::{
    fisher_matrix, information_criteria, laplace_log_evidence, numerical_hessian,
    InformationCriteria,
};
pub use likelihood::{
    effective_moments, gaussian_log_likelihood, marginal_log_likelihood, NoiseModel,
    NuisanceSystem,
};
pub use map_search::{random_search, random_search_parallel, MapEstimate, RandomSearchSettings};
pub use model::{ForwardModel, LogDensity};
pub use prior::{default_name, default_names, Prior, PriorSet, PriorValue, TaggedPrior};
pub use problem::{InferenceProblem, Likelihood};
pub use sampler::{sample_metropolis, MetropolisChain, MetropolisSettings, Progress, StepScale};
pub use summary::{summarize, summarize_rows, ChainSummary, SummaryOptions};
