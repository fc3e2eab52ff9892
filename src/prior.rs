//! Independent per-parameter priors.
//!
//! Priors are looked up by parameter name. Parameters without an entry get a
//! flat, improper prior and contribute nothing to the log-prior.

use std::collections::HashMap;
use std::f64::consts::TAU;

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::{InferenceError, Result};

/// Prior for a single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TaggedPrior", into = "TaggedPrior")]
pub enum Prior {
    /// Zero density outside `[low, high]`, constant inside.
    ///
    /// The constant is not normalized, a uniform prior only ever adds 0 or
    /// `-inf` to the log-prior.
    Uniform { low: f64, high: f64 },
    Gaussian { mean: f64, variance: f64 },
}

impl Prior {
    pub fn uniform(low: f64, high: f64) -> Self {
        Prior::Uniform { low, high }
    }

    /// `variance` must be positive. Only priors parsed from a
    /// [`TaggedPrior`] are checked.
    pub fn gaussian(mean: f64, variance: f64) -> Self {
        Prior::Gaussian { mean, variance }
    }

    pub fn log_density(&self, value: f64) -> f64 {
        match *self {
            Prior::Uniform { low, high } => {
                if (low <= value) & (value <= high) {
                    0f64
                } else {
                    f64::NEG_INFINITY
                }
            }
            Prior::Gaussian { mean, variance } => {
                let diff = value - mean;
                -0.5 * (diff * diff / variance + (TAU * variance).ln())
            }
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Prior::Uniform { low, high } => low + (high - low) * rng.random::<f64>(),
            Prior::Gaussian { mean, variance } => {
                let norm: f64 = rng.sample(StandardNormal);
                mean + variance.sqrt() * norm
            }
        }
    }
}

/// A scalar, vector or nested matrix argument of a [`TaggedPrior`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriorValue {
    Scalar(f64),
    Vector(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
}

impl PriorValue {
    fn len(&self) -> usize {
        match self {
            PriorValue::Scalar(_) => 1,
            PriorValue::Vector(vals) => vals.len(),
            PriorValue::Matrix(rows) => rows.iter().map(|row| row.len()).sum(),
        }
    }

    fn scalar(&self, context: &'static str) -> Result<f64> {
        match self {
            PriorValue::Scalar(val) => Ok(*val),
            other => Err(InferenceError::ShapeMismatch {
                context,
                expected: 1,
                found: other.len(),
            }),
        }
    }

    /// The scalar itself, or the leading element of a vector or matrix.
    fn leading(&self, context: &'static str) -> Result<f64> {
        let leading = match self {
            PriorValue::Scalar(val) => Some(*val),
            PriorValue::Vector(vals) => vals.first().copied(),
            PriorValue::Matrix(rows) => rows.first().and_then(|row| row.first()).copied(),
        };
        leading.ok_or(InferenceError::ShapeMismatch {
            context,
            expected: 1,
            found: 0,
        })
    }
}

impl From<f64> for PriorValue {
    fn from(value: f64) -> Self {
        PriorValue::Scalar(value)
    }
}

/// Loosely typed prior description, `(kind, a, b)`.
///
/// Known kinds are `"uniform"` with scalar bounds and `"gaussian"` with a
/// mean and variance. A Gaussian mean or variance given as a vector or
/// matrix is reduced to its leading element, so multivariate variances are
/// not supported and only the first diagonal entry takes effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedPrior(pub String, pub PriorValue, pub PriorValue);

impl TaggedPrior {
    pub fn new(kind: impl Into<String>, a: impl Into<PriorValue>, b: impl Into<PriorValue>) -> Self {
        TaggedPrior(kind.into(), a.into(), b.into())
    }
}

impl TryFrom<TaggedPrior> for Prior {
    type Error = InferenceError;

    fn try_from(TaggedPrior(kind, a, b): TaggedPrior) -> Result<Self> {
        match kind.as_str() {
            "uniform" => Ok(Prior::Uniform {
                low: a.scalar("uniform prior lower bound")?,
                high: b.scalar("uniform prior upper bound")?,
            }),
            "gaussian" => {
                if b.len() > 1 {
                    log::warn!(
                        "gaussian prior variance has {} entries, only the first diagonal element is used",
                        b.len()
                    );
                }
                let variance = b.leading("gaussian prior variance")?;
                if variance.is_nan() || variance <= 0f64 {
                    return Err(InferenceError::InvalidPrior(
                        "gaussian prior variance must be positive",
                    ));
                }
                Ok(Prior::Gaussian {
                    mean: a.leading("gaussian prior mean")?,
                    variance,
                })
            }
            _ => Err(InferenceError::UnknownPriorKind(kind)),
        }
    }
}

impl From<Prior> for TaggedPrior {
    fn from(value: Prior) -> Self {
        match value {
            Prior::Uniform { low, high } => TaggedPrior::new("uniform", low, high),
            Prior::Gaussian { mean, variance } => TaggedPrior::new("gaussian", mean, variance),
        }
    }
}

/// Priors by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorSet {
    priors: HashMap<String, Prior>,
}

impl PriorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, prior: Prior) -> Self {
        self.priors.insert(name.into(), prior);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, prior: Prior) -> Option<Prior> {
        self.priors.insert(name.into(), prior)
    }

    /// Parse loosely typed `(name, (kind, a, b))` entries.
    pub fn from_tagged<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, TaggedPrior)>,
        S: Into<String>,
    {
        let priors = entries
            .into_iter()
            .map(|(name, tagged)| Ok((name.into(), Prior::try_from(tagged)?)))
            .collect::<Result<_>>()?;
        Ok(Self { priors })
    }

    pub fn get(&self, name: &str) -> Option<&Prior> {
        self.priors.get(name)
    }

    pub fn len(&self) -> usize {
        self.priors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.priors.is_empty()
    }

    /// Sum of the per-parameter log-densities of `theta`.
    ///
    /// Parameters are matched to priors through `names`, which defaults to
    /// `p0, p1, ...`. A parameter outside of its uniform bounds makes the
    /// whole log-prior `-inf` and stops the evaluation.
    pub fn log_prior(&self, theta: &[f64], names: Option<&[String]>) -> Result<f64> {
        if self.priors.is_empty() {
            return Ok(0f64);
        }

        let mut logp = 0f64;
        match names {
            Some(names) => {
                InferenceError::check_len("parameter names", theta.len(), names.len())?;
                for (name, &value) in names.iter().zip(theta) {
                    if let Some(prior) = self.priors.get(name) {
                        logp += prior.log_density(value);
                        if logp == f64::NEG_INFINITY {
                            return Ok(logp);
                        }
                    }
                }
            }
            None => {
                for (i, &value) in theta.iter().enumerate() {
                    if let Some(prior) = self.priors.get(&default_name(i)) {
                        logp += prior.log_density(value);
                        if logp == f64::NEG_INFINITY {
                            return Ok(logp);
                        }
                    }
                }
            }
        }
        Ok(logp)
    }

    /// Draw a starting point from the priors. Entries without a prior keep
    /// their current value.
    pub fn init_position<R: Rng + ?Sized>(
        &self,
        names: &[String],
        rng: &mut R,
        position: &mut [f64],
    ) -> Result<()> {
        InferenceError::check_len("parameter names", position.len(), names.len())?;
        for (name, value) in names.iter().zip(position.iter_mut()) {
            if let Some(prior) = self.priors.get(name) {
                *value = prior.sample(rng);
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, Prior)> for PriorSet {
    fn from_iter<T: IntoIterator<Item = (String, Prior)>>(iter: T) -> Self {
        Self {
            priors: iter.into_iter().collect(),
        }
    }
}

/// Placeholder name of the parameter at `index`.
pub fn default_name(index: usize) -> String {
    format!("p{index}")
}

/// `p0, p1, ...` for `dim` parameters.
pub fn default_names(dim: usize) -> Vec<String> {
    (0..dim).map(default_name).collect()
}
