use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::chain::Chain;
use crate::math::scaled_add_out;
use crate::model::{eval_logp, LogDensity};
use crate::{InferenceError, Result};

/// A step width for every parameter, either shared or one per parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepScale {
    Shared(f64),
    PerParameter(Vec<f64>),
}

impl StepScale {
    pub fn expand(&self, dim: usize) -> Result<Box<[f64]>> {
        match self {
            StepScale::Shared(scale) => Ok(vec![*scale; dim].into()),
            StepScale::PerParameter(scales) => {
                InferenceError::check_len("step scale", dim, scales.len())?;
                Ok(scales.clone().into())
            }
        }
    }
}

impl Default for StepScale {
    fn default() -> Self {
        StepScale::Shared(0.1)
    }
}

impl From<f64> for StepScale {
    fn from(value: f64) -> Self {
        StepScale::Shared(value)
    }
}

impl From<Vec<f64>> for StepScale {
    fn from(value: Vec<f64>) -> Self {
        StepScale::PerParameter(value)
    }
}

/// Settings for the random-walk Metropolis sampler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetropolisSettings {
    /// The number of draws. The chain always has exactly this many rows.
    pub num_steps: u64,
    /// Standard deviation of the Gaussian proposal in each dimension.
    pub proposal_scale: StepScale,
}

impl Default for MetropolisSettings {
    fn default() -> Self {
        Self {
            num_steps: 1000,
            proposal_scale: StepScale::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct Progress {
    pub draw: u64,
    pub accepted: bool,
    pub logp: f64,
}

/// Random-walk Metropolis-Hastings over a [`LogDensity`].
///
/// Proposals are `position + scale * N(0, I)`. Since they are symmetric, a
/// proposal is accepted if `ln(u) < logp(proposal) - logp(position)` for
/// `u ~ U(0, 1)`. Proposals with a non-finite log density are always
/// rejected. Every call to [`draw`](Self::draw) consumes one normal draw per
/// dimension and one uniform draw from the rng, whatever the outcome.
pub struct MetropolisChain<'a, L: LogDensity, R: Rng> {
    density: &'a L,
    rng: R,
    scale: Box<[f64]>,
    position: Box<[f64]>,
    proposal: Box<[f64]>,
    noise: Box<[f64]>,
    logp: f64,
    draw_count: u64,
    num_accepted: u64,
    arch: pulp::Arch,
}

impl<'a, L: LogDensity, R: Rng> MetropolisChain<'a, L, R> {
    /// Start a chain at `init`.
    ///
    /// This fails if the proposal scale has the wrong dimension or if the
    /// density returns an error at `init`.
    pub fn new(density: &'a L, init: &[f64], proposal_scale: &StepScale, rng: R) -> Result<Self> {
        let dim = init.len();
        let scale = proposal_scale.expand(dim)?;
        let logp = eval_logp(density, init)?;
        Ok(Self {
            density,
            rng,
            scale,
            position: init.into(),
            proposal: vec![0f64; dim].into(),
            noise: vec![0f64; dim].into(),
            logp,
            draw_count: 0,
            num_accepted: 0,
            arch: pulp::Arch::new(),
        })
    }

    /// Propose, accept or reject, and advance by one draw.
    pub fn draw(&mut self) -> Result<Progress> {
        for z in self.noise.iter_mut() {
            *z = self.rng.sample(StandardNormal);
        }
        scaled_add_out(
            self.arch,
            &self.position,
            &self.scale,
            &self.noise,
            &mut self.proposal,
        );

        let proposal_logp = eval_logp(self.density, &self.proposal)?;
        let u: f64 = self.rng.random();
        let accepted = proposal_logp.is_finite() && (u.ln() < proposal_logp - self.logp);
        if accepted {
            std::mem::swap(&mut self.position, &mut self.proposal);
            self.logp = proposal_logp;
            self.num_accepted += 1;
        }

        let progress = Progress {
            draw: self.draw_count,
            accepted,
            logp: self.logp,
        };
        self.draw_count += 1;
        Ok(progress)
    }

    pub fn position(&self) -> &[f64] {
        &self.position
    }

    pub fn current_logp(&self) -> f64 {
        self.logp
    }

    pub fn dim(&self) -> usize {
        self.position.len()
    }

    pub fn num_draws(&self) -> u64 {
        self.draw_count
    }

    pub fn num_accepted(&self) -> u64 {
        self.num_accepted
    }

    pub fn acceptance_rate(&self) -> f64 {
        self.num_accepted as f64 / self.draw_count.max(1) as f64
    }
}

/// Run a Metropolis chain from `init` for `settings.num_steps` draws.
///
/// Rejected proposals repeat the current position, so the returned chain
/// has exactly `num_steps` rows. Errors from the density stop sampling and
/// are returned as is.
pub fn sample_metropolis<L, R>(
    density: &L,
    init: &[f64],
    settings: &MetropolisSettings,
    rng: &mut R,
) -> Result<Chain>
where
    L: LogDensity,
    R: Rng + ?Sized,
{
    let mut sampler = MetropolisChain::new(density, init, &settings.proposal_scale, rng)?;
    let mut chain = Chain::with_capacity(init.len(), settings.num_steps as usize);

    for _ in 0..settings.num_steps {
        let progress = sampler.draw()?;
        chain.push(sampler.position(), progress.logp, progress.accepted)?;
    }

    log::debug!(
        "metropolis finished {} draws, acceptance rate {:.3}",
        sampler.num_draws(),
        sampler.acceptance_rate()
    );
    if (settings.num_steps > 0) & (sampler.num_accepted() == 0) {
        log::warn!(
            "metropolis rejected all {} proposals, check the priors and the initial point",
            settings.num_steps
        );
    }

    Ok(chain)
}
