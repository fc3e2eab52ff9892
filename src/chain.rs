use faer::Mat;

use crate::summary::{summarize, ChainSummary, SummaryOptions};
use crate::{InferenceError, Result};

/// Draws of a Markov chain, stored row-major, together with the
/// log-density at every draw and the acceptance bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    dim: usize,
    draws: Vec<f64>,
    logp: Vec<f64>,
    num_accepted: u64,
    num_proposals: u64,
}

impl Chain {
    pub fn new(dim: usize) -> Self {
        Self::with_capacity(dim, 0)
    }

    pub fn with_capacity(dim: usize, num_draws: usize) -> Self {
        Self {
            dim,
            draws: Vec::with_capacity(dim * num_draws),
            logp: Vec::with_capacity(num_draws),
            num_accepted: 0,
            num_proposals: 0,
        }
    }

    /// Append the state after one step of the chain.
    pub fn push(&mut self, position: &[f64], logp: f64, accepted: bool) -> Result<()> {
        InferenceError::check_len("chain draw", self.dim, position.len())?;
        self.draws.extend_from_slice(position);
        self.logp.push(logp);
        self.num_proposals += 1;
        if accepted {
            self.num_accepted += 1;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.logp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logp.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn draw(&self, index: usize) -> Option<&[f64]> {
        if index >= self.len() {
            return None;
        }
        let start = index * self.dim;
        Some(&self.draws[start..start + self.dim])
    }

    pub fn draws(&self) -> impl ExactSizeIterator<Item = &[f64]> + '_ {
        (0..self.len()).map(move |i| &self.draws[i * self.dim..(i + 1) * self.dim])
    }

    /// Log-density at every draw.
    pub fn logp(&self) -> &[f64] {
        &self.logp
    }

    pub fn num_accepted(&self) -> u64 {
        self.num_accepted
    }

    pub fn acceptance_rate(&self) -> f64 {
        self.num_accepted as f64 / self.num_proposals.max(1) as f64
    }

    /// The draws as a `(len, dim)` matrix.
    pub fn to_mat(&self) -> Mat<f64> {
        Mat::from_fn(self.len(), self.dim, |i, j| self.draws[i * self.dim + j])
    }

    /// Drop the first `num_draws` draws as burn-in.
    ///
    /// The acceptance rate of the returned chain is the one of the full run.
    pub fn discard(&self, num_draws: usize) -> Chain {
        let skip = num_draws.min(self.len());
        Chain {
            dim: self.dim,
            draws: self.draws[skip * self.dim..].to_vec(),
            logp: self.logp[skip..].to_vec(),
            num_accepted: self.num_accepted,
            num_proposals: self.num_proposals,
        }
    }

    /// Keep every `step`-th draw, starting with the first.
    pub fn thin(&self, step: usize) -> Result<Chain> {
        if step == 0 {
            return Err(InferenceError::ShapeMismatch {
                context: "thinning step",
                expected: 1,
                found: 0,
            });
        }
        let mut draws = Vec::with_capacity(self.draws.len() / step + self.dim);
        for draw in self.draws().step_by(step) {
            draws.extend_from_slice(draw);
        }
        Ok(Chain {
            dim: self.dim,
            draws,
            logp: self.logp.iter().copied().step_by(step).collect(),
            num_accepted: self.num_accepted,
            num_proposals: self.num_proposals,
        })
    }

    pub fn summarize(&self, options: &SummaryOptions) -> Result<ChainSummary> {
        summarize(self.to_mat().as_ref(), options)
    }
}
