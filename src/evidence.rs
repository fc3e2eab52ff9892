//! Point-estimate based model comparison and forecasting.

use faer::{Mat, MatRef, Side};
use serde::{Deserialize, Serialize};

use crate::math::LN_2PI;
use crate::model::{eval_logp, ForwardModel, LogDensity};
use crate::problem::InferenceProblem;
use crate::sampler::StepScale;
use crate::{InferenceError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InformationCriteria {
    pub aic: f64,
    pub bic: f64,
}

/// Akaike and Bayesian information criteria for a model with `num_params`
/// free parameters fitted to `num_data` observations.
pub fn information_criteria(
    max_log_likelihood: f64,
    num_params: usize,
    num_data: usize,
) -> InformationCriteria {
    let k = num_params as f64;
    InformationCriteria {
        aic: 2f64 * k - 2f64 * max_log_likelihood,
        bic: k * (num_data.max(1) as f64).ln() - 2f64 * max_log_likelihood,
    }
}

/// Hessian of `-logp` at `point` from central differences.
///
/// Every entry uses the four points `point ± h_i e_i ± h_j e_j`, the
/// diagonal included, and only the upper triangle is evaluated.
pub fn numerical_hessian<L>(density: &L, point: &[f64], step: &StepScale) -> Result<Mat<f64>>
where
    L: LogDensity + ?Sized,
{
    let dim = point.len();
    let step = step.expand(dim)?;
    let mut shifted = point.to_vec();
    let mut neg_logp = |di: f64, i: usize, dj: f64, j: usize| -> Result<f64> {
        shifted.copy_from_slice(point);
        shifted[i] += di;
        shifted[j] += dj;
        Ok(-eval_logp(density, &shifted)?)
    };

    let mut hessian = Mat::zeros(dim, dim);
    for i in 0..dim {
        for j in i..dim {
            let (hi, hj) = (step[i], step[j]);
            let pp = neg_logp(hi, i, hj, j)?;
            let pm = neg_logp(hi, i, -hj, j)?;
            let mp = neg_logp(-hi, i, hj, j)?;
            let mm = neg_logp(-hi, i, -hj, j)?;
            let val = (pp - pm - mp + mm) / (4f64 * hi * hj);
            hessian[(i, j)] = val;
            hessian[(j, i)] = val;
        }
    }
    Ok(hessian)
}

/// Fisher information of the likelihood at `theta`, as the Hessian of the
/// negative log-likelihood. Priors are ignored.
pub fn fisher_matrix<M: ForwardModel>(
    problem: &InferenceProblem<M>,
    theta: &[f64],
    step: &StepScale,
) -> Result<Mat<f64>> {
    numerical_hessian(&problem.likelihood(), theta, step)
}

/// Laplace approximation of the log evidence around a mode with
/// log-density `logp_at_mode` and Hessian `hessian` of `-logp` there.
///
/// The Hessian must be positive definite, which a Cholesky factorization
/// checks. A positive determinant alone is not enough: a negative definite
/// matrix of even dimension has one too, but does not describe a maximum.
pub fn laplace_log_evidence(logp_at_mode: f64, hessian: MatRef<'_, f64>) -> Result<f64> {
    let k = hessian.nrows();
    InferenceError::check_len("hessian columns", k, hessian.ncols())?;
    let llt = hessian
        .llt(Side::Lower)
        .map_err(|_| InferenceError::NotPositiveDefinite("hessian"))?;
    let l = llt.L();
    if !(0..k).all(|i| l[(i, i)] > 0f64) {
        return Err(InferenceError::NotPositiveDefinite("hessian"));
    }
    let logdet = 2f64 * (0..k).map(|i| l[(i, i)].ln()).sum::<f64>();
    Ok(logp_at_mode + 0.5 * k as f64 * LN_2PI - 0.5 * logdet)
}
