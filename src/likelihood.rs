//! Gaussian log-likelihood and analytic marginalization over additive
//! linear nuisance parameters.
//!
//! The observation model is `y = mu(theta) + A nu + eps` with
//! `eps ~ N(0, cov_y)` and `nu ~ N(nu_mean, nu_cov)`. Integrating out `nu`
//! leaves a Gaussian with mean `mu + A nu_mean` and covariance
//! `cov_y + A nu_cov A^T`.

use faer::{Mat, MatRef, Side};
use itertools::izip;
use serde::{Deserialize, Serialize};

use crate::math::{forward_substitution, matrix_from_rows, LN_2PI};
use crate::{InferenceError, Result};

const LOGDET_REGULARIZATION: f64 = 1e-12;
const DET_FLOOR: f64 = 1e-30;
const PINV_RCOND: f64 = 1e-15;

/// Observation noise, turned into a diagonal covariance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoiseModel {
    /// The same standard deviation for every observation.
    Homoscedastic(f64),
    /// One standard deviation per observation.
    PerObservation(Vec<f64>),
}

impl NoiseModel {
    pub fn covariance(&self, num_observations: usize) -> Result<Mat<f64>> {
        match self {
            NoiseModel::Homoscedastic(sigma) => {
                let var = sigma * sigma;
                Ok(Mat::from_fn(num_observations, num_observations, |i, j| {
                    if i == j {
                        var
                    } else {
                        0f64
                    }
                }))
            }
            NoiseModel::PerObservation(sigmas) => {
                InferenceError::check_len("sigma", num_observations, sigmas.len())?;
                Ok(Mat::from_fn(num_observations, num_observations, |i, j| {
                    if i == j {
                        sigmas[i] * sigmas[i]
                    } else {
                        0f64
                    }
                }))
            }
        }
    }
}

impl From<f64> for NoiseModel {
    fn from(value: f64) -> Self {
        NoiseModel::Homoscedastic(value)
    }
}

impl From<Vec<f64>> for NoiseModel {
    fn from(value: Vec<f64>) -> Self {
        NoiseModel::PerObservation(value)
    }
}

/// Gaussian log-likelihood of `residual` under covariance `cov`:
/// `-0.5 * (r^T cov^-1 r + log|cov| + n log(2 pi))`.
///
/// Positive definite covariances go through a Cholesky factorization. If
/// that fails the quadratic form falls back to a pseudo-inverse and the
/// log-determinant to `cov + 1e-12 I`, so degenerate matrices produce a
/// very low but finite value instead of an error. A covariance with
/// non-finite entries, or a non-finite residual, has zero likelihood.
pub fn gaussian_log_likelihood(residual: &[f64], cov: MatRef<'_, f64>) -> Result<f64> {
    let n = residual.len();
    InferenceError::check_len("covariance rows", n, cov.nrows())?;
    InferenceError::check_len("covariance columns", n, cov.ncols())?;

    if n == 0 {
        return Ok(0f64);
    }

    if !all_finite(cov) {
        log::debug!("covariance has non-finite entries, likelihood is zero");
        return Ok(f64::NEG_INFINITY);
    }
    if !residual.iter().all(|r| r.is_finite()) {
        log::debug!("residual has non-finite entries, likelihood is zero");
        return Ok(f64::NEG_INFINITY);
    }

    let factorized = cov
        .llt(Side::Lower)
        .ok()
        .and_then(|llt| cholesky_terms(llt.L(), residual));

    let (quad, logdet) = match factorized {
        Some(terms) => terms,
        None => {
            log::debug!("covariance is not positive definite, using pseudo-inverse");
            match spectral_terms(cov, residual) {
                Some(terms) => terms,
                None => return Ok(f64::NEG_INFINITY),
            }
        }
    };

    let logl = -0.5 * (quad + logdet + n as f64 * LN_2PI);
    if logl.is_nan() {
        return Ok(f64::NEG_INFINITY);
    }
    Ok(logl)
}

fn all_finite(mat: MatRef<'_, f64>) -> bool {
    (0..mat.ncols()).all(|j| (0..mat.nrows()).all(|i| mat[(i, j)].is_finite()))
}

/// `None` if the factor has a vanishing pivot. An overflowing quadratic form
/// stays on this path and gives a likelihood of zero.
fn cholesky_terms(l: MatRef<'_, f64>, residual: &[f64]) -> Option<(f64, f64)> {
    if !(0..l.nrows()).all(|i| l[(i, i)] > 0f64) {
        return None;
    }
    let mut whitened = vec![0f64; residual.len()];
    forward_substitution(l, residual, &mut whitened);
    let quad: f64 = whitened.iter().map(|z| z * z).sum();
    let logdet = 2f64 * (0..l.nrows()).map(|i| l[(i, i)].ln()).sum::<f64>();
    logdet.is_finite().then_some((quad, logdet))
}

/// Quadratic form through the Moore-Penrose pseudo-inverse and the
/// regularized log-determinant, both from one symmetric eigendecomposition.
fn spectral_terms(cov: MatRef<'_, f64>, residual: &[f64]) -> Option<(f64, f64)> {
    let eig = cov.self_adjoint_eigen(Side::Lower).ok()?;
    let vals: Vec<f64> = eig.S().column_vector().to_owned().iter().copied().collect();
    let vecs = eig.U();
    let n = residual.len();

    let max_abs = vals.iter().fold(0f64, |acc, val| acc.max(val.abs()));
    let cutoff = PINV_RCOND * max_abs;

    let mut quad = 0f64;
    for (k, &val) in vals.iter().enumerate() {
        if val.abs() <= cutoff {
            continue;
        }
        let proj: f64 = (0..n).map(|i| vecs[(i, k)] * residual[i]).sum();
        quad += proj * proj / val;
    }

    let shifted: Vec<f64> = vals.iter().map(|val| val + LOGDET_REGULARIZATION).collect();
    let sign = shifted.iter().fold(1f64, |acc, &val| {
        if val == 0f64 {
            0f64
        } else {
            acc * val.signum()
        }
    });
    let logdet = if sign > 0f64 {
        shifted.iter().map(|val| val.abs().ln()).sum()
    } else {
        let det: f64 = vals.iter().product();
        (det + DET_FLOOR).abs().ln()
    };

    Some((quad, logdet))
}

/// Additive linear nuisance parameters with a Gaussian prior.
#[derive(Debug, Clone)]
pub struct NuisanceSystem {
    design: Mat<f64>,
    mean: Vec<f64>,
    covariance: Mat<f64>,
}

impl NuisanceSystem {
    /// Nuisance parameters entering through `design` (`n x k`) with prior
    /// covariance `covariance` (`k x k`) and zero prior mean.
    pub fn new(design: Mat<f64>, covariance: Mat<f64>) -> Result<Self> {
        let k = design.ncols();
        InferenceError::check_len("nuisance covariance rows", k, covariance.nrows())?;
        InferenceError::check_len("nuisance covariance columns", k, covariance.ncols())?;
        Ok(Self {
            design,
            mean: vec![0f64; k],
            covariance,
        })
    }

    /// Build from nested rows, the way an outer configuration layer hands
    /// matrices over.
    pub fn from_rows(
        design: &[Vec<f64>],
        mean: Option<Vec<f64>>,
        covariance: &[Vec<f64>],
    ) -> Result<Self> {
        let design = matrix_from_rows("nuisance design row", design)?;
        let covariance = matrix_from_rows("nuisance covariance row", covariance)?;
        let system = Self::new(design, covariance)?;
        match mean {
            Some(mean) => system.with_mean(mean),
            None => Ok(system),
        }
    }

    pub fn with_mean(mut self, mean: Vec<f64>) -> Result<Self> {
        InferenceError::check_len("nuisance mean", self.design.ncols(), mean.len())?;
        self.mean = mean;
        Ok(self)
    }

    pub fn num_observations(&self) -> usize {
        self.design.nrows()
    }

    pub fn num_nuisance(&self) -> usize {
        self.design.ncols()
    }

    pub fn design(&self) -> MatRef<'_, f64> {
        self.design.as_ref()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn covariance(&self) -> MatRef<'_, f64> {
        self.covariance.as_ref()
    }
}

/// Mean and covariance of the observations after integrating out the
/// nuisance parameters.
///
/// The nuisance contribution to the covariance is symmetrized explicitly,
/// so the result is symmetric to the last bit.
pub fn effective_moments(
    mu: &[f64],
    cov_y: MatRef<'_, f64>,
    nuisance: Option<&NuisanceSystem>,
) -> Result<(Vec<f64>, Mat<f64>)> {
    let n = mu.len();
    InferenceError::check_len("observation covariance rows", n, cov_y.nrows())?;
    InferenceError::check_len("observation covariance columns", n, cov_y.ncols())?;

    let Some(nuisance) = nuisance else {
        return Ok((mu.to_vec(), cov_y.to_owned()));
    };

    InferenceError::check_len("nuisance design rows", n, nuisance.num_observations())?;

    let design = nuisance.design();
    let mean = mu
        .iter()
        .enumerate()
        .map(|(i, &mu)| {
            mu + izip!(0..nuisance.num_nuisance(), nuisance.mean())
                .map(|(j, &nu)| design[(i, j)] * nu)
                .sum::<f64>()
        })
        .collect();

    let spread = design * nuisance.covariance() * design.transpose();
    let cov = Mat::from_fn(n, n, |i, j| {
        0.5 * ((cov_y[(i, j)] + spread[(i, j)]) + (cov_y[(j, i)] + spread[(j, i)]))
    });

    Ok((mean, cov))
}

/// Log-likelihood of `y` given the model mean `mu`, with any nuisance
/// parameters marginalized analytically.
pub fn marginal_log_likelihood(
    y: &[f64],
    mu: &[f64],
    cov_y: MatRef<'_, f64>,
    nuisance: Option<&NuisanceSystem>,
) -> Result<f64> {
    InferenceError::check_len("model prediction", y.len(), mu.len())?;

    let Some(nuisance) = nuisance else {
        let residual: Vec<f64> = izip!(y, mu).map(|(y, mu)| y - mu).collect();
        return gaussian_log_likelihood(&residual, cov_y);
    };

    let (mean, cov) = effective_moments(mu, cov_y, Some(nuisance))?;
    let residual: Vec<f64> = izip!(y, &mean).map(|(y, mean)| y - mean).collect();
    gaussian_log_likelihood(&residual, cov.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use faer::Mat;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn diag(vals: &[f64]) -> Mat<f64> {
        Mat::from_fn(vals.len(), vals.len(), |i, j| if i == j { vals[i] } else { 0. })
    }

    #[test]
    fn univariate_value() {
        let cov = diag(&[4.]);
        let logl = gaussian_log_likelihood(&[1.], cov.as_ref()).unwrap();
        let expected = -0.5 * (0.25 + 4f64.ln() + LN_2PI);
        assert_relative_eq!(logl, expected, epsilon = 1e-12);
    }

    #[test]
    fn correlated_value() {
        // cov = [[2, 1], [1, 2]], inverse = [[2, -1], [-1, 2]] / 3, det = 3
        let cov = Mat::from_fn(2, 2, |i, j| if i == j { 2. } else { 1. });
        let r = [1., -2.];
        let quad = 14. / 3.;
        let expected = -0.5 * (quad + 3f64.ln() + 2. * LN_2PI);
        let logl = gaussian_log_likelihood(&r, cov.as_ref()).unwrap();
        assert_relative_eq!(logl, expected, epsilon = 1e-12);
    }

    #[test]
    fn singular_covariance_is_finite() {
        let cov = Mat::from_fn(2, 2, |_, _| 1.);
        let logl = gaussian_log_likelihood(&[0.5, 0.5], cov.as_ref()).unwrap();
        assert!(logl.is_finite());

        let zero = Mat::<f64>::zeros(3, 3);
        let logl = gaussian_log_likelihood(&[0.1, 0.2, 0.3], zero.as_ref()).unwrap();
        assert!(logl.is_finite());
    }

    #[test]
    fn indefinite_covariance_is_finite() {
        let cov = diag(&[1., -1.]);
        let logl = gaussian_log_likelihood(&[1., 1.], cov.as_ref()).unwrap();
        assert!(logl.is_finite());
    }

    #[test]
    fn pseudo_inverse_value() {
        // cov = [[1, 1], [1, 1]] has eigenvalues 2 and 0.
        let cov = Mat::from_fn(2, 2, |_, _| 1.);
        let logdet = (2. + 1e-12f64).ln() + 1e-12f64.ln();

        let along = gaussian_log_likelihood(&[0.5, 0.5], cov.as_ref()).unwrap();
        let expected = -0.5 * (0.25 + logdet + 2. * LN_2PI);
        assert_relative_eq!(along, expected, epsilon = 1e-3);

        // Residuals in the null space do not contribute to the quadratic form.
        let null = gaussian_log_likelihood(&[1., -1.], cov.as_ref()).unwrap();
        assert_relative_eq!(null - along, 0.125, epsilon = 1e-9);
    }

    #[test]
    fn non_finite_residual_has_zero_likelihood() {
        let cov = diag(&[1., 1.]);
        for residual in [[f64::NAN, 0.], [f64::INFINITY, 0.], [0., f64::NEG_INFINITY]] {
            let logl = gaussian_log_likelihood(&residual, cov.as_ref()).unwrap();
            assert_eq!(logl, f64::NEG_INFINITY);
        }
        let singular = Mat::from_fn(2, 2, |_, _| 1.);
        let logl = gaussian_log_likelihood(&[f64::NAN, 0.], singular.as_ref()).unwrap();
        assert_eq!(logl, f64::NEG_INFINITY);
    }

    #[test]
    fn overflowing_residual_has_zero_likelihood() {
        let cov = diag(&[1e-300, 1e-300]);
        let logl = gaussian_log_likelihood(&[1e300, 0.], cov.as_ref()).unwrap();
        assert_eq!(logl, f64::NEG_INFINITY);
    }

    #[test]
    fn non_finite_covariance_has_zero_likelihood() {
        let cov = diag(&[1., f64::NAN]);
        let logl = gaussian_log_likelihood(&[1., 1.], cov.as_ref()).unwrap();
        assert_eq!(logl, f64::NEG_INFINITY);
    }

    #[test]
    fn covariance_shape_is_checked() {
        let cov = diag(&[1., 1.]);
        assert!(matches!(
            gaussian_log_likelihood(&[1.], cov.as_ref()),
            Err(InferenceError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn noise_model_covariance() {
        let cov = NoiseModel::from(0.5).covariance(2).unwrap();
        assert_eq!(cov[(0, 0)], 0.25);
        assert_eq!(cov[(0, 1)], 0.);
        let cov = NoiseModel::from(vec![1., 2.]).covariance(2).unwrap();
        assert_eq!(cov[(1, 1)], 4.);
        assert!(NoiseModel::from(vec![1., 2.]).covariance(3).is_err());
    }

    #[test]
    fn no_nuisance_matches_kernel() {
        let y = [1., 2., 3.];
        let mu = [1.1, 1.8, 3.3];
        let cov = diag(&[0.01, 0.04, 0.09]);
        let marginal = marginal_log_likelihood(&y, &mu, cov.as_ref(), None).unwrap();
        let residual: Vec<f64> = y.iter().zip(&mu).map(|(y, mu)| y - mu).collect();
        let direct = gaussian_log_likelihood(&residual, cov.as_ref()).unwrap();
        assert_eq!(marginal, direct);
    }

    #[test]
    fn nuisance_moments() {
        let design = Mat::from_fn(3, 2, |i, j| (i + 2 * j) as f64 * 0.3 + 0.1);
        let nu_cov = Mat::from_fn(2, 2, |i, j| if i == j { 0.7 } else { 0.2 });
        let system = NuisanceSystem::new(design, nu_cov)
            .unwrap()
            .with_mean(vec![1., -1.])
            .unwrap();
        let cov_y = diag(&[0.1, 0.2, 0.3]);
        let mu = [0., 0., 0.];
        let (mean, cov) = effective_moments(&mu, cov_y.as_ref(), Some(&system)).unwrap();

        for i in 0..3 {
            let a = system.design();
            assert_relative_eq!(mean[i], a[(i, 0)] - a[(i, 1)], epsilon = 1e-12);
            for j in 0..3 {
                assert_eq!(cov[(i, j)], cov[(j, i)]);
            }
            assert!(cov[(i, i)] > cov_y[(i, i)]);
        }
    }

    #[test]
    fn nuisance_widens_likelihood() {
        let y = [1., 1.];
        let mu = [0., 0.];
        let cov_y = diag(&[0.01, 0.01]);
        let system =
            NuisanceSystem::from_rows(&[vec![1.], vec![1.]], None, &[vec![1.]]).unwrap();
        let with = marginal_log_likelihood(&y, &mu, cov_y.as_ref(), Some(&system)).unwrap();
        let without = marginal_log_likelihood(&y, &mu, cov_y.as_ref(), None).unwrap();
        assert!(with > without);
    }

    #[test]
    fn nuisance_shapes_are_checked() {
        assert!(NuisanceSystem::from_rows(&[vec![1., 0.]], None, &[vec![1.]]).is_err());
        let system = NuisanceSystem::from_rows(&[vec![1.]], None, &[vec![1.]]).unwrap();
        assert!(system.clone().with_mean(vec![0., 0.]).is_err());

        let cov_y = diag(&[1., 1.]);
        assert!(matches!(
            marginal_log_likelihood(&[1., 2.], &[1., 2.], cov_y.as_ref(), Some(&system)),
            Err(InferenceError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            marginal_log_likelihood(&[1., 2.], &[1.], cov_y.as_ref(), None),
            Err(InferenceError::ShapeMismatch { .. })
        ));
    }

    proptest! {
        #[test]
        fn finite_for_positive_definite(
            vars in prop::collection::vec(1e-3f64..10., 1..6),
            offset in -5f64..5.,
        ) {
            let cov = diag(&vars);
            let residual: Vec<f64> = vars.iter().map(|v| v * offset).collect();
            let logl = gaussian_log_likelihood(&residual, cov.as_ref()).unwrap();
            prop_assert!(logl.is_finite());
        }
    }
}
