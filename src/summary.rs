use faer::{Mat, MatRef, Scale};
use serde::{Deserialize, Serialize};

use crate::math::{matrix_from_rows, sorted_quantile};
use crate::{InferenceError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryOptions {
    /// Quantile levels in `[0, 1]`. The default brackets the median by
    /// roughly one standard deviation for a near-Gaussian posterior.
    pub quantiles: Vec<f64>,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            quantiles: vec![0.16, 0.5, 0.84],
        }
    }
}

/// Column-wise statistics of a chain.
#[derive(Debug, Clone)]
pub struct ChainSummary {
    pub mean: Vec<f64>,
    /// Sample covariance with the `n - 1` denominator. NaN for a single draw.
    pub covariance: Mat<f64>,
    pub quantile_levels: Vec<f64>,
    /// One row per quantile level, one column per parameter.
    pub quantiles: Vec<Vec<f64>>,
}

impl ChainSummary {
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Marginal standard deviations.
    pub fn std(&self) -> Vec<f64> {
        (0..self.dim())
            .map(|i| self.covariance[(i, i)].sqrt())
            .collect()
    }
}

/// Summarize draws stored as a `(num_draws, dim)` matrix.
pub fn summarize(draws: MatRef<'_, f64>, options: &SummaryOptions) -> Result<ChainSummary> {
    let (n, dim) = (draws.nrows(), draws.ncols());
    if n == 0 {
        return Err(InferenceError::EmptyChain);
    }
    if let Some(&q) = options
        .quantiles
        .iter()
        .find(|q| !(0f64..=1f64).contains(*q))
    {
        return Err(InferenceError::InvalidQuantile(q));
    }

    let mean: Vec<f64> = (0..dim)
        .map(|j| (0..n).map(|i| draws[(i, j)]).sum::<f64>() / n as f64)
        .collect();

    let centered = Mat::from_fn(n, dim, |i, j| draws[(i, j)] - mean[j]);
    let covariance = if n > 1 {
        let mut cov = centered.transpose() * centered.as_ref();
        cov *= Scale(((n - 1) as f64).recip());
        cov
    } else {
        Mat::from_fn(dim, dim, |_, _| f64::NAN)
    };

    let mut quantiles = vec![vec![0f64; dim]; options.quantiles.len()];
    let mut column = vec![0f64; n];
    for j in 0..dim {
        column
            .iter_mut()
            .enumerate()
            .for_each(|(i, val)| *val = draws[(i, j)]);
        column.sort_by(f64::total_cmp);
        for (row, &q) in quantiles.iter_mut().zip(&options.quantiles) {
            row[j] = sorted_quantile(&column, q);
        }
    }

    Ok(ChainSummary {
        mean,
        covariance,
        quantile_levels: options.quantiles.clone(),
        quantiles,
    })
}

/// Summarize draws given as nested rows. Ragged rows are a shape error.
pub fn summarize_rows(draws: &[Vec<f64>], options: &SummaryOptions) -> Result<ChainSummary> {
    let draws = matrix_from_rows("chain draw", draws)?;
    summarize(draws.as_ref(), options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    #[test]
    fn known_moments() {
        let draws = vec![
            vec![1., 10.],
            vec![2., 20.],
            vec![3., 30.],
            vec![4., 40.],
        ];
        let summary = summarize_rows(&draws, &SummaryOptions::default()).unwrap();
        assert_eq!(summary.mean, vec![2.5, 25.]);
        assert_relative_eq!(summary.covariance[(0, 0)], 5. / 3., epsilon = 1e-12);
        assert_relative_eq!(summary.covariance[(0, 1)], 50. / 3., epsilon = 1e-12);
        assert_relative_eq!(summary.covariance[(1, 0)], 50. / 3., epsilon = 1e-12);
        assert_relative_eq!(summary.covariance[(1, 1)], 500. / 3., epsilon = 1e-10);
        assert_eq!(summary.quantile_levels, vec![0.16, 0.5, 0.84]);
        assert_eq!(summary.quantiles.len(), 3);
        assert_relative_eq!(summary.quantiles[1][0], 2.5, epsilon = 1e-12);
        assert_relative_eq!(summary.quantiles[0][0], 1.48, epsilon = 1e-12);
        assert_relative_eq!(summary.quantiles[2][1], 35.2, epsilon = 1e-12);
    }

    #[test]
    fn unsorted_columns() {
        let draws = vec![vec![3.], vec![1.], vec![2.]];
        let options = SummaryOptions {
            quantiles: vec![0., 0.5, 1.],
        };
        let summary = summarize_rows(&draws, &options).unwrap();
        assert_eq!(summary.quantiles, vec![vec![1.], vec![2.], vec![3.]]);
        assert_eq!(summary.std(), vec![1.]);
    }

    #[test]
    fn single_draw() {
        let summary = summarize_rows(&[vec![0.5, 1.5]], &SummaryOptions::default()).unwrap();
        assert_eq!(summary.mean, vec![0.5, 1.5]);
        assert!(summary.covariance[(0, 1)].is_nan());
        assert_eq!(summary.quantiles[2], vec![0.5, 1.5]);
    }

    #[test]
    fn invalid_input() {
        let options = SummaryOptions::default();
        assert!(matches!(
            summarize_rows(&[], &options),
            Err(InferenceError::EmptyChain)
        ));
        assert!(matches!(
            summarize_rows(&[vec![1., 2.], vec![1.]], &options),
            Err(InferenceError::ShapeMismatch { .. })
        ));
        let options = SummaryOptions {
            quantiles: vec![0.5, 1.5],
        };
        assert!(matches!(
            summarize_rows(&[vec![1.]], &options),
            Err(InferenceError::InvalidQuantile(q)) if q == 1.5
        ));
        let options = SummaryOptions {
            quantiles: vec![f64::NAN],
        };
        assert!(matches!(
            summarize_rows(&[vec![1.]], &options),
            Err(InferenceError::InvalidQuantile(_))
        ));
    }
}
