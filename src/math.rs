use faer::{Mat, MatRef};
use itertools::izip;

use crate::{InferenceError, Result};

/// `ln(2π)`
pub(crate) const LN_2PI: f64 = 1.8378770664093453;

/// Solve `L z = rhs` for lower triangular `L`.
pub(crate) fn forward_substitution(l: MatRef<'_, f64>, rhs: &[f64], out: &mut [f64]) {
    let n = rhs.len();
    assert!(l.nrows() == n);
    assert!(l.ncols() == n);
    assert!(out.len() == n);

    for i in 0..n {
        let mut acc = rhs[i];
        for j in 0..i {
            acc -= l[(i, j)] * out[j];
        }
        out[i] = acc / l[(i, i)];
    }
}

/// Build a dense matrix from nested rows, rejecting ragged input.
pub(crate) fn matrix_from_rows(context: &'static str, rows: &[Vec<f64>]) -> Result<Mat<f64>> {
    let ncols = rows.first().map(|row| row.len()).unwrap_or(0);
    for row in rows {
        InferenceError::check_len(context, ncols, row.len())?;
    }
    Ok(Mat::from_fn(rows.len(), ncols, |i, j| rows[i][j]))
}

/// `out = position + scale * noise`, elementwise.
pub(crate) fn scaled_add_out(
    arch: pulp::Arch,
    position: &[f64],
    scale: &[f64],
    noise: &[f64],
    out: &mut [f64],
) {
    let n = position.len();
    assert!(scale.len() == n);
    assert!(noise.len() == n);
    assert!(out.len() == n);

    arch.dispatch(|| {
        izip!(position, scale, noise, out.iter_mut()).for_each(|(&x, &s, &z, out)| {
            *out = s.mul_add(z, x);
        });
    });
}

/// Quantile of already sorted values, interpolating linearly between the
/// two closest order statistics.
pub(crate) fn sorted_quantile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    assert!(n > 0);
    assert!((0f64..=1f64).contains(&q));

    let h = q * (n - 1) as f64;
    let lower = h.floor() as usize;
    let upper = (lower + 1).min(n - 1);
    let frac = h - lower as f64;
    let lo = sorted[lower];
    let hi = sorted[upper];
    if frac == 0f64 {
        lo
    } else {
        lo + (hi - lo) * frac
    }
}
