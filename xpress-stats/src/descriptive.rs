//! Descriptive statistics used by the normalization and batch kernels.
//!
//! Provides [`mean`], [`variance`], [`std_dev`] and [`min_max`] for
//! `&[f64]` slices, plus [`row_moments`] which computes mean and variance of
//! every row of a row-major matrix in one pass.

use xpress_core::{Result, XpressError};

/// Arithmetic mean.
pub fn mean(data: &[f64]) -> Result<f64> {
    if data.is_empty() {
        return Err(XpressError::Data("mean: data must not be empty".into()));
    }
    Ok(data.iter().sum::<f64>() / data.len() as f64)
}

/// Variance with given degrees-of-freedom correction.
///
/// - `ddof = 0` → population variance
/// - `ddof = 1` → sample variance (Bessel's correction)
pub fn variance(data: &[f64], ddof: usize) -> Result<f64> {
    let n = data.len();
    if n <= ddof {
        return Err(XpressError::Data(format!(
            "variance: need more than {ddof} observations (got {n})"
        )));
    }
    let m = mean(data)?;
    let ss: f64 = data.iter().map(|&x| (x - m).powi(2)).sum();
    Ok(ss / (n - ddof) as f64)
}

/// Standard deviation with given degrees-of-freedom correction.
pub fn std_dev(data: &[f64], ddof: usize) -> Result<f64> {
    Ok(variance(data, ddof)?.sqrt())
}

/// Minimum and maximum of a non-empty slice.
pub fn min_max(data: &[f64]) -> Result<(f64, f64)> {
    if data.is_empty() {
        return Err(XpressError::Data("min_max: data must not be empty".into()));
    }
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &x in data {
        lo = lo.min(x);
        hi = hi.max(x);
    }
    Ok((lo, hi))
}

/// Per-row mean and variance of a row-major `(n_rows, n_cols)` matrix,
/// restricted to the column indices in `cols`.
///
/// Returns `(means, variances)` with variance computed using `ddof`.
pub fn row_moments(
    data: &[f64],
    n_rows: usize,
    n_cols: usize,
    cols: &[usize],
    ddof: usize,
) -> Result<(Vec<f64>, Vec<f64>)> {
    if data.len() != n_rows * n_cols {
        return Err(XpressError::Format(format!(
            "row_moments: data length ({}) != n_rows ({n_rows}) * n_cols ({n_cols})",
            data.len()
        )));
    }
    if cols.len() <= ddof {
        return Err(XpressError::Data(format!(
            "row_moments: need more than {ddof} columns (got {})",
            cols.len()
        )));
    }
    if let Some(&bad) = cols.iter().find(|&&c| c >= n_cols) {
        return Err(XpressError::Format(format!(
            "row_moments: column index {bad} out of bounds (n_cols={n_cols})"
        )));
    }

    let n = cols.len() as f64;
    let mut means = Vec::with_capacity(n_rows);
    let mut vars = Vec::with_capacity(n_rows);
    for r in 0..n_rows {
        let row = &data[r * n_cols..(r + 1) * n_cols];
        let m = cols.iter().map(|&c| row[c]).sum::<f64>() / n;
        let ss: f64 = cols.iter().map(|&c| (row[c] - m).powi(2)).sum();
        means.push(m);
        vars.push(ss / (n - ddof as f64));
    }
    Ok((means, vars))
}
