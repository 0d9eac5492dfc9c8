//! Batch-effect adjustment kernels on row-major `(n_features, n_samples)` data.
//!
//! - [`combat`]: parametric empirical Bayes location/scale adjustment
//!   (Johnson, Li & Rabinovic 2007) without covariates
//! - [`center_batches`]: location-only adjustment that moves every batch's
//!   row mean onto the pooled row mean
//!
//! Both kernels leave rows with zero variance inside any batch untouched and
//! report their indices in [`BatchFit::skipped_rows`].

use xpress_core::{Result, XpressError};

/// Convergence settings for the iterative posterior solver.
#[derive(Debug, Clone, Copy)]
pub struct EbConfig {
    /// Stop when the largest relative change of γ* and δ*² falls below this.
    pub tolerance: f64,
    /// Hard cap on solver iterations per batch.
    pub max_iter: usize,
}

impl Default for EbConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            max_iter: 1000,
        }
    }
}

/// Result of a batch adjustment.
#[derive(Debug, Clone)]
pub struct BatchFit {
    /// Adjusted values, same layout as the input.
    pub corrected: Vec<f64>,
    /// Rows passed through unmodified because some batch had zero variance.
    pub skipped_rows: Vec<usize>,
}

/// Check that `batches` partitions `0..n_cols` into groups of at least two.
fn validate_batches(data: &[f64], n_rows: usize, n_cols: usize, batches: &[Vec<usize>]) -> Result<()> {
    if data.len() != n_rows * n_cols {
        return Err(XpressError::Format(format!(
            "batch: data length ({}) != n_rows ({n_rows}) * n_cols ({n_cols})",
            data.len()
        )));
    }
    if batches.len() < 2 {
        return Err(XpressError::Configuration(format!(
            "batch: need at least 2 batches (got {})",
            batches.len()
        )));
    }
    let mut seen = vec![false; n_cols];
    for (b, cols) in batches.iter().enumerate() {
        if cols.len() < 2 {
            return Err(XpressError::Configuration(format!(
                "batch: batch {b} has {} sample(s); at least 2 are required",
                cols.len()
            )));
        }
        for &c in cols {
            if c >= n_cols {
                return Err(XpressError::Format(format!(
                    "batch: column index {c} out of bounds (n_cols={n_cols})"
                )));
            }
            if seen[c] {
                return Err(XpressError::Configuration(format!(
                    "batch: column {c} assigned to more than one batch"
                )));
            }
            seen[c] = true;
        }
    }
    if let Some(c) = seen.iter().position(|&s| !s) {
        return Err(XpressError::Configuration(format!(
            "batch: column {c} has no batch assignment"
        )));
    }
    Ok(())
}

/// Per-batch mean and sample variance of one row.
fn batch_moments(row: &[f64], batches: &[Vec<usize>]) -> (Vec<f64>, Vec<f64>) {
    let mut means = Vec::with_capacity(batches.len());
    let mut vars = Vec::with_capacity(batches.len());
    for cols in batches {
        let n = cols.len() as f64;
        let m = cols.iter().map(|&c| row[c]).sum::<f64>() / n;
        let ss: f64 = cols.iter().map(|&c| (row[c] - m).powi(2)).sum();
        means.push(m);
        vars.push(ss / (n - 1.0));
    }
    (means, vars)
}

fn sample_mean_var(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let m = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (m, 0.0);
    }
    let v = values.iter().map(|&x| (x - m).powi(2)).sum::<f64>() / (n - 1.0);
    (m, v)
}

/// Relative change with a floor on the denominator so values near zero
/// cannot stall convergence.
fn rel_change(new: f64, old: f64) -> f64 {
    (new - old).abs() / old.abs().max(1e-8)
}

/// Parametric empirical Bayes batch adjustment.
///
/// 1. Standardize each row by its grand mean and pooled within-batch variance.
/// 2. Estimate per-batch location γ̂ and scale δ̂² on the standardized data.
/// 3. Fit a normal prior on γ and an inverse-gamma prior on δ² across rows
///    (method of moments) and iterate the posterior means to convergence.
/// 4. Adjust: `x* = (z − γ*) / √δ*² · σ + μ`.
///
/// `batches[b]` lists the column indices of batch `b`; every column must
/// appear exactly once and every batch needs at least two columns.
pub fn combat(
    data: &[f64],
    n_rows: usize,
    n_cols: usize,
    batches: &[Vec<usize>],
    config: &EbConfig,
) -> Result<BatchFit> {
    validate_batches(data, n_rows, n_cols, batches)?;
    let n_batches = batches.len();

    let mut corrected = data.to_vec();
    let mut skipped_rows = Vec::new();

    // Standardize usable rows
    let mut usable = Vec::with_capacity(n_rows);
    let mut grand_mean = Vec::with_capacity(n_rows);
    let mut pooled_sd = Vec::with_capacity(n_rows);
    let mut z = Vec::with_capacity(n_rows * n_cols);

    for r in 0..n_rows {
        let row = &data[r * n_cols..(r + 1) * n_cols];
        let (means, vars) = batch_moments(row, batches);
        if vars.iter().any(|&v| !(v > 0.0)) || row.iter().any(|v| !v.is_finite()) {
            skipped_rows.push(r);
            continue;
        }
        let mu = row.iter().sum::<f64>() / n_cols as f64;
        let mut ss = 0.0;
        for (cols, &m) in batches.iter().zip(&means) {
            ss += cols.iter().map(|&c| (row[c] - m).powi(2)).sum::<f64>();
        }
        let sd = (ss / n_cols as f64).sqrt();
        usable.push(r);
        grand_mean.push(mu);
        pooled_sd.push(sd);
        z.extend(row.iter().map(|&x| (x - mu) / sd));
    }

    if usable.is_empty() {
        return Ok(BatchFit {
            corrected,
            skipped_rows,
        });
    }
    let n_usable = usable.len();

    // Method-of-moments batch parameters on standardized data
    let mut gamma_hat = vec![vec![0.0; n_usable]; n_batches];
    let mut delta_hat = vec![vec![0.0; n_usable]; n_batches];
    for g in 0..n_usable {
        let zrow = &z[g * n_cols..(g + 1) * n_cols];
        let (means, vars) = batch_moments(zrow, batches);
        for b in 0..n_batches {
            gamma_hat[b][g] = means[b];
            delta_hat[b][g] = vars[b];
        }
    }

    for (b, cols) in batches.iter().enumerate() {
        let nb = cols.len() as f64;
        let (gamma_bar, tau2) = sample_mean_var(&gamma_hat[b]);
        let (d_mean, d_var) = sample_mean_var(&delta_hat[b]);

        let (gamma_star, delta_star) = if n_usable < 2 {
            // No prior can be estimated from a single row
            (gamma_hat[b].clone(), delta_hat[b].clone())
        } else {
            solve_posterior(
                &z,
                n_cols,
                cols,
                &gamma_hat[b],
                &delta_hat[b],
                Prior {
                    gamma_bar,
                    tau2,
                    d_mean,
                    d_var,
                },
                nb,
                config,
            )
        };

        for (g, &r) in usable.iter().enumerate() {
            let scale = delta_star[g].sqrt();
            for &c in cols {
                let zc = z[g * n_cols + c];
                corrected[r * n_cols + c] =
                    (zc - gamma_star[g]) / scale * pooled_sd[g] + grand_mean[g];
            }
        }
    }

    Ok(BatchFit {
        corrected,
        skipped_rows,
    })
}

struct Prior {
    gamma_bar: f64,
    tau2: f64,
    d_mean: f64,
    d_var: f64,
}

/// Iterate the conditional posterior means of γ and δ² for one batch.
#[allow(clippy::too_many_arguments)]
fn solve_posterior(
    z: &[f64],
    n_cols: usize,
    cols: &[usize],
    gamma_hat: &[f64],
    delta_hat: &[f64],
    prior: Prior,
    nb: f64,
    config: &EbConfig,
) -> (Vec<f64>, Vec<f64>) {
    let n_rows = gamma_hat.len();

    // Inverse-gamma hyperparameters; a degenerate spread pins δ² to its mean.
    let ig = if prior.d_var > 0.0 {
        let a = (2.0 * prior.d_var + prior.d_mean.powi(2)) / prior.d_var;
        let b = (prior.d_mean * prior.d_var + prior.d_mean.powi(3)) / prior.d_var;
        Some((a, b))
    } else {
        None
    };

    let mut g_old = gamma_hat.to_vec();
    let mut d_old = delta_hat.to_vec();
    let mut g_new = g_old.clone();
    let mut d_new = d_old.clone();

    for _ in 0..config.max_iter {
        for g in 0..n_rows {
            g_new[g] = (prior.tau2 * nb * gamma_hat[g] + d_old[g] * prior.gamma_bar)
                / (prior.tau2 * nb + d_old[g]);
            d_new[g] = match ig {
                Some((a, b)) => {
                    let sum2: f64 = cols
                        .iter()
                        .map(|&c| (z[g * n_cols + c] - g_new[g]).powi(2))
                        .sum();
                    (0.5 * sum2 + b) / (nb / 2.0 + a - 1.0)
                }
                None => prior.d_mean,
            };
        }

        let change = (0..n_rows)
            .map(|g| rel_change(g_new[g], g_old[g]).max(rel_change(d_new[g], d_old[g])))
            .fold(0.0, f64::max);

        std::mem::swap(&mut g_old, &mut g_new);
        std::mem::swap(&mut d_old, &mut d_new);
        if change < config.tolerance {
            break;
        }
    }

    (g_old, d_old)
}

/// Location-only adjustment: shift each batch so its row mean equals the
/// grand row mean.
pub fn center_batches(
    data: &[f64],
    n_rows: usize,
    n_cols: usize,
    batches: &[Vec<usize>],
) -> Result<BatchFit> {
    validate_batches(data, n_rows, n_cols, batches)?;
    let mut corrected = data.to_vec();
    let mut skipped_rows = Vec::new();

    for r in 0..n_rows {
        let row = &data[r * n_cols..(r + 1) * n_cols];
        if row.iter().any(|v| !v.is_finite()) {
            skipped_rows.push(r);
            continue;
        }
        let (means, vars) = batch_moments(row, batches);
        if vars.iter().any(|&v| !(v > 0.0)) {
            skipped_rows.push(r);
            continue;
        }
        let mu = row.iter().sum::<f64>() / n_cols as f64;
        for (cols, &m) in batches.iter().zip(&means) {
            for &c in cols {
                corrected[r * n_cols + c] = row[c] + (mu - m);
            }
        }
    }

    Ok(BatchFit {
        corrected,
        skipped_rows,
    })
}
