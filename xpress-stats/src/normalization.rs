//! Count normalization for RNA-seq and related assays.
//!
//! All functions operate on row-major `&[f64]` slices with dimensions
//! `(n_genes, n_samples)`, matching `xpress_omics::ExpressionMatrix` layout.
//! The kernels are strict: a non-positive divisor is an error. Deciding which
//! rows or samples to exclude beforehand is the caller's job.
//!
//! - [`column_totals`]: Per-sample library sizes
//! - [`rpm`] / [`rpm_with_totals`]: Reads per million
//! - [`rpkm_with_totals`]: Reads (fragments) per kilobase per million
//! - [`tpm`]: Transcripts per million
//! - [`log_transform`]: `log_base(x + pseudocount)`
//! - [`zscore_rows`]: Per-row standardization

use xpress_core::{Result, XpressError};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn validate_matrix(counts: &[f64], n_genes: usize, n_samples: usize) -> Result<()> {
    if n_genes == 0 || n_samples == 0 {
        return Err(XpressError::Data(
            "normalization: matrix must have at least 1 gene and 1 sample".into(),
        ));
    }
    if counts.len() != n_genes * n_samples {
        return Err(XpressError::Format(format!(
            "normalization: counts length ({}) != n_genes ({}) * n_samples ({})",
            counts.len(),
            n_genes,
            n_samples,
        )));
    }
    Ok(())
}

fn validate_lengths(name: &str, gene_lengths: &[f64], n_genes: usize) -> Result<()> {
    if gene_lengths.len() != n_genes {
        return Err(XpressError::Format(format!(
            "{name}: gene_lengths length ({}) != n_genes ({n_genes})",
            gene_lengths.len(),
        )));
    }
    if let Some(i) = gene_lengths.iter().position(|&l| !(l > 0.0)) {
        return Err(XpressError::Data(format!(
            "{name}: gene_lengths[{i}] must be positive (got {})",
            gene_lengths[i]
        )));
    }
    Ok(())
}

fn validate_totals(name: &str, totals: &[f64], n_samples: usize) -> Result<()> {
    if totals.len() != n_samples {
        return Err(XpressError::Format(format!(
            "{name}: totals length ({}) != n_samples ({n_samples})",
            totals.len(),
        )));
    }
    if let Some(j) = totals.iter().position(|&t| !(t > 0.0)) {
        return Err(XpressError::Data(format!(
            "{name}: sample {j} has non-positive total ({})",
            totals[j]
        )));
    }
    Ok(())
}

/// Sum of every column of a row-major `(n_genes, n_samples)` matrix.
pub fn column_totals(counts: &[f64], n_genes: usize, n_samples: usize) -> Vec<f64> {
    let mut sums = vec![0.0; n_samples];
    for i in 0..n_genes {
        let row = &counts[i * n_samples..(i + 1) * n_samples];
        for (j, &v) in row.iter().enumerate() {
            sums[j] += v;
        }
    }
    sums
}

// ── RPM ──────────────────────────────────────────────────────────────────────

/// Reads per million: `RPM_ij = count_ij / (library_size_j / 1e6)`.
pub fn rpm(counts: &[f64], n_genes: usize, n_samples: usize) -> Result<Vec<f64>> {
    validate_matrix(counts, n_genes, n_samples)?;
    let totals = column_totals(counts, n_genes, n_samples);
    rpm_with_totals(counts, n_genes, n_samples, &totals)
}

/// Reads per million against externally supplied library sizes.
///
/// Used when the totals must come from a larger matrix than the one being
/// scaled (rows excluded after totals were taken still count toward depth).
pub fn rpm_with_totals(
    counts: &[f64],
    n_genes: usize,
    n_samples: usize,
    totals: &[f64],
) -> Result<Vec<f64>> {
    validate_matrix(counts, n_genes, n_samples)?;
    validate_totals("rpm", totals, n_samples)?;
    let mut out = vec![0.0; counts.len()];
    for i in 0..n_genes {
        for j in 0..n_samples {
            let idx = i * n_samples + j;
            out[idx] = counts[idx] / (totals[j] / 1e6);
        }
    }
    Ok(out)
}

// ── RPKM / FPKM ──────────────────────────────────────────────────────────────

/// Reads (or fragments) per kilobase per million mapped reads.
///
/// `RPKM_ij = RPM_ij / (length_i / 1000)` with lengths in nucleotides.
/// Paired-end FPKM is numerically identical once counts are fragments.
pub fn rpkm_with_totals(
    counts: &[f64],
    n_genes: usize,
    n_samples: usize,
    gene_lengths: &[f64],
    totals: &[f64],
) -> Result<Vec<f64>> {
    validate_lengths("rpkm", gene_lengths, n_genes)?;
    let mut out = rpm_with_totals(counts, n_genes, n_samples, totals)?;
    for i in 0..n_genes {
        let len_kb = gene_lengths[i] / 1000.0;
        for v in &mut out[i * n_samples..(i + 1) * n_samples] {
            *v /= len_kb;
        }
    }
    Ok(out)
}

// ── TPM ──────────────────────────────────────────────────────────────────────

/// Transcripts per million.
///
/// 1. Divide each count by gene length in kilobases (→ RPK).
/// 2. Scale each sample's RPK values to sum to 1M.
pub fn tpm(
    counts: &[f64],
    n_genes: usize,
    n_samples: usize,
    gene_lengths: &[f64],
) -> Result<Vec<f64>> {
    validate_matrix(counts, n_genes, n_samples)?;
    validate_lengths("tpm", gene_lengths, n_genes)?;

    let mut rpk = vec![0.0; counts.len()];
    for i in 0..n_genes {
        let len_kb = gene_lengths[i] / 1000.0;
        for j in 0..n_samples {
            rpk[i * n_samples + j] = counts[i * n_samples + j] / len_kb;
        }
    }

    let rpk_sums = column_totals(&rpk, n_genes, n_samples);
    validate_totals("tpm", &rpk_sums, n_samples)?;
    for i in 0..n_genes {
        for j in 0..n_samples {
            rpk[i * n_samples + j] = rpk[i * n_samples + j] / rpk_sums[j] * 1e6;
        }
    }
    Ok(rpk)
}

// ── Log transform ────────────────────────────────────────────────────────────

/// Check log-transform parameters: `base > 1`, `pseudocount >= 0`, both finite.
pub fn validate_log_params(base: f64, pseudocount: f64) -> Result<()> {
    if !base.is_finite() || base <= 1.0 {
        return Err(XpressError::Configuration(format!(
            "log transform: base must be a finite number > 1 (got {base})"
        )));
    }
    if !pseudocount.is_finite() || pseudocount < 0.0 {
        return Err(XpressError::Configuration(format!(
            "log transform: pseudocount must be a finite number >= 0 (got {pseudocount})"
        )));
    }
    Ok(())
}

/// `log_base(x + pseudocount)` for every value.
///
/// Values whose shifted argument is not positive map to a non-finite result;
/// callers that must keep the matrix finite check for that themselves.
pub fn log_transform(values: &[f64], base: f64, pseudocount: f64) -> Result<Vec<f64>> {
    validate_log_params(base, pseudocount)?;
    if base == 2.0 {
        return Ok(values.iter().map(|&x| (x + pseudocount).log2()).collect());
    }
    let ln_base = base.ln();
    Ok(values
        .iter()
        .map(|&x| (x + pseudocount).ln() / ln_base)
        .collect())
}

// ── Row standardization ─────────────────────────────────────────────────────

/// Z-score every row (population standard deviation).
///
/// Returns an error naming the first row with zero variance.
pub fn zscore_rows(values: &[f64], n_rows: usize, n_cols: usize) -> Result<Vec<f64>> {
    validate_matrix(values, n_rows, n_cols)?;
    let mut out = vec![0.0; values.len()];
    for i in 0..n_rows {
        let row = &values[i * n_cols..(i + 1) * n_cols];
        let m = row.iter().sum::<f64>() / n_cols as f64;
        let var = row.iter().map(|&x| (x - m).powi(2)).sum::<f64>() / n_cols as f64;
        if !(var > 0.0) {
            return Err(XpressError::Data(format!("zscore_rows: row {i} has zero variance")));
        }
        let sd = var.sqrt();
        for (o, &x) in out[i * n_cols..(i + 1) * n_cols].iter_mut().zip(row) {
            *o = (x - m) / sd;
        }
    }
    Ok(out)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    #[test]
    fn rpm_column_sums_to_1m() {
        // 2 genes, 3 samples
        let counts = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0];
        let result = rpm(&counts, 2, 3).unwrap();
        for j in 0..3 {
            let col_sum: f64 = (0..2).map(|i| result[i * 3 + j]).sum();
            assert!((col_sum - 1e6).abs() < 1e-3, "col {j} sum={col_sum}");
        }
    }

    #[test]
    fn rpm_zero_library_is_error() {
        let counts = [0.0, 5.0, 0.0, 5.0];
        assert!(matches!(rpm(&counts, 2, 2), Err(XpressError::Data(_))));
    }

    #[test]
    fn rpkm_dimensional_check() {
        // Column totals of 1e6 and 1 kb lengths: RPKM equals the raw count.
        let counts = [10.0, 999_990.0];
        let totals = [1e6];
        let result = rpkm_with_totals(&counts, 2, 1, &[1000.0, 1000.0], &totals).unwrap();
        assert!((result[0] - 10.0).abs() < TOL);
    }

    #[test]
    fn rpkm_uses_supplied_totals() {
        // Library size of 2e6 with a 2 kb gene: 100 / 2 / 2 = 25
        let result = rpkm_with_totals(&[100.0], 1, 1, &[2000.0], &[2e6]).unwrap();
        assert!((result[0] - 25.0).abs() < TOL);
    }

    #[test]
    fn rpkm_rejects_non_positive_length() {
        let r = rpkm_with_totals(&[1.0, 1.0], 2, 1, &[1000.0, 0.0], &[2.0]);
        assert!(matches!(r, Err(XpressError::Data(_))));
    }

    #[test]
    fn tpm_column_sums_to_1m() {
        let counts = [100.0, 200.0, 300.0, 400.0];
        let lengths = [1000.0, 2000.0];
        let result = tpm(&counts, 2, 2, &lengths).unwrap();
        for j in 0..2 {
            let col_sum: f64 = (0..2).map(|i| result[i * 2 + j]).sum();
            assert!((col_sum - 1e6).abs() < 1e-3, "col {j} sum={col_sum}");
        }
    }

    #[test]
    fn tpm_length_normalization() {
        // Same count, shorter gene → higher TPM
        let result = tpm(&[100.0, 100.0], 2, 1, &[500.0, 2000.0]).unwrap();
        assert!(result[0] > result[1]);
    }

    #[test]
    fn rpkm_to_tpm_relationship() {
        // TPM_i = RPKM_i / sum(RPKM) * 1e6
        let counts = [100.0, 200.0, 50.0, 300.0];
        let lengths = [1000.0, 2000.0];
        let totals = column_totals(&counts, 2, 2);
        let rpkm_vals = rpkm_with_totals(&counts, 2, 2, &lengths, &totals).unwrap();
        let tpm_vals = tpm(&counts, 2, 2, &lengths).unwrap();
        for j in 0..2 {
            let sum: f64 = (0..2).map(|i| rpkm_vals[i * 2 + j]).sum();
            for i in 0..2 {
                let from_rpkm = rpkm_vals[i * 2 + j] / sum * 1e6;
                assert!((from_rpkm - tpm_vals[i * 2 + j]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn log2_with_pseudocount() {
        let out = log_transform(&[3.0, 0.0], 2.0, 1.0).unwrap();
        assert!((out[0] - 2.0).abs() < TOL);
        assert!(out[1].abs() < TOL);
    }

    #[test]
    fn log10_base() {
        let out = log_transform(&[99.0], 10.0, 1.0).unwrap();
        assert!((out[0] - 2.0).abs() < TOL);
    }

    #[test]
    fn log_rejects_bad_parameters() {
        assert!(matches!(
            log_transform(&[1.0], 1.0, 1.0),
            Err(XpressError::Configuration(_))
        ));
        assert!(matches!(
            log_transform(&[1.0], 2.0, -0.5),
            Err(XpressError::Configuration(_))
        ));
        assert!(log_transform(&[1.0], f64::NAN, 1.0).is_err());
    }

    #[test]
    fn zscore_rows_centers_and_scales() {
        let out = zscore_rows(&[1.0, 2.0, 3.0], 1, 3).unwrap();
        let sd = (2.0f64 / 3.0).sqrt();
        assert!((out[0] + 1.0 / sd).abs() < TOL);
        assert!(out[1].abs() < TOL);
        assert!(zscore_rows(&[4.0, 4.0], 1, 2).is_err());
    }

    #[test]
    fn dimension_mismatch() {
        assert!(rpm(&[1.0, 2.0], 3, 1).is_err());
        assert!(tpm(&[1.0, 2.0], 2, 1, &[100.0]).is_err());
        assert!(rpkm_with_totals(&[1.0], 1, 1, &[100.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn empty_matrix() {
        assert!(rpm(&[], 0, 0).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn log_is_strictly_increasing(
            a in 0.0f64..1e6,
            delta in 1e-6f64..1e6,
            pc in 0.01f64..10.0,
            base in 1.1f64..16.0,
        ) {
            let b = a + delta;
            let out = log_transform(&[a, b], base, pc).unwrap();
            prop_assert!(out[0] < out[1]);
        }

        #[test]
        fn rpm_preserves_within_sample_order(
            counts in proptest::collection::vec(0.0f64..1e5, 2..20),
        ) {
            let n = counts.len();
            prop_assume!(counts.iter().sum::<f64>() > 0.0);
            let out = rpm(&counts, n, 1).unwrap();
            for i in 0..n {
                for k in 0..n {
                    if counts[i] < counts[k] {
                        prop_assert!(out[i] <= out[k]);
                    }
                }
            }
        }
    }
}
