//! Unit conversion and log transforms on an [`ExpressionMatrix`].
//!
//! Conversions never fail on a single bad row or column. A sample whose
//! total is not positive, a feature without a usable length, or a row that
//! turns non-finite under the log is removed and named in the returned
//! [`Reported`]. The call fails only when nothing would remain.

use tracing::{debug, warn};
use xpress_core::{Reported, Result, XpressError};
use xpress_stats::normalization;

use crate::expr::ExpressionMatrix;
use crate::tables::GeneLengthTable;

/// Target unit for count data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum UnitKind {
    /// Leave values as they are.
    #[default]
    None,
    Rpm,
    Rpkm,
    /// Numerically identical to RPKM; counts are fragments.
    Fpkm,
    Tpm,
}

impl UnitKind {
    /// Whether the unit divides by feature length.
    pub fn needs_lengths(&self) -> bool {
        matches!(self, UnitKind::Rpkm | UnitKind::Fpkm | UnitKind::Tpm)
    }
}

/// `log_base(x + pseudocount)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LogTransform {
    pub base: f64,
    pub pseudocount: f64,
}

impl Default for LogTransform {
    fn default() -> Self {
        Self {
            base: 2.0,
            pseudocount: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConvertConfig {
    pub unit: UnitKind,
    /// Applied after the unit conversion when set.
    pub log: Option<LogTransform>,
}

/// Convert to `config.unit`, then apply the optional log transform.
///
/// Length-based units take lengths from `lengths` when given, otherwise from
/// the matrix's own feature lengths.
pub fn convert(
    matrix: &ExpressionMatrix,
    lengths: Option<&GeneLengthTable>,
    config: &ConvertConfig,
) -> Result<Reported<ExpressionMatrix>> {
    if let Some(log) = &config.log {
        normalization::validate_log_params(log.base, log.pseudocount)?;
    }

    let converted = match config.unit {
        UnitKind::None => Reported::clean(matrix.clone()),
        UnitKind::Rpm => to_rpm(matrix)?,
        UnitKind::Rpkm | UnitKind::Fpkm => to_rpkm(matrix, lengths)?,
        UnitKind::Tpm => to_tpm(matrix, lengths)?,
    };

    match &config.log {
        None => Ok(converted),
        Some(log) => {
            let (m, mut excluded) = converted.into_parts();
            let logged = log_transform(&m, log)?;
            excluded.extend(logged.excluded);
            Ok(Reported::new(logged.output, excluded))
        }
    }
}

/// Reads per million, with library sizes taken over every row.
pub fn to_rpm(matrix: &ExpressionMatrix) -> Result<Reported<ExpressionMatrix>> {
    let (n_features, n_samples) = matrix.shape();
    let totals = normalization::column_totals(matrix.as_slice(), n_features, n_samples);
    let (cols, excluded) = positive_columns(matrix, &totals);
    let all_rows: Vec<usize> = (0..n_features).collect();
    let subset = subset(matrix, &all_rows, &cols, "rpm")?;
    let (n_f, n_s) = subset.shape();

    let col_totals: Vec<f64> = cols.iter().map(|&j| totals[j]).collect();
    let values = normalization::rpm_with_totals(subset.as_slice(), n_f, n_s, &col_totals)?;
    finish("rpm", subset.with_values(values)?, excluded)
}

/// Reads (fragments) per kilobase per million.
///
/// Library sizes are summed over every row, including rows later removed for
/// lacking a length.
pub fn to_rpkm(
    matrix: &ExpressionMatrix,
    lengths: Option<&GeneLengthTable>,
) -> Result<Reported<ExpressionMatrix>> {
    let (n_features, n_samples) = matrix.shape();
    let totals = normalization::column_totals(matrix.as_slice(), n_features, n_samples);

    let (rows, row_lengths, mut excluded) = rows_with_lengths(matrix, lengths, "rpkm")?;
    let (cols, dropped_cols) = positive_columns(matrix, &totals);
    excluded.extend(dropped_cols);

    let subset = subset(matrix, &rows, &cols, "rpkm")?;
    let (n_f, n_s) = subset.shape();
    let col_totals: Vec<f64> = cols.iter().map(|&j| totals[j]).collect();
    let values = normalization::rpkm_with_totals(
        subset.as_slice(),
        n_f,
        n_s,
        &row_lengths,
        &col_totals,
    )?;
    finish("rpkm", subset.with_values(values)?, excluded)
}

/// Transcripts per million over the rows that have a length.
pub fn to_tpm(
    matrix: &ExpressionMatrix,
    lengths: Option<&GeneLengthTable>,
) -> Result<Reported<ExpressionMatrix>> {
    let (rows, row_lengths, mut excluded) = rows_with_lengths(matrix, lengths, "tpm")?;
    let by_row = matrix.filter_features(&rows)?;
    let (n_f, n_s) = by_row.shape();

    // Depth only counts retained rows here, so zero columns are found after
    // the row pass.
    let mut rpk_totals = vec![0.0; n_s];
    for (i, &len) in row_lengths.iter().enumerate() {
        if let Some(row) = by_row.row(i) {
            for (t, &v) in rpk_totals.iter_mut().zip(row) {
                *t += v / len;
            }
        }
    }
    let (cols, dropped_cols) = positive_columns(&by_row, &rpk_totals);
    excluded.extend(dropped_cols);

    let all_rows: Vec<usize> = (0..n_f).collect();
    let subset = subset(&by_row, &all_rows, &cols, "tpm")?;
    let (n_f, n_s) = subset.shape();
    let values = normalization::tpm(subset.as_slice(), n_f, n_s, &row_lengths)?;
    finish("tpm", subset.with_values(values)?, excluded)
}

/// Apply `log_base(x + pseudocount)` to every value.
///
/// Rows that produce a non-finite value are removed and reported.
pub fn log_transform(
    matrix: &ExpressionMatrix,
    log: &LogTransform,
) -> Result<Reported<ExpressionMatrix>> {
    let values = normalization::log_transform(matrix.as_slice(), log.base, log.pseudocount)?;
    let logged = matrix.with_values(values)?;
    keep_finite_rows(&logged, "log transform")
}

/// Z-score every row using the population standard deviation.
///
/// Rows with zero variance cannot be standardized and are removed.
pub fn standardize_rows(matrix: &ExpressionMatrix) -> Result<Reported<ExpressionMatrix>> {
    let (n_features, n_samples) = matrix.shape();
    let mut rows = Vec::with_capacity(n_features);
    let mut excluded = Vec::new();
    for i in 0..n_features {
        let row = matrix.row(i).unwrap_or_default();
        let m = row.iter().sum::<f64>() / n_samples as f64;
        let var = row.iter().map(|&x| (x - m).powi(2)).sum::<f64>() / n_samples as f64;
        if var > 0.0 && var.is_finite() {
            rows.push(i);
        } else {
            excluded.push(matrix.feature_names()[i].clone());
        }
    }
    let all_cols: Vec<usize> = (0..n_samples).collect();
    let kept = subset(matrix, &rows, &all_cols, "standardize")?;
    let (n_f, n_s) = kept.shape();
    let values = normalization::zscore_rows(kept.as_slice(), n_f, n_s)?;
    finish("standardize", kept.with_values(values)?, excluded)
}

fn positive_columns(matrix: &ExpressionMatrix, totals: &[f64]) -> (Vec<usize>, Vec<String>) {
    let mut kept = Vec::with_capacity(totals.len());
    let mut excluded = Vec::new();
    for (j, &t) in totals.iter().enumerate() {
        if t > 0.0 && t.is_finite() {
            kept.push(j);
        } else {
            excluded.push(matrix.sample_names()[j].clone());
        }
    }
    (kept, excluded)
}

/// Rows with a positive length, those lengths, and the excluded identifiers.
fn rows_with_lengths(
    matrix: &ExpressionMatrix,
    table: Option<&GeneLengthTable>,
    stage: &str,
) -> Result<(Vec<usize>, Vec<f64>, Vec<String>)> {
    let own = matrix.feature_lengths();
    if table.is_none() && own.is_none() {
        return Err(XpressError::Configuration(format!(
            "{stage}: no gene length table and the matrix carries no lengths"
        )));
    }

    let mut rows = Vec::new();
    let mut lengths = Vec::new();
    let mut excluded = Vec::new();
    let mut covered = 0usize;
    for (i, id) in matrix.feature_names().iter().enumerate() {
        let len = match table {
            Some(t) => t.get(id),
            None => own.map(|l| l[i]),
        };
        match len {
            Some(l) if l > 0.0 && l.is_finite() => {
                covered += 1;
                rows.push(i);
                lengths.push(l);
            }
            Some(_) => {
                covered += 1;
                excluded.push(id.clone());
            }
            None => excluded.push(id.clone()),
        }
    }

    if covered == 0 && !matrix.feature_names().is_empty() {
        return Err(XpressError::Configuration(format!(
            "{stage}: no feature has a length"
        )));
    }
    Ok((rows, lengths, excluded))
}

fn subset(
    matrix: &ExpressionMatrix,
    rows: &[usize],
    cols: &[usize],
    stage: &str,
) -> Result<ExpressionMatrix> {
    if rows.is_empty() || cols.is_empty() {
        return Err(XpressError::Data(format!(
            "{stage}: exclusions leave {} rows and {} columns",
            rows.len(),
            cols.len()
        )));
    }
    let (n_features, n_samples) = matrix.shape();
    let rows_done = if rows.len() == n_features {
        matrix.clone()
    } else {
        matrix.filter_features(rows)?
    };
    if cols.len() == n_samples {
        Ok(rows_done)
    } else {
        rows_done.filter_samples(cols)
    }
}

fn keep_finite_rows(matrix: &ExpressionMatrix, stage: &str) -> Result<Reported<ExpressionMatrix>> {
    let (n_features, n_samples) = matrix.shape();
    let mut rows = Vec::with_capacity(n_features);
    let mut excluded = Vec::new();
    for i in 0..n_features {
        if matrix.row(i).unwrap_or_default().iter().all(|v| v.is_finite()) {
            rows.push(i);
        } else {
            excluded.push(matrix.feature_names()[i].clone());
        }
    }
    let all_cols: Vec<usize> = (0..n_samples).collect();
    let kept = subset(matrix, &rows, &all_cols, stage)?;
    finish(stage, kept, excluded)
}

fn finish(
    stage: &str,
    output: ExpressionMatrix,
    excluded: Vec<String>,
) -> Result<Reported<ExpressionMatrix>> {
    if !excluded.is_empty() {
        warn!(stage, excluded = excluded.len(), "identifiers removed");
    }
    let (rows, cols) = output.shape();
    debug!(stage, rows, cols, "converted");
    Ok(Reported::new(output, excluded))
}
