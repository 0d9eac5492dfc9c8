//! Collapse probe-level rows onto canonical gene identifiers.

use std::collections::HashMap;

use tracing::{debug, warn};
use xpress_core::{Reported, Result, XpressError};

use crate::expr::ExpressionMatrix;
use crate::tables::ConversionTable;

/// How rows that share a canonical identifier are combined per column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Reduction {
    #[default]
    Max,
    Mean,
    Min,
}

/// What happens to a row whose identifier is missing from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum UnmappedPolicy {
    /// Remove the row and report its identifier.
    #[default]
    Drop,
    /// Keep the row under its original identifier.
    Keep,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CollapseConfig {
    pub reduction: Reduction,
    pub unmapped: UnmappedPolicy,
}

/// Rename rows through `table` and reduce rows that land on the same name.
///
/// Output rows appear in order of their first contributing input row.
/// Sample metadata is carried over; row lengths are not.
pub fn collapse(
    matrix: &ExpressionMatrix,
    table: &ConversionTable,
    config: &CollapseConfig,
) -> Result<Reported<ExpressionMatrix>> {
    if table.is_empty() {
        return Err(XpressError::Configuration(
            "collapse: conversion table is empty".into(),
        ));
    }
    let n_features = matrix.shape().0;
    if n_features == 0 {
        return Err(XpressError::Configuration(
            "collapse: matrix has no rows".into(),
        ));
    }

    let mut slot: HashMap<&str, usize> = HashMap::new();
    let mut names: Vec<String> = Vec::new();
    // Per output row: running accumulator and the number of contributors.
    let mut acc: Vec<Vec<f64>> = Vec::new();
    let mut contributors: Vec<usize> = Vec::new();
    let mut excluded = Vec::new();

    for (i, id) in matrix.feature_names().iter().enumerate() {
        let target = match (table.get(id), config.unmapped) {
            (Some(canonical), _) => canonical,
            (None, UnmappedPolicy::Keep) => id.as_str(),
            (None, UnmappedPolicy::Drop) => {
                excluded.push(id.clone());
                continue;
            }
        };
        let row = matrix.row(i).unwrap_or_default();
        match slot.get(target) {
            Some(&k) => {
                for (a, &v) in acc[k].iter_mut().zip(row) {
                    *a = match config.reduction {
                        Reduction::Max => a.max(v),
                        Reduction::Min => a.min(v),
                        Reduction::Mean => *a + v,
                    };
                }
                contributors[k] += 1;
            }
            None => {
                slot.insert(target, names.len());
                names.push(target.to_string());
                acc.push(row.to_vec());
                contributors.push(1);
            }
        }
    }

    if config.reduction == Reduction::Mean {
        for (row, &n) in acc.iter_mut().zip(&contributors) {
            for v in row.iter_mut() {
                *v /= n as f64;
            }
        }
    }

    if !excluded.is_empty() {
        warn!(
            dropped = excluded.len(),
            "collapse: identifiers missing from the conversion table were removed"
        );
    }
    debug!(rows_in = n_features, rows_out = names.len(), "collapse");

    let data: Vec<f64> = acc.into_iter().flatten().collect();
    let mut out =
        ExpressionMatrix::from_flat(data, names, matrix.sample_names().to_vec())?;
    for key in matrix.sample_keys() {
        if let Some(values) = matrix.sample_column(key) {
            out = out.with_sample_column(key, values.to_vec())?;
        }
    }
    Ok(Reported::new(out, excluded))
}
