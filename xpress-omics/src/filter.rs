//! Quality filtering of rows (features) and columns (samples).
//!
//! Row and column passes are independent: both look at the input matrix, so
//! removing a row never changes whether a column passes its threshold.
//! Every threshold boundary is inclusive.

use std::collections::HashSet;

use tracing::{debug, warn};
use xpress_core::{Reported, Result, XpressError};

use crate::expr::ExpressionMatrix;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FilterConfig {
    /// Minimum fraction of samples in which a feature is non-zero.
    pub min_nonzero_fraction: Option<f64>,
    /// Minimum sum of a feature across samples.
    pub min_row_total: Option<f64>,
    /// Minimum sum of a sample across features.
    pub min_col_total: Option<f64>,
    /// Feature or sample identifiers to remove.
    pub drop: Vec<String>,
    /// Feature or sample identifiers to retain. On an axis where none of
    /// these identifiers occurs the list places no restriction.
    pub keep: Vec<String>,
    /// Metadata column used by `drop_labels` / `keep_labels`.
    pub label_key: String,
    pub drop_labels: Vec<String>,
    pub keep_labels: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_nonzero_fraction: None,
            min_row_total: None,
            min_col_total: None,
            drop: Vec::new(),
            keep: Vec::new(),
            label_key: "group".into(),
            drop_labels: Vec::new(),
            keep_labels: Vec::new(),
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.drop.is_empty() && !self.keep.is_empty() {
            return Err(XpressError::Configuration(
                "filter: 'drop' and 'keep' cannot both be given".into(),
            ));
        }
        if !self.drop_labels.is_empty() && !self.keep_labels.is_empty() {
            return Err(XpressError::Configuration(
                "filter: 'drop_labels' and 'keep_labels' cannot both be given".into(),
            ));
        }
        if let Some(f) = self.min_nonzero_fraction {
            if !(0.0..=1.0).contains(&f) {
                return Err(XpressError::Configuration(format!(
                    "filter: min_nonzero_fraction must be in [0, 1] (got {f})"
                )));
            }
        }
        Ok(())
    }
}

/// Apply `config` to `matrix`, reporting every removed row and column.
pub fn filter(matrix: &ExpressionMatrix, config: &FilterConfig) -> Result<Reported<ExpressionMatrix>> {
    config.validate()?;
    let (n_features, n_samples) = matrix.shape();

    let drop: HashSet<&str> = config.drop.iter().map(|s| s.as_str()).collect();
    let keep: HashSet<&str> = config.keep.iter().map(|s| s.as_str()).collect();
    let keep_features = !keep.is_empty()
        && matrix.feature_names().iter().any(|f| keep.contains(f.as_str()));
    let keep_samples = !keep.is_empty()
        && matrix.sample_names().iter().any(|s| keep.contains(s.as_str()));
    if !keep.is_empty() {
        let unmatched: Vec<&str> = config
            .keep
            .iter()
            .map(|s| s.as_str())
            .filter(|k| matrix.feature_index(k).is_none() && matrix.sample_index(k).is_none())
            .collect();
        if !keep_features && !keep_samples {
            return Err(XpressError::Configuration(format!(
                "filter: no 'keep' identifier occurs in the matrix ({})",
                unmatched.join(", ")
            )));
        }
        if !unmatched.is_empty() {
            warn!(unmatched = %unmatched.join(", "), "filter: 'keep' identifiers not found");
        }
    }

    let labels = if config.drop_labels.is_empty() && config.keep_labels.is_empty() {
        None
    } else {
        Some(matrix.sample_column(&config.label_key).ok_or_else(|| {
            XpressError::Configuration(format!(
                "filter: no '{}' sample column for label selection",
                config.label_key
            ))
        })?)
    };

    let mut excluded = Vec::new();

    let mut rows = Vec::with_capacity(n_features);
    for (i, id) in matrix.feature_names().iter().enumerate() {
        let row = matrix.row(i).unwrap_or_default();
        let mut pass = !drop.contains(id.as_str());
        if keep_features {
            pass &= keep.contains(id.as_str());
        }
        if let Some(min) = config.min_row_total {
            pass &= row.iter().sum::<f64>() >= min;
        }
        if let Some(frac) = config.min_nonzero_fraction {
            let nonzero = row.iter().filter(|&&v| v != 0.0).count();
            pass &= n_samples > 0 && nonzero as f64 / n_samples as f64 >= frac;
        }
        if pass {
            rows.push(i);
        } else {
            excluded.push(id.clone());
        }
    }

    let mut cols = Vec::with_capacity(n_samples);
    for (j, id) in matrix.sample_names().iter().enumerate() {
        let mut pass = !drop.contains(id.as_str());
        if keep_samples {
            pass &= keep.contains(id.as_str());
        }
        if let Some(min) = config.min_col_total {
            let total: f64 = matrix.column(j).unwrap_or_default().iter().sum();
            pass &= total >= min;
        }
        if let Some(labels) = labels {
            let label = &labels[j];
            if !config.keep_labels.is_empty() {
                pass &= config.keep_labels.contains(label);
            }
            pass &= !config.drop_labels.contains(label);
        }
        if pass {
            cols.push(j);
        } else {
            excluded.push(id.clone());
        }
    }

    if rows.is_empty() || cols.is_empty() {
        return Err(XpressError::Data(format!(
            "filter removed everything: {} rows and {} columns remain",
            rows.len(),
            cols.len()
        )));
    }
    if !excluded.is_empty() {
        warn!(removed = excluded.len(), "filter: identifiers removed");
    }
    debug!(rows = rows.len(), cols = cols.len(), "filter");

    let out = matrix.filter_features(&rows)?.filter_samples(&cols)?;
    Ok(Reported::new(out, excluded))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn build(values: &[f64], n_samples: usize) -> ExpressionMatrix {
        let n_features = values.len() / n_samples;
        ExpressionMatrix::from_flat(
            values[..n_features * n_samples].to_vec(),
            (0..n_features).map(|i| format!("f{i}")).collect(),
            (0..n_samples).map(|j| format!("s{j}")).collect(),
        )
        .unwrap()
    }

    proptest! {
        #[test]
        fn raising_row_threshold_never_keeps_more(
            values in proptest::collection::vec(0.0f64..100.0, 6..60),
            low in 0.0f64..150.0,
            step in 0.0f64..150.0,
        ) {
            let m = build(&values, 3);
            let kept = |t: f64| {
                let config = FilterConfig { min_row_total: Some(t), ..Default::default() };
                filter(&m, &config).map(|r| r.output.feature_names().to_vec()).unwrap_or_default()
            };
            let loose = kept(low);
            let strict = kept(low + step);
            prop_assert!(strict.len() <= loose.len());
            // surviving rows keep their input order
            let positions: Vec<usize> = strict
                .iter()
                .map(|n| loose.iter().position(|l| l == n).unwrap())
                .collect();
            prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
