//! Batch-effect correction for log-scale expression matrices.
//!
//! Batch labels come either from an explicit sample → batch map or from a
//! sample metadata column. The numeric work is done by
//! [`xpress_stats::empirical_bayes`]; this module resolves labels, checks the
//! design and maps skipped rows back to feature names.

use std::collections::HashMap;

use tracing::{debug, warn};
use xpress_core::{Reported, Result, XpressError};
use xpress_stats::empirical_bayes::{self, EbConfig};

use crate::expr::ExpressionMatrix;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BatchConfig {
    /// Metadata column holding batch labels when no explicit map is given.
    pub batch_key: String,
    /// Empirical Bayes location/scale adjustment when true; batch centering
    /// only when false.
    pub parametric: bool,
    pub tolerance: f64,
    pub max_iter: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        let eb = EbConfig::default();
        Self {
            batch_key: "batch".into(),
            parametric: true,
            tolerance: eb.tolerance,
            max_iter: eb.max_iter,
        }
    }
}

/// Remove batch effects from `matrix`.
///
/// Rows with zero variance inside some batch (or with non-finite values) are
/// passed through unchanged and listed in the report.
pub fn correct_batches(
    matrix: &ExpressionMatrix,
    labels: Option<&HashMap<String, String>>,
    config: &BatchConfig,
) -> Result<Reported<ExpressionMatrix>> {
    let sample_labels = resolve_labels(matrix, labels, &config.batch_key)?;
    let (names, batches) = group_columns(&sample_labels);

    if batches.len() < 2 {
        return Err(XpressError::Configuration(format!(
            "batch correction needs at least two batches, found {}",
            batches.len()
        )));
    }
    for (name, cols) in names.iter().zip(&batches) {
        if cols.len() < 2 {
            return Err(XpressError::Configuration(format!(
                "batch '{name}' has {} sample(s); every batch needs at least two",
                cols.len()
            )));
        }
    }

    let (n_features, n_samples) = matrix.shape();
    let fit = if config.parametric {
        let eb = EbConfig {
            tolerance: config.tolerance,
            max_iter: config.max_iter,
        };
        empirical_bayes::combat(matrix.as_slice(), n_features, n_samples, &batches, &eb)?
    } else {
        empirical_bayes::center_batches(matrix.as_slice(), n_features, n_samples, &batches)?
    };

    let skipped: Vec<String> = fit
        .skipped_rows
        .iter()
        .map(|&r| matrix.feature_names()[r].clone())
        .collect();
    if !skipped.is_empty() {
        warn!(
            rows = skipped.len(),
            "batch correction: degenerate rows passed through unchanged"
        );
    }
    debug!(batches = batches.len(), rows = n_features, "batch correction");

    let out = matrix
        .with_values(fit.corrected)?
        .with_sample_column(config.batch_key.clone(), sample_labels)?;
    Ok(Reported::new(out, skipped))
}

fn resolve_labels(
    matrix: &ExpressionMatrix,
    labels: Option<&HashMap<String, String>>,
    key: &str,
) -> Result<Vec<String>> {
    match labels {
        Some(map) => {
            let missing: Vec<&str> = matrix
                .sample_names()
                .iter()
                .filter(|s| !map.contains_key(s.as_str()))
                .map(|s| s.as_str())
                .collect();
            if !missing.is_empty() {
                return Err(XpressError::Configuration(format!(
                    "no batch label for sample(s): {}",
                    missing.join(", ")
                )));
            }
            Ok(matrix
                .sample_names()
                .iter()
                .map(|s| map[s.as_str()].clone())
                .collect())
        }
        None => matrix
            .sample_column(key)
            .map(|v| v.to_vec())
            .ok_or_else(|| {
                XpressError::Configuration(format!(
                    "no batch labels given and no '{key}' sample column"
                ))
            }),
    }
}

/// Batch names and their column indices, in order of first appearance.
fn group_columns(labels: &[String]) -> (Vec<String>, Vec<Vec<usize>>) {
    let mut names: Vec<String> = Vec::new();
    let mut batches: Vec<Vec<usize>> = Vec::new();
    for (j, label) in labels.iter().enumerate() {
        match names.iter().position(|n| n == label) {
            Some(b) => batches[b].push(j),
            None => {
                names.push(label.clone());
                batches.push(vec![j]);
            }
        }
    }
    (names, batches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcg(seed: u64) -> impl FnMut() -> f64 {
        let mut state = seed;
        move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            (state >> 11) as f64 / (1u64 << 53) as f64
        }
    }

    /// 120 features over samples a1..a4 (batch A) and b1..b4 (batch B, shifted by 2).
    fn shifted() -> ExpressionMatrix {
        let mut rng = lcg(11);
        let samples: Vec<String> = ["a1", "a2", "a3", "a4", "b1", "b2", "b3", "b4"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut rows = Vec::new();
        let mut names = Vec::new();
        for r in 0..120 {
            let base = 6.0 + (r % 9) as f64 * 0.4;
            rows.push(
                (0..8)
                    .map(|c| base + if c >= 4 { 2.0 } else { 0.0 } + rng() - 0.5)
                    .collect(),
            );
            names.push(format!("g{r}"));
        }
        ExpressionMatrix::new(rows, names, samples).unwrap()
    }

    fn label_map() -> HashMap<String, String> {
        ["a1", "a2", "a3", "a4", "b1", "b2", "b3", "b4"]
            .iter()
            .map(|s| (s.to_string(), s[..1].to_uppercase()))
            .collect()
    }

    fn gap(m: &ExpressionMatrix, r: usize) -> f64 {
        let row = m.row(r).unwrap();
        let a: f64 = row[..4].iter().sum::<f64>() / 4.0;
        let b: f64 = row[4..].iter().sum::<f64>() / 4.0;
        (a - b).abs()
    }

    #[test]
    fn batch_means_converge() {
        let m = shifted();
        let r = correct_batches(&m, Some(&label_map()), &BatchConfig::default()).unwrap();
        assert!(r.is_clean());
        let n = m.shape().0;
        let improved = (0..n).filter(|&i| gap(&r.output, i) < gap(&m, i)).count();
        assert!(improved as f64 >= 0.95 * n as f64, "improved {improved}/{n}");
        assert_eq!(r.output.sample_column("batch").unwrap()[4], "B");
    }

    #[test]
    fn labels_from_metadata_column() {
        let labels: Vec<String> = "AAAABBBB".chars().map(|c| c.to_string()).collect();
        let m = shifted().with_sample_column("run", labels).unwrap();
        let config = BatchConfig {
            batch_key: "run".into(),
            parametric: false,
            ..Default::default()
        };
        let r = correct_batches(&m, None, &config).unwrap();
        for i in 0..m.shape().0 {
            assert!(gap(&r.output, i) < 1e-9);
        }
    }

    #[test]
    fn missing_label_is_configuration_error() {
        let mut map = label_map();
        map.remove("b3");
        let err = correct_batches(&shifted(), Some(&map), &BatchConfig::default()).unwrap_err();
        assert!(matches!(err, XpressError::Configuration(ref m) if m.contains("b3")));
        let no_column = correct_batches(&shifted(), None, &BatchConfig::default());
        assert!(matches!(no_column, Err(XpressError::Configuration(_))));
    }

    #[test]
    fn singleton_batch_is_configuration_error() {
        let mut map = label_map();
        map.insert("b4".into(), "C".into());
        map.insert("b3".into(), "A".into());
        map.insert("b2".into(), "A".into());
        let err = correct_batches(&shifted(), Some(&map), &BatchConfig::default());
        assert!(matches!(err, Err(XpressError::Configuration(_))));
    }

    #[test]
    fn single_batch_is_configuration_error() {
        let map: HashMap<String, String> = label_map()
            .into_keys()
            .map(|k| (k, "A".to_string()))
            .collect();
        let err = correct_batches(&shifted(), Some(&map), &BatchConfig::default());
        assert!(matches!(err, Err(XpressError::Configuration(_))));
    }

    #[test]
    fn flat_rows_pass_through_and_are_reported() {
        let m = ExpressionMatrix::new(
            vec![
                vec![1.0, 2.0, 5.0, 7.0],
                vec![3.0, 3.0, 3.0, 3.0],
            ],
            vec!["varied".into(), "flat".into()],
            vec!["a1".into(), "a2".into(), "b1".into(), "b2".into()],
        )
        .unwrap();
        let map: HashMap<String, String> = m
            .sample_names()
            .iter()
            .map(|s| (s.clone(), s[..1].to_string()))
            .collect();
        let r = correct_batches(&m, Some(&map), &BatchConfig::default()).unwrap();
        assert_eq!(r.excluded, vec!["flat".to_string()]);
        assert_eq!(r.output.row(1).unwrap(), &[3.0, 3.0, 3.0, 3.0]);
    }

    #[test]
    fn batches_ordered_by_first_appearance() {
        let labels: Vec<String> = ["y", "x", "y", "x"].iter().map(|s| s.to_string()).collect();
        let (names, batches) = group_columns(&labels);
        assert_eq!(names, vec!["y", "x"]);
        assert_eq!(batches, vec![vec![0, 2], vec![1, 3]]);
    }
}
