//! Dense expression matrix for bulk RNA-seq and microarray data.
//!
//! [`ExpressionMatrix`] stores a row-major dense matrix of `f64` values
//! (n_features × n_samples) with unique feature and sample names, an optional
//! per-feature length (nucleotides) and named per-sample metadata columns
//! such as `batch` or `group`.
//!
//! Every pipeline stage returns a new matrix; nothing here mutates shared
//! state.

use std::collections::{BTreeMap, HashMap, HashSet};

use xpress_core::{Result, Summarizable, XpressError};

/// One sample's count column: `(identifier, value)` pairs in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleCounts {
    pub name: String,
    pub entries: Vec<(String, f64)>,
}

impl SampleCounts {
    pub fn new(name: impl Into<String>, entries: Vec<(String, f64)>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }
}

/// A dense, row-major expression matrix (features × samples).
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionMatrix {
    data: Vec<f64>,
    n_features: usize,
    n_samples: usize,
    feature_names: Vec<String>,
    sample_names: Vec<String>,
    feature_lengths: Option<Vec<f64>>,
    sample_metadata: BTreeMap<String, Vec<String>>,
}

fn check_unique(kind: &str, names: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(XpressError::Format(format!("duplicate {kind} identifier '{name}'")));
        }
    }
    Ok(())
}

impl ExpressionMatrix {
    /// Create a matrix from row-major 2D data.
    ///
    /// Each inner `Vec` is one feature (row) with `n_samples` values.
    /// Feature and sample names must be unique.
    pub fn new(
        data: Vec<Vec<f64>>,
        feature_names: Vec<String>,
        sample_names: Vec<String>,
    ) -> Result<Self> {
        let n_samples = sample_names.len();
        let mut flat = Vec::with_capacity(data.len() * n_samples);
        for (i, row) in data.iter().enumerate() {
            if row.len() != n_samples {
                return Err(XpressError::Format(format!(
                    "row {i} has {} columns, expected {n_samples}",
                    row.len()
                )));
            }
            flat.extend_from_slice(row);
        }
        if feature_names.len() != data.len() {
            return Err(XpressError::Format(format!(
                "feature_names length ({}) does not match row count ({})",
                feature_names.len(),
                data.len()
            )));
        }
        Self::from_flat(flat, feature_names, sample_names)
    }

    /// Create a matrix from a flat row-major buffer.
    pub fn from_flat(
        data: Vec<f64>,
        feature_names: Vec<String>,
        sample_names: Vec<String>,
    ) -> Result<Self> {
        let n_features = feature_names.len();
        let n_samples = sample_names.len();
        if data.len() != n_features * n_samples {
            return Err(XpressError::Format(format!(
                "data length ({}) does not match {n_features} features x {n_samples} samples",
                data.len()
            )));
        }
        check_unique("feature", &feature_names)?;
        check_unique("sample", &sample_names)?;
        Ok(Self {
            data,
            n_features,
            n_samples,
            feature_names,
            sample_names,
            feature_lengths: None,
            sample_metadata: BTreeMap::new(),
        })
    }

    /// Merge per-sample count columns into one matrix.
    ///
    /// Rows are the union of identifiers in first-seen order; a cell for an
    /// identifier a sample does not list is set to `fill`.
    pub fn concat(samples: &[SampleCounts], fill: f64) -> Result<Self> {
        if samples.is_empty() {
            return Err(XpressError::Configuration(
                "concat: no count tables to merge".into(),
            ));
        }

        let sample_names: Vec<String> = samples.iter().map(|s| s.name.clone()).collect();
        check_unique("sample", &sample_names)?;

        let mut index: HashMap<String, usize> = HashMap::new();
        let mut feature_names: Vec<String> = Vec::new();
        for s in samples {
            for (id, _) in &s.entries {
                if !index.contains_key(id) {
                    index.insert(id.clone(), feature_names.len());
                    feature_names.push(id.clone());
                }
            }
        }

        let n_samples = samples.len();
        let mut data = vec![fill; feature_names.len() * n_samples];
        for (j, s) in samples.iter().enumerate() {
            let mut seen: HashSet<&str> = HashSet::with_capacity(s.entries.len());
            for (id, value) in &s.entries {
                if !seen.insert(id.as_str()) {
                    return Err(XpressError::Format(format!(
                        "sample '{}': duplicate identifier '{id}'",
                        s.name
                    )));
                }
                data[index[id] * n_samples + j] = *value;
            }
        }

        Self::from_flat(data, feature_names, sample_names)
    }

    /// Attach per-feature lengths (nucleotides), one per row.
    pub fn with_feature_lengths(mut self, lengths: Vec<f64>) -> Result<Self> {
        if lengths.len() != self.n_features {
            return Err(XpressError::Format(format!(
                "feature_lengths length ({}) does not match n_features ({})",
                lengths.len(),
                self.n_features
            )));
        }
        self.feature_lengths = Some(lengths);
        Ok(self)
    }

    /// Attach a named metadata column, one value per sample.
    pub fn with_sample_column(mut self, key: impl Into<String>, values: Vec<String>) -> Result<Self> {
        let key = key.into();
        if values.len() != self.n_samples {
            return Err(XpressError::Format(format!(
                "sample column '{key}' has {} values, expected {}",
                values.len(),
                self.n_samples
            )));
        }
        self.sample_metadata.insert(key, values);
        Ok(self)
    }

    /// (n_features, n_samples).
    pub fn shape(&self) -> (usize, usize) {
        (self.n_features, self.n_samples)
    }

    /// Get a single value by feature and sample index.
    pub fn get(&self, feature_idx: usize, sample_idx: usize) -> Option<f64> {
        if feature_idx < self.n_features && sample_idx < self.n_samples {
            Some(self.data[feature_idx * self.n_samples + sample_idx])
        } else {
            None
        }
    }

    /// Get a value by feature and sample name.
    pub fn value(&self, feature: &str, sample: &str) -> Option<f64> {
        let i = self.feature_index(feature)?;
        let j = self.sample_index(sample)?;
        self.get(i, j)
    }

    /// A slice of one feature's values across all samples.
    pub fn row(&self, feature_idx: usize) -> Option<&[f64]> {
        if feature_idx < self.n_features {
            let start = feature_idx * self.n_samples;
            Some(&self.data[start..start + self.n_samples])
        } else {
            None
        }
    }

    /// All feature values for a single sample (column copy, since data is row-major).
    pub fn column(&self, sample_idx: usize) -> Option<Vec<f64>> {
        if sample_idx >= self.n_samples {
            return None;
        }
        Some(
            (0..self.n_features)
                .map(|r| self.data[r * self.n_samples + sample_idx])
                .collect(),
        )
    }

    /// Mean of a feature across all samples.
    pub fn row_mean(&self, feature_idx: usize) -> Option<f64> {
        let row = self.row(feature_idx)?;
        if row.is_empty() {
            return Some(0.0);
        }
        Some(row.iter().sum::<f64>() / row.len() as f64)
    }

    /// Position of a feature by name.
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    /// Position of a sample by name.
    pub fn sample_index(&self, name: &str) -> Option<usize> {
        self.sample_names.iter().position(|n| n == name)
    }

    /// Subset the matrix to the given feature (row) indices.
    ///
    /// Lengths follow their rows; sample metadata is kept as is.
    pub fn filter_features(&self, indices: &[usize]) -> Result<ExpressionMatrix> {
        let mut data = Vec::with_capacity(indices.len() * self.n_samples);
        let mut names = Vec::with_capacity(indices.len());

        for &i in indices {
            if i >= self.n_features {
                return Err(XpressError::Format(format!(
                    "feature index {i} out of bounds (n_features={})",
                    self.n_features
                )));
            }
            let start = i * self.n_samples;
            data.extend_from_slice(&self.data[start..start + self.n_samples]);
            names.push(self.feature_names[i].clone());
        }
        check_unique("feature", &names)?;

        let feature_lengths = self
            .feature_lengths
            .as_ref()
            .map(|l| indices.iter().map(|&i| l[i]).collect());

        Ok(ExpressionMatrix {
            data,
            n_features: indices.len(),
            n_samples: self.n_samples,
            feature_names: names,
            sample_names: self.sample_names.clone(),
            feature_lengths,
            sample_metadata: self.sample_metadata.clone(),
        })
    }

    /// Subset the matrix to the given sample (column) indices.
    pub fn filter_samples(&self, indices: &[usize]) -> Result<ExpressionMatrix> {
        for &i in indices {
            if i >= self.n_samples {
                return Err(XpressError::Format(format!(
                    "sample index {i} out of bounds (n_samples={})",
                    self.n_samples
                )));
            }
        }

        let names: Vec<String> = indices.iter().map(|&i| self.sample_names[i].clone()).collect();
        check_unique("sample", &names)?;

        let mut data = Vec::with_capacity(self.n_features * indices.len());
        for r in 0..self.n_features {
            for &c in indices {
                data.push(self.data[r * self.n_samples + c]);
            }
        }

        let sample_metadata = self
            .sample_metadata
            .iter()
            .map(|(k, v)| (k.clone(), indices.iter().map(|&i| v[i].clone()).collect()))
            .collect();

        Ok(ExpressionMatrix {
            data,
            n_features: self.n_features,
            n_samples: indices.len(),
            feature_names: self.feature_names.clone(),
            sample_names: names,
            feature_lengths: self.feature_lengths.clone(),
            sample_metadata,
        })
    }

    /// A matrix with the same identifiers and metadata but new values.
    pub fn with_values(&self, data: Vec<f64>) -> Result<ExpressionMatrix> {
        if data.len() != self.data.len() {
            return Err(XpressError::Format(format!(
                "with_values: got {} values, expected {}",
                data.len(),
                self.data.len()
            )));
        }
        Ok(ExpressionMatrix {
            data,
            ..self.clone_shape()
        })
    }

    fn clone_shape(&self) -> ExpressionMatrix {
        ExpressionMatrix {
            data: Vec::new(),
            n_features: self.n_features,
            n_samples: self.n_samples,
            feature_names: self.feature_names.clone(),
            sample_names: self.sample_names.clone(),
            feature_lengths: self.feature_lengths.clone(),
            sample_metadata: self.sample_metadata.clone(),
        }
    }

    /// The underlying flat data as a slice (row-major, n_features × n_samples).
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Feature (gene/probe) names.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Sample names.
    pub fn sample_names(&self) -> &[String] {
        &self.sample_names
    }

    /// Per-feature lengths in nucleotides, if attached.
    pub fn feature_lengths(&self) -> Option<&[f64]> {
        self.feature_lengths.as_deref()
    }

    /// A named metadata column, one value per sample.
    pub fn sample_column(&self, key: &str) -> Option<&[String]> {
        self.sample_metadata.get(key).map(|v| v.as_slice())
    }

    /// Names of all sample metadata columns.
    pub fn sample_keys(&self) -> impl Iterator<Item = &str> {
        self.sample_metadata.keys().map(|k| k.as_str())
    }
}

impl Summarizable for ExpressionMatrix {
    fn summary(&self) -> String {
        format!(
            "ExpressionMatrix: {} features \u{00d7} {} samples",
            self.n_features, self.n_samples
        )
    }
}
