//! End-to-end normalization: concatenate → collapse → convert → filter →
//! batch-correct.
//!
//! Each stage's exclusions are kept separately in [`PipelineReport`] so a
//! caller can tell which stage removed what.

use std::collections::HashMap;

use tracing::info;
use xpress_core::{Reported, Result, Summarizable};

use crate::batch::{correct_batches, BatchConfig};
use crate::collapse::{collapse, CollapseConfig};
use crate::convert::{convert, ConvertConfig};
use crate::expr::{ExpressionMatrix, SampleCounts};
use crate::filter::{filter, FilterConfig};
use crate::tables::{ConversionTable, GeneLengthTable};

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// Value for identifiers a sample does not list when concatenating.
    pub fill: f64,
    pub collapse: CollapseConfig,
    pub convert: ConvertConfig,
    pub filter: FilterConfig,
    /// Batch correction runs only when set.
    pub batch: Option<BatchConfig>,
}

/// Optional lookup data for the pipeline stages.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineInputs<'a> {
    /// Collapse is skipped without a conversion table.
    pub conversion: Option<&'a ConversionTable>,
    pub lengths: Option<&'a GeneLengthTable>,
    /// Sample → batch; falls back to the matrix metadata column.
    pub batch_labels: Option<&'a HashMap<String, String>>,
}

/// Identifiers removed (or passed through) by one stage.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StageReport {
    pub stage: String,
    pub excluded: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineReport {
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    fn record(&mut self, stage: &str, excluded: Vec<String>) {
        self.stages.push(StageReport {
            stage: stage.to_string(),
            excluded,
        });
    }

    /// Exclusions of a named stage, if it ran.
    pub fn stage(&self, name: &str) -> Option<&[String]> {
        self.stages
            .iter()
            .find(|s| s.stage == name)
            .map(|s| s.excluded.as_slice())
    }

    pub fn total_excluded(&self) -> usize {
        self.stages.iter().map(|s| s.excluded.len()).sum()
    }
}

/// Run the pipeline from per-sample count columns.
pub fn run_counts(
    samples: &[SampleCounts],
    inputs: &PipelineInputs<'_>,
    config: &PipelineConfig,
) -> Result<(ExpressionMatrix, PipelineReport)> {
    let matrix = ExpressionMatrix::concat(samples, config.fill)?;
    info!(summary = %matrix.summary(), "concatenated count tables");
    run(&matrix, inputs, config)
}

/// Run the pipeline on an assembled matrix.
pub fn run(
    matrix: &ExpressionMatrix,
    inputs: &PipelineInputs<'_>,
    config: &PipelineConfig,
) -> Result<(ExpressionMatrix, PipelineReport)> {
    let mut report = PipelineReport::default();
    let mut current = matrix.clone();

    if let Some(table) = inputs.conversion {
        current = stage(&mut report, "collapse", collapse(&current, table, &config.collapse)?);
    }
    current = stage(
        &mut report,
        "convert",
        convert(&current, inputs.lengths, &config.convert)?,
    );
    current = stage(&mut report, "filter", filter(&current, &config.filter)?);
    if let Some(batch) = &config.batch {
        current = stage(
            &mut report,
            "batch",
            correct_batches(&current, inputs.batch_labels, batch)?,
        );
    }

    info!(
        summary = %current.summary(),
        excluded = report.total_excluded(),
        "pipeline finished"
    );
    Ok((current, report))
}

fn stage(
    report: &mut PipelineReport,
    name: &str,
    result: Reported<ExpressionMatrix>,
) -> ExpressionMatrix {
    let (matrix, excluded) = result.into_parts();
    report.record(name, excluded);
    matrix
}
