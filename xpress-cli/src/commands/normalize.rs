use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tracing::{info, warn};
use xpress_io::{
    delimiter_for, parse_gtf, read_batch_labels, read_conversion_table, read_count_file,
    read_length_table, read_matrix, read_probe_reference, write_matrix, CountFileOptions,
    ProbeReferenceOptions, TableOptions,
};
use xpress_omics::pipeline::{self, PipelineInputs};
use xpress_omics::{
    conversion_from_records, lengths_from_records, ConversionTable, ExpressionMatrix, LengthKey,
    PipelineConfig, Reduction, UnitKind, UnmappedPolicy,
};

use crate::config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Unit {
    None,
    Rpm,
    Rpkm,
    Fpkm,
    Tpm,
}

impl From<Unit> for UnitKind {
    fn from(u: Unit) -> Self {
        match u {
            Unit::None => UnitKind::None,
            Unit::Rpm => UnitKind::Rpm,
            Unit::Rpkm => UnitKind::Rpkm,
            Unit::Fpkm => UnitKind::Fpkm,
            Unit::Tpm => UnitKind::Tpm,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReductionArg {
    Max,
    Mean,
    Min,
}

impl From<ReductionArg> for Reduction {
    fn from(r: ReductionArg) -> Self {
        match r {
            ReductionArg::Max => Reduction::Max,
            ReductionArg::Mean => Reduction::Mean,
            ReductionArg::Min => Reduction::Min,
        }
    }
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    /// Per-sample count files (sample name = file name up to the first '.')
    #[arg(long, num_args = 1.., required_unless_present = "matrix", conflicts_with = "matrix")]
    pub counts: Vec<PathBuf>,

    /// An already assembled delimited matrix (features x samples)
    #[arg(long)]
    pub matrix: Option<PathBuf>,

    /// Output matrix (.csv is comma-separated, anything else tab-separated)
    #[arg(short, long)]
    pub output: PathBuf,

    /// JSON pipeline configuration; flags below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write the per-stage exclusion report here as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Count files carry a header row
    #[arg(long)]
    pub header: bool,

    /// Column of the count files holding the counts
    #[arg(long, default_value_t = 1)]
    pub value_column: usize,

    /// Summary rows to drop from the end of every count file
    #[arg(long, default_value_t = 0)]
    pub skip_trailing: usize,

    /// Value for identifiers a sample does not list
    #[arg(long)]
    pub fill: Option<f64>,

    /// Two-column original -> canonical identifier table
    #[arg(long, conflicts_with = "probe_reference")]
    pub conversion: Option<PathBuf>,

    /// Microarray platform table with 'ID' and 'Gene Symbol' columns
    #[arg(long)]
    pub probe_reference: Option<PathBuf>,

    /// Keep probes that map to several genes
    #[arg(long)]
    pub keep_multimappers: bool,

    /// Rename gene_id rows to gene_name using a GTF; unnamed rows keep their id
    #[arg(long, conflicts_with_all = ["conversion", "probe_reference"])]
    pub gene_names_gtf: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub reduction: Option<ReductionArg>,

    #[arg(long, value_enum)]
    pub unit: Option<Unit>,

    /// Two-column identifier -> length (nt) table
    #[arg(long, conflicts_with = "lengths_gtf")]
    pub lengths: Option<PathBuf>,

    /// Derive gene lengths (longest transcript, summed exons) from a GTF
    #[arg(long)]
    pub lengths_gtf: Option<PathBuf>,

    /// Apply log_base(x + pseudocount) after the unit conversion
    #[arg(long)]
    pub log: bool,

    #[arg(long)]
    pub log_base: Option<f64>,

    #[arg(long)]
    pub pseudocount: Option<f64>,

    #[arg(long)]
    pub min_row_total: Option<f64>,

    #[arg(long)]
    pub min_col_total: Option<f64>,

    #[arg(long)]
    pub min_nonzero_fraction: Option<f64>,

    /// Tab-separated sample -> batch file; enables batch correction
    #[arg(long)]
    pub batch_labels: Option<PathBuf>,

    /// Only center batches instead of the empirical Bayes adjustment
    #[arg(long)]
    pub center_only: bool,
}

impl NormalizeArgs {
    /// Fold command-line overrides into a loaded configuration.
    pub fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(fill) = self.fill {
            config.fill = fill;
        }
        if let Some(r) = self.reduction {
            config.collapse.reduction = r.into();
        }
        if let Some(u) = self.unit {
            config.convert.unit = u.into();
        }
        if self.log || self.log_base.is_some() || self.pseudocount.is_some() {
            let mut log = config.convert.log.unwrap_or_default();
            if let Some(base) = self.log_base {
                log.base = base;
            }
            if let Some(p) = self.pseudocount {
                log.pseudocount = p;
            }
            config.convert.log = Some(log);
        }
        if self.gene_names_gtf.is_some() {
            config.collapse.unmapped = UnmappedPolicy::Keep;
        }
        if self.min_row_total.is_some() {
            config.filter.min_row_total = self.min_row_total;
        }
        if self.min_col_total.is_some() {
            config.filter.min_col_total = self.min_col_total;
        }
        if self.min_nonzero_fraction.is_some() {
            config.filter.min_nonzero_fraction = self.min_nonzero_fraction;
        }
        if self.batch_labels.is_some() || self.center_only {
            let mut batch = config.batch.take().unwrap_or_default();
            if self.center_only {
                batch.parametric = false;
            }
            config.batch = Some(batch);
        }
        config
    }

    fn count_options(&self, path: &Path) -> CountFileOptions {
        CountFileOptions {
            delimiter: delimiter_for(path),
            has_header: self.header,
            value_column: self.value_column,
            skip_trailing: self.skip_trailing,
            ..Default::default()
        }
    }

    fn load_matrix(&self, fill: f64) -> Result<ExpressionMatrix> {
        if let Some(path) = &self.matrix {
            return read_matrix(path, delimiter_for(path))
                .with_context(|| format!("reading matrix {}", path.display()));
        }
        let samples = self
            .counts
            .iter()
            .map(|p| read_count_file(p, &self.count_options(p)))
            .collect::<xpress_core::Result<Vec<_>>>()?;
        Ok(ExpressionMatrix::concat(&samples, fill)?)
    }

    fn load_conversion(&self) -> Result<Option<ConversionTable>> {
        if let Some(path) = &self.conversion {
            let options = TableOptions {
                delimiter: delimiter_for(path),
                has_header: false,
            };
            return Ok(Some(read_conversion_table(path, &options)?));
        }
        if let Some(path) = &self.probe_reference {
            let options = ProbeReferenceOptions {
                drop_multimappers: !self.keep_multimappers,
                ..Default::default()
            };
            let reported = read_probe_reference(path, &options)?;
            info!(
                probes = reported.output.len(),
                excluded = reported.excluded_count(),
                "probe reference loaded"
            );
            return Ok(Some(reported.output));
        }
        if let Some(path) = &self.gene_names_gtf {
            let records = parse_gtf(path)?;
            return Ok(Some(conversion_from_records(&records, "gene_id", "gene_name")));
        }
        Ok(None)
    }
}

pub fn run_normalize(args: NormalizeArgs) -> Result<()> {
    let config = args.apply(config::load(args.config.as_deref())?);

    let matrix = args.load_matrix(config.fill)?;
    info!(
        features = matrix.shape().0,
        samples = matrix.shape().1,
        "input matrix"
    );

    let conversion = args.load_conversion()?;
    let lengths = match (&args.lengths, &args.lengths_gtf) {
        (Some(path), _) => Some(read_length_table(
            path,
            &TableOptions {
                delimiter: delimiter_for(path),
                has_header: false,
            },
        )?),
        (None, Some(gtf)) => {
            let records = parse_gtf(gtf)?;
            Some(lengths_from_records(&records, "exon", LengthKey::GeneId)?)
        }
        (None, None) => None,
    };
    let labels = args
        .batch_labels
        .as_deref()
        .map(|p| read_batch_labels(p))
        .transpose()?;

    let inputs = PipelineInputs {
        conversion: conversion.as_ref(),
        lengths: lengths.as_ref(),
        batch_labels: labels.as_ref(),
    };
    let (out, report) = pipeline::run(&matrix, &inputs, &config)?;

    for stage in &report.stages {
        if !stage.excluded.is_empty() {
            warn!(stage = %stage.stage, excluded = stage.excluded.len(), "identifiers excluded");
        }
    }

    write_matrix(&args.output, &out, delimiter_for(&args.output))?;
    if let Some(path) = &args.report {
        let file = std::fs::File::create(path)
            .with_context(|| format!("creating report {}", path.display()))?;
        serde_json::to_writer_pretty(file, &report)?;
    }
    info!(
        output = %args.output.display(),
        features = out.shape().0,
        samples = out.shape().1,
        "normalized matrix written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use xpress_core::XpressError;
    use std::io::Write;
    use tempfile::tempdir;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: NormalizeArgs,
    }

    fn parse(argv: &[&str]) -> NormalizeArgs {
        let mut full = vec!["xpress"];
        full.extend_from_slice(argv);
        Harness::try_parse_from(full).unwrap().args
    }

    #[test]
    fn flags_override_config() {
        let args = parse(&[
            "--counts", "a.tsv", "b.tsv", "-o", "out.tsv", "--unit", "rpkm", "--log",
            "--pseudocount", "0.5", "--reduction", "mean", "--min-row-total", "10",
        ]);
        assert_eq!(args.counts.len(), 2);
        let config = args.apply(PipelineConfig::default());
        assert_eq!(config.convert.unit, UnitKind::Rpkm);
        let log = config.convert.log.unwrap();
        assert_eq!((log.base, log.pseudocount), (2.0, 0.5));
        assert_eq!(config.collapse.reduction, Reduction::Mean);
        assert_eq!(config.filter.min_row_total, Some(10.0));
        assert!(config.batch.is_none());
    }

    #[test]
    fn center_only_enables_batch_stage() {
        let args = parse(&["--matrix", "m.tsv", "-o", "out.tsv", "--center-only"]);
        let config = args.apply(PipelineConfig::default());
        assert!(!config.batch.unwrap().parametric);
    }

    #[test]
    fn bad_log_base_is_a_configuration_error() {
        let dir = tempdir().unwrap();
        let matrix = dir.path().join("m.tsv");
        std::fs::write(&matrix, "id\ts1\nG1\t5\n").unwrap();
        let out = dir.path().join("o.tsv");
        let args = parse(&[
            "--matrix",
            matrix.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--log-base",
            "1",
        ]);
        let err = run_normalize(args).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<XpressError>(),
            Some(XpressError::Configuration(_))
        ));
        assert!(!out.exists());
    }

    #[test]
    fn counts_and_matrix_conflict() {
        let argv = ["xpress", "--counts", "a.tsv", "--matrix", "m.tsv", "-o", "o.tsv"];
        assert!(Harness::try_parse_from(argv).is_err());
    }

    #[test]
    fn end_to_end_rpm_log() {
        let dir = tempdir().unwrap();
        let write = |name: &str, body: &str| {
            let p = dir.path().join(name);
            let mut f = std::fs::File::create(&p).unwrap();
            write!(f, "{body}").unwrap();
            p
        };
        let a = write("s1.counts.tsv", "G1\t3\nG2\t999997\n__no_feature\t5\n");
        let b = write("s2.counts.tsv", "G1\t1\nG3\t999999\n__no_feature\t2\n");
        let out = dir.path().join("out.csv");
        let report = dir.path().join("report.json");

        let args = parse(&[
            "--counts",
            a.to_str().unwrap(),
            b.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--report",
            report.to_str().unwrap(),
            "--skip-trailing",
            "1",
            "--unit",
            "rpm",
            "--log",
        ]);
        run_normalize(args).unwrap();

        let text = std::fs::read_to_string(&out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("id,s1,s2"));
        assert_eq!(lines.next(), Some("G1,2,1"));
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
        assert_eq!(json["stages"][0]["stage"], "convert");
    }

    #[test]
    fn gene_names_from_gtf_keep_unnamed_rows() {
        let dir = tempdir().unwrap();
        let matrix = dir.path().join("m.tsv");
        std::fs::write(&matrix, "id\ts1\nENSG1\t5\nENSG2\t7\n").unwrap();
        let gtf = dir.path().join("genes.gtf");
        std::fs::write(
            &gtf,
            "chr1\tt\tgene\t1\t100\t.\t+\t.\tgene_id \"ENSG1\"; gene_name \"TP53\";\n",
        )
        .unwrap();
        let out = dir.path().join("out.tsv");

        let args = parse(&[
            "--matrix",
            matrix.to_str().unwrap(),
            "--gene-names-gtf",
            gtf.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ]);
        run_normalize(args).unwrap();
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "id\ts1\nTP53\t5\nENSG2\t7\n"
        );
    }
}
