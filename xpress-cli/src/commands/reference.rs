use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};
use xpress_io::{parse_gtf, write_gtf};
use xpress_omics::{build_reference, coding_only, ReferenceConfig};

/// File names written into the output directory.
pub const CODING_GTF: &str = "transcripts_coding.gtf";
pub const TRUNCATED_GTF: &str = "transcripts_coding_truncated.gtf";

#[derive(Debug, Args)]
pub struct ReferenceArgs {
    /// Input annotation (.gtf or .gtf.gz)
    #[arg(short, long)]
    pub gtf: PathBuf,

    /// Directory for transcripts_coding.gtf and transcripts_coding_truncated.gtf
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Nucleotides removed from each end of every coding span
    #[arg(short, long, default_value_t = 45)]
    pub truncate_amount: u64,

    /// Biotype that marks coding records
    #[arg(long, default_value = "protein_coding")]
    pub biotype: String,

    /// Keep records of every biotype
    #[arg(long)]
    pub all_biotypes: bool,

    /// Feature type defining the coding span
    #[arg(long, default_value = "CDS")]
    pub feature: String,

    /// Do not write transcripts_coding.gtf
    #[arg(long)]
    pub skip_coding: bool,

    /// Do not write transcripts_coding_truncated.gtf
    #[arg(long, conflicts_with = "skip_coding")]
    pub skip_truncated: bool,
}

impl ReferenceArgs {
    pub fn config(&self) -> ReferenceConfig {
        ReferenceConfig {
            coding_only: !self.all_biotypes,
            biotype: self.biotype.clone(),
            truncate_amount: self.truncate_amount,
            feature: self.feature.clone(),
        }
    }
}

pub fn run_reference(args: ReferenceArgs) -> Result<()> {
    let records = parse_gtf(&args.gtf)?;
    info!(records = records.len(), gtf = %args.gtf.display(), "annotation loaded");

    let config = args.config();
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    if args.skip_truncated {
        let coding = if config.coding_only {
            coding_only(&records, &config.biotype)
        } else {
            records
        };
        let path = args.output_dir.join(CODING_GTF);
        write_gtf(&path, &coding)?;
        info!(coding = coding.len(), path = %path.display(), "coding annotation written");
        return Ok(());
    }

    let outputs = build_reference(&records, &config)?;
    if !args.skip_coding {
        write_gtf(args.output_dir.join(CODING_GTF), &outputs.coding)?;
    }
    write_gtf(args.output_dir.join(TRUNCATED_GTF), &outputs.truncated.output)?;

    if !outputs.truncated.is_clean() {
        warn!(
            transcripts = outputs.truncated.excluded_count(),
            "transcripts too short to truncate were left out"
        );
    }
    info!(
        coding = outputs.coding.len(),
        truncated = outputs.truncated.output.len(),
        dir = %args.output_dir.display(),
        "reference written"
    );
    Ok(())
}
