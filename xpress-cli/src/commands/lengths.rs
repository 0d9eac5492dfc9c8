use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};
use tracing::info;
use xpress_io::{parse_gtf, write_length_table};
use xpress_omics::{lengths_from_records, LengthKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeyArg {
    TranscriptId,
    GeneId,
    GeneName,
}

impl From<KeyArg> for LengthKey {
    fn from(k: KeyArg) -> Self {
        match k {
            KeyArg::TranscriptId => LengthKey::TranscriptId,
            KeyArg::GeneId => LengthKey::GeneId,
            KeyArg::GeneName => LengthKey::GeneName,
        }
    }
}

#[derive(Debug, Args)]
pub struct LengthsArgs {
    /// Input annotation (.gtf or .gtf.gz)
    #[arg(short, long)]
    pub gtf: PathBuf,

    /// Output two-column length table
    #[arg(short, long)]
    pub output: PathBuf,

    /// Feature type whose lengths are summed per transcript
    #[arg(long, default_value = "exon")]
    pub feature: String,

    /// Attribute keying the table; gene keys take the longest transcript
    #[arg(long, value_enum, default_value_t = KeyArg::GeneId)]
    pub key: KeyArg,
}

pub fn run_lengths(args: LengthsArgs) -> Result<()> {
    let records = parse_gtf(&args.gtf)?;
    let table = lengths_from_records(&records, &args.feature, args.key.into())?;
    write_length_table(&args.output, &table)?;
    info!(entries = table.len(), output = %args.output.display(), "length table written");
    Ok(())
}
