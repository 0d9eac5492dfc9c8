//! xpress: expression normalization and ribosome-profiling reference builder.
//!
//! # Usage
//!
//! ```bash
//! # Merge HTSeq count files, convert to log2 TPM, correct batches
//! xpress normalize --counts data/*.tsv --skip-trailing 5 --lengths-gtf genes.gtf \
//!     --unit tpm --log --batch-labels batches.tsv -o normalized.tsv
//!
//! # Collapse a microarray matrix onto gene symbols
//! xpress normalize --matrix probes.tsv --probe-reference GPL570.tsv -o genes.tsv
//!
//! # Coding-only and CDS-truncated annotation for footprint counting
//! xpress reference --gtf Homo_sapiens.gtf.gz --truncate-amount 45 -o ref/
//!
//! # Gene length table
//! xpress lengths --gtf genes.gtf -o lengths.tsv
//! ```
//!
//! Logging goes to stderr; `-v` raises the level and `RUST_LOG` overrides it.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "xpress", author, version, about, long_about = None)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalize count files or a matrix through the configured pipeline
    Normalize(commands::NormalizeArgs),
    /// Write coding-only and CDS-truncated GTF files
    Reference(commands::ReferenceArgs),
    /// Derive a gene length table from a GTF
    Lengths(commands::LengthsArgs),
}

impl Command {
    fn run(self) -> Result<()> {
        match self {
            Command::Normalize(args) => commands::run_normalize(args),
            Command::Reference(args) => commands::run_reference(args),
            Command::Lengths(args) => commands::run_lengths(args),
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = cli.command.run() {
        error!("{err:#}");
        std::process::exit(1);
    }
}
