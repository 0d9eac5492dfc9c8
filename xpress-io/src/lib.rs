//! File boundaries for the xpress toolkit.
//!
//! Supported inputs and outputs:
//! - **Count files and matrices**: delimited text, via the `csv` feature
//!   (enabled by default)
//! - **Lookup tables**: conversion, length and batch-label files, plus
//!   microarray platform references, via the `csv` feature
//! - **GTF**: plain or gzip-compressed annotation, via the `gtf` feature
//!
//! Readers open, consume and close their file within one call.

#[cfg(feature = "csv")]
pub mod counts;

#[cfg(feature = "csv")]
pub mod tables;

#[cfg(feature = "gtf")]
pub mod gtf;

#[cfg(feature = "csv")]
pub use counts::{
    delimiter_for, read_count_file, read_count_matrix, read_counts, read_matrix,
    sample_name_from_path, write_matrix, CountFileOptions,
};

#[cfg(feature = "csv")]
pub use tables::{
    parse_probe_reference, read_batch_labels, read_conversion_table, read_length_table,
    read_probe_reference, write_length_table, ProbeReferenceOptions, TableOptions,
};

#[cfg(feature = "gtf")]
pub use gtf::{gtf_to_string, parse_gtf, parse_gtf_line, parse_gtf_str, read_gtf, write_gtf};
