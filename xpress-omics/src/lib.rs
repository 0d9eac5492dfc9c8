//! Expression data model and normalization stages for the xpress toolkit.
//!
//! - **Expression matrices**: dense [`ExpressionMatrix`] (features × samples)
//!   with optional feature lengths and sample metadata
//! - **Lookup tables**: [`GeneLengthTable`], [`ConversionTable`]
//! - **Stages**: [`collapse()`], [`convert()`], [`filter()`], [`correct_batches`]
//! - **Annotation**: [`GtfRecord`], [`Strand`] and the reference builder in
//!   [`reference`]
//! - **Orchestration**: [`pipeline::run`]
//!
//! # Quick start
//!
//! ```
//! use xpress_omics::{convert, ConvertConfig, ExpressionMatrix, LogTransform, UnitKind};
//! use xpress_core::Summarizable;
//!
//! let matrix = ExpressionMatrix::new(
//!     vec![vec![10.0, 20.0], vec![30.0, 80.0]],
//!     vec!["gene1".into(), "gene2".into()],
//!     vec!["sample_a".into(), "sample_b".into()],
//! ).unwrap();
//!
//! let config = ConvertConfig { unit: UnitKind::Rpm, log: Some(LogTransform::default()) };
//! let result = convert(&matrix, None, &config).unwrap();
//!
//! assert!(result.is_clean());
//! assert_eq!(result.output.summary(), "ExpressionMatrix: 2 features \u{00d7} 2 samples");
//! ```

pub mod annotation;
pub mod batch;
pub mod collapse;
pub mod convert;
pub mod expr;
pub mod filter;
pub mod genomic;
pub mod pipeline;
pub mod reference;
pub mod tables;

pub use annotation::{parse_attributes, GtfRecord, BIOTYPE_KEYS};
pub use batch::{correct_batches, BatchConfig};
pub use collapse::{collapse, CollapseConfig, Reduction, UnmappedPolicy};
pub use convert::{
    convert, log_transform, standardize_rows, to_rpkm, to_rpm, to_tpm, ConvertConfig,
    LogTransform, UnitKind,
};
pub use expr::{ExpressionMatrix, SampleCounts};
pub use filter::{filter, FilterConfig};
pub use genomic::Strand;
pub use pipeline::{PipelineConfig, PipelineInputs, PipelineReport, StageReport};
pub use reference::{
    build_reference, coding_only, truncate_cds, truncate_interval, ReferenceConfig,
    ReferenceOutputs,
};
pub use tables::{
    conversion_from_records, lengths_from_records, ConversionTable, GeneLengthTable, LengthKey,
};
