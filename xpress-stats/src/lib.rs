//! Numeric kernels for the xpress expression toolkit.
//!
//! Everything here works on plain row-major `&[f64]` slices so the kernels
//! can be reused outside [`xpress_omics`]-style matrices:
//!
//! - **Descriptive statistics**: mean, variance, per-row moments
//! - **Normalization**: RPM, RPKM/FPKM, TPM, log transform, row z-scores
//! - **Empirical Bayes**: ComBat-style batch location/scale adjustment
//!
//! [`xpress_omics`]: https://docs.rs/xpress-omics

pub mod descriptive;
pub mod empirical_bayes;
pub mod normalization;

pub use empirical_bayes::{center_batches, combat, BatchFit, EbConfig};
