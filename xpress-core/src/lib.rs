//! Shared primitives for the xpress expression toolkit.
//!
//! `xpress-core` provides the foundation the other crates build on:
//!
//! - **Error types**: [`XpressError`] and [`Result`]
//! - **Drop-and-report**: [`Reported`], the output of every stage that
//!   excludes rows, columns or transcripts it cannot process
//! - **Traits**: [`Summarizable`]

pub mod error;
pub mod report;
pub mod traits;

pub use error::{Result, XpressError};
pub use report::Reported;
pub use traits::*;
