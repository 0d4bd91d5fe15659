//! COVID Trends - regional case/death trend report
//!
//! Loads county-level cumulative case and death tables, aggregates one
//! region into a daily series, derives smoothed and differenced columns and
//! fits deaths against cases with ordinary least squares.

pub mod charts;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod stats;

pub use error::{PipelineError, Result};
pub use pipeline::{analyze, run, PipelineOutput, ReportConfig};
pub use report::{ReportError, ReportSummary, ReportWriter};
