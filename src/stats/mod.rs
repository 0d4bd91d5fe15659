//! Stats module - derived metrics, regression and descriptive statistics

mod calculator;
mod metrics;
mod regression;

pub use calculator::{HistogramBin, StatsCalculator, SummaryStats};
pub use metrics::{DerivedMetrics, DerivedRecord, DerivedSeries, ROLLING_WINDOW};
pub use regression::{Coefficient, RegressionResult, Regressor, SIGNIFICANCE_THRESHOLD};
