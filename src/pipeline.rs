//! Pipeline Module
//! Loader → RegionFilter → Aggregator → SeriesBuilder → DerivedMetrics → Regressor.

use crate::data::{
    CountyTable, DataLoader, DataProcessor, RegionFilter, RegionalSeries, SeriesBuilder,
    TableKind,
};
use crate::error::Result;
use crate::stats::{DerivedMetrics, DerivedSeries, RegressionResult, Regressor};
use std::path::PathBuf;
use tracing::{info, warn};

/// Everything needed to produce one regional report.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub cases_path: PathBuf,
    pub deaths_path: PathBuf,
    pub region: String,
    pub output_dir: PathBuf,
    pub render_charts: bool,
    pub chart_width: u32,
    pub chart_height: u32,
}

impl ReportConfig {
    pub fn new(
        cases_path: impl Into<PathBuf>,
        deaths_path: impl Into<PathBuf>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            cases_path: cases_path.into(),
            deaths_path: deaths_path.into(),
            region: region.into(),
            output_dir: PathBuf::from("report"),
            render_charts: true,
            chart_width: 1200,
            chart_height: 800,
        }
    }
}

/// Immutable pipeline results handed to the reporter.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub derived: DerivedSeries,
    pub regression: RegressionResult,
}

impl PipelineOutput {
    pub fn series(&self) -> &RegionalSeries {
        self.derived.base()
    }
}

/// Run every stage after loading on two already-loaded tables.
pub fn analyze(cases: &CountyTable, deaths: &CountyTable, region: &str) -> Result<PipelineOutput> {
    let cases = RegionFilter::select(cases, region)?;
    let deaths = RegionFilter::select(deaths, region)?;

    let totals = DataProcessor::aggregate(&cases, &deaths)?;
    let series = SeriesBuilder::from_totals(region, &totals)?;

    for c in series.corrections() {
        warn!(
            date = %c.date,
            metric = %c.metric,
            previous = c.previous,
            current = c.current,
            "cumulative count decreased (downward correction)"
        );
    }

    let derived = DerivedMetrics::derive(&series)?;
    let regression = Regressor::fit(&series)?;

    info!(
        region,
        days = series.len(),
        first = ?series.first_date(),
        last = ?series.last_date(),
        "pipeline complete"
    );

    Ok(PipelineOutput {
        derived,
        regression,
    })
}

/// Load both tables from disk, then [`analyze`].
pub fn run(config: &ReportConfig) -> Result<PipelineOutput> {
    let cases = DataLoader::load_csv(&config.cases_path, TableKind::Cases)?;
    let deaths = DataLoader::load_csv(&config.deaths_path, TableKind::Deaths)?;
    analyze(&cases, &deaths, &config.region)
}
