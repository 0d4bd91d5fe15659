//! Report Writer Module
//! Writes the derived table, regression summary and charts for one region.

use crate::charts::StaticChartRenderer;
use crate::data::Correction;
use crate::pipeline::PipelineOutput;
use crate::stats::{RegressionResult, StatsCalculator, SummaryStats};
use chrono::NaiveDate;
use polars::prelude::{CsvWriter, PolarsError, SerWriter};
use serde::Serialize;
use std::fs::{self, File};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// Bucket count for the daily-new-cases histogram.
const HISTOGRAM_BINS: usize = 30;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Chart rendering failed: {0}")]
    Chart(String),
}

/// Machine-readable summary written next to the charts.
#[derive(Debug, Serialize)]
pub struct ReportSummary<'a> {
    pub region: &'a str,
    pub population: i64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub days: usize,
    pub final_cases: Option<i64>,
    pub final_deaths: Option<i64>,
    pub final_case_fatality_ratio: Option<f64>,
    pub corrections: Vec<Correction>,
    pub daily_new_cases: SummaryStats,
    pub daily_new_deaths: SummaryStats,
    pub regression: &'a RegressionResult,
}

impl<'a> ReportSummary<'a> {
    pub fn from_output(output: &'a PipelineOutput) -> Self {
        let series = output.series();
        let last = series.records().last();

        Self {
            region: series.region(),
            population: series.population(),
            first_date: series.first_date(),
            last_date: series.last_date(),
            days: series.len(),
            final_cases: last.map(|r| r.cumulative_cases),
            final_deaths: last.map(|r| r.cumulative_deaths),
            final_case_fatality_ratio: output
                .derived
                .case_fatality_ratio()
                .last()
                .copied()
                .flatten(),
            corrections: series.corrections(),
            daily_new_cases: StatsCalculator::describe_defined(output.derived.new_cases()),
            daily_new_deaths: StatsCalculator::describe_defined(output.derived.new_deaths()),
            regression: &output.regression,
        }
    }

    /// Plain-text rendition of the summary.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("COVID-19 trend report: {}\n", self.region));
        out.push_str(&format!("Population: {}\n", self.population));
        if let (Some(first), Some(last)) = (self.first_date, self.last_date) {
            out.push_str(&format!("Period: {first} to {last} ({} days)\n", self.days));
        }
        if let (Some(cases), Some(deaths)) = (self.final_cases, self.final_deaths) {
            out.push_str(&format!("Cumulative cases: {cases}\nCumulative deaths: {deaths}\n"));
        }
        match self.final_case_fatality_ratio {
            Some(cfr) => out.push_str(&format!("Case-fatality ratio: {:.4}%\n", cfr * 100.0)),
            None => out.push_str("Case-fatality ratio: n/a\n"),
        }

        out.push('\n');
        for (label, s) in [
            ("Daily new cases", &self.daily_new_cases),
            ("Daily new deaths", &self.daily_new_deaths),
        ] {
            out.push_str(&format!(
                "{label}: mean {:.1}, median {:.1}, std {:.1}, p05 {:.1}, p95 {:.1}, max {:.0}\n",
                s.mean, s.median, s.std, s.p05, s.p95, s.max
            ));
        }

        if !self.corrections.is_empty() {
            out.push_str(&format!(
                "\nDownward corrections ({}):\n",
                self.corrections.len()
            ));
            for c in &self.corrections {
                out.push_str(&format!(
                    "  {} {}: {} -> {}\n",
                    c.date, c.metric, c.previous, c.current
                ));
            }
        }

        out.push('\n');
        out.push_str(&self.regression.to_string());
        out.push('\n');
        out
    }
}

/// Writes report artifacts into one output directory.
pub struct ReportWriter {
    output_dir: PathBuf,
    render_charts: bool,
    chart_size: (u32, u32),
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            render_charts: true,
            chart_size: (1200, 800),
        }
    }

    pub fn with_chart_size(mut self, width: u32, height: u32) -> Self {
        self.chart_size = (width, height);
        self
    }

    pub fn with_charts(mut self, enabled: bool) -> Self {
        self.render_charts = enabled;
        self
    }

    /// Write every artifact; returns the paths written, in order.
    pub fn write(&self, output: &PipelineOutput) -> Result<Vec<PathBuf>, ReportError> {
        fs::create_dir_all(&self.output_dir)?;
        let mut written = Vec::new();

        let csv_path = self.output_dir.join("derived_series.csv");
        let mut df = output.derived.to_dataframe()?;
        let mut file = File::create(&csv_path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)?;
        written.push(csv_path);

        let summary = ReportSummary::from_output(output);

        let json_path = self.output_dir.join("summary.json");
        fs::write(&json_path, serde_json::to_string_pretty(&summary)?)?;
        written.push(json_path);

        let text_path = self.output_dir.join("summary.txt");
        fs::write(&text_path, summary.to_text())?;
        written.push(text_path);

        let regression_json = self.output_dir.join("regression.json");
        fs::write(
            &regression_json,
            serde_json::to_string_pretty(&output.regression)?,
        )?;
        written.push(regression_json);

        let regression_text = self.output_dir.join("regression.txt");
        fs::write(&regression_text, format!("{}\n", output.regression))?;
        written.push(regression_text);

        if self.render_charts {
            written.extend(self.write_charts(output)?);
        }

        info!(
            dir = %self.output_dir.display(),
            files = written.len(),
            "report written"
        );
        Ok(written)
    }

    fn write_charts(&self, output: &PipelineOutput) -> Result<Vec<PathBuf>, ReportError> {
        let renderer = StaticChartRenderer::new(self.chart_size.0, self.chart_size.1);
        let region = output.series().region();

        let cumulative = self.output_dir.join("cumulative.png");
        renderer.draw_cumulative_chart(&cumulative, region, &output.derived)?;

        let daily = self.output_dir.join("daily_new_cases.png");
        renderer.draw_daily_chart(&daily, region, &output.derived)?;

        let scatter = self.output_dir.join("deaths_vs_cases.png");
        renderer.draw_regression_chart(&scatter, region, output.series(), &output.regression)?;

        let histogram = self.output_dir.join("daily_new_cases_hist.png");
        let values: Vec<f64> = output
            .derived
            .new_cases()
            .iter()
            .flatten()
            .map(|&v| v as f64)
            .collect();
        renderer.draw_histogram(
            &histogram,
            &format!("{region}: distribution of daily new cases"),
            &StatsCalculator::histogram(&values, HISTOGRAM_BINS),
        )?;

        Ok(vec![cumulative, daily, scatter, histogram])
    }
}
