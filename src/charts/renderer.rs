//! Static Chart Renderer
//! Generates PNG charts for a regional report with plotters.
//!
//! Charts:
//! 1. Cumulative cases and deaths over time (two panels, shared x axis)
//! 2. Daily new cases with their 7-day trailing average
//! 3. Cumulative deaths vs cumulative cases with the fitted OLS line
//! 4. Histogram of daily new cases

use crate::data::RegionalSeries;
use crate::report::ReportError;
use crate::stats::{DerivedSeries, HistogramBin, RegressionResult};
use chrono::NaiveDate;
use plotters::prelude::*;
use std::path::Path;

// Colors (RGB)
const BLUE: RGBColor = RGBColor(91, 155, 213); // Cases
const RED: RGBColor = RGBColor(237, 125, 49); // Deaths
const GREEN: RGBColor = RGBColor(112, 173, 71); // Fit / average
const LIGHT_BLUE: RGBColor = RGBColor(189, 215, 238); // Bars
const GRAY: RGBColor = RGBColor(200, 200, 200); // Grid lines

const FONT: &str = "sans-serif";

fn chart_err<E: std::fmt::Display>(err: E) -> ReportError {
    ReportError::Chart(err.to_string())
}

pub struct StaticChartRenderer {
    width: u32,
    height: u32,
}

impl StaticChartRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Cumulative cases (top) and deaths (bottom), each with its rolling average.
    pub fn draw_cumulative_chart(
        &self,
        path: &Path,
        region: &str,
        derived: &DerivedSeries,
    ) -> Result<(), ReportError> {
        let series = derived.base();
        let dates = series.dates();
        let cases: Vec<f64> = series.cumulative_cases().iter().map(|&v| v as f64).collect();
        let deaths: Vec<f64> = series.cumulative_deaths().iter().map(|&v| v as f64).collect();

        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;
        let root = root
            .titled(&format!("{region}: cumulative totals"), (FONT, 28))
            .map_err(chart_err)?;
        let (upper, lower) = root.split_vertically((self.height / 2) as i32 - 20);

        for (area, label, values, smoothed, color) in [
            (&upper, "Cumulative cases", &cases, derived.cases_rolling_avg(), BLUE),
            (&lower, "Cumulative deaths", &deaths, derived.deaths_rolling_avg(), RED),
        ] {
            let (y_min, y_max) = Self::get_y_range(values.iter().copied());
            let x_fmt = |x: &f64| Self::date_label(&dates, *x);

            let mut chart = ChartBuilder::on(area)
                .margin(15)
                .x_label_area_size(40)
                .y_label_area_size(90)
                .build_cartesian_2d(0f64..Self::x_max(dates.len()), y_min..y_max)
                .map_err(chart_err)?;

            chart
                .configure_mesh()
                .light_line_style(GRAY.mix(0.4))
                .x_labels(8)
                .x_label_formatter(&x_fmt)
                .y_desc(label)
                .draw()
                .map_err(chart_err)?;

            chart
                .draw_series(LineSeries::new(
                    values.iter().enumerate().map(|(i, &v)| (i as f64, v)),
                    color.stroke_width(2),
                ))
                .map_err(chart_err)?
                .label(label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));

            chart
                .draw_series(LineSeries::new(
                    Self::defined_points(smoothed),
                    BLACK.mix(0.6),
                ))
                .map_err(chart_err)?
                .label("7-day average")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK.mix(0.6)));

            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperLeft)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(chart_err)?;
        }

        root.present().map_err(chart_err)?;
        Ok(())
    }

    /// Daily new cases as thin bars with the 7-day average line on top.
    pub fn draw_daily_chart(
        &self,
        path: &Path,
        region: &str,
        derived: &DerivedSeries,
    ) -> Result<(), ReportError> {
        let dates = derived.base().dates();
        let daily: Vec<(f64, f64)> = derived
            .new_cases()
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|x| (i as f64, x as f64)))
            .collect();
        let (y_min, y_max) = Self::get_y_range(daily.iter().map(|&(_, y)| y));
        let x_fmt = |x: &f64| Self::date_label(&dates, *x);

        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(format!("{region}: daily new cases"), (FONT, 28))
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(90)
            .build_cartesian_2d(0f64..Self::x_max(dates.len()), y_min.min(0.0)..y_max)
            .map_err(chart_err)?;

        chart
            .configure_mesh()
            .light_line_style(GRAY.mix(0.4))
            .x_labels(8)
            .x_label_formatter(&x_fmt)
            .x_desc("Date")
            .y_desc("New cases")
            .draw()
            .map_err(chart_err)?;

        chart
            .draw_series(daily.iter().map(|&(x, y)| {
                Rectangle::new([(x - 0.4, 0.0), (x + 0.4, y)], LIGHT_BLUE.filled())
            }))
            .map_err(chart_err)?
            .label("Daily new cases")
            .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], LIGHT_BLUE.filled()));

        chart
            .draw_series(LineSeries::new(
                Self::defined_points(derived.new_cases_rolling_avg()),
                BLUE.stroke_width(2),
            ))
            .map_err(chart_err)?
            .label("7-day average")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(chart_err)?;

        root.present().map_err(chart_err)?;
        Ok(())
    }

    /// Scatter of deaths against cases, one point per day, plus the fit line.
    pub fn draw_regression_chart(
        &self,
        path: &Path,
        region: &str,
        series: &RegionalSeries,
        fit: &RegressionResult,
    ) -> Result<(), ReportError> {
        let points: Vec<(f64, f64)> = series
            .records()
            .iter()
            .map(|r| (r.cumulative_cases as f64, r.cumulative_deaths as f64))
            .collect();
        let (x_min, x_max) = Self::get_y_range(points.iter().map(|&(x, _)| x));
        let (y_min, y_max) = Self::get_y_range(
            points
                .iter()
                .map(|&(_, y)| y)
                .chain([fit.predict(x_min), fit.predict(x_max)]),
        );

        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(
                format!(
                    "{region}: deaths = {:.3} + {:.5} × cases (R² = {:.4})",
                    fit.intercept.estimate, fit.slope.estimate, fit.r_squared
                ),
                (FONT, 24),
            )
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(90)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)
            .map_err(chart_err)?;

        chart
            .configure_mesh()
            .light_line_style(GRAY.mix(0.4))
            .x_desc("Cumulative cases")
            .y_desc("Cumulative deaths")
            .draw()
            .map_err(chart_err)?;

        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 3, BLUE.mix(0.7).filled())),
            )
            .map_err(chart_err)?
            .label("Daily observation")
            .legend(|(x, y)| Circle::new((x + 10, y), 3, BLUE.filled()));

        chart
            .draw_series(LineSeries::new(
                [(x_min, fit.predict(x_min)), (x_max, fit.predict(x_max))],
                GREEN.stroke_width(2),
            ))
            .map_err(chart_err)?
            .label("OLS fit")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREEN));

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(chart_err)?;

        root.present().map_err(chart_err)?;
        Ok(())
    }

    pub fn draw_histogram(
        &self,
        path: &Path,
        title: &str,
        bins: &[HistogramBin],
    ) -> Result<(), ReportError> {
        let (x_min, x_max) = match (bins.first(), bins.last()) {
            (Some(first), Some(last)) => (first.lower, last.upper),
            _ => (0.0, 1.0),
        };
        let y_max = bins.iter().map(|b| b.count).max().unwrap_or(0).max(1) as f64 * 1.1;

        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, (FONT, 28))
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(x_min..x_max, 0f64..y_max)
            .map_err(chart_err)?;

        chart
            .configure_mesh()
            .light_line_style(GRAY.mix(0.4))
            .x_desc("Daily new cases")
            .y_desc("Days")
            .draw()
            .map_err(chart_err)?;

        chart
            .draw_series(bins.iter().map(|b| {
                Rectangle::new([(b.lower, 0.0), (b.upper, b.count as f64)], BLUE.mix(0.7).filled())
            }))
            .map_err(chart_err)?;

        root.present().map_err(chart_err)?;
        Ok(())
    }

    fn defined_points(values: &[Option<f64>]) -> Vec<(f64, f64)> {
        values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|y| (i as f64, y)))
            .collect()
    }

    fn x_max(len: usize) -> f64 {
        len.saturating_sub(1).max(1) as f64
    }

    fn date_label(dates: &[NaiveDate], x: f64) -> String {
        if x < 0.0 {
            return String::new();
        }
        dates
            .get(x.round() as usize)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }

    /// Padded `(min, max)` over the values, rounded outward to a nice step.
    fn get_y_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            if v.is_finite() {
                min = min.min(v);
                max = max.max(v);
            }
        }
        if min.is_infinite() {
            return (0.0, 100.0);
        }
        if max == min {
            return (min - 1.0, max + 1.0);
        }
        let pad = (max - min) * 0.05;
        let step = Self::nice_step(max - min, 8);
        (
            ((min - pad) / step).floor() * step,
            ((max + pad) / step).ceil() * step,
        )
    }

    fn nice_step(range: f64, target_steps: usize) -> f64 {
        let raw_step = range / target_steps as f64;
        let magnitude = 10f64.powf(raw_step.log10().floor());
        let normalized = raw_step / magnitude;

        let nice = if normalized <= 1.0 {
            1.0
        } else if normalized <= 2.0 {
            2.0
        } else if normalized <= 5.0 {
            5.0
        } else {
            10.0
        };

        nice * magnitude
    }
}
