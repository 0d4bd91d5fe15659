//! Derived Metrics Module
//! Rolling averages, daily differences and case-fatality ratio, computed with
//! Polars lazy expressions over the regional series.
//!
//! Every derived column has the same length as the base series. Cells with
//! insufficient history (or a zero denominator) are `None`.

use crate::data::RegionalSeries;
use chrono::NaiveDate;
use polars::prelude::*;
use polars::series::ops::NullBehavior;
use tracing::debug;

/// Trailing window used for the smoothed columns.
pub const ROLLING_WINDOW: usize = 7;

/// One row of the derived table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedRecord {
    pub date: NaiveDate,
    pub cumulative_cases: i64,
    pub cumulative_deaths: i64,
    pub cases_rolling_avg: Option<f64>,
    pub deaths_rolling_avg: Option<f64>,
    pub new_cases: Option<i64>,
    pub new_deaths: Option<i64>,
    pub new_cases_rolling_avg: Option<f64>,
    pub case_fatality_ratio: Option<f64>,
}

/// A [`RegionalSeries`] plus its derived columns.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedSeries {
    base: RegionalSeries,
    cases_rolling_avg: Vec<Option<f64>>,
    deaths_rolling_avg: Vec<Option<f64>>,
    new_cases: Vec<Option<i64>>,
    new_deaths: Vec<Option<i64>>,
    new_cases_rolling_avg: Vec<Option<f64>>,
    case_fatality_ratio: Vec<Option<f64>>,
}

impl DerivedSeries {
    pub fn base(&self) -> &RegionalSeries {
        &self.base
    }

    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    pub fn cases_rolling_avg(&self) -> &[Option<f64>] {
        &self.cases_rolling_avg
    }

    pub fn deaths_rolling_avg(&self) -> &[Option<f64>] {
        &self.deaths_rolling_avg
    }

    pub fn new_cases(&self) -> &[Option<i64>] {
        &self.new_cases
    }

    pub fn new_deaths(&self) -> &[Option<i64>] {
        &self.new_deaths
    }

    /// Seven-day average of daily new cases (first defined at index 7).
    pub fn new_cases_rolling_avg(&self) -> &[Option<f64>] {
        &self.new_cases_rolling_avg
    }

    pub fn case_fatality_ratio(&self) -> &[Option<f64>] {
        &self.case_fatality_ratio
    }

    pub fn records(&self) -> Vec<DerivedRecord> {
        self.base
            .records()
            .iter()
            .enumerate()
            .map(|(i, r)| DerivedRecord {
                date: r.date,
                cumulative_cases: r.cumulative_cases,
                cumulative_deaths: r.cumulative_deaths,
                cases_rolling_avg: self.cases_rolling_avg[i],
                deaths_rolling_avg: self.deaths_rolling_avg[i],
                new_cases: self.new_cases[i],
                new_deaths: self.new_deaths[i],
                new_cases_rolling_avg: self.new_cases_rolling_avg[i],
                case_fatality_ratio: self.case_fatality_ratio[i],
            })
            .collect()
    }

    /// Whole table as a DataFrame; missing cells become nulls.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let dates: Vec<String> = self
            .base
            .dates()
            .iter()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .collect();
        let population = vec![self.base.population(); self.len()];

        DataFrame::new(vec![
            Column::new("date".into(), dates),
            Column::new(CASES.into(), self.base.cumulative_cases()),
            Column::new(DEATHS.into(), self.base.cumulative_deaths()),
            Column::new("population".into(), population),
            Column::new("cases_rolling_avg".into(), self.cases_rolling_avg.clone()),
            Column::new("deaths_rolling_avg".into(), self.deaths_rolling_avg.clone()),
            Column::new("new_cases".into(), self.new_cases.clone()),
            Column::new("new_deaths".into(), self.new_deaths.clone()),
            Column::new(
                "new_cases_rolling_avg".into(),
                self.new_cases_rolling_avg.clone(),
            ),
            Column::new(
                "case_fatality_ratio".into(),
                self.case_fatality_ratio.clone(),
            ),
        ])
    }
}

const CASES: &str = "cumulative_cases";
const DEATHS: &str = "cumulative_deaths";
const VALUE: &str = "value";

/// Column transforms over a regional series, evaluated as Polars expressions.
pub struct DerivedMetrics;

impl DerivedMetrics {
    /// Compute every derived column eagerly.
    pub fn derive(series: &RegionalSeries) -> PolarsResult<DerivedSeries> {
        let base = DataFrame::new(vec![
            Column::new(CASES.into(), series.cumulative_cases()),
            Column::new(DEATHS.into(), series.cumulative_deaths()),
        ])?;

        let df = base
            .lazy()
            .with_columns([
                Self::trailing_mean(col(CASES), ROLLING_WINDOW).alias("cases_rolling_avg"),
                Self::trailing_mean(col(DEATHS), ROLLING_WINDOW).alias("deaths_rolling_avg"),
                col(CASES)
                    .diff(1, NullBehavior::Ignore)
                    .alias("new_cases"),
                col(DEATHS)
                    .diff(1, NullBehavior::Ignore)
                    .alias("new_deaths"),
                Self::ratio(col(DEATHS), col(CASES)).alias("case_fatality_ratio"),
            ])
            .with_columns([Self::trailing_mean(col("new_cases"), ROLLING_WINDOW)
                .alias("new_cases_rolling_avg")])
            .collect()?;

        let derived = DerivedSeries {
            cases_rolling_avg: Self::floats(&df, "cases_rolling_avg")?,
            deaths_rolling_avg: Self::floats(&df, "deaths_rolling_avg")?,
            new_cases: Self::integers(&df, "new_cases")?,
            new_deaths: Self::integers(&df, "new_deaths")?,
            new_cases_rolling_avg: Self::floats(&df, "new_cases_rolling_avg")?,
            case_fatality_ratio: Self::floats(&df, "case_fatality_ratio")?,
            base: series.clone(),
        };

        debug!(
            days = derived.len(),
            smoothed = derived.cases_rolling_avg.iter().flatten().count(),
            ratios = derived.case_fatality_ratio.iter().flatten().count(),
            "derived metrics"
        );

        Ok(derived)
    }

    /// Trailing mean that needs `window` non-null cells ending at each row.
    fn trailing_mean(expr: Expr, window: usize) -> Expr {
        expr.cast(DataType::Float64)
            .rolling_mean(RollingOptionsFixedWindow {
                window_size: window,
                min_periods: window,
                ..Default::default()
            })
    }

    /// `numerator / denominator`, null where the denominator is zero.
    fn ratio(numerator: Expr, denominator: Expr) -> Expr {
        when(denominator.clone().eq(lit(0)))
            .then(lit(NULL))
            .otherwise(numerator.cast(DataType::Float64) / denominator.cast(DataType::Float64))
    }

    fn floats(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
        Ok(df.column(name)?.f64()?.into_iter().collect())
    }

    fn integers(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i64>>> {
        Ok(df.column(name)?.i64()?.into_iter().collect())
    }

    /// Trailing mean over `window` cells ending at each position.
    ///
    /// Defined only when the full window is present and every cell in it is
    /// defined.
    pub fn rolling_mean(values: &[Option<f64>], window: usize) -> PolarsResult<Vec<Option<f64>>> {
        if window == 0 {
            return Ok(vec![None; values.len()]);
        }
        let df = DataFrame::new(vec![Column::new(VALUE.into(), values)])?
            .lazy()
            .select([Self::trailing_mean(col(VALUE), window).alias(VALUE)])
            .collect()?;
        Self::floats(&df, VALUE)
    }

    /// `values[i] - values[i - 1]`; undefined at the first position.
    ///
    /// Downward corrections come through as negative deltas.
    pub fn daily_difference(values: &[i64]) -> PolarsResult<Vec<Option<i64>>> {
        let df = DataFrame::new(vec![Column::new(VALUE.into(), values)])?
            .lazy()
            .select([col(VALUE).diff(1, NullBehavior::Ignore)])
            .collect()?;
        Self::integers(&df, VALUE)
    }

    /// `deaths[i] / cases[i]`, undefined where cases is zero.
    pub fn case_fatality_ratio(deaths: &[i64], cases: &[i64]) -> PolarsResult<Vec<Option<f64>>> {
        let df = DataFrame::new(vec![
            Column::new(DEATHS.into(), deaths),
            Column::new(CASES.into(), cases),
        ])?
        .lazy()
        .select([Self::ratio(col(DEATHS), col(CASES)).alias(VALUE)])
        .collect()?;
        Self::floats(&df, VALUE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SeriesBuilder;
    use approx::assert_relative_eq;

    fn series(cases: &[i64], deaths: &[i64]) -> RegionalSeries {
        let labels: Vec<String> = (0..cases.len())
            .map(|i| format!("3/{}/20", i + 1))
            .collect();
        SeriesBuilder::build("Texas", &labels, cases, deaths, 1000).unwrap()
    }

    #[test]
    fn test_rolling_mean_window_seven() {
        let cases = [10, 20, 30, 40, 50, 60, 70, 80];
        let values: Vec<Option<f64>> = cases.iter().map(|&v| Some(v as f64)).collect();
        let avg = DerivedMetrics::rolling_mean(&values, ROLLING_WINDOW).unwrap();

        assert_eq!(avg.len(), 8);
        assert!(avg[..6].iter().all(Option::is_none));
        assert_relative_eq!(avg[6].unwrap(), 40.0);
        assert_relative_eq!(avg[7].unwrap(), 50.0);
    }

    #[test]
    fn test_rolling_mean_short_series_all_missing() {
        let values = vec![Some(1.0); 6];
        let avg = DerivedMetrics::rolling_mean(&values, ROLLING_WINDOW).unwrap();
        assert_eq!(avg, vec![None; 6]);
    }

    #[test]
    fn test_rolling_mean_missing_cell_poisons_window() {
        let mut values = vec![Some(1.0); 9];
        values[0] = None;
        let avg = DerivedMetrics::rolling_mean(&values, ROLLING_WINDOW).unwrap();
        assert_eq!(avg[6], None);
        assert_relative_eq!(avg[7].unwrap(), 1.0);
        assert_relative_eq!(avg[8].unwrap(), 1.0);
    }

    #[test]
    fn test_daily_difference_round_trips() {
        let cumulative = [3, 5, 5, 12, 20, 19, 30];
        let diff = DerivedMetrics::daily_difference(&cumulative).unwrap();

        assert_eq!(diff.len(), cumulative.len());
        assert_eq!(diff[0], None);
        assert_eq!(diff[5], Some(-1));
        for i in 1..cumulative.len() {
            let rebuilt: i64 = cumulative[0] + diff[1..=i].iter().flatten().sum::<i64>();
            assert_eq!(rebuilt, cumulative[i]);
        }
    }

    #[test]
    fn test_daily_difference_edge_lengths() {
        assert!(DerivedMetrics::daily_difference(&[]).unwrap().is_empty());
        assert_eq!(DerivedMetrics::daily_difference(&[7]).unwrap(), vec![None]);
    }

    #[test]
    fn test_case_fatality_ratio_zero_cases() {
        let ratio = DerivedMetrics::case_fatality_ratio(&[0, 1, 3], &[0, 50, 200]).unwrap();
        assert_eq!(ratio[0], None);
        assert_relative_eq!(ratio[1].unwrap(), 0.02, epsilon = 1e-9);
        assert_relative_eq!(ratio[2].unwrap(), 0.015, epsilon = 1e-9);
    }

    #[test]
    fn test_derive_preserves_length() {
        let s = series(
            &[0, 10, 20, 30, 40, 50, 60, 70, 80],
            &[0, 0, 1, 1, 2, 2, 3, 3, 4],
        );
        let derived = DerivedMetrics::derive(&s).unwrap();

        assert_eq!(derived.len(), s.len());
        assert_eq!(derived.cases_rolling_avg().len(), s.len());
        assert_eq!(derived.new_deaths().len(), s.len());
        assert_relative_eq!(derived.cases_rolling_avg()[6].unwrap(), 30.0);
        assert_eq!(derived.new_cases()[1], Some(10));
        assert_eq!(derived.case_fatality_ratio()[0], None);
        assert_eq!(derived.new_cases_rolling_avg()[6], None);
        assert_relative_eq!(derived.new_cases_rolling_avg()[7].unwrap(), 10.0);

        let records = derived.records();
        assert_eq!(records.len(), s.len());
        assert_eq!(records[8].new_deaths, Some(1));
    }

    #[test]
    fn test_to_dataframe_uses_nulls_for_missing() {
        let s = series(&[0, 5, 9], &[0, 0, 1]);
        let df = DerivedMetrics::derive(&s).unwrap().to_dataframe().unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 10);
        assert_eq!(df.column("cases_rolling_avg").unwrap().null_count(), 3);
        assert_eq!(df.column("case_fatality_ratio").unwrap().null_count(), 1);
        assert_eq!(df.column("new_cases").unwrap().null_count(), 1);
    }
}
