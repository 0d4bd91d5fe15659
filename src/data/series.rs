//! Regional Series Module
//! Turns per-date totals into a date-indexed daily series.

use crate::data::RegionalTotals;
use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Parse a `M/D/YY` (or `M/D/YYYY`) header label, month first.
///
/// Two-digit years are read as 20YY.
pub fn parse_date_label(label: &str) -> Result<NaiveDate> {
    let fail = || PipelineError::DateParse {
        label: label.to_string(),
    };

    let parts: Vec<&str> = label.trim().split('/').collect();
    if parts.len() != 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(fail());
    }

    let month: u32 = parts[0].parse().map_err(|_| fail())?;
    let day: u32 = parts[1].parse().map_err(|_| fail())?;
    let year: i32 = match parts[2].len() {
        2 => 2000 + parts[2].parse::<i32>().map_err(|_| fail())?,
        4 => parts[2].parse().map_err(|_| fail())?,
        _ => return Err(fail()),
    };

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(fail)
}

/// One day of regional totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub cumulative_cases: i64,
    pub cumulative_deaths: i64,
}

/// Which cumulative column a correction was seen in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesMetric {
    Cases,
    Deaths,
}

impl fmt::Display for SeriesMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesMetric::Cases => write!(f, "cases"),
            SeriesMetric::Deaths => write!(f, "deaths"),
        }
    }
}

/// A day where a cumulative count went down (a downward data correction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Correction {
    pub date: NaiveDate,
    pub metric: SeriesMetric,
    pub previous: i64,
    pub current: i64,
}

/// Ordered daily series for one region.
///
/// Dates are unique and ascending. Population is a single scalar summed once
/// across the region's subdivisions.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionalSeries {
    region: String,
    population: i64,
    records: Vec<DailyRecord>,
}

impl RegionalSeries {
    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn population(&self) -> i64 {
        self.population
    }

    pub fn records(&self) -> &[DailyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.records.iter().map(|r| r.date).collect()
    }

    pub fn cumulative_cases(&self) -> Vec<i64> {
        self.records.iter().map(|r| r.cumulative_cases).collect()
    }

    pub fn cumulative_deaths(&self) -> Vec<i64> {
        self.records.iter().map(|r| r.cumulative_deaths).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }

    /// Every day where cumulative cases or deaths dropped versus the day before.
    pub fn corrections(&self) -> Vec<Correction> {
        let mut found = Vec::new();
        for pair in self.records.windows(2) {
            let (prev, cur) = (pair[0], pair[1]);
            if cur.cumulative_cases < prev.cumulative_cases {
                found.push(Correction {
                    date: cur.date,
                    metric: SeriesMetric::Cases,
                    previous: prev.cumulative_cases,
                    current: cur.cumulative_cases,
                });
            }
            if cur.cumulative_deaths < prev.cumulative_deaths {
                found.push(Correction {
                    date: cur.date,
                    metric: SeriesMetric::Deaths,
                    previous: prev.cumulative_deaths,
                    current: cur.cumulative_deaths,
                });
            }
        }
        found
    }
}

/// Assembles aggregated totals into a [`RegionalSeries`].
pub struct SeriesBuilder;

impl SeriesBuilder {
    /// Build a series from parallel per-date totals and their header labels.
    pub fn build(
        region: &str,
        labels: &[String],
        cases: &[i64],
        deaths: &[i64],
        population: i64,
    ) -> Result<RegionalSeries> {
        if labels.len() != cases.len() || labels.len() != deaths.len() {
            return Err(PipelineError::ColumnMismatch {
                reason: format!(
                    "{} date labels but {} case totals and {} death totals",
                    labels.len(),
                    cases.len(),
                    deaths.len()
                ),
            });
        }

        let mut records = Vec::with_capacity(labels.len());
        let mut seen = HashSet::with_capacity(labels.len());
        for ((label, &c), &d) in labels.iter().zip(cases).zip(deaths) {
            let date = parse_date_label(label)?;
            if !seen.insert(date) {
                return Err(PipelineError::ColumnMismatch {
                    reason: format!("date {date} appears more than once (label {label:?})"),
                });
            }
            records.push(DailyRecord {
                date,
                cumulative_cases: c,
                cumulative_deaths: d,
            });
        }

        // Source headers are already ascending; sort anyway so the invariant
        // does not depend on file layout.
        records.sort_by_key(|r| r.date);

        debug!(
            region,
            days = records.len(),
            population,
            "built regional series"
        );

        Ok(RegionalSeries {
            region: region.to_string(),
            population,
            records,
        })
    }

    pub fn from_totals(region: &str, totals: &RegionalTotals) -> Result<RegionalSeries> {
        Self::build(
            region,
            &totals.date_labels,
            &totals.cases,
            &totals.deaths,
            totals.population,
        )
    }
}
