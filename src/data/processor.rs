//! Data Processor Module
//! Collapses a region's county rows into one total per date.

use crate::data::loader::{CountyTable, POPULATION_COLUMN};
use crate::data::series::parse_date_label;
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use tracing::{info, warn};

/// Per-date regional totals, still keyed by the raw header labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionalTotals {
    /// Date labels as they appear in the cases table header
    pub date_labels: Vec<String>,
    /// Summed cumulative cases per date
    pub cases: Vec<i64>,
    /// Summed cumulative deaths per date
    pub deaths: Vec<i64>,
    /// Population summed once across the region's subdivisions
    pub population: i64,
}

/// Sums filtered county tables into regional totals.
pub struct DataProcessor;

impl DataProcessor {
    /// Sum every date column across rows, and the deaths table's population.
    ///
    /// Each table's date columns start at its own discovered offset; the two
    /// runs must name the same dates in the same order.
    pub fn aggregate(cases: &CountyTable, deaths: &CountyTable) -> Result<RegionalTotals> {
        let case_labels = cases.date_labels();
        let death_labels = deaths.date_labels();

        if deaths.first_date_index() != cases.first_date_index() + 1 {
            warn!(
                cases_offset = cases.first_date_index(),
                deaths_offset = deaths.first_date_index(),
                "unexpected date column offsets; using header discovery"
            );
        }

        Self::check_date_alignment(&case_labels, &death_labels)?;

        let case_totals = Self::column_totals(cases.dataframe(), &case_labels)?;
        let death_totals = Self::column_totals(deaths.dataframe(), &death_labels)?;

        if !deaths.has_population() {
            return Err(PipelineError::malformed(
                deaths.source_name(),
                format!("no {POPULATION_COLUMN} column"),
            ));
        }
        let population = Self::sum_column(deaths.dataframe(), POPULATION_COLUMN)?;

        info!(
            dates = case_labels.len(),
            counties = cases.get_row_count(),
            population,
            "aggregated regional totals"
        );

        Ok(RegionalTotals {
            date_labels: case_labels,
            cases: case_totals,
            deaths: death_totals,
            population,
        })
    }

    /// Both tables must carry the same ordered dates after their offsets.
    pub fn check_date_alignment(case_labels: &[String], death_labels: &[String]) -> Result<()> {
        if case_labels.len() != death_labels.len() {
            return Err(PipelineError::ColumnMismatch {
                reason: format!(
                    "cases table has {} date columns, deaths table has {}",
                    case_labels.len(),
                    death_labels.len()
                ),
            });
        }

        for (i, (c, d)) in case_labels.iter().zip(death_labels).enumerate() {
            if !Self::same_date(c, d) {
                return Err(PipelineError::ColumnMismatch {
                    reason: format!("date column {i}: cases has {c:?}, deaths has {d:?}"),
                });
            }
        }

        Ok(())
    }

    fn same_date(a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        match (parse_date_label(a), parse_date_label(b)) {
            (Ok(x), Ok(y)) => x == y,
            _ => false,
        }
    }

    fn column_totals(df: &DataFrame, labels: &[String]) -> Result<Vec<i64>> {
        labels
            .iter()
            .map(|label| Self::sum_column(df, label))
            .collect()
    }

    fn sum_column(df: &DataFrame, name: &str) -> Result<i64> {
        Ok(df.column(name)?.i64()?.sum().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataLoader, RegionFilter, TableKind};

    const CASES: &str = "\
Admin2,Province_State,1/22/20,1/23/20,1/24/20
Anderson,Texas,0,1,2
Andrews,Texas,1,1,3
Autauga,Alabama,0,0,5
";

    const DEATHS: &str = "\
Admin2,Province_State,Population,1/22/20,1/23/20,1/24/20
Anderson,Texas,57735,0,0,0
Andrews,Texas,18705,0,0,1
Autauga,Alabama,55869,0,0,0
";

    fn load(cases: &str, deaths: &str) -> (CountyTable, CountyTable) {
        (
            DataLoader::load_reader(cases.as_bytes(), "cases", TableKind::Cases).unwrap(),
            DataLoader::load_reader(deaths.as_bytes(), "deaths", TableKind::Deaths).unwrap(),
        )
    }

    #[test]
    fn test_aggregate_sums_region_rows() {
        let (cases, deaths) = load(CASES, DEATHS);
        let cases = RegionFilter::select(&cases, "Texas").unwrap();
        let deaths = RegionFilter::select(&deaths, "Texas").unwrap();

        let totals = DataProcessor::aggregate(&cases, &deaths).unwrap();
        assert_eq!(totals.date_labels, vec!["1/22/20", "1/23/20", "1/24/20"]);
        assert_eq!(totals.cases, vec![1, 2, 5]);
        assert_eq!(totals.deaths, vec![0, 0, 1]);
        assert_eq!(totals.population, 57735 + 18705);
    }

    #[test]
    fn test_aggregate_does_not_overflow_32_bits() {
        let cases = "Province_State,1/22/20\nTexas,2147483647\nTexas,2147483647\n";
        let deaths = "Province_State,Population,1/22/20\nTexas,3000000000,1\nTexas,3000000000,1\n";
        let (cases, deaths) = load(cases, deaths);

        let totals = DataProcessor::aggregate(&cases, &deaths).unwrap();
        assert_eq!(totals.cases, vec![4_294_967_294]);
        assert_eq!(totals.population, 6_000_000_000);
    }

    #[test]
    fn test_misaligned_dates_rejected() {
        let deaths = "\
Admin2,Province_State,Population,1/22/20,1/24/20,1/25/20
Anderson,Texas,57735,0,0,0
";
        let (cases, deaths) = load(CASES, deaths);
        let err = DataProcessor::aggregate(&cases, &deaths).unwrap_err();
        assert!(matches!(err, PipelineError::ColumnMismatch { .. }));
    }

    #[test]
    fn test_different_date_counts_rejected() {
        let deaths = "\
Admin2,Province_State,Population,1/22/20,1/23/20
Anderson,Texas,57735,0,0
";
        let (cases, deaths) = load(CASES, deaths);
        let err = DataProcessor::aggregate(&cases, &deaths).unwrap_err();
        assert!(matches!(err, PipelineError::ColumnMismatch { .. }));
    }

    #[test]
    fn test_equivalent_labels_align() {
        let a = vec!["1/2/20".to_string(), "1/3/20".to_string()];
        let b = vec!["01/02/20".to_string(), "1/3/2020".to_string()];
        assert!(DataProcessor::check_date_alignment(&a, &b).is_ok());
    }
}
