//! County Table Loader Module
//! Reads wide-format county time-series CSVs into Polars DataFrames.
//!
//! Layout is discovered from the header: the first column whose label parses
//! as a `M/D/YY` date starts the run of daily cumulative counts.

use crate::data::series::parse_date_label;
use crate::error::{PipelineError, Result};
use polars::prelude::{Column, DataFrame};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// Header of the parent-region (state) column in both tables.
pub const REGION_COLUMN: &str = "Province_State";

/// Header of the population column carried by the deaths table.
pub const POPULATION_COLUMN: &str = "Population";

/// Which of the two source tables is being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Cumulative confirmed cases
    Cases,
    /// Cumulative deaths; carries a population column
    Deaths,
}

/// A loaded county table, rows and columns in source order.
#[derive(Debug, Clone)]
pub struct CountyTable {
    kind: TableKind,
    source_name: String,
    df: DataFrame,
    first_date_index: usize,
}

impl CountyTable {
    pub fn kind(&self) -> TableKind {
        self.kind
    }

    /// Path or label the table was read from.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Zero-based position of the first date column.
    pub fn first_date_index(&self) -> usize {
        self.first_date_index
    }

    pub fn get_columns(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Date column labels in header order.
    pub fn date_labels(&self) -> Vec<String> {
        self.get_columns()
            .into_iter()
            .skip(self.first_date_index)
            .collect()
    }

    pub fn get_row_count(&self) -> usize {
        self.df.height()
    }

    pub fn has_population(&self) -> bool {
        self.df.column(POPULATION_COLUMN).is_ok()
    }

    /// Same table metadata over a different (filtered) frame.
    pub(crate) fn with_dataframe(&self, df: DataFrame) -> Self {
        Self {
            kind: self.kind,
            source_name: self.source_name.clone(),
            df,
            first_date_index: self.first_date_index,
        }
    }
}

enum ColumnBuffer {
    Text(Vec<String>),
    Integer(Vec<i64>),
}

/// Handles county CSV loading.
pub struct DataLoader;

impl DataLoader {
    /// Load a county table from a CSV file.
    ///
    /// The file handle is released before this returns, on success or failure.
    pub fn load_csv(file_path: impl AsRef<Path>, kind: TableKind) -> Result<CountyTable> {
        let path = file_path.as_ref();
        let source_name = path.display().to_string();
        let file = File::open(path)?;
        let table = Self::load_reader(BufReader::new(file), &source_name, kind)?;
        info!(
            source = %source_name,
            rows = table.get_row_count(),
            dates = table.date_labels().len(),
            "loaded county table"
        );
        Ok(table)
    }

    /// Load a county table from any byte stream.
    pub fn load_reader<R: Read>(
        reader: R,
        source_name: &str,
        kind: TableKind,
    ) -> Result<CountyTable> {
        let mut rdr = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| Self::csv_error(source_name, e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(PipelineError::malformed(source_name, "missing header row"));
        }

        let mut seen = HashSet::with_capacity(headers.len());
        if let Some(dup) = headers.iter().find(|h| !seen.insert(h.as_str())) {
            return Err(PipelineError::malformed(
                source_name,
                format!("duplicate column {dup:?}"),
            ));
        }

        let first_date_index = headers
            .iter()
            .position(|h| parse_date_label(h).is_ok())
            .ok_or_else(|| PipelineError::malformed(source_name, "no date columns in header"))?;

        if !headers[..first_date_index].iter().any(|h| h == REGION_COLUMN) {
            return Err(PipelineError::malformed(
                source_name,
                format!("missing {REGION_COLUMN} column"),
            ));
        }

        let population_index = headers[..first_date_index]
            .iter()
            .position(|h| h == POPULATION_COLUMN);
        if kind == TableKind::Deaths && population_index.is_none() {
            return Err(PipelineError::malformed(
                source_name,
                format!("deaths table has no {POPULATION_COLUMN} column before its dates"),
            ));
        }

        let mut buffers: Vec<ColumnBuffer> = (0..headers.len())
            .map(|i| {
                if i >= first_date_index || Some(i) == population_index {
                    ColumnBuffer::Integer(Vec::new())
                } else {
                    ColumnBuffer::Text(Vec::new())
                }
            })
            .collect();

        for record in rdr.records() {
            let record = record.map_err(|e| Self::csv_error(source_name, e))?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();

            for (i, (cell, buffer)) in record.iter().zip(buffers.iter_mut()).enumerate() {
                match buffer {
                    ColumnBuffer::Text(values) => values.push(cell.to_string()),
                    ColumnBuffer::Integer(values) => {
                        let value = cell.trim().parse::<i64>().map_err(|_| {
                            PipelineError::malformed(
                                source_name,
                                format!(
                                    "line {line}, column {:?}: {cell:?} is not an integer",
                                    headers[i]
                                ),
                            )
                        })?;
                        values.push(value);
                    }
                }
            }
        }

        let columns: Vec<Column> = headers
            .iter()
            .zip(buffers)
            .map(|(name, buffer)| match buffer {
                ColumnBuffer::Text(values) => Column::new(name.as_str().into(), values),
                ColumnBuffer::Integer(values) => Column::new(name.as_str().into(), values),
            })
            .collect();

        let df = DataFrame::new(columns)?;

        debug!(
            source = source_name,
            ?kind,
            first_date_index,
            rows = df.height(),
            "parsed county table"
        );

        Ok(CountyTable {
            kind,
            source_name: source_name.to_string(),
            df,
            first_date_index,
        })
    }

    fn csv_error(source_name: &str, err: ::csv::Error) -> PipelineError {
        match err.into_kind() {
            ::csv::ErrorKind::Io(e) => PipelineError::Io(e),
            ::csv::ErrorKind::UnequalLengths {
                pos,
                expected_len,
                len,
            } => PipelineError::malformed(
                source_name,
                format!(
                    "line {} has {len} fields, header has {expected_len}",
                    pos.map(|p| p.line()).unwrap_or_default()
                ),
            ),
            other => PipelineError::malformed(source_name, format!("{other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CASES: &str = "\
UID,Admin2,Province_State,Country_Region,1/22/20,1/23/20,1/24/20
1,Anderson,Texas,US,0,1,2
2,Andrews,Texas,US,1,1,3
3,Autauga,Alabama,US,0,0,5
";

    const DEATHS: &str = "\
UID,Admin2,Province_State,Country_Region,Population,1/22/20,1/23/20,1/24/20
1,Anderson,Texas,US,57735,0,0,0
2,Andrews,Texas,US,18705,0,0,1
3,Autauga,Alabama,US,55869,0,0,0
";

    #[test]
    fn test_load_discovers_date_columns() {
        let table = DataLoader::load_reader(CASES.as_bytes(), "cases", TableKind::Cases).unwrap();
        assert_eq!(table.first_date_index(), 4);
        assert_eq!(table.date_labels(), vec!["1/22/20", "1/23/20", "1/24/20"]);
        assert_eq!(table.get_row_count(), 3);
        assert!(!table.has_population());

        let deaths =
            DataLoader::load_reader(DEATHS.as_bytes(), "deaths", TableKind::Deaths).unwrap();
        assert_eq!(deaths.first_date_index(), table.first_date_index() + 1);
        assert!(deaths.has_population());
    }

    #[test]
    fn test_load_preserves_row_order_and_types() {
        let table = DataLoader::load_reader(CASES.as_bytes(), "cases", TableKind::Cases).unwrap();
        let df = table.dataframe();

        let counties: Vec<&str> = df
            .column("Admin2")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(counties, vec!["Anderson", "Andrews", "Autauga"]);

        let last: Vec<i64> = df
            .column("1/24/20")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(last, vec![2, 3, 5]);
    }

    #[test]
    fn test_missing_header_is_malformed() {
        let err = DataLoader::load_reader("".as_bytes(), "empty", TableKind::Cases).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput { .. }));
    }

    #[test]
    fn test_ragged_row_is_malformed() {
        let input = "Province_State,1/22/20,1/23/20\nTexas,1,2\nTexas,3\n";
        let err = DataLoader::load_reader(input.as_bytes(), "ragged", TableKind::Cases).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput { .. }));
    }

    #[test]
    fn test_non_numeric_count_is_malformed() {
        let input = "Province_State,1/22/20,1/23/20\nTexas,1,two\n";
        let err = DataLoader::load_reader(input.as_bytes(), "bad", TableKind::Cases).unwrap_err();
        match err {
            PipelineError::MalformedInput { reason, .. } => assert!(reason.contains("1/23/20")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric_population_is_malformed() {
        let input = "Province_State,Population,1/22/20\nTexas,lots,1\n";
        let err = DataLoader::load_reader(input.as_bytes(), "bad", TableKind::Deaths).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput { .. }));
    }

    #[test]
    fn test_header_without_dates_is_malformed() {
        let input = "Province_State,Admin2\nTexas,Anderson\n";
        let err = DataLoader::load_reader(input.as_bytes(), "nodates", TableKind::Cases).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput { .. }));
    }

    #[test]
    fn test_deaths_without_population_is_malformed() {
        let err = DataLoader::load_reader(CASES.as_bytes(), "deaths", TableKind::Deaths).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput { .. }));
    }

    #[test]
    fn test_duplicate_header_is_malformed() {
        let input = "Province_State,1/22/20,1/22/20\nTexas,1,2\n";
        let err = DataLoader::load_reader(input.as_bytes(), "dup", TableKind::Cases).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = DataLoader::load_csv("/nonexistent/cases.csv", TableKind::Cases).unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
